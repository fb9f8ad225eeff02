//! HttpTableClient: DynamoDB-compatible JSON protocol over HTTP.
//!
//! Requests are not signed. Point the endpoint at a local table service or a
//! signing proxy.

use std::collections::BTreeMap;

use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::client::{Item, ScanPage, TableClient};
use crate::error::{StoreError, StoreResult};

const TARGET_PREFIX: &str = "DynamoDB_20120810";
const CONTENT_TYPE_JSON: &str = "application/x-amz-json-1.0";

/// Wire form of one attribute value. Only scalar strings and numbers are used.
#[derive(Debug, Serialize, Deserialize)]
struct AttributeValue {
    #[serde(rename = "S", skip_serializing_if = "Option::is_none")]
    s: Option<String>,
    #[serde(rename = "N", skip_serializing_if = "Option::is_none")]
    n: Option<String>,
}

type WireItem = BTreeMap<String, AttributeValue>;

#[derive(Debug, Deserialize)]
struct GetItemOutput {
    #[serde(rename = "Item")]
    item: Option<WireItem>,
}

#[derive(Debug, Deserialize)]
struct ScanOutput {
    #[serde(rename = "Items", default)]
    items: Vec<WireItem>,
    #[serde(rename = "LastEvaluatedKey")]
    last_evaluated_key: Option<WireItem>,
}

#[derive(Debug, Deserialize)]
struct ServiceFault {
    #[serde(rename = "__type", default)]
    kind: String,
    #[serde(alias = "Message", default)]
    message: String,
}

fn to_wire(item: &Item) -> WireItem {
    item.iter()
        .map(|(name, value)| {
            (
                name.clone(),
                AttributeValue {
                    s: Some(value.clone()),
                    n: None,
                },
            )
        })
        .collect()
}

fn from_wire(item: WireItem) -> StoreResult<Item> {
    item.into_iter()
        .map(|(name, value)| match value.s.or(value.n) {
            Some(v) => Ok((name, v)),
            None => Err(StoreError::Malformed(format!(
                "attribute {} is not a string or number",
                name
            ))),
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct HttpTableClient {
    client: Client,
    endpoint: String,
}

impl HttpTableClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn call(&self, operation: &str, body: Value) -> StoreResult<Value> {
        debug!("{} {}", operation, self.endpoint);

        let response = self
            .client
            .post(&self.endpoint)
            .header("X-Amz-Target", format!("{}.{}", TARGET_PREFIX, operation))
            .header(CONTENT_TYPE, CONTENT_TYPE_JSON)
            .body(body.to_string())
            .send()
            .map_err(|e| StoreError::Transport {
                endpoint: self.endpoint.clone(),
                message: e.to_string(),
            })?;

        let status = response.status();
        let text = response.text().map_err(|e| StoreError::Transport {
            endpoint: self.endpoint.clone(),
            message: e.to_string(),
        })?;

        if !status.is_success() {
            let fault: ServiceFault = serde_json::from_str(&text).unwrap_or(ServiceFault {
                kind: String::new(),
                message: text.clone(),
            });
            // "com.amazonaws.dynamodb.v20120810#ResourceNotFoundException"
            let code = fault
                .kind
                .rsplit('#')
                .next()
                .filter(|c| !c.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| status.as_u16().to_string());
            warn!("{} failed with {}: {}", operation, code, fault.message);
            return Err(StoreError::Service {
                code,
                message: fault.message,
            });
        }

        if text.trim().is_empty() {
            return Ok(Value::Object(Default::default()));
        }
        serde_json::from_str(&text)
            .map_err(|e| StoreError::Malformed(format!("{} response: {}", operation, e)))
    }

    fn parse<T: for<'de> Deserialize<'de>>(operation: &str, value: Value) -> StoreResult<T> {
        serde_json::from_value(value)
            .map_err(|e| StoreError::Malformed(format!("{} response: {}", operation, e)))
    }
}

impl TableClient for HttpTableClient {
    fn get_item(&self, table: &str, key: &Item) -> StoreResult<Option<Item>> {
        let response = self.call(
            "GetItem",
            json!({ "TableName": table, "Key": to_wire(key), "ConsistentRead": true }),
        )?;
        let output: GetItemOutput = Self::parse("GetItem", response)?;
        output.item.map(from_wire).transpose()
    }

    fn put_item(&self, table: &str, item: Item) -> StoreResult<()> {
        self.call(
            "PutItem",
            json!({ "TableName": table, "Item": to_wire(&item) }),
        )?;
        Ok(())
    }

    fn delete_item(&self, table: &str, key: &Item) -> StoreResult<()> {
        self.call(
            "DeleteItem",
            json!({ "TableName": table, "Key": to_wire(key) }),
        )?;
        Ok(())
    }

    fn scan(&self, table: &str, attributes: &[&str], start: Option<&Item>) -> StoreResult<ScanPage> {
        let mut request = json!({ "TableName": table });
        if !attributes.is_empty() {
            request["AttributesToGet"] = json!(attributes);
        }
        if let Some(start) = start {
            request["ExclusiveStartKey"] = json!(to_wire(start));
        }

        let output: ScanOutput = Self::parse("Scan", self.call("Scan", request)?)?;
        Ok(ScanPage {
            items: output
                .items
                .into_iter()
                .map(from_wire)
                .collect::<StoreResult<_>>()?,
            last_evaluated_key: output.last_evaluated_key.map(from_wire).transpose()?,
        })
    }
}
