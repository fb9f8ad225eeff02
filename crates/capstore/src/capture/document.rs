//! Capture document format: a stream of JSON elements, one per line.
//!
//! ```text
//! {"header":{"frequency":29.9,"created_time":"2017-06-01T12:00:00Z","sensors":[{"name":"Sensor One","type":"3906c164-..."}]}}
//! {"sample":{"values":{"Sensor One":"(0.01,0.98,0.02)"}}}
//! {"sample":{"values":{"Sensor One":"(0.02,0.97,0.01)"},"time":"2017-06-01T12:00:00.067Z"}}
//! ```
//!
//! Sample indices are implied by order. Sample timestamps are derived from
//! the header; only the last sample may carry an explicit `time`.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::de::StrRead;
use serde_json::StreamDeserializer;
use uuid::Uuid;

use crate::error::CaptureError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Element {
    Header(Header),
    Sample(SampleElement),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Header {
    pub frequency: f64,
    pub created_time: DateTime<Utc>,
    pub sensors: Vec<SensorEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub type_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleElement {
    pub values: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<DateTime<Utc>>,
}

/// Serialize a header and its samples, one element per line.
pub fn write_document<'a, I>(header: &Header, samples: I) -> Result<String, CaptureError>
where
    I: IntoIterator<Item = &'a SampleElement>,
{
    let mut out = serde_json::to_string(&ElementRef::Header(header))?;
    out.push('\n');
    for sample in samples {
        out.push_str(&serde_json::to_string(&ElementRef::Sample(sample))?);
        out.push('\n');
    }
    Ok(out)
}

// Borrowing twin of Element so writing never clones sample values
#[derive(Serialize)]
#[serde(rename_all = "snake_case")]
enum ElementRef<'a> {
    Header(&'a Header),
    Sample(&'a SampleElement),
}

/// Parse the header and return a reader over the samples that follow it.
pub fn read_document(text: &str) -> Result<(Header, SampleReader<'_>), CaptureError> {
    let mut stream = serde_json::Deserializer::from_str(text).into_iter::<Element>();
    let header = match stream.next() {
        Some(Ok(Element::Header(header))) => header,
        Some(Ok(Element::Sample(_))) | None => return Err(CaptureError::MissingHeader),
        Some(Err(e)) => return Err(e.into()),
    };
    let rest = &text[stream.byte_offset()..];
    Ok((header, SampleReader::new(rest)))
}

/// Reads consecutive sample elements.
///
/// Can start at any sample element boundary. Ends at the end of input or at
/// the first element that is not a sample.
pub struct SampleReader<'a> {
    stream: StreamDeserializer<'a, StrRead<'a>, Element>,
    done: bool,
}

impl<'a> SampleReader<'a> {
    pub fn new(text: &'a str) -> Self {
        Self {
            stream: serde_json::Deserializer::from_str(text).into_iter(),
            done: false,
        }
    }
}

impl Iterator for SampleReader<'_> {
    type Item = Result<SampleElement, CaptureError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.stream.next() {
            Some(Ok(Element::Sample(sample))) => Some(Ok(sample)),
            Some(Ok(Element::Header(_))) | None => {
                self.done = true;
                None
            }
            Some(Err(e)) => {
                self.done = true;
                Some(Err(e.into()))
            }
        }
    }
}
