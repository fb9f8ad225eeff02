//! Row-level access to a remote key/value table service.

use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock};

use crate::error::{StoreError, StoreResult};

/// One row: attribute name to string value.
pub type Item = BTreeMap<String, String>;

/// One page of a scan.
#[derive(Debug, Clone, Default)]
pub struct ScanPage {
    pub items: Vec<Item>,
    /// Continuation token; `None` once the table is exhausted.
    pub last_evaluated_key: Option<Item>,
}

/// Operations the table backend needs from the service.
pub trait TableClient: Send + Sync {
    fn get_item(&self, table: &str, key: &Item) -> StoreResult<Option<Item>>;

    fn put_item(&self, table: &str, item: Item) -> StoreResult<()>;

    fn delete_item(&self, table: &str, key: &Item) -> StoreResult<()>;

    /// Fetch one page, projecting `attributes`, starting after `start`.
    fn scan(&self, table: &str, attributes: &[&str], start: Option<&Item>) -> StoreResult<ScanPage>;
}

/// Build a single-attribute key.
pub fn key_of(attribute: &str, value: impl Into<String>) -> Item {
    let mut key = Item::new();
    key.insert(attribute.to_string(), value.into());
    key
}

struct Table {
    key_attribute: String,
    rows: BTreeMap<String, Item>,
}

/// In-process table service.
///
/// Pages scans like the real service does: a full page always carries a
/// continuation token, even when nothing follows it.
pub struct MemoryTable {
    tables: RwLock<HashMap<String, Table>>,
    page_size: usize,
    unavailable: AtomicBool,
}

impl MemoryTable {
    pub const DEFAULT_PAGE_SIZE: usize = 100;

    pub fn new() -> Self {
        Self::with_page_size(Self::DEFAULT_PAGE_SIZE)
    }

    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
            page_size: page_size.max(1),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Declare a table keyed on `key_attribute`.
    pub fn create_table(&self, name: &str, key_attribute: &str) {
        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        tables.entry(name.to_string()).or_insert_with(|| Table {
            key_attribute: key_attribute.to_string(),
            rows: BTreeMap::new(),
        });
    }

    /// Make every request fail as if the service were down.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Service {
                code: "ServiceUnavailable".to_string(),
                message: "table service is unavailable".to_string(),
            });
        }
        Ok(())
    }

    fn key_value(table: &Table, item: &Item) -> StoreResult<String> {
        item.get(&table.key_attribute).cloned().ok_or_else(|| {
            StoreError::Service {
                code: "ValidationException".to_string(),
                message: format!("missing key attribute {}", table.key_attribute),
            }
        })
    }
}

impl Default for MemoryTable {
    fn default() -> Self {
        Self::new()
    }
}

fn not_found(table: &str) -> StoreError {
    StoreError::Service {
        code: "ResourceNotFoundException".to_string(),
        message: format!("table {} does not exist", table),
    }
}

impl TableClient for MemoryTable {
    fn get_item(&self, table: &str, key: &Item) -> StoreResult<Option<Item>> {
        self.check_available()?;
        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        let t = tables.get(table).ok_or_else(|| not_found(table))?;
        let id = Self::key_value(t, key)?;
        Ok(t.rows.get(&id).cloned())
    }

    fn put_item(&self, table: &str, item: Item) -> StoreResult<()> {
        self.check_available()?;
        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        let t = tables.get_mut(table).ok_or_else(|| not_found(table))?;
        let id = Self::key_value(t, &item)?;
        t.rows.insert(id, item);
        Ok(())
    }

    fn delete_item(&self, table: &str, key: &Item) -> StoreResult<()> {
        self.check_available()?;
        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        let t = tables.get_mut(table).ok_or_else(|| not_found(table))?;
        let id = Self::key_value(t, key)?;
        t.rows.remove(&id);
        Ok(())
    }

    fn scan(&self, table: &str, attributes: &[&str], start: Option<&Item>) -> StoreResult<ScanPage> {
        self.check_available()?;
        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        let t = tables.get(table).ok_or_else(|| not_found(table))?;

        let lower = match start {
            Some(key) => Bound::Excluded(Self::key_value(t, key)?),
            None => Bound::Unbounded,
        };

        let rows: Vec<(&String, &Item)> = t
            .rows
            .range((lower, Bound::Unbounded))
            .take(self.page_size)
            .collect();

        let last_evaluated_key = if rows.len() == self.page_size {
            rows.last()
                .map(|(id, _)| key_of(&t.key_attribute, id.as_str()))
        } else {
            None
        };

        let items = rows
            .into_iter()
            .map(|(_, item)| {
                if attributes.is_empty() {
                    item.clone()
                } else {
                    item.iter()
                        .filter(|(name, _)| attributes.contains(&name.as_str()))
                        .map(|(name, value)| (name.clone(), value.clone()))
                        .collect()
                }
            })
            .collect();

        Ok(ScanPage {
            items,
            last_evaluated_key,
        })
    }
}
