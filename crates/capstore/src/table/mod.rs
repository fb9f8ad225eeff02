//! TableStore: captures kept in a remote key/value table service.
//!
//! Two tables:
//! - `DATA` {`ID`, `VALUE`}: one row per key.
//! - `CAPTURES` {`LOCATION`, `SYSTEM`, `CREATEDTIME`, `FREQUENCY`}: one row per
//!   indexed capture.
//!
//! The service has no ordered secondary index, so the list of capture
//! locations is kept comma-joined in `DATA` under [`CAPTURE_LOCATIONS_KEY`].

pub mod client;
pub mod http;

use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, SecondsFormat, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use crate::description::CaptureDescription;
use crate::error::{StoreError, StoreResult};
use crate::store::{CaptureStore, Keys};
use client::{key_of, Item, TableClient};

pub use client::{MemoryTable, ScanPage};
pub use http::HttpTableClient;

pub const DATA_TABLE: &str = "DATA";
pub const CAPTURES_TABLE: &str = "CAPTURES";

/// Reserved `DATA` key holding the capture-location list. Never listed by `keys()`.
pub const CAPTURE_LOCATIONS_KEY: Uuid = Uuid::from_u128(0xb4522adf_5581_4e5a_a2e8_6ea94d25c0b3);

const ID: &str = "ID";
const VALUE: &str = "VALUE";
const LOCATION: &str = "LOCATION";
const SYSTEM: &str = "SYSTEM";
const CREATED_TIME: &str = "CREATEDTIME";
const FREQUENCY: &str = "FREQUENCY";

pub struct TableStore<C> {
    client: C,
    system_id: Uuid,
    // Serializes read-modify-write of the location list
    index_lock: Mutex<()>,
}

impl<C: TableClient> TableStore<C> {
    /// `system_id` is stamped on every `CAPTURES` row this store writes.
    pub fn new(client: C, system_id: Uuid) -> Self {
        Self {
            client,
            system_id,
            index_lock: Mutex::new(()),
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    fn read_locations(&self) -> StoreResult<Vec<Uuid>> {
        let Some(list) = self.read(&CAPTURE_LOCATIONS_KEY)? else {
            return Ok(Vec::new());
        };
        list.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                Uuid::parse_str(s)
                    .map_err(|e| StoreError::Malformed(format!("capture location {}: {}", s, e)))
            })
            .collect()
    }

    fn write_locations(&self, locations: &[Uuid]) -> StoreResult<()> {
        let list = locations
            .iter()
            .map(Uuid::to_string)
            .collect::<Vec<_>>()
            .join(",");
        self.write(&CAPTURE_LOCATIONS_KEY, &list)
    }

    fn description_from_row(row: &Item) -> StoreResult<CaptureDescription> {
        let field = |name: &str| {
            row.get(name)
                .ok_or_else(|| StoreError::Malformed(format!("{} row missing {}", CAPTURES_TABLE, name)))
        };

        let location = Uuid::parse_str(field(LOCATION)?)
            .map_err(|e| StoreError::Malformed(format!("{}: {}", LOCATION, e)))?;
        let created_time = DateTime::parse_from_rfc3339(field(CREATED_TIME)?)
            .map_err(|e| StoreError::Malformed(format!("{}: {}", CREATED_TIME, e)))?
            .with_timezone(&Utc);
        let frequency = field(FREQUENCY)?
            .parse()
            .map_err(|e| StoreError::Malformed(format!("{}: {}", FREQUENCY, e)))?;

        Ok(CaptureDescription::new(location, created_time, frequency))
    }
}

impl<C: TableClient> CaptureStore for TableStore<C> {
    fn read(&self, key: &Uuid) -> StoreResult<Option<String>> {
        let row = self.client.get_item(DATA_TABLE, &key_of(ID, key.to_string()))?;
        match row {
            Some(mut row) => match row.remove(VALUE) {
                Some(value) => Ok(Some(value)),
                None => Err(StoreError::Malformed(format!(
                    "{} row {} has no {}",
                    DATA_TABLE, key, VALUE
                ))),
            },
            None => Ok(None),
        }
    }

    fn write(&self, key: &Uuid, value: &str) -> StoreResult<()> {
        let mut item = key_of(ID, key.to_string());
        item.insert(VALUE.to_string(), value.to_string());
        self.client.put_item(DATA_TABLE, item)
    }

    fn delete(&self, key: &Uuid) -> StoreResult<()> {
        self.client.delete_item(DATA_TABLE, &key_of(ID, key.to_string()))
    }

    fn keys(&self) -> Keys<'_> {
        Box::new(ScanKeys::new(&self.client))
    }

    fn add_capture_description(&self, description: &CaptureDescription) -> StoreResult<()> {
        let _guard = self.index_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut row = key_of(LOCATION, description.location.to_string());
        row.insert(SYSTEM.to_string(), self.system_id.to_string());
        row.insert(
            CREATED_TIME.to_string(),
            description
                .created_time
                .to_rfc3339_opts(SecondsFormat::AutoSi, true),
        );
        row.insert(FREQUENCY.to_string(), description.frequency.to_string());
        self.client.put_item(CAPTURES_TABLE, row)?;

        let mut locations = self.read_locations()?;
        if !locations.contains(&description.location) {
            locations.push(description.location);
            self.write_locations(&locations)?;
        }
        info!("indexed capture {}", description.location);
        Ok(())
    }

    fn capture_description(&self, location: &Uuid) -> StoreResult<Option<CaptureDescription>> {
        self.client
            .get_item(CAPTURES_TABLE, &key_of(LOCATION, location.to_string()))?
            .map(|row| Self::description_from_row(&row))
            .transpose()
    }

    fn remove_capture_description(&self, location: &Uuid) -> StoreResult<()> {
        let _guard = self.index_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut locations = self.read_locations()?;
        let before = locations.len();
        locations.retain(|l| l != location);
        if locations.len() != before {
            self.write_locations(&locations)?;
        }
        self.client
            .delete_item(CAPTURES_TABLE, &key_of(LOCATION, location.to_string()))
    }

    fn capture_locations(&self) -> StoreResult<Vec<Uuid>> {
        self.read_locations()
    }
}

/// Follows scan continuation tokens until the table is exhausted.
struct ScanKeys<'a, C> {
    client: &'a C,
    buffer: std::vec::IntoIter<Item>,
    next_start: Option<Item>,
    started: bool,
    done: bool,
    seen: HashSet<Uuid>,
}

impl<'a, C: TableClient> ScanKeys<'a, C> {
    fn new(client: &'a C) -> Self {
        Self {
            client,
            buffer: Vec::new().into_iter(),
            next_start: None,
            started: false,
            done: false,
            seen: HashSet::new(),
        }
    }

    fn fetch_page(&mut self) -> StoreResult<bool> {
        if self.started && self.next_start.is_none() {
            return Ok(false);
        }
        let page = self
            .client
            .scan(DATA_TABLE, &[ID], self.next_start.as_ref())?;
        self.started = true;
        debug!(
            "scanned {} keys, more: {}",
            page.items.len(),
            page.last_evaluated_key.is_some()
        );
        self.next_start = page.last_evaluated_key;
        self.buffer = page.items.into_iter();
        Ok(true)
    }
}

impl<C: TableClient> Iterator for ScanKeys<'_, C> {
    type Item = StoreResult<Uuid>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            if let Some(row) = self.buffer.next() {
                let Some(id) = row.get(ID) else {
                    return Some(Err(StoreError::Malformed(format!(
                        "{} row without {}",
                        DATA_TABLE, ID
                    ))));
                };
                let key = match Uuid::parse_str(id) {
                    Ok(key) => key,
                    Err(e) => {
                        return Some(Err(StoreError::Malformed(format!("key {}: {}", id, e))))
                    }
                };
                if key == CAPTURE_LOCATIONS_KEY || !self.seen.insert(key) {
                    continue;
                }
                return Some(Ok(key));
            }

            match self.fetch_page() {
                Ok(true) => {}
                Ok(false) => self.done = true,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::ValueHash;
    use std::sync::Arc;
    use std::thread;

    fn table_store(page_size: usize) -> TableStore<MemoryTable> {
        let table = MemoryTable::with_page_size(page_size);
        table.create_table(DATA_TABLE, ID);
        table.create_table(CAPTURES_TABLE, LOCATION);
        TableStore::new(table, Uuid::new_v4())
    }

    #[test]
    fn test_reserved_key_constant() {
        assert_eq!(
            CAPTURE_LOCATIONS_KEY.to_string(),
            "b4522adf-5581-4e5a-a2e8-6ea94d25c0b3"
        );
    }

    #[test]
    fn test_keys_cross_every_page() -> StoreResult<()> {
        let store = table_store(7);
        let written: HashSet<Uuid> = (0..45).map(|_| Uuid::new_v4()).collect();
        for key in &written {
            store.write(key, "v")?;
        }
        store.add_capture_description(&CaptureDescription::new(
            *written.iter().next().expect("non-empty"),
            Utc::now(),
            10.0,
        ))?;

        let listed: Vec<Uuid> = store.keys().collect::<StoreResult<_>>()?;
        assert_eq!(listed.len(), written.len());
        assert!(!listed.contains(&CAPTURE_LOCATIONS_KEY));
        assert_eq!(listed.into_iter().collect::<HashSet<_>>(), written);
        Ok(())
    }

    #[test]
    fn test_scenario_write_read_delete_hash() -> StoreResult<()> {
        let store = table_store(10);
        let k1 = Uuid::new_v4();

        store.write(&k1, "hello")?;
        assert_eq!(store.read(&k1)?.as_deref(), Some("hello"));
        assert_eq!(store.hashes(&[k1])?[&k1], ValueHash::of("hello").to_string());

        store.delete(&k1)?;
        assert_eq!(store.read(&k1)?, None);
        assert_eq!(store.hashes(&[k1])?[&k1], "");
        Ok(())
    }

    #[test]
    fn test_index_round_trip() -> StoreResult<()> {
        let store = table_store(10);
        let first = CaptureDescription::new(Uuid::new_v4(), Utc::now(), 29.97);
        let second = CaptureDescription::new(Uuid::new_v4(), Utc::now(), 10.0);

        store.add_capture_description(&first)?;
        store.add_capture_description(&second)?;
        store.add_capture_description(&first)?;

        assert_eq!(
            store.capture_locations()?,
            vec![first.location, second.location]
        );
        assert_eq!(
            store.read(&CAPTURE_LOCATIONS_KEY)?,
            Some(format!("{},{}", first.location, second.location))
        );

        let row = store
            .client()
            .get_item(CAPTURES_TABLE, &key_of(LOCATION, first.location.to_string()))?
            .expect("row written");
        assert_eq!(row[SYSTEM], store.system_id.to_string());
        assert_eq!(row[FREQUENCY], "29.97");

        let restored = store.capture_description(&first.location)?.expect("indexed");
        assert_eq!(restored, first);

        store.remove_capture_description(&first.location)?;
        assert_eq!(store.capture_locations()?, vec![second.location]);
        assert_eq!(store.capture_description(&first.location)?, None);
        Ok(())
    }

    #[test]
    fn test_concurrent_index_updates_are_not_lost() -> StoreResult<()> {
        let store = Arc::new(table_store(10));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let store = store.clone();
                thread::spawn(move || {
                    let description = CaptureDescription::new(Uuid::new_v4(), Utc::now(), 1.0);
                    store.add_capture_description(&description).map(|_| description.location)
                })
            })
            .collect();

        let mut expected = HashSet::new();
        for handle in handles {
            expected.insert(handle.join().expect("thread panicked")?);
        }

        let listed: HashSet<Uuid> = store.capture_locations()?.into_iter().collect();
        assert_eq!(listed, expected);
        Ok(())
    }

    #[test]
    fn test_service_failure_surfaces() {
        let store = table_store(10);
        store.client().set_unavailable(true);

        assert!(matches!(
            store.write(&Uuid::new_v4(), "x"),
            Err(StoreError::Service { .. })
        ));
        let first = store.keys().next();
        assert!(matches!(first, Some(Err(StoreError::Service { .. }))));
    }
}
