//! MemoryStore: in-process backend for the mock board and tests.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use uuid::Uuid;

use crate::description::CaptureDescription;
use crate::error::StoreResult;
use crate::store::{CaptureStore, Keys};

/// Blobs and index held in maps. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: RwLock<HashMap<Uuid, String>>,
    // Vec keeps insertion order for capture_locations
    index: RwLock<Vec<CaptureDescription>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.data
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CaptureStore for MemoryStore {
    fn read(&self, key: &Uuid) -> StoreResult<Option<String>> {
        let data = self.data.read().unwrap_or_else(PoisonError::into_inner);
        Ok(data.get(key).cloned())
    }

    fn write(&self, key: &Uuid, value: &str) -> StoreResult<()> {
        let mut data = self.data.write().unwrap_or_else(PoisonError::into_inner);
        data.insert(*key, value.to_string());
        Ok(())
    }

    fn delete(&self, key: &Uuid) -> StoreResult<()> {
        let mut data = self.data.write().unwrap_or_else(PoisonError::into_inner);
        data.remove(key);
        Ok(())
    }

    fn keys(&self) -> Keys<'_> {
        let keys: Vec<Uuid> = self
            .data
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .copied()
            .collect();
        Box::new(keys.into_iter().map(Ok))
    }

    fn add_capture_description(&self, description: &CaptureDescription) -> StoreResult<()> {
        let mut index = self.index.write().unwrap_or_else(PoisonError::into_inner);
        index.retain(|d| d.location != description.location);
        index.push(description.clone());
        Ok(())
    }

    fn capture_description(&self, location: &Uuid) -> StoreResult<Option<CaptureDescription>> {
        let index = self.index.read().unwrap_or_else(PoisonError::into_inner);
        Ok(index.iter().find(|d| d.location == *location).cloned())
    }

    fn remove_capture_description(&self, location: &Uuid) -> StoreResult<()> {
        let mut index = self.index.write().unwrap_or_else(PoisonError::into_inner);
        index.retain(|d| d.location != *location);
        Ok(())
    }

    fn capture_locations(&self) -> StoreResult<Vec<Uuid>> {
        let index = self.index.read().unwrap_or_else(PoisonError::into_inner);
        Ok(index.iter().map(|d| d.location).collect())
    }
}
