//! The CaptureStore contract.

use std::collections::HashMap;

use uuid::Uuid;

use crate::description::CaptureDescription;
use crate::error::StoreResult;
use crate::hash::ValueHash;

/// Lazy sequence of stored keys. Backends follow their own continuation
/// tokens while it is consumed, so a single iterator covers every page.
pub type Keys<'a> = Box<dyn Iterator<Item = StoreResult<Uuid>> + Send + 'a>;

/// Key-value persistence for capture blobs and their index.
///
/// Implementations must be safe to share between threads. Every operation
/// reports failures through [`StoreError`](crate::StoreError); nothing is
/// dropped silently.
pub trait CaptureStore: Send + Sync {
    /// Read the blob stored under `key`.
    ///
    /// Returns `Ok(None)` if the key doesn't exist.
    fn read(&self, key: &Uuid) -> StoreResult<Option<String>>;

    /// Store `value` under `key`, replacing any previous value.
    fn write(&self, key: &Uuid, value: &str) -> StoreResult<()>;

    /// Remove `key`. Removing an absent key is not an error.
    fn delete(&self, key: &Uuid) -> StoreResult<()>;

    /// Every stored key, without duplicates.
    fn keys(&self) -> Keys<'_>;

    /// Decimal hash of the value under each key, `""` for absent keys.
    fn hashes(&self, keys: &[Uuid]) -> StoreResult<HashMap<Uuid, String>> {
        keys.iter()
            .map(|key| {
                let value = self.read(key)?;
                Ok((*key, ValueHash::export(value.as_deref())))
            })
            .collect()
    }

    /// Record a capture in the index.
    fn add_capture_description(&self, description: &CaptureDescription) -> StoreResult<()>;

    /// Look up the index entry for a capture location.
    fn capture_description(&self, location: &Uuid) -> StoreResult<Option<CaptureDescription>>;

    /// Drop a capture from the index. The blob is left alone.
    fn remove_capture_description(&self, location: &Uuid) -> StoreResult<()>;

    /// Locations of every indexed capture, in insertion order where the
    /// backend preserves it.
    fn capture_locations(&self) -> StoreResult<Vec<Uuid>>;
}

impl<S: CaptureStore + ?Sized> CaptureStore for std::sync::Arc<S> {
    fn read(&self, key: &Uuid) -> StoreResult<Option<String>> {
        (**self).read(key)
    }

    fn write(&self, key: &Uuid, value: &str) -> StoreResult<()> {
        (**self).write(key, value)
    }

    fn delete(&self, key: &Uuid) -> StoreResult<()> {
        (**self).delete(key)
    }

    fn keys(&self) -> Keys<'_> {
        (**self).keys()
    }

    fn hashes(&self, keys: &[Uuid]) -> StoreResult<HashMap<Uuid, String>> {
        (**self).hashes(keys)
    }

    fn add_capture_description(&self, description: &CaptureDescription) -> StoreResult<()> {
        (**self).add_capture_description(description)
    }

    fn capture_description(&self, location: &Uuid) -> StoreResult<Option<CaptureDescription>> {
        (**self).capture_description(location)
    }

    fn remove_capture_description(&self, location: &Uuid) -> StoreResult<()> {
        (**self).remove_capture_description(location)
    }

    fn capture_locations(&self) -> StoreResult<Vec<Uuid>> {
        (**self).capture_locations()
    }
}

impl<S: CaptureStore + ?Sized> CaptureStore for Box<S> {
    fn read(&self, key: &Uuid) -> StoreResult<Option<String>> {
        (**self).read(key)
    }

    fn write(&self, key: &Uuid, value: &str) -> StoreResult<()> {
        (**self).write(key, value)
    }

    fn delete(&self, key: &Uuid) -> StoreResult<()> {
        (**self).delete(key)
    }

    fn keys(&self) -> Keys<'_> {
        (**self).keys()
    }

    fn hashes(&self, keys: &[Uuid]) -> StoreResult<HashMap<Uuid, String>> {
        (**self).hashes(keys)
    }

    fn add_capture_description(&self, description: &CaptureDescription) -> StoreResult<()> {
        (**self).add_capture_description(description)
    }

    fn capture_description(&self, location: &Uuid) -> StoreResult<Option<CaptureDescription>> {
        (**self).capture_description(location)
    }

    fn remove_capture_description(&self, location: &Uuid) -> StoreResult<()> {
        (**self).remove_capture_description(location)
    }

    fn capture_locations(&self) -> StoreResult<Vec<Uuid>> {
        (**self).capture_locations()
    }
}
