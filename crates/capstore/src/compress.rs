//! CompressedStore: zstd + base64 on the way in, the reverse on the way out.
//!
//! Backends store text, so compressed bytes are carried as standard-alphabet
//! base64. Keys, index entries and hashes pass straight through; hashes are
//! therefore of the stored (compressed) form.

use std::collections::HashMap;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tracing::trace;
use uuid::Uuid;

use crate::description::CaptureDescription;
use crate::error::{StoreError, StoreResult};
use crate::store::{CaptureStore, Keys};

const ZSTD_LEVEL: i32 = 3;

#[derive(Debug)]
pub struct CompressedStore<S> {
    inner: S,
}

impl<S: CaptureStore> CompressedStore<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn into_inner(self) -> S {
        self.inner
    }

    fn encode(key: &Uuid, value: &str) -> StoreResult<String> {
        let compressed = zstd::encode_all(value.as_bytes(), ZSTD_LEVEL).map_err(|e| {
            StoreError::Codec {
                key: *key,
                message: format!("compress: {}", e),
            }
        })?;
        trace!(
            "compressed {} from {} to {} bytes",
            key,
            value.len(),
            compressed.len()
        );
        Ok(STANDARD.encode(compressed))
    }

    fn decode(key: &Uuid, stored: &str) -> StoreResult<String> {
        let codec = |message: String| StoreError::Codec { key: *key, message };

        let compressed = STANDARD
            .decode(stored)
            .map_err(|e| codec(format!("base64: {}", e)))?;
        let bytes =
            zstd::decode_all(compressed.as_slice()).map_err(|e| codec(format!("decompress: {}", e)))?;
        String::from_utf8(bytes).map_err(|e| codec(format!("utf-8: {}", e)))
    }
}

impl<S: CaptureStore> CaptureStore for CompressedStore<S> {
    fn read(&self, key: &Uuid) -> StoreResult<Option<String>> {
        self.inner
            .read(key)?
            .map(|stored| Self::decode(key, &stored))
            .transpose()
    }

    fn write(&self, key: &Uuid, value: &str) -> StoreResult<()> {
        let encoded = Self::encode(key, value)?;
        self.inner.write(key, &encoded)
    }

    fn delete(&self, key: &Uuid) -> StoreResult<()> {
        self.inner.delete(key)
    }

    fn keys(&self) -> Keys<'_> {
        self.inner.keys()
    }

    fn hashes(&self, keys: &[Uuid]) -> StoreResult<HashMap<Uuid, String>> {
        self.inner.hashes(keys)
    }

    fn add_capture_description(&self, description: &CaptureDescription) -> StoreResult<()> {
        self.inner.add_capture_description(description)
    }

    fn capture_description(&self, location: &Uuid) -> StoreResult<Option<CaptureDescription>> {
        self.inner.capture_description(location)
    }

    fn remove_capture_description(&self, location: &Uuid) -> StoreResult<()> {
        self.inner.remove_capture_description(location)
    }

    fn capture_locations(&self) -> StoreResult<Vec<Uuid>> {
        self.inner.capture_locations()
    }
}
