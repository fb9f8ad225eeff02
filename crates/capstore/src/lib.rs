//! Capture persistence for trailcap.
//!
//! A shared crate providing the key/value store captures are saved to:
//! - **[`CaptureStore`]**: the contract every backend implements
//! - **[`CompressedStore`]**: zstd + base64 decorator over any backend
//! - **[`MemoryStore`]**, **[`FileStore`]**, **[`TableStore`]**: backends
//! - **[`Capture`]**: the recording model and its document format
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use capstore::{Capture, CaptureStore, FileStore};
//! use std::collections::{BTreeMap, HashMap};
//!
//! let store = FileStore::at_path("/var/lib/trailcap/store").unwrap();
//!
//! let mut capture = Capture::new(29.97, BTreeMap::new()).unwrap();
//! capture.add_sample(HashMap::new()).unwrap();
//! capture.save(&store).unwrap();
//!
//! let loaded = Capture::load(&store, capture.id()).unwrap();
//! println!("{} samples", loaded.samples().len());
//!
//! // Hashes let a sync process compare stores without moving blobs
//! let hashes = store.hashes(&[capture.id()]).unwrap();
//! println!("{}", hashes[&capture.id()]);
//! ```

pub mod capture;
pub mod compress;
pub mod description;
pub mod error;
pub mod file;
pub mod hash;
pub mod memory;
pub mod store;
pub mod table;

pub use capture::{Capture, Sample};
pub use compress::CompressedStore;
pub use description::CaptureDescription;
pub use error::{CaptureError, StoreError, StoreResult};
pub use file::FileStore;
pub use hash::ValueHash;
pub use memory::MemoryStore;
pub use store::{CaptureStore, Keys};
pub use table::{HttpTableClient, MemoryTable, TableStore, CAPTURE_LOCATIONS_KEY};

use std::sync::Arc;

use tracing::info;
use trailconf::{StoreKind, StoreSection};
use uuid::Uuid;

/// Build the configured backend, wrapped for compression when enabled.
///
/// `system_id` is recorded on index rows by backends that keep one per row.
pub fn open(section: &StoreSection, system_id: Uuid) -> StoreResult<Arc<dyn CaptureStore>> {
    let backend: Box<dyn CaptureStore> = match section.kind {
        StoreKind::Memory => Box::new(MemoryStore::new()),
        StoreKind::File => Box::new(FileStore::at_path(&section.path)?),
        StoreKind::Table => Box::new(TableStore::new(
            HttpTableClient::new(section.endpoint.clone()),
            system_id,
        )),
    };

    info!(
        "opened {:?} store (compress: {})",
        section.kind, section.compress
    );

    Ok(if section.compress {
        Arc::new(CompressedStore::new(backend))
    } else {
        Arc::from(backend)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_file_store_compressed() -> Result<(), Box<dyn std::error::Error>> {
        let temp_dir = TempDir::new()?;
        let section = StoreSection {
            kind: StoreKind::File,
            compress: true,
            path: temp_dir.path().to_path_buf(),
            ..StoreSection::default()
        };

        let store = open(&section, Uuid::nil())?;
        let key = Uuid::new_v4();
        store.write(&key, "compressed on disk")?;
        assert_eq!(store.read(&key)?.as_deref(), Some("compressed on disk"));

        // What reached the disk is not the plain text
        let raw = FileStore::at_path(temp_dir.path())?.read(&key)?.expect("on disk");
        assert_ne!(raw, "compressed on disk");
        Ok(())
    }

    #[test]
    fn test_open_memory_store_plain() -> StoreResult<()> {
        let section = StoreSection {
            kind: StoreKind::Memory,
            compress: false,
            ..StoreSection::default()
        };
        let store = open(&section, Uuid::nil())?;
        let key = Uuid::new_v4();
        store.write(&key, "plain")?;
        assert_eq!(store.hashes(&[key])?[&key], ValueHash::of("plain").to_string());
        Ok(())
    }
}
