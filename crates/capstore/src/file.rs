//! FileStore: durable local backend.
//!
//! Layout:
//! ```text
//! {base_path}/
//! ├── objects/
//! │   ├── 6f/
//! │   │   └── 1c2f0e-31a4-...   # blob (remainder of the key)
//! │   └── b4/
//! │       └── 522adf-5581-...
//! └── captures/
//!     └── 6f1c2f0e-31a4-....json  # CaptureDescription
//! ```
//!
//! Blobs are written to a dot-prefixed temp file beside their target and
//! renamed into place, so a reader never sees a half-written value.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;
use uuid::Uuid;

use crate::description::CaptureDescription;
use crate::error::{StoreError, StoreResult};
use crate::store::{CaptureStore, Keys};

#[derive(Debug, Clone)]
pub struct FileStore {
    base_path: PathBuf,
}

impl FileStore {
    /// Open (creating if needed) a store rooted at `path`.
    pub fn at_path(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let store = Self {
            base_path: path.into(),
        };
        let objects = store.objects_dir();
        fs::create_dir_all(&objects).map_err(|e| StoreError::io(&objects, e))?;
        let captures = store.captures_dir();
        fs::create_dir_all(&captures).map_err(|e| StoreError::io(&captures, e))?;
        Ok(store)
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn objects_dir(&self) -> PathBuf {
        self.base_path.join("objects")
    }

    fn captures_dir(&self) -> PathBuf {
        self.base_path.join("captures")
    }

    fn object_path(&self, key: &Uuid) -> PathBuf {
        let name = key.to_string();
        self.objects_dir().join(&name[..2]).join(&name[2..])
    }

    fn description_path(&self, location: &Uuid) -> PathBuf {
        self.captures_dir().join(format!("{}.json", location))
    }

    fn write_atomic(path: &Path, contents: &[u8]) -> StoreResult<()> {
        let parent = path
            .parent()
            .ok_or_else(|| StoreError::Malformed(format!("no parent for {}", path.display())))?;
        fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let temp = parent.join(format!(".{}.{}", file_name, Uuid::new_v4().simple()));

        fs::write(&temp, contents).map_err(|e| StoreError::io(&temp, e))?;
        if let Err(e) = fs::rename(&temp, path) {
            let _ = fs::remove_file(&temp);
            return Err(StoreError::io(path, e));
        }
        Ok(())
    }

    fn remove_if_present(path: &Path) -> StoreResult<()> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::io(path, e)),
        }
    }

    fn read_if_present(path: &Path) -> StoreResult<Option<String>> {
        match fs::read_to_string(path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::io(path, e)),
        }
    }
}

impl CaptureStore for FileStore {
    fn read(&self, key: &Uuid) -> StoreResult<Option<String>> {
        Self::read_if_present(&self.object_path(key))
    }

    fn write(&self, key: &Uuid, value: &str) -> StoreResult<()> {
        Self::write_atomic(&self.object_path(key), value.as_bytes())
    }

    fn delete(&self, key: &Uuid) -> StoreResult<()> {
        Self::remove_if_present(&self.object_path(key))
    }

    fn keys(&self) -> Keys<'_> {
        Box::new(ObjectKeys::new(self.objects_dir()))
    }

    fn add_capture_description(&self, description: &CaptureDescription) -> StoreResult<()> {
        let json = serde_json::to_vec_pretty(description)
            .map_err(|e| StoreError::Malformed(format!("description: {}", e)))?;
        Self::write_atomic(&self.description_path(&description.location), &json)
    }

    fn capture_description(&self, location: &Uuid) -> StoreResult<Option<CaptureDescription>> {
        let path = self.description_path(location);
        match Self::read_if_present(&path)? {
            Some(json) => serde_json::from_str(&json)
                .map(Some)
                .map_err(|e| StoreError::Malformed(format!("{}: {}", path.display(), e))),
            None => Ok(None),
        }
    }

    fn remove_capture_description(&self, location: &Uuid) -> StoreResult<()> {
        Self::remove_if_present(&self.description_path(location))
    }

    fn capture_locations(&self) -> StoreResult<Vec<Uuid>> {
        let dir = self.captures_dir();
        let entries = fs::read_dir(&dir).map_err(|e| StoreError::io(&dir, e))?;

        let mut descriptions = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StoreError::io(&dir, e))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let Some(stem) = name.strip_suffix(".json") else {
                continue;
            };
            if stem.starts_with('.') {
                continue;
            }
            let location = Uuid::parse_str(stem)
                .map_err(|e| StoreError::Malformed(format!("{}: {}", name, e)))?;
            if let Some(description) = self.capture_description(&location)? {
                descriptions.push(description);
            }
        }

        // No native order on disk; oldest capture first
        descriptions.sort_by(|a, b| {
            a.created_time
                .cmp(&b.created_time)
                .then(a.location.cmp(&b.location))
        });
        Ok(descriptions.into_iter().map(|d| d.location).collect())
    }
}

/// Walks `objects/` one prefix directory at a time.
struct ObjectKeys {
    root: PathBuf,
    prefixes: Option<fs::ReadDir>,
    current: Option<(String, fs::ReadDir)>,
    failed: bool,
}

impl ObjectKeys {
    fn new(root: PathBuf) -> Self {
        Self {
            root,
            prefixes: None,
            current: None,
            failed: false,
        }
    }

    fn next_prefix(&mut self) -> Option<StoreResult<()>> {
        if self.prefixes.is_none() {
            match fs::read_dir(&self.root) {
                Ok(p) => self.prefixes = Some(p),
                Err(e) => return Some(Err(StoreError::io(&self.root, e))),
            }
        }
        let prefixes = self.prefixes.as_mut()?;

        loop {
            let entry = match prefixes.next()? {
                Ok(entry) => entry,
                Err(e) => return Some(Err(StoreError::io(&self.root, e))),
            };
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let prefix = entry.file_name().to_string_lossy().into_owned();
            return match fs::read_dir(&path) {
                Ok(dir) => {
                    self.current = Some((prefix, dir));
                    Some(Ok(()))
                }
                Err(e) => Some(Err(StoreError::io(&path, e))),
            };
        }
    }
}

impl Iterator for ObjectKeys {
    type Item = StoreResult<Uuid>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        loop {
            if let Some((prefix, dir)) = &mut self.current {
                match dir.next() {
                    Some(Ok(entry)) => {
                        let rest = entry.file_name().to_string_lossy().into_owned();
                        if rest.starts_with('.') {
                            debug!("skipping temp file {}/{}", prefix, rest);
                            continue;
                        }
                        let name = format!("{}{}", prefix, rest);
                        return Some(
                            Uuid::parse_str(&name)
                                .map_err(|e| StoreError::Malformed(format!("{}: {}", name, e))),
                        );
                    }
                    Some(Err(e)) => {
                        self.failed = true;
                        return Some(Err(StoreError::io(self.root.join(prefix.as_str()), e)));
                    }
                    None => self.current = None,
                }
            }

            match self.next_prefix()? {
                Ok(()) => {}
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e));
                }
            }
        }
    }
}
