//! Synchronous key-value persistence backends.
//!
//! The store persists one record (the full session collection) under a fixed
//! key. The boundary is deliberately narrow: read a string, write a string,
//! both synchronous.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use askdoc_core::Result;

/// Synchronous key-value persistence.
///
/// Implementations must make `write` atomic enough that a torn record is
/// never observed by a later `read` (the file backend writes a temp file and
/// renames it into place).
pub trait KvStorage: Send + Sync {
    /// Read the value stored under `key`, or `None` if absent.
    fn read(&self, key: &str) -> Result<Option<String>>;

    /// Overwrite the value stored under `key`.
    fn write(&self, key: &str, value: &str) -> Result<()>;
}

impl<T: KvStorage + ?Sized> KvStorage for std::sync::Arc<T> {
    fn read(&self, key: &str) -> Result<Option<String>> {
        (**self).read(key)
    }

    fn write(&self, key: &str, value: &str) -> Result<()> {
        (**self).write(key, value)
    }
}

/// File-backed storage: one `<key>.json` file per key inside a base
/// directory.
pub struct FileStorage {
    base_dir: PathBuf,
}

impl FileStorage {
    /// Create a file storage rooted at `base_dir`, creating the directory
    /// if needed.
    pub fn new(base_dir: impl AsRef<Path>) -> Result<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        fs::create_dir_all(&base_dir)?;
        Ok(Self { base_dir })
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.base_dir.join(format!("{}.json", key))
    }
}

impl KvStorage for FileStorage {
    fn read(&self, key: &str) -> Result<Option<String>> {
        let path = self.key_path(key);
        match fs::read_to_string(&path) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, key: &str, value: &str) -> Result<()> {
        let path = self.key_path(key);
        let tmp = self.base_dir.join(format!("{}.json.tmp", key));
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}

/// In-memory storage for tests and ephemeral runs.
#[derive(Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStorage for MemoryStorage {
    fn read(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.lock().unwrap().get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}
