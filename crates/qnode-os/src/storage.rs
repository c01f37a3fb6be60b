use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};

use qnode::platform::{Storage, StorageKey};

use tracing::debug;

use crate::error::Result;

/// A [`Storage`] keeping every value in a single `JSON` document on disk.
///
/// A missing file holds no values. Each store rewrites the whole document.
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    /// Creates a [`FileStorage`] backed by `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the document path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<BTreeMap<String, String>> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == IoErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, values: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_vec_pretty(values)?)?;
        Ok(())
    }
}

impl Storage for FileStorage {
    fn load(&mut self, key: StorageKey) -> qnode::error::Result<Option<String>> {
        Ok(self.read()?.remove(key.name()))
    }

    fn store(&mut self, key: StorageKey, value: &str) -> qnode::error::Result<()> {
        let mut values = self.read()?;
        let _ = values.insert(key.name().into(), value.into());
        self.write(&values)?;
        debug!("Stored `{}` in {}", key.name(), self.path.display());
        Ok(())
    }
}
