use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};
use std::sync::Mutex;

use tracing::debug;

use crate::workflows::admissions::repository::{DocumentVault, VaultError};

/// Writes documents beneath a root directory, one file per key.
#[derive(Debug, Clone)]
pub struct FilesystemVault {
    root: PathBuf,
}

impl FilesystemVault {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, key: &str) -> Result<PathBuf, VaultError> {
        let relative = Path::new(key);
        let escapes = relative
            .components()
            .any(|component| !matches!(component, Component::Normal(_)));
        if key.is_empty() || escapes {
            return Err(VaultError::Unavailable(format!(
                "refusing storage key outside vault: {key}"
            )));
        }
        Ok(self.root.join(relative))
    }
}

impl DocumentVault for FilesystemVault {
    fn put(&self, key: &str, bytes: &[u8]) -> Result<String, VaultError> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|err| match err.kind() {
                io::ErrorKind::AlreadyExists => VaultError::KeyTaken(key.to_string()),
                _ => VaultError::Io(err),
            })?;
        file.write_all(bytes)?;
        debug!(path = %path.display(), size = bytes.len(), "document stored");
        Ok(path.to_string_lossy().into_owned())
    }
}

/// In-process vault used by tests and the demo.
#[derive(Debug, Default)]
pub struct MemoryVault {
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryVault {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.objects
            .lock()
            .ok()
            .and_then(|objects| objects.get(key).cloned())
    }

    pub fn len(&self) -> usize {
        self.objects.lock().map(|objects| objects.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DocumentVault for MemoryVault {
    fn put(&self, key: &str, bytes: &[u8]) -> Result<String, VaultError> {
        let mut objects = self
            .objects
            .lock()
            .map_err(|_| VaultError::Unavailable("vault lock poisoned".to_string()))?;
        match objects.entry(key.to_string()) {
            Entry::Occupied(_) => Err(VaultError::KeyTaken(key.to_string())),
            Entry::Vacant(slot) => {
                slot.insert(bytes.to_vec());
                Ok(format!("memory://{key}"))
            }
        }
    }
}
