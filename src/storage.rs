use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
    #[error("Failed to access storage file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Corrupt value under '{key}': {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Persistent string key-value store
pub trait StorageSource {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError>;
}

impl<T: StorageSource> StorageSource for Rc<RefCell<T>> {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.borrow().get(key)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.borrow_mut().set(key, value)
    }
}

/// Storage kept in memory for the lifetime of the value
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    items: HashMap<String, String>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_item(mut self, key: &str, value: &str) -> Self {
        self.items.insert(key.to_string(), value.to_string());
        self
    }
}

impl StorageSource for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.items.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.items.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Storage backed by a JSON object file mapping keys to string values
///
/// A missing file reads as empty; it is created on the first write.
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> StorageError {
        StorageError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }

    fn read_items(&self) -> Result<BTreeMap<String, String>, StorageError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(self.io_error(e)),
        };
        if raw.trim().is_empty() {
            return Ok(BTreeMap::new());
        }

        serde_json::from_str(&raw).map_err(|source| StorageError::Corrupt {
            key: self.path.display().to_string(),
            source,
        })
    }
}

impl StorageSource for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.read_items()?.remove(key))
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        // An unreadable file is overwritten rather than blocking every save
        let mut items = self.read_items().unwrap_or_else(|e| {
            tracing::warn!("discarding unreadable storage file: {e}");
            BTreeMap::new()
        });
        items.insert(key.to_string(), value.to_string());

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }
        let body = serde_json::to_string_pretty(&items).map_err(|source| StorageError::Corrupt {
            key: key.to_string(),
            source,
        })?;
        fs::write(&self.path, body).map_err(|e| self.io_error(e))
    }
}

/// Persisted filter envelope
///
/// `present` separates "saved an empty set" from "never saved"; both have
/// an empty `filters` list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedFilters {
    pub filters: Vec<String>,
    pub present: bool,
}

/// Loads and saves the filter envelope under a single storage key
#[derive(Debug)]
pub struct Persistence<S> {
    storage: S,
    key: String,
}

impl<S: StorageSource> Persistence<S> {
    pub fn new(storage: S, key: impl Into<String>) -> Self {
        Self {
            storage,
            key: key.into(),
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    pub fn into_storage(self) -> S {
        self.storage
    }

    /// Read and validate the envelope
    pub fn try_load(&self) -> Result<Option<SavedFilters>, StorageError> {
        let Some(raw) = self.storage.get(&self.key)? else {
            return Ok(None);
        };

        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|source| StorageError::Corrupt {
                key: self.key.clone(),
                source,
            })
    }

    /// Read the envelope; any storage or shape problem reads as nothing saved
    pub fn load(&self) -> Option<SavedFilters> {
        match self.try_load() {
            Ok(saved) => saved,
            Err(e) => {
                tracing::warn!("ignoring saved filters: {e}");
                None
            }
        }
    }

    /// Remember `tokens` as an explicit selection, including an empty one
    pub fn save(&mut self, tokens: &[String]) -> Result<(), StorageError> {
        self.write(&SavedFilters {
            filters: tokens.to_vec(),
            present: true,
        })
    }

    /// Forget the saved selection so defaults apply again
    pub fn clear(&mut self) -> Result<(), StorageError> {
        self.write(&SavedFilters {
            filters: Vec::new(),
            present: false,
        })
    }

    fn write(&mut self, saved: &SavedFilters) -> Result<(), StorageError> {
        let body = serde_json::to_string(saved).map_err(|source| StorageError::Corrupt {
            key: self.key.clone(),
            source,
        })?;
        tracing::debug!(key = %self.key, filters = saved.filters.len(), "saving filters");
        self.storage.set(&self.key, &body)
    }
}
