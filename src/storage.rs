use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

const APP_NAME: &str = "dropmark";
const STORAGE_FILENAME: &str = "storage.json";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("storage file {path} is not valid JSON: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Synchronous string-keyed store holding serialized snapshots.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: String) -> Result<(), StorageError>;
}

/// Volatile store, used for tests and `--ephemeral` runs.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) -> Result<(), StorageError> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StorageFile {
    #[serde(flatten)]
    entries: BTreeMap<String, String>,
}

/// Key/value pairs kept in one JSON object on disk. Every `set` rewrites the
/// whole file.
#[derive(Debug)]
pub struct JsonFileStore {
    file_path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl JsonFileStore {
    /// Default location under the platform data directory
    pub fn default_path() -> Option<PathBuf> {
        dirs::data_dir().map(|dir| dir.join(APP_NAME).join(STORAGE_FILENAME))
    }

    /// Open the store at `file_path`. A missing file is an empty store; an
    /// unreadable one is an error so the caller can decide what to do.
    pub fn open(file_path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let file_path = file_path.into();
        let entries = if file_path.exists() {
            Self::read_entries(&file_path)?
        } else {
            BTreeMap::new()
        };
        Ok(Self { file_path, entries })
    }

    /// Like [`JsonFileStore::open`] but starts empty when the file is corrupt.
    /// The corrupt file is left untouched until the next write.
    pub fn open_or_empty(file_path: impl Into<PathBuf>) -> Self {
        let file_path = file_path.into();
        match Self::open(file_path.clone()) {
            Ok(store) => store,
            Err(e) => {
                log::error!("Failed to load storage: {e}");
                Self {
                    file_path,
                    entries: BTreeMap::new(),
                }
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }

    fn read_entries(path: &Path) -> Result<BTreeMap<String, String>, StorageError> {
        let content = fs::read_to_string(path).map_err(|source| StorageError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        let file: StorageFile =
            serde_json::from_str(&content).map_err(|source| StorageError::Json {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(file.entries)
    }

    fn save(&self) -> Result<(), StorageError> {
        let io_err = |source| StorageError::Io {
            path: self.file_path.clone(),
            source,
        };
        if let Some(parent) = self.file_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(io_err)?;
            }
        }
        let file = StorageFile {
            entries: self.entries.clone(),
        };
        let content = serde_json::to_string_pretty(&file).map_err(|source| StorageError::Json {
            path: self.file_path.clone(),
            source,
        })?;
        fs::write(&self.file_path, content).map_err(io_err)
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) -> Result<(), StorageError> {
        self.entries.insert(key.to_string(), value);
        self.save()
    }
}
