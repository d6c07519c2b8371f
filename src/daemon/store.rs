//! Persistent key-value state store.
//!
//! All records live in a single JSON document keyed by record name. The
//! daemon is the only writer; it keeps the document in memory and rewrites
//! the file atomically (temp file + rename) on every change, so readers in
//! other processes always see a complete, committed document.

use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// Record keys.
pub mod keys {
    pub const TIMER_STATE: &str = "timerState";
    pub const STOPWATCH_STATE: &str = "stopwatchState";
    pub const POMODORO_STATE: &str = "pomodoroState";
    pub const POMODORO_SETTINGS: &str = "pomodoroSettings";
    pub const SCHEDULED_WAKES: &str = "scheduledWakes";
    pub const PINNED_TIMER_TYPE: &str = "pinnedTimerType";
}

// ============================================================================
// StoreError
// ============================================================================

/// Errors raised by the state store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Reading or writing the store file failed.
    #[error("状態ファイルの入出力に失敗しました ({path}): {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The store file is not a JSON object.
    #[error("状態ファイルが破損しています: {0}")]
    Corrupt(String),

    /// A record could not be serialized.
    #[error("レコードのシリアライズに失敗しました: {0}")]
    Serialize(#[from] serde_json::Error),
}

// ============================================================================
// StateStore
// ============================================================================

/// JSON document store, optionally backed by a file.
#[derive(Debug)]
pub struct StateStore {
    /// Backing file; `None` keeps everything in memory
    path: Option<PathBuf>,
    /// Current document
    document: Map<String, Value>,
}

impl StateStore {
    /// Opens the store at `path`.
    ///
    /// A missing file yields an empty document. A corrupt file is logged and
    /// replaced by an empty document on the next write.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let document = match Self::read_document(path) {
            Ok(Some(document)) => document,
            Ok(None) => Map::new(),
            Err(StoreError::Corrupt(reason)) => {
                tracing::warn!("状態ファイルを初期化します ({:?}): {}", path, reason);
                Map::new()
            }
            Err(e) => return Err(e),
        };

        Ok(Self {
            path: Some(path.to_path_buf()),
            document,
        })
    }

    /// Creates a store that is never written to disk.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            path: None,
            document: Map::new(),
        }
    }

    /// Reads the committed document at `path` without taking ownership of it.
    ///
    /// Returns `Ok(None)` when the file does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a JSON object.
    pub fn read_document(path: &Path) -> Result<Option<Map<String, Value>>, StoreError> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(StoreError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        match serde_json::from_slice::<Value>(&bytes) {
            Ok(Value::Object(document)) => Ok(Some(document)),
            Ok(_) => Err(StoreError::Corrupt("トップレベルがオブジェクトではありません".into())),
            Err(e) => Err(StoreError::Corrupt(e.to_string())),
        }
    }

    /// Returns true if a record is stored under `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.document.contains_key(key)
    }

    /// Reads the record under `key`.
    ///
    /// A missing or malformed record reads as `T::default()`.
    pub fn get<T: DeserializeOwned + Default>(&self, key: &str) -> T {
        record_or_default(&self.document, key)
    }

    /// Writes the record under `key` and commits the document.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the file write fails. The
    /// in-memory document is updated either way.
    pub fn set<T: Serialize>(&mut self, key: &str, value: &T) -> Result<(), StoreError> {
        let value = serde_json::to_value(value)?;
        self.document.insert(key.to_string(), value);
        self.commit()
    }

    /// Writes several records with a single commit.
    ///
    /// # Errors
    ///
    /// Returns an error if the file write fails.
    pub fn set_many(&mut self, records: Vec<(&str, Value)>) -> Result<(), StoreError> {
        for (key, value) in records {
            self.document.insert(key.to_string(), value);
        }
        self.commit()
    }

    /// Returns the current document.
    pub fn document(&self) -> &Map<String, Value> {
        &self.document
    }

    fn commit(&self) -> Result<(), StoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let io_err = |source| StoreError::Io {
            path: path.clone(),
            source,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        let json = serde_json::to_vec_pretty(&self.document)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(io_err)?;
        fs::rename(&tmp, path).map_err(io_err)?;
        Ok(())
    }
}

/// Deserializes `key` from `document`, falling back to the default.
pub fn record_or_default<T: DeserializeOwned + Default>(
    document: &Map<String, Value>,
    key: &str,
) -> T {
    match document.get(key) {
        Some(value) => serde_json::from_value(value.clone()).unwrap_or_else(|e| {
            tracing::warn!("レコード '{}' を読み込めません。既定値を使用します: {}", key, e);
            T::default()
        }),
        None => T::default(),
    }
}

// ============================================================================
// Tests
// ============================================================================
