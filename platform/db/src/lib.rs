//! Durable storage primitives for record sets that live in memory and are
//! flushed wholesale.
//!
//! A [`DurableStore`] loads the full record set once and saves the full set on
//! demand. It knows nothing about identities or indexing; that belongs to the
//! caller holding the records in memory.

mod file;
mod memory;

use std::path::{Path, PathBuf};

use thiserror::Error;

pub use file::JsonFileStore;
pub use memory::MemoryStore;

/// Default location of the data file, relative to the working directory.
pub const DEFAULT_DATA_FILE: &str = "data/employees.json";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to access {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed data in {}{}: {source}", .path.display(), entry_suffix(.position))]
    Serialization {
        path: PathBuf,
        /// Array position of the offending record, when a single record failed.
        position: Option<usize>,
        #[source]
        source: serde_json::Error,
    },
    #[error("store rejected the request: {0}")]
    Rejected(String),
}

impl StoreError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn serialization(path: &Path, source: serde_json::Error) -> Self {
        Self::Serialization {
            path: path.to_path_buf(),
            position: None,
            source,
        }
    }

    pub(crate) fn entry(path: &Path, position: usize, source: serde_json::Error) -> Self {
        Self::Serialization {
            path: path.to_path_buf(),
            position: Some(position),
            source,
        }
    }
}

fn entry_suffix(position: &Option<usize>) -> String {
    position
        .map(|position| format!(" at entry {position}"))
        .unwrap_or_default()
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Whole-set persistence contract.
///
/// Implementations must be thread-safe; callers serialize `save` against
/// their own mutations.
pub trait DurableStore<T>: Send + Sync {
    /// Load every persisted record.
    ///
    /// Returns `Ok(None)` when nothing has been persisted yet, which lets the
    /// caller tell a fresh deployment apart from an empty record set.
    fn load(&self) -> StoreResult<Option<Vec<T>>>;

    /// Replace the persisted record set with `records`.
    fn save(&self, records: &[T]) -> StoreResult<()>;

    /// Human readable location, used in log events.
    fn location(&self) -> String;
}

/// Environment-driven settings for the file-backed store.
#[derive(Clone, Debug)]
pub struct StoreSettings {
    pub data_file: PathBuf,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            data_file: PathBuf::from(DEFAULT_DATA_FILE),
        }
    }
}

impl StoreSettings {
    pub fn new(data_file: impl Into<PathBuf>) -> Self {
        Self {
            data_file: data_file.into(),
        }
    }

    /// Read `DATA_FILE`, falling back to [`DEFAULT_DATA_FILE`].
    pub fn from_env() -> Self {
        std::env::var("DATA_FILE")
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .map(Self::new)
            .unwrap_or_default()
    }

    pub fn open_json(&self) -> JsonFileStore {
        JsonFileStore::new(&self.data_file)
    }
}
