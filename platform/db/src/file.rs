use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};

use serde::{Serialize, de::DeserializeOwned};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::{DurableStore, StoreError, StoreResult};

/// Stores the record set as a pretty-printed JSON array in a single file.
///
/// Saves go through a temp file in the same directory that is synced and then
/// renamed over the target, so a crash mid-save leaves the previous file
/// intact. On load, an entry without an `id` that fails to decode is skipped
/// with a warning. A keyed entry that fails to decode fails the whole load,
/// since dropping it would erase it from disk on the next save.
#[derive(Clone, Debug)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn parent_dir(&self) -> &Path {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }
}

impl<T> DurableStore<T> for JsonFileStore
where
    T: Serialize + DeserializeOwned,
{
    fn load(&self) -> StoreResult<Option<Vec<T>>> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "data file missing; starting empty");
                return Ok(None);
            }
            Err(err) => return Err(StoreError::io(&self.path, err)),
        };
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Some(Vec::new()));
        }

        let entries: Vec<serde_json::Value> = serde_json::from_slice(&bytes)
            .map_err(|err| StoreError::serialization(&self.path, err))?;
        let mut records = Vec::with_capacity(entries.len());
        for (position, entry) in entries.into_iter().enumerate() {
            let keyed = has_key(&entry);
            match serde_json::from_value(entry) {
                Ok(record) => records.push(record),
                Err(err) if keyed => return Err(StoreError::entry(&self.path, position, err)),
                Err(err) => warn!(
                    path = %self.path.display(),
                    position,
                    error = %err,
                    "skipping undecodable record without id"
                ),
            }
        }
        Ok(Some(records))
    }

    fn save(&self, records: &[T]) -> StoreResult<()> {
        let dir = self.parent_dir();
        fs::create_dir_all(dir).map_err(|err| StoreError::io(dir, err))?;

        let mut file = NamedTempFile::new_in(dir).map_err(|err| StoreError::io(dir, err))?;
        serde_json::to_writer_pretty(&mut file, records)
            .map_err(|err| StoreError::serialization(&self.path, err))?;
        file.write_all(b"\n")
            .and_then(|_| file.as_file().sync_all())
            .map_err(|err| StoreError::io(file.path(), err))?;
        file.persist(&self.path)
            .map_err(|err| StoreError::io(&self.path, err.error))?;

        debug!(path = %self.path.display(), records = records.len(), "data file written");
        Ok(())
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

/// Whether an entry carries an identity worth refusing to lose.
fn has_key(entry: &serde_json::Value) -> bool {
    match entry.get("id") {
        None | Some(serde_json::Value::Null) => false,
        Some(serde_json::Value::String(id)) => !id.is_empty(),
        Some(_) => true,
    }
}
