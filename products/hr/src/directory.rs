use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use platform_db::DurableStore;
use tracing::{debug, info};

use crate::{
    employee::{Employee, EmployeePatch, NewEmployee},
    error::DirectoryResult,
    index::{MemoryIndex, RecordIndex, ReloadReport},
};

pub type EmployeeStore = Arc<dyn DurableStore<Employee>>;

/// The process-wide employee directory: one [`RecordIndex`] paired with the
/// [`DurableStore`] it was loaded from.
///
/// A single lock guards the whole index. Reads share it; mutations and the
/// snapshot-save cycle of [`Directory::flush`] take it exclusively, so a save
/// never interleaves with a write. Nothing is persisted until `flush` is
/// called.
pub struct Directory<I = MemoryIndex> {
    index: RwLock<I>,
    store: EmployeeStore,
}

impl<I: RecordIndex> Directory<I> {
    /// Load every record from `store` into a fresh index.
    ///
    /// When the store has never been written, the directory starts with
    /// unsaved changes so that the first flush creates it.
    pub fn open(store: EmployeeStore) -> DirectoryResult<Self> {
        let loaded = store.load()?;
        let mut index = I::empty(loaded.is_none());
        let report = index.reload(loaded.unwrap_or_default());
        info!(
            location = %store.location(),
            loaded = report.loaded,
            skipped = report.skipped,
            "employee directory loaded"
        );
        Ok(Self {
            index: RwLock::new(index),
            store,
        })
    }

    fn read(&self) -> RwLockReadGuard<'_, I> {
        self.index.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, I> {
        self.index.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add(&self, record: NewEmployee) -> DirectoryResult<Employee> {
        let stored = self.write().add(record)?;
        debug!(id = %stored.id, "employee added");
        Ok(stored)
    }

    pub fn get(&self, id: &str) -> Option<Employee> {
        self.read().get(id)
    }

    pub fn get_all(&self, department: Option<&str>) -> Vec<Employee> {
        self.read().get_all(department)
    }

    pub fn update(&self, id: &str, patch: EmployeePatch) -> DirectoryResult<Employee> {
        let updated = self.write().update(id, patch)?;
        debug!(%id, "employee updated");
        Ok(updated)
    }

    pub fn delete(&self, id: &str) -> DirectoryResult<Employee> {
        let removed = self.write().delete(id)?;
        debug!(%id, "employee deleted");
        Ok(removed)
    }

    pub fn snapshot(&self) -> Vec<Employee> {
        self.read().to_snapshot()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.read().has_unsaved_changes()
    }

    /// Save the full record set if anything changed since the last save.
    ///
    /// Returns whether a save happened. A failed save keeps the unsaved flag
    /// so the next flush retries.
    pub fn flush(&self) -> DirectoryResult<bool> {
        let mut index = self.write();
        if !index.has_unsaved_changes() {
            return Ok(false);
        }
        let snapshot = index.to_snapshot();
        self.store.save(&snapshot)?;
        index.set_unsaved_changes(false);
        info!(
            location = %self.store.location(),
            records = snapshot.len(),
            "employee directory flushed"
        );
        Ok(true)
    }

    /// Discard in-memory state and load again from the store.
    pub fn reload(&self) -> DirectoryResult<ReloadReport> {
        let mut index = self.write();
        let loaded = self.store.load()?;
        let fresh = loaded.is_none();
        let report = index.reload(loaded.unwrap_or_default());
        index.set_unsaved_changes(fresh);
        info!(
            location = %self.store.location(),
            loaded = report.loaded,
            skipped = report.skipped,
            "employee directory reloaded"
        );
        Ok(report)
    }
}
