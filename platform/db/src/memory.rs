use std::sync::{
    Mutex, MutexGuard, PoisonError,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};

use crate::{DurableStore, StoreError, StoreResult};

/// In-memory [`DurableStore`] for tests and ephemeral runs.
///
/// Keeps the last saved set and counts saves. Loads and saves can be forced
/// to fail to exercise error paths in callers.
#[derive(Debug)]
pub struct MemoryStore<T> {
    records: Mutex<Option<Vec<T>>>,
    saves: AtomicUsize,
    fail_saves: AtomicBool,
    fail_loads: AtomicBool,
}

impl<T> Default for MemoryStore<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T> MemoryStore<T> {
    /// A store that has never been saved to.
    pub fn empty() -> Self {
        Self {
            records: Mutex::new(None),
            saves: AtomicUsize::new(0),
            fail_saves: AtomicBool::new(false),
            fail_loads: AtomicBool::new(false),
        }
    }

    pub fn with_records(records: Vec<T>) -> Self {
        Self {
            records: Mutex::new(Some(records)),
            ..Self::empty()
        }
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    pub fn fail_loads(&self, fail: bool) {
        self.fail_loads.store(fail, Ordering::SeqCst);
    }

    fn guard(&self) -> MutexGuard<'_, Option<Vec<T>>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Clone> MemoryStore<T> {
    /// Current persisted contents, `None` if never saved or seeded.
    pub fn persisted(&self) -> Option<Vec<T>> {
        self.guard().clone()
    }
}

impl<T> DurableStore<T> for MemoryStore<T>
where
    T: Clone + Send,
{
    fn load(&self) -> StoreResult<Option<Vec<T>>> {
        if self.fail_loads.load(Ordering::SeqCst) {
            return Err(StoreError::Rejected("memory store is failing loads".into()));
        }
        Ok(self.guard().clone())
    }

    fn save(&self, records: &[T]) -> StoreResult<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(StoreError::Rejected("memory store is failing saves".into()));
        }
        *self.guard() = Some(records.to_vec());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}
