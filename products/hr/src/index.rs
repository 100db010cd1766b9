//! The [`RecordIndex`] contract and its `HashMap` implementation.

use std::collections::{HashMap, hash_map::Entry};

use tracing::warn;
use uuid::Uuid;

use crate::{
    employee::{Employee, EmployeePatch, NewEmployee},
    error::{DirectoryError, DirectoryResult},
};

/// Outcome of a [`RecordIndex::reload`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReloadReport {
    pub loaded: usize,
    pub skipped: usize,
}

/// In-memory keyed employee storage.
///
/// Implementations are single-writer and synchronous; sharing across threads
/// is the job of [`Directory`](crate::Directory). Every mutating operation
/// touches at most one key and leaves the index unchanged when it fails.
pub trait RecordIndex {
    /// An index with no records and the given unsaved-changes flag.
    fn empty(has_unsaved_changes: bool) -> Self
    where
        Self: Sized;

    /// Replace every record with `records`. Records without an id are
    /// skipped and reported. The unsaved-changes flag is left as it was.
    fn reload(&mut self, records: Vec<Employee>) -> ReloadReport;

    /// Insert a new record, generating an id when none is given.
    fn add(&mut self, record: NewEmployee) -> DirectoryResult<Employee>;

    fn get(&self, id: &str) -> Option<Employee>;

    /// Every record, or those whose department matches exactly.
    fn get_all(&self, department: Option<&str>) -> Vec<Employee>;

    /// Merge `patch` into the record stored under `id`.
    fn update(&mut self, id: &str, patch: EmployeePatch) -> DirectoryResult<Employee>;

    /// Remove and return the record stored under `id`.
    fn delete(&mut self, id: &str) -> DirectoryResult<Employee>;

    fn to_snapshot(&self) -> Vec<Employee>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn has_unsaved_changes(&self) -> bool;

    fn set_unsaved_changes(&mut self, value: bool);
}

/// Fresh random identifier for records created without one.
fn generate_id() -> String {
    Uuid::new_v4().to_string()
}

#[derive(Debug, Default)]
pub struct MemoryIndex {
    records: HashMap<String, Employee>,
    unsaved: bool,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecordIndex for MemoryIndex {
    fn empty(has_unsaved_changes: bool) -> Self {
        Self {
            records: HashMap::new(),
            unsaved: has_unsaved_changes,
        }
    }

    fn reload(&mut self, records: Vec<Employee>) -> ReloadReport {
        self.records.clear();
        self.records.reserve(records.len());
        let mut report = ReloadReport::default();
        for record in records {
            if record.id.is_empty() {
                warn!(full_name = %record.full_name, "skipping employee without id");
                report.skipped += 1;
                continue;
            }
            match self.records.insert(record.id.clone(), record) {
                Some(previous) => {
                    warn!(id = %previous.id, "duplicate employee id; keeping the later record")
                }
                None => report.loaded += 1,
            }
        }
        report
    }

    fn add(&mut self, record: NewEmployee) -> DirectoryResult<Employee> {
        let id = match record.requested_id() {
            Some(id) => id.to_string(),
            None => generate_id(),
        };
        match self.records.entry(id) {
            Entry::Occupied(entry) => Err(DirectoryError::AlreadyExists {
                id: entry.key().clone(),
            }),
            Entry::Vacant(entry) => {
                let id = entry.key().clone();
                let stored = entry.insert(record.into_employee(id)).clone();
                self.unsaved = true;
                Ok(stored)
            }
        }
    }

    fn get(&self, id: &str) -> Option<Employee> {
        self.records.get(id).cloned()
    }

    fn get_all(&self, department: Option<&str>) -> Vec<Employee> {
        self.records
            .values()
            .filter(|record| department.is_none_or(|wanted| record.department == wanted))
            .cloned()
            .collect()
    }

    fn update(&mut self, id: &str, mut patch: EmployeePatch) -> DirectoryResult<Employee> {
        let record = self
            .records
            .get_mut(id)
            .ok_or_else(|| DirectoryError::not_found(id))?;
        if let Some(requested) = patch.id.take() {
            if requested != id {
                return Err(DirectoryError::IdentityChange {
                    id: id.to_string(),
                    requested,
                });
            }
        }
        patch.apply_to(record);
        self.unsaved = true;
        Ok(record.clone())
    }

    fn delete(&mut self, id: &str) -> DirectoryResult<Employee> {
        let removed = self
            .records
            .remove(id)
            .ok_or_else(|| DirectoryError::not_found(id))?;
        self.unsaved = true;
        Ok(removed)
    }

    fn to_snapshot(&self) -> Vec<Employee> {
        self.records.values().cloned().collect()
    }

    fn len(&self) -> usize {
        self.records.len()
    }

    fn has_unsaved_changes(&self) -> bool {
        self.unsaved
    }

    fn set_unsaved_changes(&mut self, value: bool) {
        self.unsaved = value;
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use chrono::NaiveDate;

    use super::*;

    fn employee(id: &str, full_name: &str, department: &str) -> Employee {
        Employee {
            id: id.into(),
            full_name: full_name.into(),
            avatar: None,
            department: department.into(),
            birth_date: NaiveDate::from_ymd_opt(1988, 2, 29).unwrap(),
            salary: 1000.0,
        }
    }

    fn new_employee(id: Option<&str>, full_name: &str, department: &str) -> NewEmployee {
        NewEmployee {
            id: id.map(str::to_string),
            full_name: full_name.into(),
            avatar: None,
            department: department.into(),
            birth_date: NaiveDate::from_ymd_opt(1992, 7, 1).unwrap(),
            salary: 1000.0,
        }
    }

    fn seeded() -> MemoryIndex {
        let mut index = MemoryIndex::empty(false);
        index.reload(vec![
            employee("e1", "Ann", "Eng"),
            employee("e2", "Bob", "Sales"),
            employee("e3", "Cy", "sales"),
        ]);
        index
    }

    fn ids(records: &[Employee]) -> HashSet<String> {
        records.iter().map(|record| record.id.clone()).collect()
    }

    #[test]
    fn add_without_id_assigns_fresh_identity() {
        let mut index = MemoryIndex::new();
        let joe = index.add(new_employee(None, "Joe", "Sales")).unwrap();

        assert!(!joe.id.is_empty());
        assert!(Uuid::parse_str(&joe.id).is_ok());
        assert!(index.has_unsaved_changes());

        let all = index.get_all(None);
        let matching: Vec<_> = all.iter().filter(|r| r.id == joe.id).collect();
        assert_eq!(matching.len(), 1);
        assert_eq!(matching[0], &joe);
        assert_eq!(joe.full_name, "Joe");
        assert_eq!(joe.department, "Sales");
        assert_eq!(joe.salary, 1000.0);
    }

    #[test]
    fn generated_ids_do_not_repeat() {
        let mut index = MemoryIndex::new();
        let created: HashSet<String> = (0..64)
            .map(|n| {
                index
                    .add(new_employee(None, &format!("emp-{n}"), "Ops"))
                    .unwrap()
                    .id
            })
            .collect();
        assert_eq!(created.len(), 64);
        assert_eq!(index.len(), 64);
    }

    #[test]
    fn empty_explicit_id_is_replaced() {
        let mut index = MemoryIndex::new();
        let stored = index.add(new_employee(Some(""), "Joe", "Sales")).unwrap();
        assert!(!stored.id.is_empty());
    }

    #[test]
    fn duplicate_explicit_id_is_rejected() {
        let mut index = MemoryIndex::new();
        index.add(new_employee(Some("e9"), "First", "Eng")).unwrap();
        let err = index
            .add(new_employee(Some("e9"), "Second", "Ops"))
            .unwrap_err();

        assert!(matches!(err, DirectoryError::AlreadyExists { ref id } if id == "e9"));
        let all = index.get_all(None);
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].full_name, "First");
    }

    #[test]
    fn update_missing_id_leaves_index_untouched() {
        let mut index = seeded();
        let err = index
            .update(
                "missing-id",
                EmployeePatch {
                    salary: Some(1.0),
                    ..EmployeePatch::default()
                },
            )
            .unwrap_err();

        assert!(matches!(err, DirectoryError::NotFound { ref id } if id == "missing-id"));
        assert_eq!(index.len(), 3);
        assert!(!index.has_unsaved_changes());
    }

    #[test]
    fn update_merges_present_fields() {
        let mut index = seeded();
        let updated = index
            .update(
                "e2",
                EmployeePatch {
                    department: Some("Eng".into()),
                    salary: Some(4100.5),
                    ..EmployeePatch::default()
                },
            )
            .unwrap();

        assert_eq!(updated.id, "e2");
        assert_eq!(updated.full_name, "Bob");
        assert_eq!(updated.department, "Eng");
        assert_eq!(updated.salary, 4100.5);
        assert_eq!(index.get("e2"), Some(updated));
        assert!(index.has_unsaved_changes());
    }

    #[test]
    fn update_accepts_matching_id_in_patch() {
        let mut index = seeded();
        let updated = index
            .update(
                "e1",
                EmployeePatch {
                    id: Some("e1".into()),
                    full_name: Some("Ann Lee".into()),
                    ..EmployeePatch::default()
                },
            )
            .unwrap();
        assert_eq!(updated.id, "e1");
        assert_eq!(updated.full_name, "Ann Lee");
    }

    #[test]
    fn update_rejects_identity_change() {
        let mut index = seeded();
        let err = index
            .update(
                "e1",
                EmployeePatch {
                    id: Some("e7".into()),
                    full_name: Some("Renamed".into()),
                    ..EmployeePatch::default()
                },
            )
            .unwrap_err();

        assert!(matches!(
            err,
            DirectoryError::IdentityChange { ref id, ref requested } if id == "e1" && requested == "e7"
        ));
        let kept = index.get("e1").unwrap();
        assert_eq!(kept.full_name, "Ann");
        assert!(index.get("e7").is_none());
        assert!(!index.has_unsaved_changes());
    }

    #[test]
    fn delete_removes_and_then_reports_missing() {
        let mut index = seeded();
        let removed = index.delete("e1").unwrap();
        assert_eq!(removed, employee("e1", "Ann", "Eng"));
        assert!(index.has_unsaved_changes());
        assert!(!ids(&index.get_all(None)).contains("e1"));

        let err = index.delete("e1").unwrap_err();
        assert!(matches!(err, DirectoryError::NotFound { .. }));
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn department_filter_is_exact_and_case_sensitive() {
        let index = seeded();
        let sales = index.get_all(Some("Sales"));
        assert_eq!(ids(&sales), HashSet::from(["e2".to_string()]));

        let everyone = index.get_all(None);
        assert_eq!(everyone.len(), 3);
        assert!(index.get_all(Some("Marketing")).is_empty());
    }

    #[test]
    fn get_all_returns_a_snapshot() {
        let mut index = seeded();
        let before = index.get_all(None);
        index
            .update(
                "e1",
                EmployeePatch {
                    full_name: Some("Changed".into()),
                    ..EmployeePatch::default()
                },
            )
            .unwrap();
        index.delete("e2").unwrap();

        assert_eq!(before.len(), 3);
        let ann = before.iter().find(|record| record.id == "e1").unwrap();
        assert_eq!(ann.full_name, "Ann");
    }

    #[test]
    fn reload_skips_records_without_id() {
        let mut index = MemoryIndex::empty(false);
        let report = index.reload(vec![
            employee("", "Bad", "Eng"),
            employee("e1", "Ann", "Eng"),
        ]);

        assert_eq!(report, ReloadReport { loaded: 1, skipped: 1 });
        assert_eq!(index.len(), 1);
        assert_eq!(index.get("e1").unwrap().full_name, "Ann");
    }

    #[test]
    fn reload_replaces_previous_contents_and_keeps_flag() {
        let mut index = seeded();
        index.add(new_employee(Some("e4"), "Dee", "Ops")).unwrap();
        index.reload(vec![employee("x1", "Xi", "Ops")]);

        assert_eq!(ids(&index.get_all(None)), HashSet::from(["x1".to_string()]));
        assert!(index.has_unsaved_changes());

        let mut clean = MemoryIndex::empty(false);
        clean.reload(vec![employee("x1", "Xi", "Ops")]);
        assert!(!clean.has_unsaved_changes());
    }

    #[test]
    fn reload_with_duplicate_ids_keeps_the_later_record() {
        let mut index = MemoryIndex::new();
        let report = index.reload(vec![
            employee("e1", "Old", "Eng"),
            employee("e1", "New", "Eng"),
        ]);
        assert_eq!(report, ReloadReport { loaded: 1, skipped: 0 });
        assert_eq!(index.get("e1").unwrap().full_name, "New");
    }

    #[test]
    fn snapshot_round_trips_through_reload() {
        let mut index = seeded();
        index.add(new_employee(None, "Joe", "Sales")).unwrap();
        let mut before = index.to_snapshot();

        let mut restored = MemoryIndex::new();
        restored.reload(index.to_snapshot());
        let mut after = restored.to_snapshot();

        before.sort_by(|a, b| a.id.cmp(&b.id));
        after.sort_by(|a, b| a.id.cmp(&b.id));
        assert_eq!(before, after);
    }
}
