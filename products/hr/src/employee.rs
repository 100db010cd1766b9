use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

/// A stored employee. `id` is the directory key and never changes once set.
///
/// `id` defaults to empty on decode so that records persisted without one can
/// still be read and then dropped by [`RecordIndex::reload`].
///
/// [`RecordIndex::reload`]: crate::RecordIndex::reload
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Employee {
    #[serde(default)]
    pub id: String,
    pub full_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    pub department: String,
    pub birth_date: NaiveDate,
    pub salary: f64,
}

/// Create payload. A missing or empty `id` gets a generated one.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEmployee {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub full_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    pub department: String,
    pub birth_date: NaiveDate,
    pub salary: f64,
}

impl NewEmployee {
    /// The caller-supplied id, if it is usable as a key.
    pub fn requested_id(&self) -> Option<&str> {
        self.id.as_deref().filter(|id| !id.is_empty())
    }

    pub(crate) fn into_employee(self, id: String) -> Employee {
        Employee {
            id,
            full_name: self.full_name,
            avatar: self.avatar,
            department: self.department,
            birth_date: self.birth_date,
            salary: self.salary,
        }
    }
}

/// Partial update. Absent fields are left untouched.
///
/// `avatar` tells "absent" (`None`) apart from an explicit `null`
/// (`Some(None)`), which clears it. `id` may only repeat the key of the record
/// being updated.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(
        default,
        deserialize_with = "explicit_null",
        skip_serializing_if = "Option::is_none"
    )]
    pub avatar: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salary: Option<f64>,
}

impl EmployeePatch {
    /// Merge every present field into `record`. The identity field is never
    /// written; callers check it first.
    pub(crate) fn apply_to(self, record: &mut Employee) {
        if let Some(full_name) = self.full_name {
            record.full_name = full_name;
        }
        if let Some(avatar) = self.avatar {
            record.avatar = avatar;
        }
        if let Some(department) = self.department {
            record.department = department;
        }
        if let Some(birth_date) = self.birth_date {
            record.birth_date = birth_date;
        }
        if let Some(salary) = self.salary {
            record.salary = salary;
        }
    }
}

fn explicit_null<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}
