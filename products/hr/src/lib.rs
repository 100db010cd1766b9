//! HR vertical slice: employee records held in an in-memory index that is
//! seeded from, and flushed back to, a durable store.

mod directory;
mod employee;
mod error;
mod index;

pub use directory::{Directory, EmployeeStore};
pub use employee::{Employee, EmployeePatch, NewEmployee};
pub use error::{DirectoryError, DirectoryResult};
pub use index::{MemoryIndex, RecordIndex, ReloadReport};
