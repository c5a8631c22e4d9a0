use crate::assignment::{Assignment, AssignmentFilter, AssignmentId, AssignmentUpdate, NewAssignment};
use crate::attendance::{AttendanceRecord, RosterMember};
use crate::calendar::VacationWindow;
use chrono::NaiveDate;
use serde_json::Error as SerdeJsonError;
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("serialization error: {0}")]
    Serialization(#[from] SerdeJsonError),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[cfg(feature = "sqlite")]
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("invalid data: {0}")]
    InvalidData(String),
    #[error("{0} not found")]
    NotFound(String),
}

pub type PersistenceResult<T> = Result<T, PersistenceError>;

/// Document store for assignments. No locking: last write wins per document.
pub trait AssignmentStore: Send + Sync {
    /// Matching assignments ordered by `start`, then `id`.
    fn query_assignments(&self, filter: &AssignmentFilter) -> PersistenceResult<Vec<Assignment>>;
    fn get_assignment(&self, id: &str) -> PersistenceResult<Option<Assignment>>;
    fn create_assignment(&self, assignment: NewAssignment) -> PersistenceResult<AssignmentId>;
    /// Deletes every listed id in one batch; returns how many existed.
    fn batch_delete_assignments(&self, ids: &[AssignmentId]) -> PersistenceResult<usize>;
    fn update_assignment(&self, id: &str, update: &AssignmentUpdate) -> PersistenceResult<()>;
}

pub trait RosterStore: Send + Sync {
    fn list_members(&self, course_name: &str) -> PersistenceResult<Vec<RosterMember>>;
}

/// Write side of the roster, owned by roster management rather than the scheduler.
pub trait RosterAdmin: RosterStore {
    fn upsert_member(&self, member: &RosterMember) -> PersistenceResult<()>;
    fn remove_member(&self, name: &str, course_name: &str) -> PersistenceResult<bool>;
    fn all_members(&self) -> PersistenceResult<Vec<RosterMember>>;
}

/// Whole-record storage: `put` replaces the date's record.
pub trait AttendanceStore: Send + Sync {
    fn get_attendance(&self, date: NaiveDate) -> PersistenceResult<Option<AttendanceRecord>>;
    fn put_attendance(&self, record: &AttendanceRecord) -> PersistenceResult<()>;
}

pub trait VacationStore: Send + Sync {
    fn vacations_for(&self, resource_name: &str) -> PersistenceResult<Vec<VacationWindow>>;
    fn insert_vacation(&self, window: &VacationWindow) -> PersistenceResult<()>;
}

/// Everything the scheduler facade reads and writes.
pub trait SchedulerStore: AssignmentStore + RosterStore + AttendanceStore + VacationStore {}

impl<T> SchedulerStore for T where
    T: AssignmentStore + RosterStore + AttendanceStore + VacationStore + ?Sized
{
}

pub fn validate_new_assignment(assignment: &NewAssignment) -> PersistenceResult<()> {
    if assignment.assignee_name.trim().is_empty() {
        return Err(PersistenceError::InvalidData(
            "assignment requires an assignee".into(),
        ));
    }
    if assignment.end <= assignment.start {
        return Err(PersistenceError::InvalidData(format!(
            "assignment end {} must be after start {}",
            assignment.end, assignment.start
        )));
    }
    Ok(())
}

pub fn validate_member(member: &RosterMember) -> PersistenceResult<()> {
    if member.name.trim().is_empty() || member.course_name.trim().is_empty() {
        return Err(PersistenceError::InvalidData(
            "roster member requires a name and a course".into(),
        ));
    }
    Ok(())
}

pub mod file;
pub mod memory;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use file::{
    export_assignments_to_csv, load_roster_from_csv, load_snapshot_from_json,
    save_snapshot_to_json,
};
pub use memory::{MemoryStore, StoreSnapshot};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;
