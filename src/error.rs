use crate::attendance::AttendanceBucket;
use crate::persistence::PersistenceError;
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("end time {end} must be after start time {start}")]
    InvalidTimeRange { start: NaiveTime, end: NaiveTime },

    #[error("repeat count {count} must be between 1 and {max}")]
    InvalidCount { count: i64, max: u32 },

    #[error("calendar source unavailable: {0}")]
    CalendarSourceUnavailable(String),

    /// Removals were applied but some creates failed. Re-running the same
    /// reconciliation adds exactly the `pending` dates.
    #[error(
        "partial reconciliation: added {added}, removed {removed}, {} date(s) still pending",
        pending.len()
    )]
    PartialReconciliation {
        added: usize,
        removed: usize,
        pending: Vec<NaiveDate>,
    },

    #[error("cannot move '{name}' from {from} to {to}")]
    InvalidTransition {
        name: String,
        from: AttendanceBucket,
        to: AttendanceBucket,
    },

    #[error("scope violation: {0}")]
    ScopeViolation(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

impl SchedulerError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        SchedulerError::InvalidInput(message.into())
    }

    pub fn scope_violation(message: impl Into<String>) -> Self {
        SchedulerError::ScopeViolation(message.into())
    }
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;

/// Non-fatal calendar failure. Scheduling continues as if the failed lookup
/// returned no exclusions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarWarning {
    pub lookup: CalendarLookup,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "key")]
pub enum CalendarLookup {
    Holidays(i32),
    Vacations(String),
}

impl fmt::Display for CalendarWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.lookup {
            CalendarLookup::Holidays(year) => {
                write!(f, "holidays for {year} unavailable ({})", self.message)
            }
            CalendarLookup::Vacations(resource) => {
                write!(f, "vacations for {resource} unavailable ({})", self.message)
            }
        }
    }
}
