pub mod annotate;
pub mod assignment;
pub mod attendance;
pub mod calendar;
pub mod config;
pub mod error;
#[cfg(feature = "http_api")]
pub mod http_api;
pub mod logging;
pub mod persistence;
pub mod preview;
pub mod reconcile;
pub mod recurrence;
pub mod reschedule;
pub mod roster_sync;
pub mod scheduler;

pub use annotate::{Occurrence, annotate};
pub use assignment::{Assignment, AssignmentFilter, AssignmentId, NewAssignment, ResourceKind};
pub use attendance::{AttendanceBucket, AttendanceRecord, AttendanceTransition, RosterMember};
pub use calendar::{CachedHolidaySource, FixedHolidays, Holiday, HolidaySet, HolidaySource, VacationWindow};
pub use config::SchedulerConfig;
pub use error::{CalendarWarning, SchedulerError, SchedulerResult};
pub use preview::{CommitSummary, PreviewKey, PreviewRequest, PreviewSession};
pub use reconcile::{Period, ReconcileScope, ReconcileSummary};
pub use recurrence::{RecurrenceRule, StepUnit};
pub use reschedule::{RescheduleOutcome, RescheduleProposal};
pub use scheduler::{Scheduler, ShiftCalendarSync, ShiftCalendarView};
