//! Keeps a date's attendance record in step with the roster.
//!
//! Sync only ever adds names to `pending`. Names already triaged into
//! `present` or `on_leave` stay where they are even after the member departs
//! or the course is cancelled.
//!
//! Both sync and transitions are read-merge-write over the whole record with
//! no version check: two operators editing the same date concurrently lose
//! one of the two writes.

use crate::assignment::{AssignmentFilter, ResourceKind};
use crate::attendance::{AttendanceRecord, AttendanceTransition};
use crate::error::{SchedulerError, SchedulerResult};
use crate::persistence::{AssignmentStore, AttendanceStore, RosterStore};
use crate::reconcile::Period;
use chrono::{NaiveDate, Utc};
use std::collections::BTreeSet;
use tracing::{debug, info};

/// Active members of every course that has a class on `date`.
pub fn target_eligible<S>(store: &S, date: NaiveDate, marker: &str) -> SchedulerResult<BTreeSet<String>>
where
    S: AssignmentStore + RosterStore + ?Sized,
{
    let day = Period::day(date)?;
    let filter = AssignmentFilter::new()
        .kind(ResourceKind::Class)
        .dates(day.start, day.end);
    let classes = store.query_assignments(&filter)?;

    let courses: BTreeSet<String> = classes
        .iter()
        .filter(|class| day.contains(class.start_date()))
        .map(|class| class.course_name(marker).to_string())
        .collect();

    let mut eligible = BTreeSet::new();
    for course in &courses {
        for member in store.list_members(course)? {
            if member.is_active_on(date) {
                eligible.insert(member.name);
            }
        }
    }
    Ok(eligible)
}

/// Adds every target name the record does not mention yet to `pending`.
/// Returns the names that were added.
pub fn merge_missing(record: &mut AttendanceRecord, target: &BTreeSet<String>) -> BTreeSet<String> {
    let missing: BTreeSet<String> = {
        let recorded = record.recorded();
        target
            .iter()
            .filter(|name| !recorded.contains(name.as_str()))
            .cloned()
            .collect()
    };
    record.pending.extend(missing.iter().cloned());
    missing
}

/// The date's record after merging in newly eligible members. Creates the
/// record on first read and writes it back only when something was added.
pub fn sync_attendance<S>(
    store: &S,
    date: NaiveDate,
    operator: &str,
    marker: &str,
) -> SchedulerResult<AttendanceRecord>
where
    S: AssignmentStore + RosterStore + AttendanceStore + ?Sized,
{
    let target = target_eligible(store, date, marker)?;
    let mut record = store
        .get_attendance(date)?
        .unwrap_or_else(|| AttendanceRecord::empty(date));

    let missing = merge_missing(&mut record, &target);
    if missing.is_empty() {
        debug!(%date, eligible = target.len(), "attendance already in sync");
        return Ok(record);
    }

    record.stamp(operator, Utc::now());
    store.put_attendance(&record)?;
    info!(%date, added = missing.len(), %operator, "attendance synced");
    Ok(record)
}

/// Moves one name between buckets on the stored record and persists the
/// whole record. A date without a stored record has nobody to move.
pub fn transition_attendance<S>(
    store: &S,
    date: NaiveDate,
    name: &str,
    transition: AttendanceTransition,
    operator: &str,
) -> SchedulerResult<AttendanceRecord>
where
    S: AttendanceStore + ?Sized,
{
    let Some(mut record) = store.get_attendance(date)? else {
        return Err(SchedulerError::InvalidTransition {
            name: name.to_string(),
            from: transition.from,
            to: transition.to,
        });
    };

    record.apply(name, transition)?;
    record.stamp(operator, Utc::now());
    store.put_attendance(&record)?;
    info!(%date, %name, from = %transition.from, to = %transition.to, %operator, "attendance updated");
    Ok(record)
}
