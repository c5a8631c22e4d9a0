use super::memory::{MemoryStore, StoreSnapshot};
use super::{PersistenceError, PersistenceResult, RosterAdmin, validate_member};
use crate::assignment::{Assignment, iso_timestamp};
use crate::attendance::RosterMember;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::Path;

pub fn save_snapshot_to_json<P: AsRef<Path>>(store: &MemoryStore, path: P) -> PersistenceResult<()> {
    let snapshot = store.snapshot();
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, &snapshot)?;
    Ok(())
}

pub fn load_snapshot_from_json<P: AsRef<Path>>(path: P) -> PersistenceResult<MemoryStore> {
    let file = File::open(path)?;
    let snapshot: StoreSnapshot = serde_json::from_reader(file)?;
    MemoryStore::from_snapshot(snapshot)
}

#[derive(Serialize)]
struct AssignmentCsvRecord<'a> {
    id: &'a str,
    kind: &'a str,
    title: &'a str,
    start: String,
    end: String,
    assignee_name: &'a str,
    location: &'a str,
    category: &'a str,
    created_by: &'a str,
    created_at: String,
}

impl<'a> From<&'a Assignment> for AssignmentCsvRecord<'a> {
    fn from(assignment: &'a Assignment) -> Self {
        Self {
            id: &assignment.id,
            kind: assignment.kind.as_str(),
            title: &assignment.title,
            start: iso_timestamp(assignment.start),
            end: iso_timestamp(assignment.end),
            assignee_name: &assignment.assignee_name,
            location: &assignment.location,
            category: &assignment.category,
            created_by: &assignment.created_by,
            created_at: assignment.created_at.to_rfc3339(),
        }
    }
}

/// Writes assignments with a fixed header; the file feeds payroll tooling.
pub fn export_assignments_to_csv<P: AsRef<Path>>(
    assignments: &[Assignment],
    path: P,
) -> PersistenceResult<usize> {
    let file = File::create(path)?;
    let mut writer = csv::Writer::from_writer(file);
    for assignment in assignments {
        writer.serialize(AssignmentCsvRecord::from(assignment))?;
    }
    writer.flush()?;
    Ok(assignments.len())
}

#[derive(Deserialize)]
struct RosterCsvRecord {
    name: String,
    course_name: String,
    #[serde(default)]
    effective_departure_date: String,
}

impl RosterCsvRecord {
    fn into_member(self) -> PersistenceResult<RosterMember> {
        let departure = self.effective_departure_date.trim();
        let effective_departure_date = if departure.is_empty() {
            None
        } else {
            Some(NaiveDate::parse_from_str(departure, "%Y-%m-%d").map_err(|e| {
                PersistenceError::InvalidData(format!("invalid departure date '{departure}': {e}"))
            })?)
        };
        let member = RosterMember {
            name: self.name.trim().to_string(),
            course_name: self.course_name.trim().to_string(),
            effective_departure_date,
        };
        validate_member(&member)?;
        Ok(member)
    }
}

/// Reads `name,course_name,effective_departure_date` rows into `roster`.
/// Every row is validated before any member is written.
pub fn load_roster_from_csv<P, R>(path: P, roster: &R) -> PersistenceResult<usize>
where
    P: AsRef<Path>,
    R: RosterAdmin + ?Sized,
{
    let file = File::open(path)?;
    let mut reader = csv::Reader::from_reader(file);
    let mut members = Vec::new();
    for record in reader.deserialize::<RosterCsvRecord>() {
        members.push(record?.into_member()?);
    }

    if members.is_empty() {
        return Err(PersistenceError::InvalidData(
            "CSV file contained no roster members".into(),
        ));
    }

    for member in &members {
        roster.upsert_member(member)?;
    }
    Ok(members.len())
}
