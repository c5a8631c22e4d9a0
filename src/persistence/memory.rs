use super::{
    AssignmentStore, AttendanceStore, PersistenceError, PersistenceResult, RosterAdmin,
    RosterStore, VacationStore, validate_member, validate_new_assignment,
};
use crate::assignment::{Assignment, AssignmentFilter, AssignmentId, AssignmentUpdate, NewAssignment};
use crate::attendance::{AttendanceRecord, RosterMember};
use crate::calendar::VacationWindow;
use chrono::{NaiveDate, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Plain-data copy of a store's contents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    #[serde(default)]
    pub assignments: Vec<Assignment>,
    #[serde(default)]
    pub roster: Vec<RosterMember>,
    #[serde(default)]
    pub attendance: Vec<AttendanceRecord>,
    #[serde(default)]
    pub vacations: Vec<VacationWindow>,
}

#[derive(Default)]
struct MemoryState {
    assignments: BTreeMap<AssignmentId, Assignment>,
    roster: Vec<RosterMember>,
    attendance: BTreeMap<NaiveDate, AttendanceRecord>,
    vacations: Vec<VacationWindow>,
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: StoreSnapshot) -> PersistenceResult<Self> {
        let mut state = MemoryState::default();
        for assignment in snapshot.assignments {
            if state
                .assignments
                .insert(assignment.id.clone(), assignment)
                .is_some()
            {
                return Err(PersistenceError::InvalidData(
                    "snapshot contains duplicate assignment ids".into(),
                ));
            }
        }
        for member in snapshot.roster {
            validate_member(&member)?;
            state.roster.push(member);
        }
        for record in snapshot.attendance {
            if !record.is_disjoint() {
                return Err(PersistenceError::InvalidData(format!(
                    "attendance for {} lists a name in more than one bucket",
                    record.date
                )));
            }
            state.attendance.insert(record.date, record);
        }
        state.vacations = snapshot.vacations;
        Ok(Self {
            state: Mutex::new(state),
        })
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        let state = self.state.lock();
        let mut assignments: Vec<Assignment> = state.assignments.values().cloned().collect();
        assignments.sort_by(|a, b| a.start.cmp(&b.start).then_with(|| a.id.cmp(&b.id)));
        StoreSnapshot {
            assignments,
            roster: state.roster.clone(),
            attendance: state.attendance.values().cloned().collect(),
            vacations: state.vacations.clone(),
        }
    }

    /// Stores an assignment with a caller-chosen id, replacing any existing one.
    pub fn insert_assignment(&self, assignment: Assignment) {
        self.state
            .lock()
            .assignments
            .insert(assignment.id.clone(), assignment);
    }

    pub fn assignment_count(&self) -> usize {
        self.state.lock().assignments.len()
    }
}

impl AssignmentStore for MemoryStore {
    fn query_assignments(&self, filter: &AssignmentFilter) -> PersistenceResult<Vec<Assignment>> {
        let state = self.state.lock();
        let mut matches: Vec<Assignment> = state
            .assignments
            .values()
            .filter(|assignment| filter.matches(assignment))
            .cloned()
            .collect();
        matches.sort_by(|a, b| a.start.cmp(&b.start).then_with(|| a.id.cmp(&b.id)));
        Ok(matches)
    }

    fn get_assignment(&self, id: &str) -> PersistenceResult<Option<Assignment>> {
        Ok(self.state.lock().assignments.get(id).cloned())
    }

    fn create_assignment(&self, assignment: NewAssignment) -> PersistenceResult<AssignmentId> {
        validate_new_assignment(&assignment)?;
        let id = Uuid::new_v4().to_string();
        let stored = Assignment::from_new(id.clone(), assignment, Utc::now());
        self.state.lock().assignments.insert(id.clone(), stored);
        Ok(id)
    }

    fn batch_delete_assignments(&self, ids: &[AssignmentId]) -> PersistenceResult<usize> {
        let mut state = self.state.lock();
        let removed = ids
            .iter()
            .filter(|id| state.assignments.remove(id.as_str()).is_some())
            .count();
        Ok(removed)
    }

    fn update_assignment(&self, id: &str, update: &AssignmentUpdate) -> PersistenceResult<()> {
        let mut state = self.state.lock();
        let assignment = state
            .assignments
            .get_mut(id)
            .ok_or_else(|| PersistenceError::NotFound(format!("assignment {id}")))?;
        assignment.apply_update(update);
        Ok(())
    }
}

impl RosterStore for MemoryStore {
    fn list_members(&self, course_name: &str) -> PersistenceResult<Vec<RosterMember>> {
        Ok(self
            .state
            .lock()
            .roster
            .iter()
            .filter(|member| member.course_name == course_name)
            .cloned()
            .collect())
    }
}

impl RosterAdmin for MemoryStore {
    fn upsert_member(&self, member: &RosterMember) -> PersistenceResult<()> {
        validate_member(member)?;
        let mut state = self.state.lock();
        match state
            .roster
            .iter_mut()
            .find(|m| m.name == member.name && m.course_name == member.course_name)
        {
            Some(existing) => *existing = member.clone(),
            None => state.roster.push(member.clone()),
        }
        Ok(())
    }

    fn remove_member(&self, name: &str, course_name: &str) -> PersistenceResult<bool> {
        let mut state = self.state.lock();
        let before = state.roster.len();
        state
            .roster
            .retain(|m| !(m.name == name && m.course_name == course_name));
        Ok(state.roster.len() != before)
    }

    fn all_members(&self) -> PersistenceResult<Vec<RosterMember>> {
        Ok(self.state.lock().roster.clone())
    }
}

impl AttendanceStore for MemoryStore {
    fn get_attendance(&self, date: NaiveDate) -> PersistenceResult<Option<AttendanceRecord>> {
        Ok(self.state.lock().attendance.get(&date).cloned())
    }

    fn put_attendance(&self, record: &AttendanceRecord) -> PersistenceResult<()> {
        self.state
            .lock()
            .attendance
            .insert(record.date, record.clone());
        Ok(())
    }
}

impl VacationStore for MemoryStore {
    fn vacations_for(&self, resource_name: &str) -> PersistenceResult<Vec<VacationWindow>> {
        Ok(self
            .state
            .lock()
            .vacations
            .iter()
            .filter(|window| window.resource_name == resource_name)
            .cloned()
            .collect())
    }

    fn insert_vacation(&self, window: &VacationWindow) -> PersistenceResult<()> {
        self.state.lock().vacations.push(window.clone());
        Ok(())
    }
}
