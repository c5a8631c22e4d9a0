use crate::assignment::{Assignment, AssignmentFilter, AssignmentUpdate, ResourceKind};
use crate::calendar::VacationWindow;
use crate::error::{SchedulerError, SchedulerResult};
use crate::persistence::{AssignmentStore, PersistenceError};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Classes that fall inside a newly recorded vacation, awaiting confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RescheduleProposal {
    pub window: VacationWindow,
    pub assignments: Vec<Assignment>,
}

impl RescheduleProposal {
    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RescheduleOutcome {
    pub flagged: usize,
    pub already_flagged: usize,
}

fn window_filter(window: &VacationWindow) -> SchedulerResult<AssignmentFilter> {
    let after_end = window.end_date.succ_opt().ok_or_else(|| {
        SchedulerError::invalid_input(format!("no day after {}", window.end_date))
    })?;
    Ok(AssignmentFilter::new()
        .kind(ResourceKind::Class)
        .assignee(window.resource_name.clone())
        .dates(window.start_date, after_end))
}

fn check_in_window(window: &VacationWindow, assignment: &Assignment) -> SchedulerResult<()> {
    if assignment.kind != ResourceKind::Class
        || assignment.assignee_name != window.resource_name
        || !window.contains(assignment.start_date())
    {
        return Err(SchedulerError::scope_violation(format!(
            "assignment {} ({} for {} on {}) is outside vacation {}..={} of {}",
            assignment.id,
            assignment.kind,
            assignment.assignee_name,
            assignment.start_date(),
            window.start_date,
            window.end_date,
            window.resource_name
        )));
    }
    Ok(())
}

/// Persisted classes for the window's resource starting inside the window.
pub fn scan_vacation<S>(store: &S, window: &VacationWindow) -> SchedulerResult<RescheduleProposal>
where
    S: AssignmentStore + ?Sized,
{
    window.validate()?;
    let assignments = store.query_assignments(&window_filter(window)?)?;
    for assignment in &assignments {
        check_in_window(window, assignment)?;
    }
    debug!(
        resource = %window.resource_name,
        found = assignments.len(),
        "vacation scan"
    );
    Ok(RescheduleProposal {
        window: window.clone(),
        assignments,
    })
}

/// Prefixes each proposed class title with `marker` unless it already has it.
/// Never deletes or moves an assignment.
pub fn confirm_reschedule<S>(
    store: &S,
    proposal: &RescheduleProposal,
    marker: &str,
) -> SchedulerResult<RescheduleOutcome>
where
    S: AssignmentStore + ?Sized,
{
    if marker.is_empty() {
        return Err(SchedulerError::invalid_input("reschedule marker is empty"));
    }

    // The stored records decide; the proposal may be stale or hand-written.
    // Every class is checked before any title changes.
    let mut current = Vec::with_capacity(proposal.assignments.len());
    for proposed in &proposal.assignments {
        check_in_window(&proposal.window, proposed)?;
        let stored = store
            .get_assignment(&proposed.id)?
            .ok_or_else(|| PersistenceError::NotFound(format!("assignment {}", proposed.id)))?;
        check_in_window(&proposal.window, &stored)?;
        current.push(stored);
    }

    let mut outcome = RescheduleOutcome::default();
    for assignment in current {
        if assignment.title.starts_with(marker) {
            outcome.already_flagged += 1;
            continue;
        }
        let title = format!("{marker}{}", assignment.title);
        store.update_assignment(&assignment.id, &AssignmentUpdate::title(title))?;
        outcome.flagged += 1;
    }

    info!(
        resource = %proposal.window.resource_name,
        flagged = outcome.flagged,
        already_flagged = outcome.already_flagged,
        "reschedule confirmed"
    );
    Ok(outcome)
}
