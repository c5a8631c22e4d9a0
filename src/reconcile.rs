//! Desired-set versus persisted-set synchronisation.
//!
//! `reconcile` turns "the dates an operator currently wants assigned" into the
//! minimal set of deletes and creates against the store, restricted to one
//! [`ReconcileScope`]. The delete half is one batch; creates are independent,
//! so a failure part-way leaves some dates pending. Calling `reconcile` again
//! with the same desired set converges without touching already-correct dates.

use crate::assignment::{Assignment, AssignmentFilter, AssignmentId, NewAssignment, ResourceKind};
use crate::calendar::month_bounds;
use crate::error::{SchedulerError, SchedulerResult};
use crate::persistence::AssignmentStore;
use crate::recurrence::validate_time_range;
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::{debug, info, warn};

/// Half-open date range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Period {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl Period {
    pub fn month(year: i32, month: u32) -> SchedulerResult<Self> {
        let (start, end) = month_bounds(year, month)
            .ok_or_else(|| SchedulerError::invalid_input(format!("invalid month {year}-{month}")))?;
        Ok(Self { start, end })
    }

    /// Single calendar day.
    pub fn day(date: NaiveDate) -> SchedulerResult<Self> {
        let end = date
            .succ_opt()
            .ok_or_else(|| SchedulerError::invalid_input(format!("no day after {date}")))?;
        Ok(Self { start: date, end })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date < self.end
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// The documents a reconciliation may read, create, or delete.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReconcileScope {
    pub kind: ResourceKind,
    pub assignee: String,
    pub period: Period,
}

impl ReconcileScope {
    pub fn new(kind: ResourceKind, assignee: impl Into<String>, period: Period) -> Self {
        Self {
            kind,
            assignee: assignee.into(),
            period,
        }
    }

    pub fn key(&self) -> String {
        format!("{}:{}:{}", self.kind, self.assignee, self.period)
    }

    pub fn filter(&self) -> AssignmentFilter {
        AssignmentFilter::new()
            .kind(self.kind)
            .assignee(self.assignee.clone())
            .dates(self.period.start, self.period.end)
    }

    pub fn check_date(&self, date: NaiveDate) -> SchedulerResult<()> {
        if !self.period.contains(date) {
            return Err(SchedulerError::scope_violation(format!(
                "date {date} is outside scope {}",
                self.key()
            )));
        }
        Ok(())
    }

    pub fn check_assignment(&self, assignment: &Assignment) -> SchedulerResult<()> {
        if assignment.kind != self.kind || assignment.assignee_name != self.assignee {
            return Err(SchedulerError::scope_violation(format!(
                "assignment {} ({} for {}) is outside scope {}",
                assignment.id,
                assignment.kind,
                assignment.assignee_name,
                self.key()
            )));
        }
        self.check_date(assignment.start_date())
    }

    fn check_template(&self, template: &AssignmentTemplate) -> SchedulerResult<()> {
        if template.kind != self.kind || template.assignee_name != self.assignee {
            return Err(SchedulerError::scope_violation(format!(
                "template for {} ({}) does not match scope {}",
                template.assignee_name,
                template.kind,
                self.key()
            )));
        }
        Ok(())
    }
}

/// Persisted assignments keyed by calendar day.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersistedSet {
    entries: BTreeMap<NaiveDate, AssignmentId>,
    duplicates: Vec<(NaiveDate, AssignmentId)>,
}

impl PersistedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keeps the first id seen for a date; later ones are recorded as duplicates.
    pub fn insert(&mut self, date: NaiveDate, id: AssignmentId) {
        if self.entries.contains_key(&date) {
            self.duplicates.push((date, id));
        } else {
            self.entries.insert(date, id);
        }
    }

    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (NaiveDate, AssignmentId)>,
    {
        let mut set = Self::new();
        for (date, id) in entries {
            set.insert(date, id);
        }
        set
    }

    pub fn dates(&self) -> BTreeSet<NaiveDate> {
        self.entries.keys().copied().collect()
    }

    pub fn id_for(&self, date: NaiveDate) -> Option<&AssignmentId> {
        self.entries.get(&date)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn duplicates(&self) -> &[(NaiveDate, AssignmentId)] {
        &self.duplicates
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NaiveDate, &AssignmentId)> {
        self.entries.iter()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcilePlan {
    pub to_add: Vec<NaiveDate>,
    pub to_remove: Vec<(NaiveDate, AssignmentId)>,
}

impl ReconcilePlan {
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }

    pub fn remove_ids(&self) -> Vec<AssignmentId> {
        self.to_remove.iter().map(|(_, id)| id.clone()).collect()
    }
}

/// `to_add = desired - persisted`, `to_remove = persisted - desired`, both in date order.
/// A removed date takes every id stored on it, duplicates included.
pub fn plan(desired: &BTreeSet<NaiveDate>, persisted: &PersistedSet) -> ReconcilePlan {
    let to_add = desired
        .iter()
        .filter(|date| persisted.id_for(**date).is_none())
        .copied()
        .collect();
    let mut to_remove: Vec<(NaiveDate, AssignmentId)> = persisted
        .iter()
        .chain(persisted.duplicates().iter().map(|(date, id)| (date, id)))
        .filter(|(date, _)| !desired.contains(*date))
        .map(|(date, id)| (*date, id.clone()))
        .collect();
    to_remove.sort();
    ReconcilePlan { to_add, to_remove }
}

/// Everything needed to create an assignment on a given day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentTemplate {
    pub kind: ResourceKind,
    pub title: String,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub assignee_name: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub created_by: String,
}

impl AssignmentTemplate {
    pub fn validate(&self) -> SchedulerResult<()> {
        validate_time_range(self.start_time, self.end_time)?;
        if self.assignee_name.trim().is_empty() {
            return Err(SchedulerError::invalid_input("assignee name is required"));
        }
        Ok(())
    }

    pub fn instantiate(&self, date: NaiveDate) -> NewAssignment {
        NewAssignment {
            kind: self.kind,
            title: self.title.clone(),
            start: date.and_time(self.start_time),
            end: date.and_time(self.end_time),
            assignee_name: self.assignee_name.clone(),
            location: self.location.clone(),
            category: self.category.clone(),
            created_by: self.created_by.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileSummary {
    pub added: usize,
    pub removed: usize,
}

impl ReconcileSummary {
    pub fn is_noop(&self) -> bool {
        self.added == 0 && self.removed == 0
    }

    pub fn to_cli_summary(&self) -> String {
        if self.is_noop() {
            return "no changes".to_string();
        }
        let mut parts = Vec::new();
        if self.added > 0 {
            parts.push(format!("added {}", self.added));
        }
        if self.removed > 0 {
            parts.push(format!("removed {}", self.removed));
        }
        parts.join(", ")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddOutcome {
    pub created: Vec<(NaiveDate, AssignmentId)>,
    pub failed: Vec<(NaiveDate, String)>,
}

impl AddOutcome {
    pub fn failed_dates(&self) -> Vec<NaiveDate> {
        self.failed.iter().map(|(date, _)| *date).collect()
    }
}

/// The "add" path: one independent create per date. Failures are collected,
/// never rolled back.
pub fn apply_additions<S>(store: &S, dates: &[NaiveDate], template: &AssignmentTemplate) -> AddOutcome
where
    S: AssignmentStore + ?Sized,
{
    let mut outcome = AddOutcome::default();
    for &date in dates {
        match store.create_assignment(template.instantiate(date)) {
            Ok(id) => outcome.created.push((date, id)),
            Err(err) => {
                warn!(%date, assignee = %template.assignee_name, error = %err, "create failed");
                outcome.failed.push((date, err.to_string()));
            }
        }
    }
    outcome
}

/// Reads the scope's persisted assignments keyed by day.
pub fn load_persisted<S>(store: &S, scope: &ReconcileScope) -> SchedulerResult<PersistedSet>
where
    S: AssignmentStore + ?Sized,
{
    let assignments = store.query_assignments(&scope.filter())?;
    let mut persisted = PersistedSet::new();
    for assignment in &assignments {
        scope.check_assignment(assignment)?;
        persisted.insert(assignment.start_date(), assignment.id.clone());
    }
    for (date, id) in persisted.duplicates() {
        warn!(scope = %scope.key(), %date, assignment = %id, "duplicate assignment on date");
    }
    Ok(persisted)
}

pub fn reconcile<S>(
    store: &S,
    scope: &ReconcileScope,
    desired: &BTreeSet<NaiveDate>,
    persisted: &PersistedSet,
    template: &AssignmentTemplate,
) -> SchedulerResult<ReconcileSummary>
where
    S: AssignmentStore + ?Sized,
{
    template.validate()?;
    scope.check_template(template)?;
    for date in desired {
        scope.check_date(*date)?;
    }
    for (date, _) in persisted.iter() {
        scope.check_date(*date)?;
    }
    for (date, _) in persisted.duplicates() {
        scope.check_date(*date)?;
    }

    let plan = plan(desired, persisted);
    debug!(
        scope = %scope.key(),
        to_add = plan.to_add.len(),
        to_remove = plan.to_remove.len(),
        "reconcile plan"
    );
    if plan.is_empty() {
        return Ok(ReconcileSummary::default());
    }

    let removed = if plan.to_remove.is_empty() {
        0
    } else {
        store.batch_delete_assignments(&plan.remove_ids())?
    };

    let outcome = apply_additions(store, &plan.to_add, template);
    let added = outcome.created.len();
    if !outcome.failed.is_empty() {
        let pending = outcome.failed_dates();
        warn!(
            scope = %scope.key(),
            added,
            removed,
            pending = pending.len(),
            "reconciliation incomplete"
        );
        return Err(SchedulerError::PartialReconciliation {
            added,
            removed,
            pending,
        });
    }

    info!(scope = %scope.key(), added, removed, "reconciled");
    Ok(ReconcileSummary { added, removed })
}

/// Loads the persisted set and reconciles against it in one call.
pub fn reconcile_scope<S>(
    store: &S,
    scope: &ReconcileScope,
    desired: &BTreeSet<NaiveDate>,
    template: &AssignmentTemplate,
) -> SchedulerResult<ReconcileSummary>
where
    S: AssignmentStore + ?Sized,
{
    template.validate()?;
    let persisted = load_persisted(store, scope)?;
    reconcile(store, scope, desired, &persisted, template)
}
