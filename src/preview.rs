use crate::annotate::{Occurrence, annotate};
use crate::assignment::ResourceKind;
use crate::calendar::CachedHolidaySource;
use crate::error::{CalendarLookup, CalendarWarning, SchedulerError, SchedulerResult};
use crate::persistence::{AssignmentStore, VacationStore};
use crate::reconcile::{AssignmentTemplate, apply_additions};
use crate::recurrence::{RecurrenceRule, StepUnit};
use chrono::{Datelike, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use tracing::{info, warn};

fn default_kind() -> ResourceKind {
    ResourceKind::Class
}

/// Parameters of one scheduling session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewRequest {
    #[serde(default = "default_kind")]
    pub kind: ResourceKind,
    pub resource: String,
    pub title: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub category: String,
    pub start_date: NaiveDate,
    pub step: StepUnit,
    pub count: i64,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    #[serde(default)]
    pub created_by: String,
}

impl PreviewRequest {
    pub fn rule(&self) -> RecurrenceRule {
        RecurrenceRule::new(
            self.start_date,
            self.step,
            self.count,
            self.start_time,
            self.end_time,
        )
    }

    pub fn template(&self) -> AssignmentTemplate {
        AssignmentTemplate {
            kind: self.kind,
            title: self.title.clone(),
            start_time: self.start_time,
            end_time: self.end_time,
            assignee_name: self.resource.clone(),
            location: self.location.clone(),
            category: self.category.clone(),
            created_by: self.created_by.clone(),
        }
    }

    pub fn key(&self) -> PreviewKey {
        PreviewKey(format!(
            "{}|{}|{}|{}",
            self.resource, self.start_date, self.step, self.count
        ))
    }
}

/// Identifies a session by resource and starting parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PreviewKey(String);

impl PreviewKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PreviewKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for PreviewKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitSummary {
    pub created: usize,
}

/// Pending proposal an operator edits before committing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewSession {
    key: PreviewKey,
    template: AssignmentTemplate,
    occurrences: Vec<Occurrence>,
    warnings: Vec<CalendarWarning>,
}

impl PreviewSession {
    pub fn new(
        key: PreviewKey,
        template: AssignmentTemplate,
        occurrences: Vec<Occurrence>,
        warnings: Vec<CalendarWarning>,
    ) -> Self {
        Self {
            key,
            template,
            occurrences,
            warnings,
        }
    }

    pub fn key(&self) -> &PreviewKey {
        &self.key
    }

    pub fn template(&self) -> &AssignmentTemplate {
        &self.template
    }

    pub fn occurrences(&self) -> &[Occurrence] {
        &self.occurrences
    }

    pub fn warnings(&self) -> &[CalendarWarning] {
        &self.warnings
    }

    pub fn is_empty(&self) -> bool {
        self.occurrences.is_empty()
    }

    /// Flips one occurrence and returns its new `selected` value.
    pub fn toggle(&mut self, index: usize) -> SchedulerResult<bool> {
        let len = self.occurrences.len();
        let occurrence = self.occurrences.get_mut(index).ok_or_else(|| {
            SchedulerError::invalid_input(format!(
                "occurrence index {index} out of range (preview has {len})"
            ))
        })?;
        occurrence.toggle();
        Ok(occurrence.selected)
    }

    pub fn selected_dates(&self) -> Vec<NaiveDate> {
        self.occurrences
            .iter()
            .filter(|occurrence| occurrence.selected)
            .map(|occurrence| occurrence.date)
            .collect()
    }

    /// Creates an assignment per selected occurrence and clears the proposal.
    /// Does not look for existing assignments on the same dates. If some
    /// creates fail only those occurrences stay pending for a retry.
    pub fn commit<S>(&mut self, store: &S) -> SchedulerResult<CommitSummary>
    where
        S: AssignmentStore + ?Sized,
    {
        let dates = self.selected_dates();
        if dates.is_empty() {
            self.occurrences.clear();
            return Ok(CommitSummary::default());
        }

        let outcome = apply_additions(store, &dates, &self.template);
        let created = outcome.created.len();
        if !outcome.failed.is_empty() {
            let pending = outcome.failed_dates();
            let retry: BTreeSet<NaiveDate> = pending.iter().copied().collect();
            self.occurrences
                .retain(|occurrence| occurrence.selected && retry.contains(&occurrence.date));
            warn!(preview = %self.key, created, pending = pending.len(), "commit incomplete");
            return Err(SchedulerError::PartialReconciliation {
                added: created,
                removed: 0,
                pending,
            });
        }

        self.occurrences.clear();
        info!(preview = %self.key, created, "preview committed");
        Ok(CommitSummary { created })
    }
}

/// Expands the request and marks holiday/vacation conflicts. Calendar lookups
/// that fail are reported as warnings and treated as having no exclusions.
pub fn generate_preview<V>(
    request: &PreviewRequest,
    max_count: u32,
    holidays: &CachedHolidaySource,
    vacations: &V,
) -> SchedulerResult<PreviewSession>
where
    V: VacationStore + ?Sized,
{
    let rule = request.rule();
    rule.validate(max_count)?;
    let template = request.template();
    template.validate()?;
    let dates = rule.dates(max_count)?;

    let mut warnings = Vec::new();
    let years: BTreeSet<i32> = dates.iter().map(|date| date.year()).collect();
    let mut holiday_sets = Vec::with_capacity(years.len());
    for year in years {
        match holidays.holiday_set(year) {
            Ok(set) => holiday_sets.push(set),
            Err(err) => {
                warn!(year, error = %err, "holiday lookup failed; assuming none");
                warnings.push(CalendarWarning {
                    lookup: CalendarLookup::Holidays(year),
                    message: err.to_string(),
                });
            }
        }
    }

    let windows = match vacations.vacations_for(&request.resource) {
        Ok(windows) => windows,
        Err(err) => {
            warn!(resource = %request.resource, error = %err, "vacation lookup failed; assuming none");
            warnings.push(CalendarWarning {
                lookup: CalendarLookup::Vacations(request.resource.clone()),
                message: err.to_string(),
            });
            Vec::new()
        }
    };

    let occurrences = annotate(
        &dates,
        request.start_time,
        request.end_time,
        &holiday_sets,
        &windows,
    );
    Ok(PreviewSession::new(request.key(), template, occurrences, warnings))
}
