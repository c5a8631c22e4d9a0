//! Operator-facing facade over the scheduling core.
//!
//! Every method is a synchronous request/response against the shared store.
//! There is no locking between operators: concurrent edits of the same month
//! or attendance date resolve as last write wins.

use crate::assignment::{Assignment, AssignmentFilter, AssignmentId, ResourceKind};
use crate::attendance::{AttendanceRecord, AttendanceTransition};
use crate::calendar::{
    CachedHolidaySource, FixedHolidays, Holiday, HolidaySet, HolidaySource, VacationWindow,
    month_grid,
};
use crate::config::SchedulerConfig;
use crate::error::{SchedulerError, SchedulerResult};
use crate::persistence::SchedulerStore;
use crate::preview::{CommitSummary, PreviewRequest, PreviewSession, generate_preview};
use crate::reconcile::{
    AssignmentTemplate, Period, ReconcileScope, ReconcileSummary, load_persisted, reconcile,
};
use crate::recurrence::validate_time_range;
use crate::reschedule::{RescheduleOutcome, RescheduleProposal, confirm_reschedule, scan_vacation};
use crate::roster_sync::{sync_attendance, transition_attendance};
use chrono::{Datelike, NaiveDate, NaiveTime};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::info;

/// Desired shift days for one staff member and month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShiftCalendarSync {
    pub staff: String,
    pub year: i32,
    pub month: u32,
    #[serde(default)]
    pub dates: BTreeSet<NaiveDate>,
    /// Falls back to the configured shift hours.
    #[serde(default)]
    pub start_time: Option<NaiveTime>,
    #[serde(default)]
    pub end_time: Option<NaiveTime>,
    #[serde(default)]
    pub operator: String,
}

/// Month grid with the days that already have a shift.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShiftCalendarView {
    pub staff: String,
    pub year: i32,
    pub month: u32,
    pub weeks: Vec<[Option<NaiveDate>; 7]>,
    pub scheduled: BTreeSet<NaiveDate>,
}

impl ShiftCalendarView {
    pub fn is_scheduled(&self, date: NaiveDate) -> bool {
        self.scheduled.contains(&date)
    }
}

pub struct Scheduler {
    store: Arc<dyn SchedulerStore>,
    holidays: CachedHolidaySource,
    editable_holidays: Option<Arc<RwLock<FixedHolidays>>>,
    config: SchedulerConfig,
}

impl Scheduler {
    /// Uses an external holiday feed; `add_holiday` is unavailable.
    pub fn new(
        store: Arc<dyn SchedulerStore>,
        holiday_source: Arc<dyn HolidaySource>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            store,
            holidays: CachedHolidaySource::new(holiday_source),
            editable_holidays: None,
            config,
        }
    }

    /// Holidays come from `config.holidays` and can be extended at runtime.
    pub fn with_config(store: Arc<dyn SchedulerStore>, config: SchedulerConfig) -> Self {
        let fixed = Arc::new(RwLock::new(config.holiday_source()));
        Self {
            store,
            holidays: CachedHolidaySource::new(fixed.clone()),
            editable_holidays: Some(fixed),
            config,
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn SchedulerStore> {
        &self.store
    }

    pub fn add_holiday(&self, holiday: Holiday) -> SchedulerResult<()> {
        let fixed = self.editable_holidays.as_ref().ok_or_else(|| {
            SchedulerError::invalid_input("holidays come from an external source")
        })?;
        let year = holiday.date.year();
        fixed.write().add_holiday(holiday.date, holiday.description.clone());
        self.holidays.invalidate(year);
        info!(date = %holiday.date, description = %holiday.description, "holiday added");
        Ok(())
    }

    pub fn holiday_set(&self, year: i32) -> SchedulerResult<Arc<HolidaySet>> {
        self.holidays
            .holiday_set(year)
            .map_err(|err| SchedulerError::CalendarSourceUnavailable(err.to_string()))
    }

    pub fn generate_preview(&self, request: &PreviewRequest) -> SchedulerResult<PreviewSession> {
        generate_preview(
            request,
            self.config.max_repeat_count,
            &self.holidays,
            &*self.store,
        )
    }

    pub fn commit_preview(&self, session: &mut PreviewSession) -> SchedulerResult<CommitSummary> {
        session.commit(&*self.store)
    }

    pub fn shift_scope(staff: &str, year: i32, month: u32) -> SchedulerResult<ReconcileScope> {
        Ok(ReconcileScope::new(
            ResourceKind::Shift,
            staff,
            Period::month(year, month)?,
        ))
    }

    /// Replaces the staff member's shifts in the month with `request.dates`.
    pub fn sync_shift_calendar(&self, request: &ShiftCalendarSync) -> SchedulerResult<ReconcileSummary> {
        let start_time = request.start_time.unwrap_or(self.config.shift_start);
        let end_time = request.end_time.unwrap_or(self.config.shift_end);
        validate_time_range(start_time, end_time)?;
        if request.staff.trim().is_empty() {
            return Err(SchedulerError::invalid_input("staff name is required"));
        }

        let scope = Self::shift_scope(&request.staff, request.year, request.month)?;
        if let Some(outside) = request.dates.iter().find(|date| !scope.period.contains(**date)) {
            return Err(SchedulerError::invalid_input(format!(
                "{outside} is not in {}-{:02}",
                request.year, request.month
            )));
        }

        let template = AssignmentTemplate {
            kind: ResourceKind::Shift,
            title: self.config.shift_title.clone(),
            start_time,
            end_time,
            assignee_name: request.staff.clone(),
            location: String::new(),
            category: String::new(),
            created_by: request.operator.clone(),
        };
        let persisted = load_persisted(&*self.store, &scope)?;
        reconcile(&*self.store, &scope, &request.dates, &persisted, &template)
    }

    pub fn shift_calendar_view(&self, staff: &str, year: i32, month: u32) -> SchedulerResult<ShiftCalendarView> {
        let scope = Self::shift_scope(staff, year, month)?;
        let weeks = month_grid(year, month)?;
        let scheduled = load_persisted(&*self.store, &scope)?.dates();
        Ok(ShiftCalendarView {
            staff: staff.to_string(),
            year,
            month,
            weeks,
            scheduled,
        })
    }

    /// The date's attendance after merging in newly eligible members.
    pub fn get_attendance_view(&self, date: NaiveDate, operator: &str) -> SchedulerResult<AttendanceRecord> {
        sync_attendance(&*self.store, date, operator, &self.config.reschedule_marker)
    }

    pub fn transition_attendance(
        &self,
        date: NaiveDate,
        name: &str,
        transition: AttendanceTransition,
        operator: &str,
    ) -> SchedulerResult<AttendanceRecord> {
        transition_attendance(&*self.store, date, name, transition, operator)
    }

    /// Stores the window and returns the classes it overlaps.
    pub fn record_vacation(&self, window: &VacationWindow) -> SchedulerResult<RescheduleProposal> {
        window.validate()?;
        self.store.insert_vacation(window)?;
        info!(
            resource = %window.resource_name,
            start = %window.start_date,
            end = %window.end_date,
            "vacation recorded"
        );
        scan_vacation(&*self.store, window)
    }

    pub fn scan_vacation(&self, window: &VacationWindow) -> SchedulerResult<RescheduleProposal> {
        scan_vacation(&*self.store, window)
    }

    pub fn confirm_reschedule(&self, proposal: &RescheduleProposal) -> SchedulerResult<RescheduleOutcome> {
        confirm_reschedule(&*self.store, proposal, &self.config.reschedule_marker)
    }

    pub fn list_assignments(&self, filter: &AssignmentFilter) -> SchedulerResult<Vec<Assignment>> {
        Ok(self.store.query_assignments(filter)?)
    }

    /// Returns whether the assignment existed.
    pub fn delete_assignment(&self, id: &str) -> SchedulerResult<bool> {
        let ids: Vec<AssignmentId> = vec![id.to_string()];
        let removed = self.store.batch_delete_assignments(&ids)?;
        if removed > 0 {
            info!(assignment = %id, "assignment deleted");
        }
        Ok(removed > 0)
    }
}
