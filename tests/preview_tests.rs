use chrono::{NaiveDate, NaiveTime};
use roster_scheduler::calendar::CalendarError;
use roster_scheduler::error::CalendarLookup;
use roster_scheduler::persistence::{AssignmentStore, MemoryStore, VacationStore};
use roster_scheduler::{
    AssignmentFilter, FixedHolidays, Holiday, HolidaySource, PreviewRequest, ResourceKind,
    Scheduler, SchedulerConfig, SchedulerError, StepUnit, VacationWindow,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

fn d(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn t(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

fn request(start: NaiveDate, count: i64) -> PreviewRequest {
    PreviewRequest {
        kind: ResourceKind::Class,
        resource: "Ms. Lin".into(),
        title: "Piano".into(),
        location: "Room 2".into(),
        category: "music".into(),
        start_date: start,
        step: StepUnit::Weekly,
        count,
        start_time: t(9, 0),
        end_time: t(12, 0),
        created_by: "admin".into(),
    }
}

fn scheduler_with_holidays(store: Arc<MemoryStore>, holidays: Vec<Holiday>) -> Scheduler {
    let config = SchedulerConfig {
        holidays,
        ..SchedulerConfig::default()
    };
    Scheduler::with_config(store, config)
}

struct FlakyHolidays {
    calls: AtomicUsize,
}

impl HolidaySource for FlakyHolidays {
    fn holidays(&self, _year: i32) -> Result<Vec<Holiday>, CalendarError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            return Err(CalendarError::Unavailable("feed timed out".into()));
        }
        Ok(vec![Holiday::new(d(2024, 1, 8), "Founders' Day")])
    }
}

#[test]
fn holiday_occurrence_defaults_to_unselected() {
    let store = Arc::new(MemoryStore::new());
    let scheduler =
        scheduler_with_holidays(store, vec![Holiday::new(d(2024, 1, 8), "Founders' Day")]);

    let session = scheduler.generate_preview(&request(d(2024, 1, 1), 4)).unwrap();
    let occurrences = session.occurrences();

    assert_eq!(occurrences.len(), 4);
    let conflicted: Vec<_> = occurrences.iter().filter(|o| o.conflicted).collect();
    assert_eq!(conflicted.len(), 1);
    assert_eq!(conflicted[0].date, d(2024, 1, 8));
    assert!(!conflicted[0].selected);
    assert_eq!(conflicted[0].conflict_reason, "Founders' Day");
    for occurrence in occurrences.iter().filter(|o| !o.conflicted) {
        assert!(occurrence.selected);
        assert!(occurrence.conflict_reason.is_empty());
    }
    assert!(session.warnings().is_empty());
}

#[test]
fn reasons_list_holidays_before_vacations() {
    let store = Arc::new(MemoryStore::new());
    store
        .insert_vacation(&VacationWindow::new(
            "Ms. Lin",
            d(2024, 1, 8),
            d(2024, 1, 15),
            "Family trip",
        ))
        .unwrap();
    let scheduler = scheduler_with_holidays(
        store,
        vec![
            Holiday::new(d(2024, 1, 8), "Founders' Day"),
            Holiday::new(d(2024, 1, 8), "Bank holiday"),
        ],
    );

    let session = scheduler.generate_preview(&request(d(2024, 1, 1), 4)).unwrap();
    let reasons: Vec<(&str, bool)> = session
        .occurrences()
        .iter()
        .map(|o| (o.conflict_reason.as_str(), o.selected))
        .collect();

    assert_eq!(
        reasons,
        vec![
            ("", true),
            ("Founders' Day / Bank holiday / Family trip", false),
            ("Family trip", false),
            ("", true),
        ]
    );
}

#[test]
fn vacations_of_other_teachers_are_ignored() {
    let store = Arc::new(MemoryStore::new());
    store
        .insert_vacation(&VacationWindow::new("Mr. Wu", d(2024, 1, 1), d(2024, 1, 31), "Leave"))
        .unwrap();
    let scheduler = scheduler_with_holidays(store, Vec::new());

    let session = scheduler.generate_preview(&request(d(2024, 1, 1), 3)).unwrap();
    assert!(session.occurrences().iter().all(|o| o.selected && !o.conflicted));
}

#[test]
fn invalid_requests_are_rejected_before_any_lookup() {
    let store = Arc::new(MemoryStore::new());
    let scheduler = scheduler_with_holidays(store, Vec::new());

    let mut reversed = request(d(2024, 1, 1), 3);
    reversed.end_time = t(8, 0);
    assert!(matches!(
        scheduler.generate_preview(&reversed),
        Err(SchedulerError::InvalidTimeRange { .. })
    ));
    assert!(matches!(
        scheduler.generate_preview(&request(d(2024, 1, 1), 0)),
        Err(SchedulerError::InvalidCount { .. })
    ));
}

#[test]
fn holiday_feed_failure_becomes_a_warning_and_is_retried() {
    let store = Arc::new(MemoryStore::new());
    let source = Arc::new(FlakyHolidays {
        calls: AtomicUsize::new(0),
    });
    let scheduler = Scheduler::new(store, source, SchedulerConfig::default());

    let first = scheduler.generate_preview(&request(d(2024, 1, 1), 4)).unwrap();
    assert_eq!(first.warnings().len(), 1);
    assert_eq!(first.warnings()[0].lookup, CalendarLookup::Holidays(2024));
    assert!(first.occurrences().iter().all(|o| o.selected));

    let second = scheduler.generate_preview(&request(d(2024, 1, 1), 4)).unwrap();
    assert!(second.warnings().is_empty());
    assert!(second.occurrences()[1].conflicted);
}

#[test]
fn recurrence_spanning_two_years_checks_both_calendars() {
    let store = Arc::new(MemoryStore::new());
    let scheduler = scheduler_with_holidays(
        store,
        vec![
            Holiday::new(d(2024, 12, 25), "Christmas"),
            Holiday::new(d(2025, 1, 1), "New Year"),
        ],
    );

    let session = scheduler.generate_preview(&request(d(2024, 12, 18), 3)).unwrap();
    let conflicted: Vec<NaiveDate> = session
        .occurrences()
        .iter()
        .filter(|o| o.conflicted)
        .map(|o| o.date)
        .collect();
    assert_eq!(conflicted, vec![d(2024, 12, 25), d(2025, 1, 1)]);
}

#[test]
fn toggle_flips_selection_and_rejects_bad_index() {
    let store = Arc::new(MemoryStore::new());
    let scheduler =
        scheduler_with_holidays(store, vec![Holiday::new(d(2024, 1, 8), "Founders' Day")]);
    let mut session = scheduler.generate_preview(&request(d(2024, 1, 1), 4)).unwrap();

    assert!(session.toggle(1).unwrap());
    assert!(!session.toggle(0).unwrap());
    assert_eq!(
        session.selected_dates(),
        vec![d(2024, 1, 8), d(2024, 1, 15), d(2024, 1, 22)]
    );
    assert!(matches!(
        session.toggle(4),
        Err(SchedulerError::InvalidInput(_))
    ));
}

#[test]
fn commit_creates_only_selected_occurrences_and_clears_session() {
    let store = Arc::new(MemoryStore::new());
    let scheduler = scheduler_with_holidays(
        store.clone(),
        vec![Holiday::new(d(2024, 1, 8), "Founders' Day")],
    );
    let mut session = scheduler.generate_preview(&request(d(2024, 1, 1), 4)).unwrap();

    let summary = scheduler.commit_preview(&mut session).unwrap();
    assert_eq!(summary.created, 3);
    assert!(session.is_empty());

    let created = store
        .query_assignments(&AssignmentFilter::new().kind(ResourceKind::Class))
        .unwrap();
    let dates: Vec<NaiveDate> = created.iter().map(|a| a.start_date()).collect();
    assert_eq!(dates, vec![d(2024, 1, 1), d(2024, 1, 15), d(2024, 1, 22)]);
    let first = &created[0];
    assert_eq!(first.title, "Piano");
    assert_eq!(first.assignee_name, "Ms. Lin");
    assert_eq!(first.location, "Room 2");
    assert_eq!(first.start, d(2024, 1, 1).and_time(t(9, 0)));
    assert_eq!(first.end, d(2024, 1, 1).and_time(t(12, 0)));
    assert_eq!(first.created_by, "admin");

    let again = scheduler.commit_preview(&mut session).unwrap();
    assert_eq!(again.created, 0);
    assert_eq!(store.assignment_count(), 3);
}

#[test]
fn commit_of_fully_deselected_preview_is_a_noop() {
    let store = Arc::new(MemoryStore::new());
    let scheduler = scheduler_with_holidays(store.clone(), Vec::new());
    let mut session = scheduler.generate_preview(&request(d(2024, 1, 1), 2)).unwrap();
    session.toggle(0).unwrap();
    session.toggle(1).unwrap();

    let summary = scheduler.commit_preview(&mut session).unwrap();
    assert_eq!(summary.created, 0);
    assert_eq!(store.assignment_count(), 0);
}

#[test]
fn commit_does_not_detect_existing_duplicates() {
    let store = Arc::new(MemoryStore::new());
    let scheduler = scheduler_with_holidays(store.clone(), Vec::new());

    let mut first = scheduler.generate_preview(&request(d(2024, 1, 1), 2)).unwrap();
    scheduler.commit_preview(&mut first).unwrap();
    let mut second = scheduler.generate_preview(&request(d(2024, 1, 1), 2)).unwrap();
    scheduler.commit_preview(&mut second).unwrap();

    assert_eq!(store.assignment_count(), 4);
}

#[test]
fn preview_key_reflects_resource_and_start_parameters() {
    let key = request(d(2024, 1, 1), 4).key();
    assert_eq!(key.as_str(), "Ms. Lin|2024-01-01|weekly|4");
    assert_ne!(key, request(d(2024, 1, 8), 4).key());
}

#[test]
fn fixed_holiday_source_filters_by_year() {
    let mut holidays = FixedHolidays::new();
    holidays.add_recurring_holiday(12, 25, "Christmas", 2024, 2026);
    let for_2025 = holidays.holidays(2025).unwrap();
    assert_eq!(for_2025, vec![Holiday::new(d(2025, 12, 25), "Christmas")]);
}
