use chrono::{NaiveDate, NaiveTime};
use roster_scheduler::persistence::{AssignmentStore, MemoryStore, RosterAdmin};
use roster_scheduler::{
    AssignmentFilter, AttendanceBucket, AttendanceTransition, FixedHolidays, Holiday,
    PreviewRequest, ResourceKind, RosterMember, Scheduler, SchedulerConfig, SchedulerError,
    ShiftCalendarSync, StepUnit,
};
use std::collections::BTreeSet;
use std::sync::Arc;

fn d(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn t(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

fn setup() -> (Arc<MemoryStore>, Scheduler) {
    let store = Arc::new(MemoryStore::new());
    let scheduler = Scheduler::with_config(store.clone(), SchedulerConfig::default());
    (store, scheduler)
}

fn march(staff: &str, days: &[u32]) -> ShiftCalendarSync {
    ShiftCalendarSync {
        staff: staff.into(),
        year: 2024,
        month: 3,
        dates: days.iter().map(|day| d(2024, 3, *day)).collect(),
        start_time: None,
        end_time: None,
        operator: "office".into(),
    }
}

fn class_request(start: NaiveDate, count: i64) -> PreviewRequest {
    PreviewRequest {
        kind: ResourceKind::Class,
        resource: "Ms. Lin".into(),
        title: "Piano".into(),
        location: String::new(),
        category: String::new(),
        start_date: start,
        step: StepUnit::Weekly,
        count,
        start_time: t(14, 0),
        end_time: t(15, 0),
        created_by: "admin".into(),
    }
}

#[test]
fn shift_sync_uses_configured_defaults() {
    let (store, scheduler) = setup();

    let summary = scheduler.sync_shift_calendar(&march("Amy", &[4, 6])).unwrap();
    assert_eq!(summary.to_cli_summary(), "added 2, removed 0");

    let shifts = store
        .query_assignments(&AssignmentFilter::new().kind(ResourceKind::Shift))
        .unwrap();
    assert_eq!(shifts.len(), 2);
    for shift in &shifts {
        assert_eq!(shift.title, "Part-time shift");
        assert_eq!(shift.assignee_name, "Amy");
        assert_eq!(shift.start.time(), t(9, 0));
        assert_eq!(shift.end.time(), t(12, 0));
        assert_eq!(shift.created_by, "office");
    }
}

#[test]
fn shift_sync_honours_explicit_times() {
    let (store, scheduler) = setup();
    let mut request = march("Amy", &[4]);
    request.start_time = Some(t(13, 0));
    request.end_time = Some(t(17, 30));

    scheduler.sync_shift_calendar(&request).unwrap();

    let shift = &store.query_assignments(&AssignmentFilter::new()).unwrap()[0];
    assert_eq!(shift.start, d(2024, 3, 4).and_time(t(13, 0)));
    assert_eq!(shift.end, d(2024, 3, 4).and_time(t(17, 30)));
}

#[test]
fn shift_sync_rejects_bad_requests_without_writing() {
    let (store, scheduler) = setup();

    let mut outside = march("Amy", &[4]);
    outside.dates.insert(d(2024, 4, 1));
    assert!(matches!(
        scheduler.sync_shift_calendar(&outside),
        Err(SchedulerError::InvalidInput(_))
    ));

    let mut reversed = march("Amy", &[4]);
    reversed.start_time = Some(t(12, 0));
    reversed.end_time = Some(t(9, 0));
    assert!(matches!(
        scheduler.sync_shift_calendar(&reversed),
        Err(SchedulerError::InvalidTimeRange { .. })
    ));

    assert!(matches!(
        scheduler.sync_shift_calendar(&march(" ", &[4])),
        Err(SchedulerError::InvalidInput(_))
    ));

    let mut bad_month = march("Amy", &[]);
    bad_month.month = 13;
    assert!(scheduler.sync_shift_calendar(&bad_month).is_err());

    assert_eq!(store.assignment_count(), 0);
}

#[test]
fn resubmitting_the_month_converges() {
    let (store, scheduler) = setup();
    scheduler.sync_shift_calendar(&march("Amy", &[4, 11, 18])).unwrap();

    let summary = scheduler.sync_shift_calendar(&march("Amy", &[11, 18, 25])).unwrap();
    assert_eq!((summary.added, summary.removed), (1, 1));
    assert!(scheduler.sync_shift_calendar(&march("Amy", &[11, 18, 25])).unwrap().is_noop());

    let cleared = scheduler.sync_shift_calendar(&march("Amy", &[])).unwrap();
    assert_eq!(cleared.removed, 3);
    assert_eq!(store.assignment_count(), 0);
}

#[test]
fn shift_calendar_view_marks_scheduled_days() {
    let (_store, scheduler) = setup();
    scheduler.sync_shift_calendar(&march("Amy", &[1, 31])).unwrap();
    scheduler.sync_shift_calendar(&march("Ben", &[15])).unwrap();

    let view = scheduler.shift_calendar_view("Amy", 2024, 3).unwrap();

    assert_eq!(view.weeks.len(), 6);
    assert!(view.is_scheduled(d(2024, 3, 1)));
    assert!(view.is_scheduled(d(2024, 3, 31)));
    assert!(!view.is_scheduled(d(2024, 3, 15)));
    let expected: BTreeSet<NaiveDate> = [d(2024, 3, 1), d(2024, 3, 31)].into_iter().collect();
    assert_eq!(view.scheduled, expected);
}

#[test]
fn added_holiday_shows_up_in_the_next_preview() {
    let (_store, scheduler) = setup();
    let before = scheduler.generate_preview(&class_request(d(2024, 1, 1), 3)).unwrap();
    assert!(before.occurrences().iter().all(|o| o.selected));

    scheduler
        .add_holiday(Holiday::new(d(2024, 1, 8), "Snow day"))
        .unwrap();

    let after = scheduler.generate_preview(&class_request(d(2024, 1, 1), 3)).unwrap();
    assert!(after.occurrences()[1].conflicted);
    assert_eq!(after.occurrences()[1].conflict_reason, "Snow day");
    assert_eq!(scheduler.holiday_set(2024).unwrap().len(), 1);
}

#[test]
fn external_holiday_feed_cannot_be_edited() {
    let store = Arc::new(MemoryStore::new());
    let scheduler = Scheduler::new(
        store,
        Arc::new(FixedHolidays::new()),
        SchedulerConfig::default(),
    );
    assert!(matches!(
        scheduler.add_holiday(Holiday::new(d(2024, 1, 8), "Snow day")),
        Err(SchedulerError::InvalidInput(_))
    ));
}

#[test]
fn attendance_view_follows_committed_classes() {
    let (store, scheduler) = setup();
    store.upsert_member(&RosterMember::new("Amy", "Piano")).unwrap();
    store.upsert_member(&RosterMember::new("Ben", "Piano")).unwrap();
    let mut session = scheduler.generate_preview(&class_request(d(2024, 3, 4), 1)).unwrap();
    scheduler.commit_preview(&mut session).unwrap();

    let view = scheduler.get_attendance_view(d(2024, 3, 4), "teacher").unwrap();
    assert_eq!(view.pending.len(), 2);

    let record = scheduler
        .transition_attendance(d(2024, 3, 4), "Amy", AttendanceTransition::MARK_PRESENT, "teacher")
        .unwrap();
    assert_eq!(record.bucket_of("Amy"), Some(AttendanceBucket::Present));
    assert_eq!(record.bucket_of("Ben"), Some(AttendanceBucket::Pending));

    let empty_day = scheduler.get_attendance_view(d(2024, 3, 5), "teacher").unwrap();
    assert!(empty_day.recorded().is_empty());
}

#[test]
fn delete_reports_whether_the_assignment_existed() {
    let (_store, scheduler) = setup();
    scheduler.sync_shift_calendar(&march("Amy", &[4])).unwrap();
    let id = scheduler
        .list_assignments(&AssignmentFilter::new())
        .unwrap()
        .remove(0)
        .id;

    assert!(scheduler.delete_assignment(&id).unwrap());
    assert!(!scheduler.delete_assignment(&id).unwrap());
    assert!(scheduler.shift_calendar_view("Amy", 2024, 3).unwrap().scheduled.is_empty());
}

#[test]
fn repeat_count_limit_comes_from_config() {
    let store = Arc::new(MemoryStore::new());
    let config = SchedulerConfig {
        max_repeat_count: 5,
        ..SchedulerConfig::default()
    };
    let scheduler = Scheduler::with_config(store, config);

    assert!(scheduler.generate_preview(&class_request(d(2024, 1, 1), 5)).is_ok());
    assert!(matches!(
        scheduler.generate_preview(&class_request(d(2024, 1, 1), 6)),
        Err(SchedulerError::InvalidCount { count: 6, max: 5 })
    ));
}
