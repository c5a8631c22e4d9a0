use chrono::{NaiveDate, NaiveTime};
use roster_scheduler::persistence::{AssignmentStore, AttendanceStore, MemoryStore, RosterAdmin};
use roster_scheduler::reconcile::AssignmentTemplate;
use roster_scheduler::roster_sync::{sync_attendance, target_eligible, transition_attendance};
use roster_scheduler::{
    AttendanceBucket, AttendanceRecord, AttendanceTransition, ResourceKind, RosterMember,
    SchedulerError,
};
use std::collections::BTreeSet;

const MARKER: &str = "[RESCHEDULE] ";

fn d(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn names(list: &[&str]) -> BTreeSet<String> {
    list.iter().map(|name| name.to_string()).collect()
}

fn schedule_class(store: &MemoryStore, course: &str, teacher: &str, date: NaiveDate) {
    let template = AssignmentTemplate {
        kind: ResourceKind::Class,
        title: course.into(),
        start_time: NaiveTime::from_hms_opt(14, 0, 0).unwrap(),
        end_time: NaiveTime::from_hms_opt(15, 30, 0).unwrap(),
        assignee_name: teacher.into(),
        location: String::new(),
        category: String::new(),
        created_by: "admin".into(),
    };
    store.create_assignment(template.instantiate(date)).unwrap();
}

fn enroll(store: &MemoryStore, name: &str, course: &str) {
    store.upsert_member(&RosterMember::new(name, course)).unwrap();
}

#[test]
fn sync_is_additive_and_keeps_present_names() {
    let store = MemoryStore::new();
    let date = d(2024, 3, 4);
    schedule_class(&store, "Piano", "Ms. Lin", date);
    enroll(&store, "Amy", "Piano");
    enroll(&store, "Ben", "Piano");

    let mut existing = AttendanceRecord::empty(date);
    existing.present.insert("Amy".into());
    store.put_attendance(&existing).unwrap();

    let record = sync_attendance(&store, date, "teacher", MARKER).unwrap();

    assert_eq!(record.present, names(&["Amy"]));
    assert_eq!(record.pending, names(&["Ben"]));
    assert!(record.on_leave.is_empty());
    assert_eq!(record.last_updated_by, "teacher");
    assert_eq!(store.get_attendance(date).unwrap(), Some(record));
}

#[test]
fn first_read_creates_pending_record_from_all_courses_that_day() {
    let store = MemoryStore::new();
    let date = d(2024, 3, 4);
    schedule_class(&store, "Piano", "Ms. Lin", date);
    schedule_class(&store, "Violin", "Mr. Wu", date);
    schedule_class(&store, "Cello", "Mr. Wu", d(2024, 3, 5));
    enroll(&store, "Amy", "Piano");
    enroll(&store, "Cleo", "Violin");
    enroll(&store, "Dan", "Cello");

    assert!(store.get_attendance(date).unwrap().is_none());
    let record = sync_attendance(&store, date, "teacher", MARKER).unwrap();

    assert_eq!(record.pending, names(&["Amy", "Cleo"]));
    assert!(store.get_attendance(date).unwrap().is_some());
}

#[test]
fn sync_without_missing_names_does_not_write() {
    let store = MemoryStore::new();
    let date = d(2024, 3, 4);

    let record = sync_attendance(&store, date, "teacher", MARKER).unwrap();
    assert!(record.recorded().is_empty());
    assert!(store.get_attendance(date).unwrap().is_none());

    schedule_class(&store, "Piano", "Ms. Lin", date);
    enroll(&store, "Amy", "Piano");
    let synced = sync_attendance(&store, date, "first", MARKER).unwrap();
    let again = sync_attendance(&store, date, "second", MARKER).unwrap();
    assert_eq!(again, synced);
    assert_eq!(store.get_attendance(date).unwrap().unwrap().last_updated_by, "first");
}

#[test]
fn departed_members_stop_being_targeted_after_departure_date() {
    let store = MemoryStore::new();
    for date in [d(2024, 2, 26), d(2024, 3, 1), d(2024, 3, 4)] {
        schedule_class(&store, "Piano", "Ms. Lin", date);
    }
    store
        .upsert_member(&RosterMember::new("Amy", "Piano").departing(d(2024, 3, 1)))
        .unwrap();
    enroll(&store, "Ben", "Piano");

    let before = target_eligible(&store, d(2024, 2, 26), MARKER).unwrap();
    let on_day = target_eligible(&store, d(2024, 3, 1), MARKER).unwrap();
    let after = target_eligible(&store, d(2024, 3, 4), MARKER).unwrap();

    assert_eq!(before, names(&["Amy", "Ben"]));
    assert_eq!(on_day, names(&["Amy", "Ben"]));
    assert_eq!(after, names(&["Ben"]));
}

#[test]
fn departed_member_keeps_historical_status() {
    let store = MemoryStore::new();
    let date = d(2024, 3, 4);
    schedule_class(&store, "Piano", "Ms. Lin", date);
    enroll(&store, "Amy", "Piano");
    sync_attendance(&store, date, "teacher", MARKER).unwrap();
    transition_attendance(&store, date, "Amy", AttendanceTransition::MARK_PRESENT, "teacher")
        .unwrap();

    store
        .upsert_member(&RosterMember::new("Amy", "Piano").departing(d(2024, 3, 1)))
        .unwrap();
    let record = sync_attendance(&store, date, "teacher", MARKER).unwrap();

    assert_eq!(record.present, names(&["Amy"]));
    assert!(record.pending.is_empty());
}

#[test]
fn flagged_class_still_maps_to_its_course() {
    let store = MemoryStore::new();
    let date = d(2024, 3, 4);
    schedule_class(&store, &format!("{MARKER}Piano"), "Ms. Lin", date);
    enroll(&store, "Amy", "Piano");

    assert_eq!(target_eligible(&store, date, MARKER).unwrap(), names(&["Amy"]));
}

#[test]
fn shifts_do_not_count_as_courses() {
    let store = MemoryStore::new();
    let date = d(2024, 3, 4);
    let shift = AssignmentTemplate {
        kind: ResourceKind::Shift,
        title: "Piano".into(),
        start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
        end_time: NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
        assignee_name: "Amy".into(),
        location: String::new(),
        category: String::new(),
        created_by: String::new(),
    };
    store.create_assignment(shift.instantiate(date)).unwrap();
    enroll(&store, "Ben", "Piano");

    assert!(target_eligible(&store, date, MARKER).unwrap().is_empty());
}

#[test]
fn present_to_leave_requires_going_through_pending() {
    let store = MemoryStore::new();
    let date = d(2024, 3, 4);
    schedule_class(&store, "Piano", "Ms. Lin", date);
    enroll(&store, "Carl", "Piano");
    let before = sync_attendance(&store, date, "teacher", MARKER).unwrap();
    assert_eq!(before.pending, names(&["Carl"]));

    let direct = AttendanceTransition::new(AttendanceBucket::Present, AttendanceBucket::OnLeave);
    let err = transition_attendance(&store, date, "Carl", direct, "teacher").unwrap_err();

    assert!(matches!(
        err,
        SchedulerError::InvalidTransition {
            from: AttendanceBucket::Present,
            to: AttendanceBucket::OnLeave,
            ..
        }
    ));
    assert_eq!(store.get_attendance(date).unwrap(), Some(before));
}

#[test]
fn mark_and_undo_round_trip_through_pending() {
    let store = MemoryStore::new();
    let date = d(2024, 3, 4);
    schedule_class(&store, "Piano", "Ms. Lin", date);
    enroll(&store, "Carl", "Piano");
    sync_attendance(&store, date, "teacher", MARKER).unwrap();

    let marked =
        transition_attendance(&store, date, "Carl", AttendanceTransition::MARK_ON_LEAVE, "office")
            .unwrap();
    assert_eq!(marked.bucket_of("Carl"), Some(AttendanceBucket::OnLeave));
    assert_eq!(marked.last_updated_by, "office");

    let undone =
        transition_attendance(&store, date, "Carl", AttendanceTransition::UNDO_LEAVE, "office")
            .unwrap();
    assert_eq!(undone.bucket_of("Carl"), Some(AttendanceBucket::Pending));

    let present =
        transition_attendance(&store, date, "Carl", AttendanceTransition::MARK_PRESENT, "office")
            .unwrap();
    assert_eq!(store.get_attendance(date).unwrap(), Some(present));
}

#[test]
fn transition_on_unknown_name_or_date_is_rejected() {
    let store = MemoryStore::new();
    let date = d(2024, 3, 4);

    let no_record =
        transition_attendance(&store, date, "Amy", AttendanceTransition::MARK_PRESENT, "t");
    assert!(matches!(no_record, Err(SchedulerError::InvalidTransition { .. })));
    assert!(store.get_attendance(date).unwrap().is_none());

    schedule_class(&store, "Piano", "Ms. Lin", date);
    enroll(&store, "Amy", "Piano");
    sync_attendance(&store, date, "teacher", MARKER).unwrap();
    let stranger =
        transition_attendance(&store, date, "Zed", AttendanceTransition::MARK_PRESENT, "t");
    assert!(matches!(stranger, Err(SchedulerError::InvalidTransition { .. })));
}
