#![cfg(feature = "cli")]

use assert_cmd::Command;
use predicates::str::contains as str_contains;
use std::fs;
use tempfile::{NamedTempFile, tempdir};

#[allow(deprecated)]
fn run_cli(script: &str) -> assert_cmd::assert::Assert {
    let mut cmd = Command::cargo_bin("cli").expect("cli binary");
    cmd.env_remove("ROSTER_SCHEDULER_CONFIG")
        .env_remove("ROSTER_SCHEDULER_DB_PATH")
        .write_stdin(script.to_string())
        .assert()
}

#[test]
fn cli_reports_unknown_commands() {
    run_cli("frobnicate\nquit\n")
        .success()
        .stdout(str_contains("Roster Scheduler (CLI)"))
        .stdout(str_contains("Unknown command: frobnicate (type 'help')"));
}

#[test]
fn cli_preview_skips_holidays_until_toggled() {
    run_cli(
        "holiday add 2024-01-08 Founders Day\n\
         preview Lin Piano 2024-01-01 weekly 3 09:00 12:00\n\
         commit\n\
         list class\n\
         quit\n",
    )
    .success()
    .stdout(str_contains("Holiday added on 2024-01-08."))
    .stdout(str_contains("[ ]   1 2024-01-08 09:00-12:00  conflict: Founders Day"))
    .stdout(str_contains("2 selected"))
    .stdout(str_contains("Created 2 class(es)."));
}

#[test]
fn cli_holiday_dates_accept_timestamps_and_reject_other_formats() {
    run_cli(
        "holiday add 2024-02-28T00:00:00 Peace Memorial Day\n\
         holiday add 28/02/2024 Bad\n\
         holiday list 2024\n\
         quit\n",
    )
    .success()
    .stdout(str_contains("Holiday added on 2024-02-28."))
    .stdout(str_contains("Error: calendar source returned invalid data"))
    .stdout(str_contains("  2024-02-28 Peace Memorial Day"));
}

#[test]
fn cli_rejects_invalid_preview() {
    run_cli("preview Lin Piano 2024-01-01 weekly 3 12:00 09:00\ncommit\nquit\n")
        .success()
        .stdout(str_contains("Error:"))
        .stdout(str_contains("No preview in progress."));
}

#[test]
fn cli_shift_sync_is_idempotent() {
    run_cli(
        "shifts set Amy 2024 3 4,11\n\
         shifts set Amy 2024 3 4,11\n\
         shifts set Amy 2024 3 11,18\n\
         shifts show Amy 2024 3\n\
         quit\n",
    )
    .success()
    .stdout(str_contains("Shifts saved: added 2, removed 0."))
    .stdout(str_contains("Shifts saved: no changes."))
    .stdout(str_contains("Shifts saved: added 1, removed 1."))
    .stdout(str_contains(" 11*"))
    .stdout(str_contains("2 shift day(s)"));
}

#[test]
fn cli_attendance_roll_call() {
    run_cli(
        "member add Carl Piano\n\
         preview Lin Piano 2024-03-04 weekly 1 14:00 15:00\n\
         commit\n\
         attendance 2024-03-04\n\
         mark 2024-03-04 Carl present leave\n\
         mark 2024-03-04 Carl pending present\n\
         quit\n",
    )
    .success()
    .stdout(str_contains("Member Carl enrolled in Piano."))
    .stdout(str_contains("  pending : Carl"))
    .stdout(str_contains("Error:"))
    .stdout(str_contains("  present : Carl"));
}

#[test]
fn cli_vacation_flags_classes_once() {
    run_cli(
        "preview Lin Piano 2024-05-06 daily 2 10:00 11:00\n\
         commit\n\
         vacation Lin 2024-05-06 2024-05-06 Conference\n\
         reschedule confirm\n\
         reschedule confirm\n\
         list class Lin\n\
         quit\n",
    )
    .success()
    .stdout(str_contains("Vacation recorded for Lin."))
    .stdout(str_contains("1 class(es) fall inside the vacation"))
    .stdout(str_contains("Flagged 1 class(es), 0 already flagged."))
    .stdout(str_contains("Nothing to confirm."))
    .stdout(str_contains("[RESCHEDULE] Piano"));
}

#[test]
fn cli_loads_roster_and_exports_assignments() {
    let dir = tempdir().expect("create temp dir");
    let roster = dir.path().join("roster.csv");
    fs::write(
        &roster,
        "name,course_name,effective_departure_date\nAmy,Piano,\nBen,Piano,2024-06-30\n",
    )
    .expect("write roster");
    let export = NamedTempFile::new().expect("create temp file");
    let roster_path = roster.to_string_lossy().to_string();
    let export_path = export.path().to_string_lossy().to_string();

    let script = format!(
        "roster load {roster_path}\nmember list\nshifts set Amy 2024 3 4,5\nexport {export_path}\nquit\n"
    );
    run_cli(&script)
        .success()
        .stdout(str_contains("Loaded 2 roster member(s)"))
        .stdout(str_contains("  Ben (Piano) until 2024-06-30"))
        .stdout(str_contains("Exported 2 assignment(s)"));

    let csv = fs::read_to_string(export.path()).expect("read export");
    assert_eq!(csv.lines().count(), 3);
    assert!(csv.contains("shift"));
}
