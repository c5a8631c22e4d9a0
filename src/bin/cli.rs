use chrono::{Datelike, NaiveDate};
use roster_scheduler::persistence::{
    AssignmentStore, RosterAdmin, SqliteStore, export_assignments_to_csv, load_roster_from_csv,
};
use roster_scheduler::recurrence::parse_time_of_day;
use roster_scheduler::{
    AssignmentFilter, AttendanceBucket, AttendanceRecord, AttendanceTransition, Holiday,
    PreviewRequest, PreviewSession, RescheduleProposal, ResourceKind, RosterMember, Scheduler,
    SchedulerConfig, ShiftCalendarSync, ShiftCalendarView, StepUnit, VacationWindow, logging,
};
use std::collections::BTreeSet;
use std::io::{self, Write};
use std::process;
use std::sync::Arc;

const OPERATOR: &str = "cli";

fn print_help() {
    println!(
        "Commands:\n  help                                         Show this help\n  member add <name> <course> [departure]       Add or update a roster member\n  member remove <name> <course>                Remove a roster member\n  member list                                  List roster members\n  roster load <csv_path>                       Load members from name,course_name,effective_departure_date\n  holiday add <YYYY-MM-DD> <description...>    Declare a holiday\n  holiday list <year>                          List holidays for a year\n  vacation <teacher> <start> <end> <reason...> Record a vacation and scan its classes\n  reschedule confirm                           Flag the classes found by the last vacation\n  preview <teacher> <course> <start> <weekly|daily> <count> <HH:MM> <HH:MM>\n                                               Generate a class preview\n  toggle <index>                               Flip one occurrence of the preview\n  commit                                       Create the selected occurrences\n  shifts show <staff> <year> <month>           Show a month of shifts\n  shifts set <staff> <year> <month> <days|-> [HH:MM HH:MM]\n                                               Replace the month's shift days (e.g. 3,10,17)\n  attendance <YYYY-MM-DD>                      Show the roll call for a date\n  mark <YYYY-MM-DD> <name> <from> <to>         Move a name between pending/present/leave\n  list [class|shift] [assignee]                List assignments\n  delete <id>                                  Delete an assignment\n  export <csv_path>                            Export all assignments to CSV\n  quit|exit                                    Exit"
    );
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()
}

fn print_preview(session: &PreviewSession) {
    for warning in session.warnings() {
        println!("Warning: {warning}");
    }
    for (index, occurrence) in session.occurrences().iter().enumerate() {
        let mark = if occurrence.selected { "x" } else { " " };
        let reason = if occurrence.conflicted {
            format!("  conflict: {}", occurrence.conflict_reason)
        } else {
            String::new()
        };
        println!(
            "[{mark}] {index:>3} {} {}-{}{reason}",
            occurrence.date,
            occurrence.start_time.format("%H:%M"),
            occurrence.end_time.format("%H:%M"),
        );
    }
    println!("{} selected", session.selected_dates().len());
}

fn print_shift_calendar(view: &ShiftCalendarView) {
    println!("{} {}-{:02}", view.staff, view.year, view.month);
    println!(" Su  Mo  Tu  We  Th  Fr  Sa");
    for week in &view.weeks {
        let line: Vec<String> = week
            .iter()
            .map(|cell| match cell {
                Some(date) if view.is_scheduled(*date) => format!("{:>3}*", date.day()),
                Some(date) => format!("{:>3} ", date.day()),
                None => "    ".to_string(),
            })
            .collect();
        println!("{}", line.join(""));
    }
    println!("{} shift day(s)", view.scheduled.len());
}

fn print_attendance(record: &AttendanceRecord) {
    let join = |names: &BTreeSet<String>| names.iter().cloned().collect::<Vec<_>>().join(", ");
    println!("Attendance {}", record.date);
    println!("  pending : {}", join(&record.pending));
    println!("  present : {}", join(&record.present));
    println!("  on leave: {}", join(&record.on_leave));
}

fn print_proposal(proposal: &RescheduleProposal) {
    if proposal.is_empty() {
        println!("No classes fall inside the vacation.");
        return;
    }
    println!(
        "{} class(es) fall inside the vacation; run 'reschedule confirm' to flag them:",
        proposal.assignments.len()
    );
    for assignment in &proposal.assignments {
        println!("  {} {} {}", assignment.start, assignment.title, assignment.id);
    }
}

fn parse_days(spec: &str, year: i32, month: u32) -> Option<BTreeSet<NaiveDate>> {
    if spec == "-" {
        return Some(BTreeSet::new());
    }
    spec.split(',')
        .filter(|part| !part.trim().is_empty())
        .map(|part| {
            let day = part.trim().parse::<u32>().ok()?;
            NaiveDate::from_ymd_opt(year, month, day)
        })
        .collect()
}

fn main() {
    let config = match SchedulerConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Configuration error: {err}");
            process::exit(1);
        }
    };
    logging::init(&config.log_filter);

    let opened = match &config.db_path {
        Some(path) => SqliteStore::new(path),
        None => SqliteStore::in_memory(),
    };
    let store = match opened {
        Ok(store) => Arc::new(store),
        Err(err) => {
            eprintln!("Failed to open store: {err}");
            process::exit(1);
        }
    };
    let scheduler = Scheduler::with_config(store.clone(), config);

    let mut preview: Option<PreviewSession> = None;
    let mut proposal: Option<RescheduleProposal> = None;

    println!("Roster Scheduler (CLI) - type 'help' for commands\n");

    let stdin = io::stdin();
    let mut line = String::new();
    loop {
        print!("> ");
        let _ = io::stdout().flush();
        line.clear();
        match stdin.read_line(&mut line) {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        let parts: Vec<&str> = input.split_whitespace().collect();
        let cmd = parts[0];
        let args = &parts[1..];

        match cmd {
            "help" => print_help(),
            "quit" | "exit" => break,
            "member" => match args {
                ["add", name, course, rest @ ..] => {
                    let mut member = RosterMember::new(*name, *course);
                    if let Some(departure) = rest.first() {
                        match parse_date(departure) {
                            Some(date) => member = member.departing(date),
                            None => {
                                println!("Invalid date (use YYYY-MM-DD)");
                                continue;
                            }
                        }
                    }
                    match store.upsert_member(&member) {
                        Ok(()) => println!("Member {name} enrolled in {course}."),
                        Err(e) => println!("Error saving member: {e}"),
                    }
                }
                ["remove", name, course] => match store.remove_member(name, course) {
                    Ok(true) => println!("Member {name} removed from {course}."),
                    Ok(false) => println!("Member {name} is not enrolled in {course}."),
                    Err(e) => println!("Error removing member: {e}"),
                },
                ["list"] => match store.all_members() {
                    Ok(members) if members.is_empty() => println!("Roster is empty."),
                    Ok(members) => {
                        for member in members {
                            match member.effective_departure_date {
                                Some(date) => {
                                    println!("  {} ({}) until {date}", member.name, member.course_name)
                                }
                                None => println!("  {} ({})", member.name, member.course_name),
                            }
                        }
                    }
                    Err(e) => println!("Error listing roster: {e}"),
                },
                _ => println!("Usage: member add <name> <course> [departure] | member remove <name> <course> | member list"),
            },
            "roster" => match args {
                ["load", path] => match load_roster_from_csv(path, &*store) {
                    Ok(count) => println!("Loaded {count} roster member(s) from {path}."),
                    Err(e) => println!("Error loading roster: {e}"),
                },
                _ => println!("Usage: roster load <csv_path>"),
            },
            "holiday" => match args {
                ["add", date, description @ ..] if !description.is_empty() => {
                    let holiday = match Holiday::parse(date, description.join(" ")) {
                        Ok(holiday) => holiday,
                        Err(e) => {
                            println!("Error: {e}");
                            continue;
                        }
                    };
                    let date = holiday.date;
                    match scheduler.add_holiday(holiday) {
                        Ok(()) => println!("Holiday added on {date}."),
                        Err(e) => println!("Error adding holiday: {e}"),
                    }
                }
                ["list", year] => {
                    let Ok(year) = year.parse::<i32>() else {
                        println!("Invalid year");
                        continue;
                    };
                    match scheduler.holiday_set(year) {
                        Ok(set) if set.is_empty() => println!("No holidays in {year}."),
                        Ok(set) => {
                            for holiday in set.holidays() {
                                println!("  {} {}", holiday.date, holiday.description);
                            }
                        }
                        Err(e) => println!("Error: {e}"),
                    }
                }
                _ => println!("Usage: holiday add <YYYY-MM-DD> <description...> | holiday list <year>"),
            },
            "vacation" => match args {
                [teacher, start, end, reason @ ..] if !reason.is_empty() => {
                    let (Some(start), Some(end)) = (parse_date(start), parse_date(end)) else {
                        println!("Invalid date (use YYYY-MM-DD)");
                        continue;
                    };
                    let window = VacationWindow::new(*teacher, start, end, reason.join(" "));
                    match scheduler.record_vacation(&window) {
                        Ok(found) => {
                            println!("Vacation recorded for {teacher}.");
                            print_proposal(&found);
                            proposal = (!found.is_empty()).then_some(found);
                        }
                        Err(e) => println!("Error recording vacation: {e}"),
                    }
                }
                _ => println!("Usage: vacation <teacher> <start> <end> <reason...>"),
            },
            "reschedule" => match (args, proposal.take()) {
                (["confirm"], Some(pending)) => match scheduler.confirm_reschedule(&pending) {
                    Ok(outcome) => println!(
                        "Flagged {} class(es), {} already flagged.",
                        outcome.flagged, outcome.already_flagged
                    ),
                    Err(e) => {
                        println!("Error flagging classes: {e}");
                        proposal = Some(pending);
                    }
                },
                (["confirm"], None) => println!("Nothing to confirm."),
                (_, pending) => {
                    proposal = pending;
                    println!("Usage: reschedule confirm");
                }
            },
            "preview" => match args {
                [teacher, course, start, step, count, from, to] => {
                    let Some(start_date) = parse_date(start) else {
                        println!("Invalid date (use YYYY-MM-DD)");
                        continue;
                    };
                    let parsed = step.parse::<StepUnit>().and_then(|step| {
                        Ok((step, parse_time_of_day(from)?, parse_time_of_day(to)?))
                    });
                    let (step, start_time, end_time) = match parsed {
                        Ok(values) => values,
                        Err(e) => {
                            println!("Error: {e}");
                            continue;
                        }
                    };
                    let Ok(count) = count.parse::<i64>() else {
                        println!("Invalid count");
                        continue;
                    };
                    let request = PreviewRequest {
                        kind: ResourceKind::Class,
                        resource: teacher.to_string(),
                        title: course.to_string(),
                        location: String::new(),
                        category: String::new(),
                        start_date,
                        step,
                        count,
                        start_time,
                        end_time,
                        created_by: OPERATOR.to_string(),
                    };
                    match scheduler.generate_preview(&request) {
                        Ok(session) => {
                            print_preview(&session);
                            preview = Some(session);
                        }
                        Err(e) => println!("Error: {e}"),
                    }
                }
                _ => println!("Usage: preview <teacher> <course> <start> <weekly|daily> <count> <HH:MM> <HH:MM>"),
            },
            "toggle" => match (args, preview.as_mut()) {
                ([index], Some(session)) => match index.parse::<usize>() {
                    Ok(index) => match session.toggle(index) {
                        Ok(_) => print_preview(session),
                        Err(e) => println!("Error: {e}"),
                    },
                    Err(_) => println!("Invalid index"),
                },
                (_, None) => println!("No preview in progress."),
                _ => println!("Usage: toggle <index>"),
            },
            "commit" => match preview.as_mut() {
                Some(session) => match scheduler.commit_preview(session) {
                    Ok(summary) => {
                        println!("Created {} class(es).", summary.created);
                        preview = None;
                    }
                    Err(e) => println!("Error: {e}"),
                },
                None => println!("No preview in progress."),
            },
            "shifts" => match args {
                ["show", staff, year, month] => {
                    let (Ok(year), Ok(month)) = (year.parse::<i32>(), month.parse::<u32>()) else {
                        println!("Invalid year or month");
                        continue;
                    };
                    match scheduler.shift_calendar_view(staff, year, month) {
                        Ok(view) => print_shift_calendar(&view),
                        Err(e) => println!("Error: {e}"),
                    }
                }
                ["set", staff, year, month, days, times @ ..] => {
                    let (Ok(year), Ok(month)) = (year.parse::<i32>(), month.parse::<u32>()) else {
                        println!("Invalid year or month");
                        continue;
                    };
                    let Some(dates) = parse_days(days, year, month) else {
                        println!("Invalid day list");
                        continue;
                    };
                    let (start_time, end_time) = match times {
                        [] => (None, None),
                        [from, to] => match (parse_time_of_day(from), parse_time_of_day(to)) {
                            (Ok(from), Ok(to)) => (Some(from), Some(to)),
                            (Err(e), _) | (_, Err(e)) => {
                                println!("Error: {e}");
                                continue;
                            }
                        },
                        _ => {
                            println!("Usage: shifts set <staff> <year> <month> <days|-> [HH:MM HH:MM]");
                            continue;
                        }
                    };
                    let request = ShiftCalendarSync {
                        staff: staff.to_string(),
                        year,
                        month,
                        dates,
                        start_time,
                        end_time,
                        operator: OPERATOR.to_string(),
                    };
                    match scheduler.sync_shift_calendar(&request) {
                        Ok(summary) => println!("Shifts saved: {}.", summary.to_cli_summary()),
                        Err(e) => println!("Error: {e}"),
                    }
                }
                _ => println!("Usage: shifts show <staff> <year> <month> | shifts set <staff> <year> <month> <days|-> [HH:MM HH:MM]"),
            },
            "attendance" => match args {
                [date] => {
                    let Some(date) = parse_date(date) else {
                        println!("Invalid date (use YYYY-MM-DD)");
                        continue;
                    };
                    match scheduler.get_attendance_view(date, OPERATOR) {
                        Ok(record) => print_attendance(&record),
                        Err(e) => println!("Error: {e}"),
                    }
                }
                _ => println!("Usage: attendance <YYYY-MM-DD>"),
            },
            "mark" => match args {
                [date, name, from, to] => {
                    let Some(date) = parse_date(date) else {
                        println!("Invalid date (use YYYY-MM-DD)");
                        continue;
                    };
                    let buckets = from
                        .parse::<AttendanceBucket>()
                        .and_then(|from| Ok((from, to.parse::<AttendanceBucket>()?)));
                    let transition = match buckets {
                        Ok((from, to)) => AttendanceTransition::new(from, to),
                        Err(e) => {
                            println!("Error: {e}");
                            continue;
                        }
                    };
                    match scheduler.transition_attendance(date, name, transition, OPERATOR) {
                        Ok(record) => print_attendance(&record),
                        Err(e) => println!("Error: {e}"),
                    }
                }
                _ => println!("Usage: mark <YYYY-MM-DD> <name> <from> <to>"),
            },
            "list" => {
                let mut filter = AssignmentFilter::new();
                if let Some(kind) = args.first() {
                    match kind.parse::<ResourceKind>() {
                        Ok(kind) => filter = filter.kind(kind),
                        Err(e) => {
                            println!("Error: {e}");
                            continue;
                        }
                    }
                }
                if let Some(assignee) = args.get(1) {
                    filter = filter.assignee(*assignee);
                }
                match scheduler.list_assignments(&filter) {
                    Ok(assignments) if assignments.is_empty() => println!("No assignments."),
                    Ok(assignments) => {
                        for a in assignments {
                            println!(
                                "  {} {:<5} {} - {} {} ({}) {}",
                                a.start.date(),
                                a.kind.as_str(),
                                a.start.format("%H:%M"),
                                a.end.format("%H:%M"),
                                a.title,
                                a.assignee_name,
                                a.id
                            );
                        }
                    }
                    Err(e) => println!("Error listing assignments: {e}"),
                }
            }
            "delete" => match args {
                [id] => match scheduler.delete_assignment(id) {
                    Ok(true) => println!("Deleted assignment {id}."),
                    Ok(false) => println!("Assignment {id} not found."),
                    Err(e) => println!("Error deleting assignment: {e}"),
                },
                _ => println!("Usage: delete <id>"),
            },
            "export" => match args {
                [path] => {
                    let exported = store
                        .query_assignments(&AssignmentFilter::new())
                        .map_err(|e| e.to_string())
                        .and_then(|all| export_assignments_to_csv(&all, path).map_err(|e| e.to_string()));
                    match exported {
                        Ok(count) => println!("Exported {count} assignment(s) to {path}."),
                        Err(e) => println!("Error exporting assignments: {e}"),
                    }
                }
                _ => println!("Usage: export <csv_path>"),
            },
            _ => println!("Unknown command: {cmd} (type 'help')"),
        }
    }
}
