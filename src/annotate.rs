use crate::calendar::{HolidaySet, VacationWindow};
use chrono::{Datelike, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const CONFLICT_SEPARATOR: &str = " / ";

/// One candidate slot inside a pending preview. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occurrence {
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub conflicted: bool,
    pub conflict_reason: String,
    pub selected: bool,
}

impl Occurrence {
    pub fn toggle(&mut self) {
        self.selected = !self.selected;
    }
}

/// Marks each date that falls on a holiday or inside one of `vacations`.
/// Holiday descriptions come first in the reason, vacation reasons after.
pub fn annotate(
    dates: &[NaiveDate],
    start_time: NaiveTime,
    end_time: NaiveTime,
    holidays: &[Arc<HolidaySet>],
    vacations: &[VacationWindow],
) -> Vec<Occurrence> {
    dates
        .iter()
        .map(|&date| {
            let mut reasons: Vec<&str> = holidays
                .iter()
                .filter(|set| set.year() == date.year())
                .flat_map(|set| set.descriptions_on(date).iter().map(String::as_str))
                .collect();
            reasons.extend(
                vacations
                    .iter()
                    .filter(|window| window.contains(date))
                    .map(|window| window.reason.as_str()),
            );

            let conflicted = !reasons.is_empty();
            Occurrence {
                date,
                start_time,
                end_time,
                conflicted,
                conflict_reason: reasons.join(CONFLICT_SEPARATOR),
                selected: !conflicted,
            }
        })
        .collect()
}
