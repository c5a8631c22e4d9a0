use crate::error::{SchedulerError, SchedulerResult};
use chrono::{Duration, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Upper bound on occurrences generated by one rule (ten years of weekly sessions).
pub const DEFAULT_MAX_REPEAT_COUNT: u32 = 520;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepUnit {
    Weekly,
    Daily,
}

impl StepUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepUnit::Weekly => "weekly",
            StepUnit::Daily => "daily",
        }
    }

    pub fn step(&self) -> Duration {
        match self {
            StepUnit::Weekly => Duration::days(7),
            StepUnit::Daily => Duration::days(1),
        }
    }
}

impl fmt::Display for StepUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StepUnit {
    type Err = SchedulerError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "weekly" | "week" | "w" => Ok(StepUnit::Weekly),
            "daily" | "day" | "d" => Ok(StepUnit::Daily),
            other => Err(SchedulerError::invalid_input(format!(
                "unknown step unit '{other}' (expected weekly or daily)"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurrenceRule {
    pub start_date: NaiveDate,
    pub step: StepUnit,
    pub count: i64,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

impl RecurrenceRule {
    pub fn new(
        start_date: NaiveDate,
        step: StepUnit,
        count: i64,
        start_time: NaiveTime,
        end_time: NaiveTime,
    ) -> Self {
        Self {
            start_date,
            step,
            count,
            start_time,
            end_time,
        }
    }

    pub fn validate(&self, max_count: u32) -> SchedulerResult<()> {
        validate_time_range(self.start_time, self.end_time)?;
        if self.count < 1 || self.count > i64::from(max_count) {
            return Err(SchedulerError::InvalidCount {
                count: self.count,
                max: max_count,
            });
        }
        Ok(())
    }

    /// `date[i] = start_date + i * step` for `i in 0..count`.
    pub fn dates(&self, max_count: u32) -> SchedulerResult<Vec<NaiveDate>> {
        self.validate(max_count)?;
        let step = self.step.step();
        let mut dates = Vec::with_capacity(self.count as usize);
        let mut current = self.start_date;
        for index in 0..self.count {
            if index > 0 {
                current = current.checked_add_signed(step).ok_or_else(|| {
                    SchedulerError::invalid_input("recurrence runs past the supported date range")
                })?;
            }
            dates.push(current);
        }
        Ok(dates)
    }
}

pub fn validate_time_range(start: NaiveTime, end: NaiveTime) -> SchedulerResult<()> {
    if end <= start {
        return Err(SchedulerError::InvalidTimeRange { start, end });
    }
    Ok(())
}

pub fn generate_dates(
    start_date: NaiveDate,
    step: StepUnit,
    count: i64,
    start_time: NaiveTime,
    end_time: NaiveTime,
) -> SchedulerResult<Vec<NaiveDate>> {
    RecurrenceRule::new(start_date, step, count, start_time, end_time)
        .dates(DEFAULT_MAX_REPEAT_COUNT)
}

/// Accepts `HH:MM` or `HH:MM:SS`.
pub fn parse_time_of_day(input: &str) -> SchedulerResult<NaiveTime> {
    let trimmed = input.trim();
    NaiveTime::parse_from_str(trimmed, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(trimmed, "%H:%M:%S"))
        .map_err(|_| SchedulerError::invalid_input(format!("invalid time '{input}' (HH:MM)")))
}
