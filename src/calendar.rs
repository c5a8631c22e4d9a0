use crate::error::{SchedulerError, SchedulerResult};
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CalendarError {
    #[error("calendar source unavailable: {0}")]
    Unavailable(String),
    #[error("calendar source returned invalid data: {0}")]
    InvalidData(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holiday {
    pub date: NaiveDate,
    pub description: String,
}

impl Holiday {
    pub fn new(date: NaiveDate, description: impl Into<String>) -> Self {
        Self {
            date,
            description: description.into(),
        }
    }

    /// Parse a feed entry whose date is an ISO-8601 date string.
    pub fn parse(date: &str, description: impl Into<String>) -> Result<Self, CalendarError> {
        let trimmed = date.trim();
        let day = trimmed.get(..10).unwrap_or(trimmed);
        let date = NaiveDate::parse_from_str(day, "%Y-%m-%d").map_err(|err| {
            CalendarError::InvalidData(format!("invalid holiday date '{date}': {err}"))
        })?;
        Ok(Self::new(date, description))
    }
}

/// Immutable holidays of a single year.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HolidaySet {
    year: i32,
    by_date: BTreeMap<NaiveDate, Vec<String>>,
}

impl HolidaySet {
    pub fn new(year: i32, holidays: impl IntoIterator<Item = Holiday>) -> Self {
        let mut by_date: BTreeMap<NaiveDate, Vec<String>> = BTreeMap::new();
        for holiday in holidays {
            if holiday.date.year() != year {
                continue;
            }
            let descriptions = by_date.entry(holiday.date).or_default();
            if !descriptions.contains(&holiday.description) {
                descriptions.push(holiday.description);
            }
        }
        Self { year, by_date }
    }

    pub fn empty(year: i32) -> Self {
        Self {
            year,
            by_date: BTreeMap::new(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn len(&self) -> usize {
        self.by_date.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_date.is_empty()
    }

    pub fn is_holiday(&self, date: NaiveDate) -> bool {
        self.by_date.contains_key(&date)
    }

    pub fn descriptions_on(&self, date: NaiveDate) -> &[String] {
        self.by_date.get(&date).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn holidays(&self) -> Vec<Holiday> {
        self.by_date
            .iter()
            .flat_map(|(date, descriptions)| {
                descriptions
                    .iter()
                    .map(move |description| Holiday::new(*date, description.clone()))
            })
            .collect()
    }
}

/// A resource-specific exclusion window, inclusive on both ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VacationWindow {
    pub resource_name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub reason: String,
}

impl VacationWindow {
    pub fn new(
        resource_name: impl Into<String>,
        start_date: NaiveDate,
        end_date: NaiveDate,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            resource_name: resource_name.into(),
            start_date,
            end_date,
            reason: reason.into(),
        }
    }

    pub fn validate(&self) -> SchedulerResult<()> {
        if self.resource_name.trim().is_empty() {
            return Err(SchedulerError::invalid_input(
                "vacation requires a resource name",
            ));
        }
        if self.start_date > self.end_date {
            return Err(SchedulerError::invalid_input(format!(
                "vacation start {} is after end {}",
                self.start_date, self.end_date
            )));
        }
        Ok(())
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }
}

/// Supplies public holidays for a year.
pub trait HolidaySource: Send + Sync {
    fn holidays(&self, year: i32) -> Result<Vec<Holiday>, CalendarError>;
}

/// Holidays declared up front, typically from configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixedHolidays {
    holidays: BTreeMap<NaiveDate, Vec<String>>,
}

impl FixedHolidays {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_holidays<I>(holidays: I) -> Self
    where
        I: IntoIterator<Item = Holiday>,
    {
        let mut calendar = Self::new();
        for holiday in holidays {
            calendar.add_holiday(holiday.date, holiday.description);
        }
        calendar
    }

    pub fn add_holiday(&mut self, date: NaiveDate, description: impl Into<String>) {
        let description = description.into();
        let entry = self.holidays.entry(date).or_default();
        if !entry.contains(&description) {
            entry.push(description);
        }
    }

    /// Add the same month/day for every year in the range.
    /// Example: Dec 24 (Christmas Eve) for 2025-2030
    pub fn add_recurring_holiday(
        &mut self,
        month: u32,
        day: u32,
        description: &str,
        start_year: i32,
        end_year: i32,
    ) {
        for year in start_year..=end_year {
            if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
                self.add_holiday(date, description);
            }
        }
    }

    /// Add the nth weekday of a month for every year in the range.
    pub fn add_recurring_weekday_holiday(
        &mut self,
        month: u32,
        weekday: Weekday,
        n: u32,
        description: &str,
        start_year: i32,
        end_year: i32,
    ) {
        for year in start_year..=end_year {
            if let Some(date) = nth_weekday(year, month, weekday, n) {
                self.add_holiday(date, description);
            }
        }
    }

    pub fn is_holiday(&self, date: NaiveDate) -> bool {
        self.holidays.contains_key(&date)
    }

    pub fn to_holidays(&self) -> Vec<Holiday> {
        self.holidays
            .iter()
            .flat_map(|(date, descriptions)| {
                descriptions
                    .iter()
                    .map(move |description| Holiday::new(*date, description.clone()))
            })
            .collect()
    }
}

impl HolidaySource for FixedHolidays {
    fn holidays(&self, year: i32) -> Result<Vec<Holiday>, CalendarError> {
        Ok(self
            .to_holidays()
            .into_iter()
            .filter(|holiday| holiday.date.year() == year)
            .collect())
    }
}

impl HolidaySource for parking_lot::RwLock<FixedHolidays> {
    fn holidays(&self, year: i32) -> Result<Vec<Holiday>, CalendarError> {
        self.read().holidays(year)
    }
}

/// Per-process cache of holiday sets. Only successful lookups are cached.
pub struct CachedHolidaySource {
    inner: Arc<dyn HolidaySource>,
    cache: Mutex<HashMap<i32, Arc<HolidaySet>>>,
}

impl CachedHolidaySource {
    pub fn new(inner: Arc<dyn HolidaySource>) -> Self {
        Self {
            inner,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn holiday_set(&self, year: i32) -> Result<Arc<HolidaySet>, CalendarError> {
        if let Some(set) = self.cache.lock().get(&year) {
            return Ok(set.clone());
        }
        let holidays = self.inner.holidays(year)?;
        let set = Arc::new(HolidaySet::new(year, holidays));
        debug!(year, holidays = set.len(), "cached holiday set");
        self.cache.lock().insert(year, set.clone());
        Ok(set)
    }

    pub fn invalidate(&self, year: i32) {
        self.cache.lock().remove(&year);
    }

    pub fn cached_years(&self) -> Vec<i32> {
        let mut years: Vec<i32> = self.cache.lock().keys().copied().collect();
        years.sort();
        years
    }
}

/// `[first day of month, first day of next month)`.
pub fn month_bounds(year: i32, month: u32) -> Option<(NaiveDate, NaiveDate)> {
    let start = NaiveDate::from_ymd_opt(year, month, 1)?;
    let end = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    Some((start, end))
}

/// Sunday-first weeks of a month; cells outside the month are `None`.
pub fn month_grid(year: i32, month: u32) -> SchedulerResult<Vec<[Option<NaiveDate>; 7]>> {
    let (start, end) = month_bounds(year, month)
        .ok_or_else(|| SchedulerError::invalid_input(format!("invalid month {year}-{month}")))?;

    let mut weeks = Vec::new();
    let mut week: [Option<NaiveDate>; 7] = [None; 7];
    let mut column = start.weekday().num_days_from_sunday() as usize;
    let mut current = start;
    while current < end {
        week[column] = Some(current);
        column += 1;
        if column == 7 {
            weeks.push(week);
            week = [None; 7];
            column = 0;
        }
        current += Duration::days(1);
    }
    if column > 0 {
        weeks.push(week);
    }
    Ok(weeks)
}

/// Find the nth occurrence of a weekday in a month
fn nth_weekday(year: i32, month: u32, weekday: Weekday, n: u32) -> Option<NaiveDate> {
    let mut date = NaiveDate::from_ymd_opt(year, month, 1)?;
    let mut count = 0;

    while date.month() == month {
        if date.weekday() == weekday {
            count += 1;
            if count == n {
                return Some(date);
            }
        }
        date += Duration::days(1);
    }
    None
}
