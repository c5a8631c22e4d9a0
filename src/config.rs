//! Scheduler configuration.
//!
//! Loaded from an optional JSON file, then overridden by environment variables.

use crate::calendar::{FixedHolidays, Holiday};
use crate::recurrence::DEFAULT_MAX_REPEAT_COUNT;
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const CONFIG_PATH_ENV: &str = "ROSTER_SCHEDULER_CONFIG";
pub const DB_PATH_ENV: &str = "ROSTER_SCHEDULER_DB_PATH";
pub const HTTP_ADDR_ENV: &str = "ROSTER_SCHEDULER_HTTP_ADDR";
pub const LOG_ENV: &str = "ROSTER_SCHEDULER_LOG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// SQLite database file. `None` keeps everything in memory.
    pub db_path: Option<PathBuf>,
    pub http_addr: String,
    pub log_filter: String,
    /// Prepended to class titles flagged for rescheduling.
    pub reschedule_marker: String,
    pub shift_title: String,
    /// Default time of day for shifts synced from the month calendar.
    pub shift_start: NaiveTime,
    pub shift_end: NaiveTime,
    pub max_repeat_count: u32,
    pub holidays: Vec<Holiday>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            http_addr: "0.0.0.0:3000".to_string(),
            log_filter: "info".to_string(),
            reschedule_marker: "[RESCHEDULE] ".to_string(),
            shift_title: "Part-time shift".to_string(),
            shift_start: NaiveTime::from_hms_opt(9, 0, 0).unwrap_or(NaiveTime::MIN),
            shift_end: NaiveTime::from_hms_opt(12, 0, 0).unwrap_or(NaiveTime::MIN),
            max_repeat_count: DEFAULT_MAX_REPEAT_COUNT,
            holidays: Vec::new(),
        }
    }
}

impl SchedulerConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    /// Reads the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`SchedulerConfig::from_env`] with a caller-supplied variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match lookup(CONFIG_PATH_ENV).filter(|path| !path.trim().is_empty()) {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        if let Some(db_path) = lookup(DB_PATH_ENV).filter(|value| !value.trim().is_empty()) {
            config.db_path = Some(PathBuf::from(db_path));
        }
        if let Some(addr) = lookup(HTTP_ADDR_ENV).filter(|value| !value.trim().is_empty()) {
            config.http_addr = addr;
        }
        if let Some(filter) = lookup(LOG_ENV).filter(|value| !value.trim().is_empty()) {
            config.log_filter = filter;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.shift_end <= self.shift_start {
            return Err(ConfigError::Invalid(format!(
                "shift_end {} must be after shift_start {}",
                self.shift_end, self.shift_start
            )));
        }
        if self.max_repeat_count == 0 {
            return Err(ConfigError::Invalid(
                "max_repeat_count must be at least 1".into(),
            ));
        }
        if self.reschedule_marker.is_empty() {
            return Err(ConfigError::Invalid(
                "reschedule_marker must not be empty".into(),
            ));
        }
        Ok(())
    }

    pub fn holiday_source(&self) -> FixedHolidays {
        FixedHolidays::from_holidays(self.holidays.iter().cloned())
    }
}
