use crate::error::{SchedulerError, SchedulerResult};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterMember {
    pub name: String,
    pub course_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effective_departure_date: Option<NaiveDate>,
}

impl RosterMember {
    pub fn new(name: impl Into<String>, course_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            course_name: course_name.into(),
            effective_departure_date: None,
        }
    }

    pub fn departing(mut self, date: NaiveDate) -> Self {
        self.effective_departure_date = Some(date);
        self
    }

    /// The departure date itself is still an active day.
    pub fn is_active_on(&self, date: NaiveDate) -> bool {
        match self.effective_departure_date {
            Some(departure) => date <= departure,
            None => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceBucket {
    Pending,
    Present,
    OnLeave,
}

impl AttendanceBucket {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceBucket::Pending => "pending",
            AttendanceBucket::Present => "present",
            AttendanceBucket::OnLeave => "on_leave",
        }
    }
}

impl fmt::Display for AttendanceBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttendanceBucket {
    type Err = SchedulerError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(AttendanceBucket::Pending),
            "present" => Ok(AttendanceBucket::Present),
            "on_leave" | "onleave" | "leave" => Ok(AttendanceBucket::OnLeave),
            other => Err(SchedulerError::invalid_input(format!(
                "unknown attendance bucket '{other}'"
            ))),
        }
    }
}

/// A requested move between buckets. Only moves through `Pending` are legal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceTransition {
    pub from: AttendanceBucket,
    pub to: AttendanceBucket,
}

impl AttendanceTransition {
    pub const MARK_PRESENT: Self = Self::new(AttendanceBucket::Pending, AttendanceBucket::Present);
    pub const MARK_ON_LEAVE: Self = Self::new(AttendanceBucket::Pending, AttendanceBucket::OnLeave);
    pub const UNDO_PRESENT: Self = Self::new(AttendanceBucket::Present, AttendanceBucket::Pending);
    pub const UNDO_LEAVE: Self = Self::new(AttendanceBucket::OnLeave, AttendanceBucket::Pending);

    pub const fn new(from: AttendanceBucket, to: AttendanceBucket) -> Self {
        Self { from, to }
    }

    pub fn is_allowed(&self) -> bool {
        matches!(
            (self.from, self.to),
            (AttendanceBucket::Pending, AttendanceBucket::Present)
                | (AttendanceBucket::Pending, AttendanceBucket::OnLeave)
                | (AttendanceBucket::Present, AttendanceBucket::Pending)
                | (AttendanceBucket::OnLeave, AttendanceBucket::Pending)
        )
    }
}

/// Per-date roll call. The three buckets are pairwise disjoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub date: NaiveDate,
    #[serde(default)]
    pub pending: BTreeSet<String>,
    #[serde(default)]
    pub present: BTreeSet<String>,
    #[serde(default)]
    pub on_leave: BTreeSet<String>,
    #[serde(default)]
    pub last_updated_by: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated_at: Option<DateTime<Utc>>,
}

impl AttendanceRecord {
    pub fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            pending: BTreeSet::new(),
            present: BTreeSet::new(),
            on_leave: BTreeSet::new(),
            last_updated_by: String::new(),
            last_updated_at: None,
        }
    }

    pub fn bucket(&self, bucket: AttendanceBucket) -> &BTreeSet<String> {
        match bucket {
            AttendanceBucket::Pending => &self.pending,
            AttendanceBucket::Present => &self.present,
            AttendanceBucket::OnLeave => &self.on_leave,
        }
    }

    fn bucket_mut(&mut self, bucket: AttendanceBucket) -> &mut BTreeSet<String> {
        match bucket {
            AttendanceBucket::Pending => &mut self.pending,
            AttendanceBucket::Present => &mut self.present,
            AttendanceBucket::OnLeave => &mut self.on_leave,
        }
    }

    pub fn bucket_of(&self, name: &str) -> Option<AttendanceBucket> {
        [
            AttendanceBucket::Pending,
            AttendanceBucket::Present,
            AttendanceBucket::OnLeave,
        ]
        .into_iter()
        .find(|bucket| self.bucket(*bucket).contains(name))
    }

    /// Every name in any bucket.
    pub fn recorded(&self) -> BTreeSet<&str> {
        self.pending
            .iter()
            .chain(self.present.iter())
            .chain(self.on_leave.iter())
            .map(String::as_str)
            .collect()
    }

    pub fn is_disjoint(&self) -> bool {
        self.pending.is_disjoint(&self.present)
            && self.pending.is_disjoint(&self.on_leave)
            && self.present.is_disjoint(&self.on_leave)
    }

    pub fn stamp(&mut self, operator: &str, at: DateTime<Utc>) {
        self.last_updated_by = operator.to_string();
        self.last_updated_at = Some(at);
    }

    /// Moves `name` between buckets. Leaves the record untouched on error.
    pub fn apply(&mut self, name: &str, transition: AttendanceTransition) -> SchedulerResult<()> {
        let invalid = || SchedulerError::InvalidTransition {
            name: name.to_string(),
            from: transition.from,
            to: transition.to,
        };
        if !transition.is_allowed() || !self.bucket(transition.from).contains(name) {
            return Err(invalid());
        }
        self.bucket_mut(transition.from).remove(name);
        self.bucket_mut(transition.to).insert(name.to_string());
        Ok(())
    }
}
