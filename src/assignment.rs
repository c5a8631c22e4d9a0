use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub type AssignmentId = String;

const ISO_TIMESTAMP: &str = "%Y-%m-%dT%H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Class,
    Shift,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Class => "class",
            ResourceKind::Shift => "shift",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "class" => Ok(ResourceKind::Class),
            "shift" => Ok(ResourceKind::Shift),
            other => Err(format!("unknown resource kind '{other}'")),
        }
    }
}

/// A persisted scheduled item. `id` and `created_at` are set by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub id: AssignmentId,
    pub kind: ResourceKind,
    pub title: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub assignee_name: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

impl Assignment {
    pub fn from_new(id: AssignmentId, new: NewAssignment, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            kind: new.kind,
            title: new.title,
            start: new.start,
            end: new.end,
            assignee_name: new.assignee_name,
            location: new.location,
            category: new.category,
            created_by: new.created_by,
            created_at,
        }
    }

    pub fn start_iso(&self) -> String {
        iso_timestamp(self.start)
    }

    pub fn start_date(&self) -> NaiveDate {
        self.start.date()
    }

    /// Title without a leading reschedule marker.
    pub fn course_name(&self, marker: &str) -> &str {
        if marker.is_empty() {
            return &self.title;
        }
        self.title.strip_prefix(marker).unwrap_or(&self.title)
    }

    pub fn apply_update(&mut self, update: &AssignmentUpdate) {
        if let Some(title) = &update.title {
            self.title = title.clone();
        }
        if let Some(start) = update.start {
            self.start = start;
        }
        if let Some(end) = update.end {
            self.end = end;
        }
    }
}

/// Creation payload handed to a store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAssignment {
    pub kind: ResourceKind,
    pub title: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub assignee_name: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub created_by: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<NaiveDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<NaiveDateTime>,
}

impl AssignmentUpdate {
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }
}

/// Store query. Start bounds are ISO-8601 strings compared lexicographically:
/// `start_from` inclusive, `start_before` exclusive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentFilter {
    #[serde(default)]
    pub kind: Option<ResourceKind>,
    #[serde(default)]
    pub assignee: Option<String>,
    #[serde(default)]
    pub start_from: Option<String>,
    #[serde(default)]
    pub start_before: Option<String>,
}

impl AssignmentFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn kind(mut self, kind: ResourceKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn assignee(mut self, assignee: impl Into<String>) -> Self {
        self.assignee = Some(assignee.into());
        self
    }

    /// `[from, before)` expressed as day boundaries.
    pub fn dates(mut self, from: NaiveDate, before: NaiveDate) -> Self {
        self.start_from = Some(iso_day_start(from));
        self.start_before = Some(iso_day_start(before));
        self
    }

    pub fn matches(&self, assignment: &Assignment) -> bool {
        if let Some(kind) = self.kind {
            if assignment.kind != kind {
                return false;
            }
        }
        if let Some(assignee) = &self.assignee {
            if &assignment.assignee_name != assignee {
                return false;
            }
        }
        let start = assignment.start_iso();
        if let Some(from) = &self.start_from {
            if start.as_str() < from.as_str() {
                return false;
            }
        }
        if let Some(before) = &self.start_before {
            if start.as_str() >= before.as_str() {
                return false;
            }
        }
        true
    }
}

pub fn iso_timestamp(value: NaiveDateTime) -> String {
    value.format(ISO_TIMESTAMP).to_string()
}

pub fn iso_day_start(date: NaiveDate) -> String {
    format!("{}T00:00:00", date.format("%Y-%m-%d"))
}

pub fn parse_iso_timestamp(value: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value.trim(), ISO_TIMESTAMP)
        .or_else(|_| NaiveDateTime::parse_from_str(value.trim(), "%Y-%m-%dT%H:%M:%S%.f"))
        .ok()
}
