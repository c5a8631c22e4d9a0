use super::{
    AssignmentStore, AttendanceStore, PersistenceError, PersistenceResult, RosterAdmin,
    RosterStore, VacationStore, validate_member, validate_new_assignment,
};
use crate::assignment::{
    Assignment, AssignmentFilter, AssignmentId, AssignmentUpdate, NewAssignment, ResourceKind,
    iso_timestamp, parse_iso_timestamp,
};
use crate::attendance::{AttendanceRecord, RosterMember};
use crate::calendar::VacationWindow;
use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use std::path::Path;
use tracing::warn;
use uuid::Uuid;

const DATE_FORMAT: &str = "%Y-%m-%d";

pub struct SqliteStore {
    connection: Mutex<Connection>,
}

struct AssignmentRow {
    id: String,
    kind: String,
    title: String,
    start: String,
    end: String,
    assignee_name: String,
    location: String,
    category: String,
    created_by: String,
    created_at: String,
}

impl AssignmentRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            kind: row.get(1)?,
            title: row.get(2)?,
            start: row.get(3)?,
            end: row.get(4)?,
            assignee_name: row.get(5)?,
            location: row.get(6)?,
            category: row.get(7)?,
            created_by: row.get(8)?,
            created_at: row.get(9)?,
        })
    }

    fn into_assignment(self) -> PersistenceResult<Assignment> {
        let invalid = |field: &str, value: &str| {
            PersistenceError::InvalidData(format!(
                "assignment {} has invalid {field} '{value}'",
                self.id
            ))
        };
        let kind: ResourceKind = self
            .kind
            .parse()
            .map_err(|_| invalid("kind", &self.kind))?;
        let start = parse_iso_timestamp(&self.start).ok_or_else(|| invalid("start", &self.start))?;
        let end = parse_iso_timestamp(&self.end).ok_or_else(|| invalid("end", &self.end))?;
        let created_at = DateTime::parse_from_rfc3339(&self.created_at)
            .map(|value| value.with_timezone(&Utc))
            .map_err(|_| invalid("created_at", &self.created_at))?;
        Ok(Assignment {
            id: self.id,
            kind,
            title: self.title,
            start,
            end,
            assignee_name: self.assignee_name,
            location: self.location,
            category: self.category,
            created_by: self.created_by,
            created_at,
        })
    }
}

const ASSIGNMENT_COLUMNS: &str =
    "id, kind, title, start, end_at, assignee_name, location, category, created_by, created_at";

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(path: P) -> PersistenceResult<Self> {
        let connection = Connection::open(path)?;
        Self::from_connection(connection)
    }

    pub fn in_memory() -> PersistenceResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(connection: Connection) -> PersistenceResult<Self> {
        Self::initialize_schema(&connection)?;
        Ok(Self {
            connection: Mutex::new(connection),
        })
    }

    fn initialize_schema(connection: &Connection) -> PersistenceResult<()> {
        let ddl = r#"
            CREATE TABLE IF NOT EXISTS assignments (
                id TEXT PRIMARY KEY,
                kind TEXT NOT NULL,
                title TEXT NOT NULL,
                start TEXT NOT NULL,
                end_at TEXT NOT NULL,
                assignee_name TEXT NOT NULL,
                location TEXT NOT NULL DEFAULT '',
                category TEXT NOT NULL DEFAULT '',
                created_by TEXT NOT NULL DEFAULT '',
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_assignments_scope
                ON assignments (kind, assignee_name, start);
            CREATE TABLE IF NOT EXISTS roster_members (
                name TEXT NOT NULL,
                course_name TEXT NOT NULL,
                effective_departure_date TEXT,
                PRIMARY KEY (name, course_name)
            );
            CREATE TABLE IF NOT EXISTS attendance (
                date TEXT PRIMARY KEY,
                record_json TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS vacations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                resource_name TEXT NOT NULL,
                start_date TEXT NOT NULL,
                end_date TEXT NOT NULL,
                reason TEXT NOT NULL
            );
        "#;
        connection.execute_batch(ddl)?;
        Ok(())
    }

    fn parse_date(value: &str) -> PersistenceResult<NaiveDate> {
        NaiveDate::parse_from_str(value, DATE_FORMAT)
            .map_err(|e| PersistenceError::InvalidData(format!("invalid date '{value}': {e}")))
    }
}

impl AssignmentStore for SqliteStore {
    fn query_assignments(&self, filter: &AssignmentFilter) -> PersistenceResult<Vec<Assignment>> {
        let mut clauses = Vec::new();
        let mut values: Vec<String> = Vec::new();
        if let Some(kind) = filter.kind {
            clauses.push("kind = ?");
            values.push(kind.as_str().to_string());
        }
        if let Some(assignee) = &filter.assignee {
            clauses.push("assignee_name = ?");
            values.push(assignee.clone());
        }
        if let Some(from) = &filter.start_from {
            clauses.push("start >= ?");
            values.push(from.clone());
        }
        if let Some(before) = &filter.start_before {
            clauses.push("start < ?");
            values.push(before.clone());
        }
        let mut sql = format!("SELECT {ASSIGNMENT_COLUMNS} FROM assignments");
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY start ASC, id ASC");

        let rows = {
            let conn = self.connection.lock();
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(values.iter()), AssignmentRow::from_row)?;
            rows.collect::<Result<Vec<_>, _>>()?
        };

        let mut assignments = Vec::with_capacity(rows.len());
        for row in rows {
            let id = row.id.clone();
            match row.into_assignment() {
                Ok(assignment) => assignments.push(assignment),
                Err(err) => warn!(assignment = %id, error = %err, "skipping unreadable assignment"),
            }
        }
        Ok(assignments)
    }

    fn get_assignment(&self, id: &str) -> PersistenceResult<Option<Assignment>> {
        let row = {
            let conn = self.connection.lock();
            conn.query_row(
                &format!("SELECT {ASSIGNMENT_COLUMNS} FROM assignments WHERE id = ?1"),
                params![id],
                AssignmentRow::from_row,
            )
            .optional()?
        };
        row.map(AssignmentRow::into_assignment).transpose()
    }

    fn create_assignment(&self, assignment: NewAssignment) -> PersistenceResult<AssignmentId> {
        validate_new_assignment(&assignment)?;
        let id = Uuid::new_v4().to_string();
        let conn = self.connection.lock();
        conn.execute(
            &format!(
                "INSERT INTO assignments ({ASSIGNMENT_COLUMNS}) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"
            ),
            params![
                id,
                assignment.kind.as_str(),
                assignment.title,
                iso_timestamp(assignment.start),
                iso_timestamp(assignment.end),
                assignment.assignee_name,
                assignment.location,
                assignment.category,
                assignment.created_by,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(id)
    }

    fn batch_delete_assignments(&self, ids: &[AssignmentId]) -> PersistenceResult<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let mut conn = self.connection.lock();
        let tx = conn.transaction()?;
        let mut removed = 0;
        {
            let mut stmt = tx.prepare("DELETE FROM assignments WHERE id = ?1")?;
            for id in ids {
                removed += stmt.execute(params![id])?;
            }
        }
        tx.commit()?;
        Ok(removed)
    }

    fn update_assignment(&self, id: &str, update: &AssignmentUpdate) -> PersistenceResult<()> {
        let mut assignment = self
            .get_assignment(id)?
            .ok_or_else(|| PersistenceError::NotFound(format!("assignment {id}")))?;
        assignment.apply_update(update);
        let conn = self.connection.lock();
        conn.execute(
            "UPDATE assignments SET title = ?1, start = ?2, end_at = ?3 WHERE id = ?4",
            params![
                assignment.title,
                iso_timestamp(assignment.start),
                iso_timestamp(assignment.end),
                id
            ],
        )?;
        Ok(())
    }
}

impl RosterStore for SqliteStore {
    fn list_members(&self, course_name: &str) -> PersistenceResult<Vec<RosterMember>> {
        let rows = {
            let conn = self.connection.lock();
            let mut stmt = conn.prepare(
                "SELECT name, course_name, effective_departure_date FROM roster_members \
                 WHERE course_name = ?1 ORDER BY name ASC",
            )?;
            let rows = stmt.query_map(params![course_name], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                ))
            })?;
            rows.collect::<Result<Vec<_>, _>>()?
        };
        rows.into_iter()
            .map(|(name, course_name, departure)| {
                Ok(RosterMember {
                    name,
                    course_name,
                    effective_departure_date: departure
                        .as_deref()
                        .map(Self::parse_date)
                        .transpose()?,
                })
            })
            .collect()
    }
}

impl RosterAdmin for SqliteStore {
    fn upsert_member(&self, member: &RosterMember) -> PersistenceResult<()> {
        validate_member(member)?;
        let conn = self.connection.lock();
        conn.execute(
            "INSERT INTO roster_members (name, course_name, effective_departure_date) \
             VALUES (?1, ?2, ?3) \
             ON CONFLICT(name, course_name) DO UPDATE SET \
             effective_departure_date = excluded.effective_departure_date",
            params![
                member.name,
                member.course_name,
                member
                    .effective_departure_date
                    .map(|d| d.format(DATE_FORMAT).to_string()),
            ],
        )?;
        Ok(())
    }

    fn remove_member(&self, name: &str, course_name: &str) -> PersistenceResult<bool> {
        let conn = self.connection.lock();
        let removed = conn.execute(
            "DELETE FROM roster_members WHERE name = ?1 AND course_name = ?2",
            params![name, course_name],
        )?;
        Ok(removed > 0)
    }

    fn all_members(&self) -> PersistenceResult<Vec<RosterMember>> {
        let courses: Vec<String> = {
            let conn = self.connection.lock();
            let mut stmt =
                conn.prepare("SELECT DISTINCT course_name FROM roster_members ORDER BY course_name")?;
            let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
            rows.collect::<Result<Vec<_>, _>>()?
        };
        let mut members = Vec::new();
        for course in courses {
            members.extend(self.list_members(&course)?);
        }
        Ok(members)
    }
}

impl AttendanceStore for SqliteStore {
    fn get_attendance(&self, date: NaiveDate) -> PersistenceResult<Option<AttendanceRecord>> {
        let json: Option<String> = {
            let conn = self.connection.lock();
            conn.query_row(
                "SELECT record_json FROM attendance WHERE date = ?1",
                params![date.format(DATE_FORMAT).to_string()],
                |row| row.get(0),
            )
            .optional()?
        };
        match json {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    fn put_attendance(&self, record: &AttendanceRecord) -> PersistenceResult<()> {
        let json = serde_json::to_string(record)?;
        let conn = self.connection.lock();
        conn.execute(
            "INSERT INTO attendance (date, record_json) VALUES (?1, ?2) \
             ON CONFLICT(date) DO UPDATE SET record_json = excluded.record_json",
            params![record.date.format(DATE_FORMAT).to_string(), json],
        )?;
        Ok(())
    }
}

impl VacationStore for SqliteStore {
    fn vacations_for(&self, resource_name: &str) -> PersistenceResult<Vec<VacationWindow>> {
        let rows = {
            let conn = self.connection.lock();
            let mut stmt = conn.prepare(
                "SELECT resource_name, start_date, end_date, reason FROM vacations \
                 WHERE resource_name = ?1 ORDER BY start_date ASC, id ASC",
            )?;
            let rows = stmt.query_map(params![resource_name], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })?;
            rows.collect::<Result<Vec<_>, _>>()?
        };
        rows.into_iter()
            .map(|(resource_name, start, end, reason)| {
                Ok(VacationWindow {
                    resource_name,
                    start_date: Self::parse_date(&start)?,
                    end_date: Self::parse_date(&end)?,
                    reason,
                })
            })
            .collect()
    }

    fn insert_vacation(&self, window: &VacationWindow) -> PersistenceResult<()> {
        let conn = self.connection.lock();
        conn.execute(
            "INSERT INTO vacations (resource_name, start_date, end_date, reason) \
             VALUES (?1, ?2, ?3, ?4)",
            params![
                window.resource_name,
                window.start_date.format(DATE_FORMAT).to_string(),
                window.end_date.format(DATE_FORMAT).to_string(),
                window.reason,
            ],
        )?;
        Ok(())
    }
}
