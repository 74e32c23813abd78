//! Job repository: operations on the `jobs` table.

use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{timestamp, Database, DatabaseError, JobStatus};

/// A job row from the database.
#[derive(Debug, Clone, PartialEq)]
pub struct JobRow {
    pub id: String,
    pub owner: String,
    pub status: JobStatus,
    pub set_a_label: Option<String>,
    pub set_b_label: Option<String>,
    pub has_diffs: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl JobRow {
    /// Builds a fresh `created` job with a new UUID.
    pub fn new(owner: &str) -> Self {
        let now = timestamp();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            owner: owner.to_string(),
            status: JobStatus::Created,
            set_a_label: None,
            set_b_label: None,
            has_diffs: false,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            owner: row.get("owner")?,
            status: row.get("status")?,
            set_a_label: row.get("set_a_label")?,
            set_b_label: row.get("set_b_label")?,
            has_diffs: row.get("has_diffs")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    /// Human-facing identifier: `<YYYYMMDD-HHMM>-<labelA>_<labelB>`.
    pub fn display_id(&self) -> String {
        let ts = DateTime::parse_from_rfc3339(&self.created_at)
            .map(|dt| dt.with_timezone(&Utc).format("%Y%m%d-%H%M").to_string())
            .unwrap_or_else(|_| "00000000-0000".to_string());
        let set_a = sanitize_label(self.set_a_label.as_deref().unwrap_or(""), "setA");
        let set_b = sanitize_label(self.set_b_label.as_deref().unwrap_or(""), "setB");
        format!("{}-{}_{}", ts, set_a, set_b)
    }
}

fn sanitize_label(label: &str, fallback: &str) -> String {
    static UNSAFE: OnceLock<Regex> = OnceLock::new();
    let re = UNSAFE.get_or_init(|| Regex::new(r"[^A-Za-z0-9_-]+").expect("valid label regex"));

    let cleaned = re.replace_all(label.trim(), "-");
    let cleaned = cleaned.trim_matches('-');
    if cleaned.is_empty() {
        fallback.to_string()
    } else {
        cleaned.to_string()
    }
}

/// Inserts a new job row.
pub fn insert(db: &Database, job: &JobRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO jobs (id, owner, status, set_a_label, set_b_label, has_diffs,
             created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                job.id,
                job.owner,
                job.status,
                job.set_a_label,
                job.set_b_label,
                job.has_diffs,
                job.created_at,
                job.updated_at,
            ],
        )?;
        Ok(())
    })
}

/// Finds a job by its ID.
pub fn find_by_id(db: &Database, id: &str) -> Result<Option<JobRow>, DatabaseError> {
    db.with_conn(|conn| find_by_id_in(conn, id))
}

pub(crate) fn find_by_id_in(conn: &Connection, id: &str) -> Result<Option<JobRow>, DatabaseError> {
    let row = conn
        .query_row("SELECT * FROM jobs WHERE id = ?1", params![id], JobRow::from_row)
        .optional()?;
    Ok(row)
}

/// Reads only the status column.
pub(crate) fn status_in(conn: &Connection, id: &str) -> Result<Option<JobStatus>, DatabaseError> {
    let status = conn
        .query_row("SELECT status FROM jobs WHERE id = ?1", params![id], |r| {
            r.get(0)
        })
        .optional()?;
    Ok(status)
}

/// Lists all jobs of an owner, newest first.
pub fn list_for_owner(db: &Database, owner: &str) -> Result<Vec<JobRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt =
            conn.prepare("SELECT * FROM jobs WHERE owner = ?1 ORDER BY created_at DESC")?;
        let rows = stmt
            .query_map(params![owner], JobRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Lists the IDs of all jobs in the given status.
pub fn list_ids_with_status(db: &Database, status: JobStatus) -> Result<Vec<String>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT id FROM jobs WHERE status = ?1 ORDER BY created_at")?;
        let ids = stmt
            .query_map(params![status], |r| r.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(ids)
    })
}

/// Unconditionally sets the status. Returns whether a row was updated.
pub fn update_status(db: &Database, id: &str, status: JobStatus) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| update_status_in(conn, id, status))
}

pub(crate) fn update_status_in(
    conn: &Connection,
    id: &str,
    status: JobStatus,
) -> Result<bool, DatabaseError> {
    let changed = conn.execute(
        "UPDATE jobs SET status = ?2, updated_at = ?3 WHERE id = ?1",
        params![id, status, timestamp()],
    )?;
    Ok(changed == 1)
}

/// Sets the status unless the job is currently `cancelled`.
/// Returns whether a row was updated.
pub(crate) fn update_status_unless_cancelled_in(
    conn: &Connection,
    id: &str,
    status: JobStatus,
) -> Result<bool, DatabaseError> {
    let changed = conn.execute(
        "UPDATE jobs SET status = ?2, updated_at = ?3 WHERE id = ?1 AND status != ?4",
        params![id, status, timestamp(), JobStatus::Cancelled],
    )?;
    Ok(changed == 1)
}

pub(crate) fn set_has_diffs_in(
    conn: &Connection,
    id: &str,
    has_diffs: bool,
) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE jobs SET has_diffs = ?2, updated_at = ?3 WHERE id = ?1",
        params![id, has_diffs, timestamp()],
    )?;
    Ok(())
}

/// Updates the two set labels.
pub fn set_labels(
    db: &Database,
    id: &str,
    set_a_label: Option<&str>,
    set_b_label: Option<&str>,
) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE jobs SET set_a_label = ?2, set_b_label = ?3, updated_at = ?4 WHERE id = ?1",
            params![id, set_a_label, set_b_label, timestamp()],
        )?;
        Ok(changed == 1)
    })
}
