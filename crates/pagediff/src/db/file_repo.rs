//! Job file repository: one row per paired relative path.

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{timestamp, Database, DatabaseError, TextStatus};
use crate::pairing::FilePairing;

/// A job file row from the database.
#[derive(Debug, Clone, PartialEq)]
pub struct JobFileRow {
    pub id: String,
    pub job_id: String,
    pub relative_path: String,
    pub set_a_path: Option<String>,
    pub set_b_path: Option<String>,
    pub missing_in_set_a: bool,
    pub missing_in_set_b: bool,
    pub has_diffs: bool,
    pub text_status: TextStatus,
    pub text_set_a_path: Option<String>,
    pub text_set_b_path: Option<String>,
    pub text_error: Option<String>,
    pub created_at: String,
}

impl JobFileRow {
    /// Builds a new file row for a pairing record.
    pub fn from_pairing(job_id: &str, pairing: &FilePairing) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            job_id: job_id.to_string(),
            relative_path: pairing.relative_path.clone(),
            set_a_path: pairing.set_a_path().map(str::to_string),
            set_b_path: pairing.set_b_path().map(str::to_string),
            missing_in_set_a: !pairing.present_in_a,
            missing_in_set_b: !pairing.present_in_b,
            has_diffs: false,
            text_status: TextStatus::Pending,
            text_set_a_path: None,
            text_set_b_path: None,
            text_error: None,
            created_at: timestamp(),
        }
    }

    pub fn is_missing(&self) -> bool {
        self.missing_in_set_a || self.missing_in_set_b
    }

    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            job_id: row.get("job_id")?,
            relative_path: row.get("relative_path")?,
            set_a_path: row.get("set_a_path")?,
            set_b_path: row.get("set_b_path")?,
            missing_in_set_a: row.get("missing_in_set_a")?,
            missing_in_set_b: row.get("missing_in_set_b")?,
            has_diffs: row.get("has_diffs")?,
            text_status: row.get("text_status")?,
            text_set_a_path: row.get("text_set_a_path")?,
            text_set_b_path: row.get("text_set_b_path")?,
            text_error: row.get("text_error")?,
            created_at: row.get("created_at")?,
        })
    }
}

pub(crate) fn insert_many_in(conn: &Connection, files: &[JobFileRow]) -> Result<(), DatabaseError> {
    let mut stmt = conn.prepare(
        "INSERT INTO job_files (id, job_id, relative_path, set_a_path, set_b_path,
         missing_in_set_a, missing_in_set_b, has_diffs, text_status, text_set_a_path,
         text_set_b_path, text_error, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
    )?;
    for file in files {
        stmt.execute(params![
            file.id,
            file.job_id,
            file.relative_path,
            file.set_a_path,
            file.set_b_path,
            file.missing_in_set_a,
            file.missing_in_set_b,
            file.has_diffs,
            file.text_status,
            file.text_set_a_path,
            file.text_set_b_path,
            file.text_error,
            file.created_at,
        ])?;
    }
    Ok(())
}

/// Inserts all rows in one transaction.
pub fn insert_many(db: &Database, files: &[JobFileRow]) -> Result<(), DatabaseError> {
    db.with_transaction(|tx| insert_many_in(tx, files))
}

/// Deletes every file of a job. Page results go with them (cascade).
pub(crate) fn delete_for_job_in(conn: &Connection, job_id: &str) -> Result<usize, DatabaseError> {
    Ok(conn.execute("DELETE FROM job_files WHERE job_id = ?1", params![job_id])?)
}

/// Lists the files of a job ordered by relative path.
pub fn list_for_job(db: &Database, job_id: &str) -> Result<Vec<JobFileRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt =
            conn.prepare("SELECT * FROM job_files WHERE job_id = ?1 ORDER BY relative_path")?;
        let rows = stmt
            .query_map(params![job_id], JobFileRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

pub fn find_by_id(db: &Database, id: &str) -> Result<Option<JobFileRow>, DatabaseError> {
    db.with_conn(|conn| find_by_id_in(conn, id))
}

pub(crate) fn find_by_id_in(
    conn: &Connection,
    id: &str,
) -> Result<Option<JobFileRow>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT * FROM job_files WHERE id = ?1",
            params![id],
            JobFileRow::from_row,
        )
        .optional()?;
    Ok(row)
}

/// Recomputes `has_diffs` for every file of a job from its page scores.
/// Returns whether any file of the job has diffs.
pub(crate) fn recompute_has_diffs_in(
    conn: &Connection,
    job_id: &str,
) -> Result<bool, DatabaseError> {
    conn.execute(
        "UPDATE job_files SET has_diffs = EXISTS (
             SELECT 1 FROM job_page_results p
             WHERE p.job_file_id = job_files.id
               AND p.diff_score IS NOT NULL AND p.diff_score > 0
         )
         WHERE job_id = ?1",
        params![job_id],
    )?;
    let any: bool = conn.query_row(
        "SELECT EXISTS (SELECT 1 FROM job_files WHERE job_id = ?1 AND has_diffs = 1)",
        params![job_id],
        |r| r.get(0),
    )?;
    Ok(any)
}

/// Whether some file of the job has no page results yet, i.e. the job has
/// not been enumerated since its files were (re)created.
pub(crate) fn any_without_pages_in(conn: &Connection, job_id: &str) -> Result<bool, DatabaseError> {
    let any = conn.query_row(
        "SELECT EXISTS (
             SELECT 1 FROM job_files f
             WHERE f.job_id = ?1
               AND NOT EXISTS (SELECT 1 FROM job_page_results p WHERE p.job_file_id = f.id)
         )",
        params![job_id],
        |r| r.get(0),
    )?;
    Ok(any)
}

pub fn any_without_pages(db: &Database, job_id: &str) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| any_without_pages_in(conn, job_id))
}

/// Sets the text status and error, leaving text paths untouched.
pub fn set_text_status(
    db: &Database,
    id: &str,
    status: TextStatus,
    error: Option<&str>,
) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE job_files SET text_status = ?2, text_error = ?3 WHERE id = ?1",
            params![id, status, error],
        )?;
        Ok(())
    })
}

/// Records the terminal outcome of a text extraction.
pub fn finish_text(
    db: &Database,
    id: &str,
    status: TextStatus,
    text_set_a_path: Option<&str>,
    text_set_b_path: Option<&str>,
    error: Option<&str>,
) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE job_files SET text_status = ?2, text_set_a_path = ?3, text_set_b_path = ?4,
             text_error = ?5 WHERE id = ?1",
            params![id, status, text_set_a_path, text_set_b_path, error],
        )?;
        Ok(())
    })
}
