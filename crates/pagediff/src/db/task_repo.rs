//! Durable task queue table.
//!
//! A claimed task whose lease has expired is handed out again, so delivery
//! is at-least-once.

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{timestamp, Database, DatabaseError, TaskStatus};

#[derive(Debug, Clone, PartialEq)]
pub struct TaskRow {
    pub id: String,
    pub name: String,
    pub payload: String,
    pub status: TaskStatus,
    pub attempts: u32,
    pub worker: Option<String>,
    pub last_error: Option<String>,
    pub created_at: String,
    pub claimed_at: Option<String>,
    pub finished_at: Option<String>,
}

impl TaskRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            payload: row.get("payload")?,
            status: row.get("status")?,
            attempts: row.get("attempts")?,
            worker: row.get("worker")?,
            last_error: row.get("last_error")?,
            created_at: row.get("created_at")?,
            claimed_at: row.get("claimed_at")?,
            finished_at: row.get("finished_at")?,
        })
    }
}

pub fn insert(db: &Database, id: &str, name: &str, payload: &str) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO tasks (id, name, payload, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![id, name, payload, TaskStatus::Queued, timestamp()],
        )?;
        Ok(())
    })
}

pub fn find_by_id(db: &Database, id: &str) -> Result<Option<TaskRow>, DatabaseError> {
    db.with_conn(|conn| find_by_id_in(conn, id))
}

fn find_by_id_in(conn: &Connection, id: &str) -> Result<Option<TaskRow>, DatabaseError> {
    let row = conn
        .query_row("SELECT * FROM tasks WHERE id = ?1", params![id], TaskRow::from_row)
        .optional()?;
    Ok(row)
}

/// Claims the oldest deliverable task for `worker`.
///
/// Deliverable means queued, or claimed with `claimed_at` older than
/// `lease_expired_before`.
pub fn claim_next(
    db: &Database,
    worker: &str,
    lease_expired_before: &str,
) -> Result<Option<TaskRow>, DatabaseError> {
    db.with_transaction(|tx| {
        let id: Option<String> = tx
            .query_row(
                "SELECT id FROM tasks
                 WHERE status = 'queued'
                    OR (status = 'claimed' AND claimed_at < ?1)
                 ORDER BY created_at, rowid
                 LIMIT 1",
                params![lease_expired_before],
                |r| r.get(0),
            )
            .optional()?;

        let Some(id) = id else {
            return Ok(None);
        };

        tx.execute(
            "UPDATE tasks SET status = 'claimed', worker = ?2, claimed_at = ?3,
             attempts = attempts + 1
             WHERE id = ?1",
            params![id, worker, timestamp()],
        )?;

        find_by_id_in(tx, &id)
    })
}

/// Marks a claimed task done. Returns whether the row moved.
pub fn complete(db: &Database, id: &str) -> Result<bool, DatabaseError> {
    finish(db, id, TaskStatus::Done, None)
}

/// Marks a claimed task failed with an error message.
pub fn fail(db: &Database, id: &str, error: &str) -> Result<bool, DatabaseError> {
    finish(db, id, TaskStatus::Failed, Some(error))
}

fn finish(
    db: &Database,
    id: &str,
    status: TaskStatus,
    error: Option<&str>,
) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE tasks SET status = ?2, last_error = ?3, finished_at = ?4
             WHERE id = ?1 AND status = 'claimed'",
            params![id, status, error, timestamp()],
        )?;
        Ok(changed == 1)
    })
}

/// Withdraws a task that has not been picked up yet.
/// Claimed tasks are left alone.
pub fn revoke(db: &Database, id: &str) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE tasks SET status = 'revoked', finished_at = ?2
             WHERE id = ?1 AND status = 'queued'",
            params![id, timestamp()],
        )?;
        Ok(changed == 1)
    })
}

/// Deletes done, failed and revoked tasks that finished before
/// `finished_before`. Returns how many rows went.
pub fn prune_finished(db: &Database, finished_before: &str) -> Result<usize, DatabaseError> {
    db.with_conn(|conn| {
        let deleted = conn.execute(
            "DELETE FROM tasks
             WHERE status IN ('done', 'failed', 'revoked') AND finished_at < ?1",
            params![finished_before],
        )?;
        Ok(deleted)
    })
}

pub fn count_with_status(db: &Database, status: TaskStatus) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count = conn.query_row(
            "SELECT COUNT(*) FROM tasks WHERE status = ?1",
            params![status],
            |r| r.get(0),
        )?;
        Ok(count)
    })
}
