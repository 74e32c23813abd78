//! Page result repository: one row per (file, page index) comparison unit.
//!
//! Every status transition here is a compare-and-set: terminal writes only
//! apply while the row is still pending/running and still carries the task
//! handle the caller was dispatched with.

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::file_repo::JobFileRow;
use super::{timestamp, Database, DatabaseError, JobStatus, PageStatus};

/// A page result row from the database.
#[derive(Debug, Clone, PartialEq)]
pub struct PageResultRow {
    pub id: i64,
    pub job_file_id: String,
    pub page_index: u32,
    pub status: PageStatus,
    pub diff_score: Option<f64>,
    pub task_handle: Option<String>,
    pub incompatible_size: bool,
    pub missing_in_set_a: bool,
    pub missing_in_set_b: bool,
    pub overlay_svg_path: Option<String>,
    pub error_message: Option<String>,
    pub created_at: String,
    pub started_at: Option<String>,
    pub finished_at: Option<String>,
}

impl PageResultRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            job_file_id: row.get("job_file_id")?,
            page_index: row.get("page_index")?,
            status: row.get("status")?,
            diff_score: row.get("diff_score")?,
            task_handle: row.get("task_handle")?,
            incompatible_size: row.get("incompatible_size")?,
            missing_in_set_a: row.get("missing_in_set_a")?,
            missing_in_set_b: row.get("missing_in_set_b")?,
            overlay_svg_path: row.get("overlay_svg_path")?,
            error_message: row.get("error_message")?,
            created_at: row.get("created_at")?,
            started_at: row.get("started_at")?,
            finished_at: row.get("finished_at")?,
        })
    }

    pub fn is_missing(&self) -> bool {
        self.missing_in_set_a || self.missing_in_set_b
    }
}

/// A page result to be inserted by the enumerator.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPageResult {
    pub job_file_id: String,
    pub page_index: u32,
    pub status: PageStatus,
    pub missing_in_set_a: bool,
    pub missing_in_set_b: bool,
}

/// Terminal outcome written by the page comparer.
#[derive(Debug, Clone, PartialEq)]
pub enum PageOutcome {
    Done { diff_score: f64, overlay_svg_path: String },
    Missing,
    IncompatibleSize,
    Failed { message: String },
}

impl PageOutcome {
    pub fn status(&self) -> PageStatus {
        match self {
            PageOutcome::Done { .. } => PageStatus::Done,
            PageOutcome::Missing => PageStatus::Missing,
            PageOutcome::IncompatibleSize => PageStatus::IncompatibleSize,
            PageOutcome::Failed { .. } => PageStatus::Failed,
        }
    }
}

/// Everything a worker needs to process one page.
#[derive(Debug, Clone)]
pub struct PageContext {
    pub page: PageResultRow,
    pub file: JobFileRow,
    pub job_id: String,
    pub job_status: JobStatus,
}

const UNFINISHED: &str = "('pending', 'running')";

/// Deletes all page results of a job and inserts `pages` in one transaction.
pub fn replace_for_job(
    db: &Database,
    job_id: &str,
    pages: &[NewPageResult],
) -> Result<usize, DatabaseError> {
    db.with_transaction(|tx| {
        tx.execute(
            "DELETE FROM job_page_results
             WHERE job_file_id IN (SELECT id FROM job_files WHERE job_id = ?1)",
            params![job_id],
        )?;

        let mut stmt = tx.prepare(
            "INSERT INTO job_page_results (job_file_id, page_index, status, missing_in_set_a,
             missing_in_set_b, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )?;
        let created_at = timestamp();
        for page in pages {
            stmt.execute(params![
                page.job_file_id,
                page.page_index,
                page.status,
                page.missing_in_set_a,
                page.missing_in_set_b,
                created_at,
            ])?;
        }
        Ok(pages.len())
    })
}

pub fn find_by_id(db: &Database, id: i64) -> Result<Option<PageResultRow>, DatabaseError> {
    db.with_conn(|conn| {
        let row = conn
            .query_row(
                "SELECT * FROM job_page_results WHERE id = ?1",
                params![id],
                PageResultRow::from_row,
            )
            .optional()?;
        Ok(row)
    })
}

/// Loads a page together with its file and the owning job's status.
pub fn load_context(db: &Database, id: i64) -> Result<Option<PageContext>, DatabaseError> {
    db.with_conn(|conn| {
        let page = match conn
            .query_row(
                "SELECT * FROM job_page_results WHERE id = ?1",
                params![id],
                PageResultRow::from_row,
            )
            .optional()?
        {
            Some(page) => page,
            None => return Ok(None),
        };

        let file = super::file_repo::find_by_id_in(conn, &page.job_file_id)?;
        let Some(file) = file else {
            return Ok(None);
        };
        let Some(job_status) = super::job_repo::status_in(conn, &file.job_id)? else {
            return Ok(None);
        };

        Ok(Some(PageContext {
            job_id: file.job_id.clone(),
            page,
            file,
            job_status,
        }))
    })
}

/// Lists the pages of a file ordered by page index.
pub fn list_for_file(db: &Database, file_id: &str) -> Result<Vec<PageResultRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT * FROM job_page_results WHERE job_file_id = ?1 ORDER BY page_index",
        )?;
        let rows = stmt
            .query_map(params![file_id], PageResultRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Lists all pages of a job in creation order.
pub fn list_for_job(db: &Database, job_id: &str) -> Result<Vec<PageResultRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT p.* FROM job_page_results p
             JOIN job_files f ON p.job_file_id = f.id
             WHERE f.job_id = ?1
             ORDER BY p.created_at, p.id",
        )?;
        let rows = stmt
            .query_map(params![job_id], PageResultRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Number of pending/running pages of a job that already carry a task handle.
pub(crate) fn count_in_flight_in(conn: &Connection, job_id: &str) -> Result<u32, DatabaseError> {
    let count = conn.query_row(
        &format!(
            "SELECT COUNT(*) FROM job_page_results p
             JOIN job_files f ON p.job_file_id = f.id
             WHERE f.job_id = ?1 AND p.status IN {} AND p.task_handle IS NOT NULL",
            UNFINISHED
        ),
        params![job_id],
        |r| r.get(0),
    )?;
    Ok(count)
}

/// IDs of up to `limit` pending pages without a handle, oldest first.
pub(crate) fn select_dispatchable_in(
    conn: &Connection,
    job_id: &str,
    limit: u32,
) -> Result<Vec<i64>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT p.id FROM job_page_results p
         JOIN job_files f ON p.job_file_id = f.id
         WHERE f.job_id = ?1 AND p.status = 'pending' AND p.task_handle IS NULL
         ORDER BY p.created_at, p.id
         LIMIT ?2",
    )?;
    let ids = stmt
        .query_map(params![job_id, limit], |r| r.get(0))?
        .collect::<Result<Vec<i64>, _>>()?;
    Ok(ids)
}

/// Assigns `handle` to a pending page only if it has none yet.
/// Returns whether this call won the claim.
pub(crate) fn claim_in(conn: &Connection, id: i64, handle: &str) -> Result<bool, DatabaseError> {
    let changed = conn.execute(
        "UPDATE job_page_results SET task_handle = ?2
         WHERE id = ?1 AND status = 'pending' AND task_handle IS NULL",
        params![id, handle],
    )?;
    Ok(changed == 1)
}

/// Clears a claim, but only if it is still the one identified by `handle`.
pub fn release_claim(db: &Database, id: i64, handle: &str) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE job_page_results SET task_handle = NULL
             WHERE id = ?1 AND status = 'pending' AND task_handle = ?2",
            params![id, handle],
        )?;
        Ok(changed == 1)
    })
}

/// Moves a page to `running` if it is unfinished and still owned by `handle`.
pub fn mark_running(db: &Database, id: i64, handle: Option<&str>) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            &format!(
                "UPDATE job_page_results SET status = 'running', started_at = ?3
                 WHERE id = ?1 AND status IN {} AND task_handle IS ?2",
                UNFINISHED
            ),
            params![id, handle, timestamp()],
        )?;
        Ok(changed == 1)
    })
}

/// Writes a terminal outcome if the page is unfinished and still owned by
/// `handle`. Returns whether the write applied.
pub fn finalize(
    db: &Database,
    id: i64,
    handle: Option<&str>,
    outcome: &PageOutcome,
) -> Result<bool, DatabaseError> {
    let (diff_score, overlay, incompatible, error) = match outcome {
        PageOutcome::Done {
            diff_score,
            overlay_svg_path,
        } => (Some(*diff_score), Some(overlay_svg_path.as_str()), false, None),
        PageOutcome::Missing => (None, None, false, None),
        PageOutcome::IncompatibleSize => (None, None, true, None),
        PageOutcome::Failed { message } => (None, None, false, Some(message.as_str())),
    };

    db.with_conn(|conn| {
        let changed = conn.execute(
            &format!(
                "UPDATE job_page_results
                 SET status = ?3, diff_score = ?4, overlay_svg_path = ?5,
                     incompatible_size = ?6, error_message = ?7, finished_at = ?8
                 WHERE id = ?1 AND status IN {} AND task_handle IS ?2",
                UNFINISHED
            ),
            params![
                id,
                handle,
                outcome.status(),
                diff_score,
                overlay,
                incompatible,
                error,
                timestamp(),
            ],
        )?;
        Ok(changed == 1)
    })
}

/// Whether any page of the job is still pending or running.
pub(crate) fn any_unfinished_in(conn: &Connection, job_id: &str) -> Result<bool, DatabaseError> {
    let any = conn.query_row(
        &format!(
            "SELECT EXISTS (
                 SELECT 1 FROM job_page_results p
                 JOIN job_files f ON p.job_file_id = f.id
                 WHERE f.job_id = ?1 AND p.status IN {}
             )",
            UNFINISHED
        ),
        params![job_id],
        |r| r.get(0),
    )?;
    Ok(any)
}

/// Page counts grouped by status for one job.
pub fn count_by_status(
    db: &Database,
    job_id: &str,
) -> Result<Vec<(PageStatus, u64)>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT p.status, COUNT(*) FROM job_page_results p
             JOIN job_files f ON p.job_file_id = f.id
             WHERE f.job_id = ?1
             GROUP BY p.status",
        )?;
        let counts = stmt
            .query_map(params![job_id], |r| Ok((r.get(0)?, r.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(counts)
    })
}

/// Fails every unfinished page of a job with the message "cancelled".
/// Returns the task handles those pages carried.
pub(crate) fn cancel_unfinished_in(
    conn: &Connection,
    job_id: &str,
) -> Result<Vec<String>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT p.task_handle FROM job_page_results p
         JOIN job_files f ON p.job_file_id = f.id
         WHERE f.job_id = ?1 AND p.status IN {} AND p.task_handle IS NOT NULL",
        UNFINISHED
    ))?;
    let handles = stmt
        .query_map(params![job_id], |r| r.get(0))?
        .collect::<Result<Vec<String>, _>>()?;

    conn.execute(
        &format!(
            "UPDATE job_page_results
             SET status = 'failed', error_message = 'cancelled', finished_at = ?2
             WHERE status IN {}
               AND job_file_id IN (SELECT id FROM job_files WHERE job_id = ?1)",
            UNFINISHED
        ),
        params![job_id, timestamp()],
    )?;

    Ok(handles)
}

/// Result of resetting a job's pages for another dispatch round.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RetryReset {
    /// Pages that were pending or failed before the reset.
    pub selected: usize,
    /// Handles cleared from the selected pages.
    pub cleared_handles: Vec<String>,
}

/// Resets failed pages to pending and clears handles on all pending/failed
/// pages of a job.
pub(crate) fn reset_for_retry_in(
    conn: &Connection,
    job_id: &str,
) -> Result<RetryReset, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT p.task_handle FROM job_page_results p
         JOIN job_files f ON p.job_file_id = f.id
         WHERE f.job_id = ?1 AND p.status IN ('pending', 'failed')",
    )?;
    let handles = stmt
        .query_map(params![job_id], |r| r.get::<_, Option<String>>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    if handles.is_empty() {
        return Ok(RetryReset::default());
    }

    conn.execute(
        "UPDATE job_page_results
         SET status = 'pending', diff_score = NULL, overlay_svg_path = NULL,
             error_message = NULL, incompatible_size = 0, task_handle = NULL,
             started_at = NULL, finished_at = NULL
         WHERE status = 'failed'
           AND job_file_id IN (SELECT id FROM job_files WHERE job_id = ?1)",
        params![job_id],
    )?;
    conn.execute(
        "UPDATE job_page_results SET task_handle = NULL
         WHERE status = 'pending'
           AND job_file_id IN (SELECT id FROM job_files WHERE job_id = ?1)",
        params![job_id],
    )?;

    Ok(RetryReset {
        selected: handles.len(),
        cleared_handles: handles.into_iter().flatten().collect(),
    })
}

/// Fails pages that have been `running` since before `started_before`.
/// Returns the IDs of the affected jobs.
pub fn fail_stale_running(
    db: &Database,
    started_before: &str,
    message: &str,
) -> Result<Vec<String>, DatabaseError> {
    db.with_transaction(|tx| {
        let mut stmt = tx.prepare(
            "SELECT DISTINCT f.job_id FROM job_page_results p
             JOIN job_files f ON p.job_file_id = f.id
             WHERE p.status = 'running' AND p.started_at < ?1",
        )?;
        let job_ids = stmt
            .query_map(params![started_before], |r| r.get(0))?
            .collect::<Result<Vec<String>, _>>()?;

        tx.execute(
            "UPDATE job_page_results
             SET status = 'failed', error_message = ?2, finished_at = ?3
             WHERE status = 'running' AND started_at < ?1",
            params![started_before, message, timestamp()],
        )?;
        Ok(job_ids)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::file_repo;
    use crate::db::job_repo::{self, JobRow};
    use crate::pairing::pair_paths;

    fn setup(paths: &[&str]) -> (Database, JobRow, Vec<JobFileRow>) {
        let db = Database::open_in_memory().unwrap();
        let job = JobRow::new("alice");
        job_repo::insert(&db, &job).unwrap();
        let files: Vec<_> = pair_paths(paths.iter().copied(), paths.iter().copied())
            .iter()
            .map(|p| JobFileRow::from_pairing(&job.id, p))
            .collect();
        file_repo::insert_many(&db, &files).unwrap();
        (db, job, files)
    }

    fn pending(file: &JobFileRow, index: u32) -> NewPageResult {
        NewPageResult {
            job_file_id: file.id.clone(),
            page_index: index,
            status: PageStatus::Pending,
            missing_in_set_a: false,
            missing_in_set_b: false,
        }
    }

    #[test]
    fn test_replace_for_job_is_idempotent() {
        let (db, job, files) = setup(&["a.pdf"]);
        let pages = vec![pending(&files[0], 0), pending(&files[0], 1)];

        replace_for_job(&db, &job.id, &pages).unwrap();
        replace_for_job(&db, &job.id, &pages).unwrap();

        assert_eq!(list_for_job(&db, &job.id).unwrap().len(), 2);
    }

    #[test]
    fn test_claim_only_once() {
        let (db, job, files) = setup(&["a.pdf"]);
        replace_for_job(&db, &job.id, &[pending(&files[0], 0)]).unwrap();
        let id = list_for_job(&db, &job.id).unwrap()[0].id;

        assert!(db.with_conn(|c| claim_in(c, id, "h1")).unwrap());
        assert!(!db.with_conn(|c| claim_in(c, id, "h2")).unwrap());
        assert_eq!(
            find_by_id(&db, id).unwrap().unwrap().task_handle.as_deref(),
            Some("h1")
        );
        assert_eq!(db.with_conn(|c| count_in_flight_in(c, &job.id)).unwrap(), 1);
    }

    #[test]
    fn test_release_claim_requires_matching_handle() {
        let (db, job, files) = setup(&["a.pdf"]);
        replace_for_job(&db, &job.id, &[pending(&files[0], 0)]).unwrap();
        let id = list_for_job(&db, &job.id).unwrap()[0].id;
        db.with_conn(|c| claim_in(c, id, "h1")).unwrap();

        assert!(!release_claim(&db, id, "other").unwrap());
        assert!(release_claim(&db, id, "h1").unwrap());
        assert!(find_by_id(&db, id).unwrap().unwrap().task_handle.is_none());
    }

    #[test]
    fn test_select_dispatchable_in_creation_order() {
        let (db, job, files) = setup(&["a.pdf", "b.pdf"]);
        let pages = vec![
            pending(&files[0], 0),
            pending(&files[0], 1),
            pending(&files[1], 0),
        ];
        replace_for_job(&db, &job.id, &pages).unwrap();
        let all = list_for_job(&db, &job.id).unwrap();

        let ids = db.with_conn(|c| select_dispatchable_in(c, &job.id, 2)).unwrap();
        assert_eq!(ids, vec![all[0].id, all[1].id]);
    }

    #[test]
    fn test_finalize_is_compare_and_set() {
        let (db, job, files) = setup(&["a.pdf"]);
        replace_for_job(&db, &job.id, &[pending(&files[0], 0)]).unwrap();
        let id = list_for_job(&db, &job.id).unwrap()[0].id;
        db.with_conn(|c| claim_in(c, id, "h1")).unwrap();

        // A stale handle cannot write.
        assert!(!finalize(&db, id, Some("h0"), &PageOutcome::Missing).unwrap());

        assert!(mark_running(&db, id, Some("h1")).unwrap());
        let done = PageOutcome::Done {
            diff_score: 1.5,
            overlay_svg_path: "/o.svg".to_string(),
        };
        assert!(finalize(&db, id, Some("h1"), &done).unwrap());

        // Terminal rows do not move again.
        let failed = PageOutcome::Failed {
            message: "late".to_string(),
        };
        assert!(!finalize(&db, id, Some("h1"), &failed).unwrap());

        let row = find_by_id(&db, id).unwrap().unwrap();
        assert_eq!(row.status, PageStatus::Done);
        assert_eq!(row.diff_score, Some(1.5));
        assert!(row.started_at.is_some());
        assert!(row.finished_at.is_some());
    }

    #[test]
    fn test_cancel_unfinished_returns_handles() {
        let (db, job, files) = setup(&["a.pdf"]);
        replace_for_job(
            &db,
            &job.id,
            &[pending(&files[0], 0), pending(&files[0], 1), pending(&files[0], 2)],
        )
        .unwrap();
        let all = list_for_job(&db, &job.id).unwrap();
        db.with_conn(|c| claim_in(c, all[0].id, "h0")).unwrap();
        db.with_conn(|c| claim_in(c, all[2].id, "h2")).unwrap();
        finalize(&db, all[2].id, Some("h2"), &PageOutcome::Missing).unwrap();

        let handles = db.with_conn(|c| cancel_unfinished_in(c, &job.id)).unwrap();
        assert_eq!(handles, vec!["h0".to_string()]);

        let rows = list_for_job(&db, &job.id).unwrap();
        assert_eq!(rows[0].status, PageStatus::Failed);
        assert_eq!(rows[0].error_message.as_deref(), Some("cancelled"));
        assert_eq!(rows[1].status, PageStatus::Failed);
        assert_eq!(rows[2].status, PageStatus::Missing);
        assert!(!db.with_conn(|c| any_unfinished_in(c, &job.id)).unwrap());
    }

    #[test]
    fn test_reset_for_retry() {
        let (db, job, files) = setup(&["a.pdf"]);
        replace_for_job(&db, &job.id, &[pending(&files[0], 0), pending(&files[0], 1)]).unwrap();
        let all = list_for_job(&db, &job.id).unwrap();
        db.with_conn(|c| claim_in(c, all[0].id, "h0")).unwrap();
        finalize(
            &db,
            all[0].id,
            Some("h0"),
            &PageOutcome::Failed {
                message: "boom".to_string(),
            },
        )
        .unwrap();

        let reset = db.with_conn(|c| reset_for_retry_in(c, &job.id)).unwrap();
        assert_eq!(reset.selected, 2);
        assert_eq!(reset.cleared_handles, vec!["h0".to_string()]);

        for row in list_for_job(&db, &job.id).unwrap() {
            assert_eq!(row.status, PageStatus::Pending);
            assert!(row.task_handle.is_none());
            assert!(row.error_message.is_none());
        }
    }

    #[test]
    fn test_count_by_status() {
        let (db, job, files) = setup(&["a.pdf"]);
        let mut missing = pending(&files[0], 1);
        missing.status = PageStatus::Missing;
        missing.missing_in_set_b = true;
        replace_for_job(&db, &job.id, &[pending(&files[0], 0), missing]).unwrap();

        let mut counts = count_by_status(&db, &job.id).unwrap();
        counts.sort_by_key(|(s, _)| s.as_str());
        assert_eq!(
            counts,
            vec![(PageStatus::Missing, 1), (PageStatus::Pending, 1)]
        );
    }
}
