use tracing::info;

use crate::db::file_repo;
use crate::db::job_repo;
use crate::db::page_repo;
use crate::db::JobStatus;

use super::error::PipelineError;
use super::runner::Pipeline;

impl Pipeline {
    /// Completes the job once every file has been enumerated and none of
    /// its pages is pending or running.
    ///
    /// File and job `has_diffs` are recomputed from the page scores in the
    /// same transaction as the status write, and the status write never
    /// overrides a cancellation. Returns whether the job is now completed.
    pub fn try_complete_job(&self, job_id: &str) -> Result<bool, PipelineError> {
        let completed = self.db.with_transaction(|tx| {
            match job_repo::status_in(tx, job_id)? {
                Some(JobStatus::Running) | Some(JobStatus::Completed) => {}
                _ => return Ok(None),
            }
            if file_repo::any_without_pages_in(tx, job_id)?
                || page_repo::any_unfinished_in(tx, job_id)?
            {
                return Ok(None);
            }

            let has_diffs = file_repo::recompute_has_diffs_in(tx, job_id)?;
            job_repo::set_has_diffs_in(tx, job_id, has_diffs)?;
            if !job_repo::update_status_unless_cancelled_in(tx, job_id, JobStatus::Completed)? {
                return Ok(None);
            }
            Ok(Some(has_diffs))
        })?;

        match completed {
            Some(has_diffs) => {
                info!(job_id = %job_id, has_diffs, "Job completed");
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
