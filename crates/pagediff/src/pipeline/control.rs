use tracing::{debug, info, info_span, warn};

use crate::db::job_repo;
use crate::db::page_repo;
use crate::db::{timestamp_secs_ago, JobStatus};
use crate::queue::TaskHandle;

use super::error::PipelineError;
use super::runner::Pipeline;

const STALE_MESSAGE: &str = "stale: worker lease expired";

enum RetryDecision {
    NotFound,
    Cancelled,
    Nothing(JobStatus),
    Reset(Vec<String>),
}

impl Pipeline {
    /// Cancels a job and fails all of its unfinished pages.
    ///
    /// Task revocation is best-effort; a page task that is already running
    /// finds its page terminal and discards its result.
    pub fn cancel_job(&self, job_id: &str) -> Result<JobStatus, PipelineError> {
        let _span = info_span!("pipeline.cancel_job", job_id = %job_id).entered();

        let handles = self.db.with_transaction(|tx| {
            if job_repo::status_in(tx, job_id)?.is_none() {
                return Ok(None);
            }
            job_repo::update_status_in(tx, job_id, JobStatus::Cancelled)?;
            Ok(Some(page_repo::cancel_unfinished_in(tx, job_id)?))
        })?;
        let Some(handles) = handles else {
            return Err(PipelineError::JobNotFound(job_id.to_string()));
        };

        let revoked = self.revoke_all(handles);
        info!(revoked, "Cancelled job");
        Ok(JobStatus::Cancelled)
    }

    /// Puts failed pages back to pending and re-dispatches the job.
    ///
    /// Pending pages lose their handle too, so pages whose task was lost are
    /// dispatched again. A job without pending or failed pages is left as it
    /// is and its current status is returned.
    pub fn retry_job(&self, job_id: &str) -> Result<JobStatus, PipelineError> {
        let _span = info_span!("pipeline.retry_job", job_id = %job_id).entered();

        let decision = self.db.with_transaction(|tx| {
            let status = match job_repo::status_in(tx, job_id)? {
                None => return Ok(RetryDecision::NotFound),
                Some(JobStatus::Cancelled) => return Ok(RetryDecision::Cancelled),
                Some(status) => status,
            };

            let reset = page_repo::reset_for_retry_in(tx, job_id)?;
            if reset.selected == 0 {
                return Ok(RetryDecision::Nothing(status));
            }
            job_repo::update_status_in(tx, job_id, JobStatus::Running)?;
            Ok(RetryDecision::Reset(reset.cleared_handles))
        })?;

        let cleared = match decision {
            RetryDecision::NotFound => return Err(PipelineError::JobNotFound(job_id.to_string())),
            RetryDecision::Cancelled => {
                return Err(PipelineError::JobCancelled(job_id.to_string()))
            }
            RetryDecision::Nothing(status) => {
                debug!("Nothing to retry");
                return Ok(status);
            }
            RetryDecision::Reset(cleared) => cleared,
        };

        self.revoke_all(cleared);
        let dispatched = self.dispatch_pages(job_id)?;
        info!(dispatched, "Retrying job");
        Ok(JobStatus::Running)
    }

    /// Fails pages that have been running for longer than the configured
    /// stale timeout and re-evaluates their jobs. Returns the number of jobs
    /// touched.
    pub fn reclaim_stale_pages(&self) -> Result<usize, PipelineError> {
        let cutoff = timestamp_secs_ago(self.config.stale_page_timeout_secs);
        let job_ids = page_repo::fail_stale_running(&self.db, &cutoff, STALE_MESSAGE)?;

        for job_id in &job_ids {
            warn!(job_id = %job_id, "Failed stale running pages");
            self.dispatch_pages(job_id)?;
            self.try_complete_job(job_id)?;
        }
        Ok(job_ids.len())
    }

    fn revoke_all(&self, handles: Vec<String>) -> usize {
        let mut revoked = 0;
        for handle in handles.into_iter().map(TaskHandle::from) {
            match self.queue.revoke(&handle) {
                Ok(true) => revoked += 1,
                Ok(false) => {}
                Err(e) => warn!(handle = %handle, "Failed to revoke task: {}", e),
            }
        }
        revoked
    }
}
