use tracing::{debug, info_span, warn};

use crate::db::job_repo;
use crate::db::page_repo;
use crate::db::JobStatus;
use crate::queue::{Task, TaskHandle};

use super::error::PipelineError;
use super::runner::Pipeline;

impl Pipeline {
    /// Tops the job's in-flight window back up to `page_batch_size`.
    ///
    /// Counting, selecting and claiming happen in one immediate transaction
    /// so concurrent passes can never overfill the window. The compare tasks
    /// are enqueued after commit; a page whose task could not be enqueued
    /// has its claim released again. Returns the number of pages handed to
    /// the queue.
    pub fn dispatch_pages(&self, job_id: &str) -> Result<usize, PipelineError> {
        let _span = info_span!("pipeline.dispatch", job_id = %job_id).entered();
        let batch_size = self.config.page_batch_size;

        let claimed = self.db.with_transaction(|tx| {
            match job_repo::status_in(tx, job_id)? {
                None | Some(JobStatus::Cancelled) => return Ok(Vec::new()),
                Some(_) => {}
            }

            let in_flight = page_repo::count_in_flight_in(tx, job_id)?;
            let slots = batch_size.saturating_sub(in_flight);
            if slots == 0 {
                return Ok(Vec::new());
            }

            let mut claimed = Vec::new();
            for page_id in page_repo::select_dispatchable_in(tx, job_id, slots)? {
                let handle = TaskHandle::generate();
                if page_repo::claim_in(tx, page_id, handle.as_str())? {
                    claimed.push((page_id, handle));
                }
            }
            Ok(claimed)
        })?;

        let mut dispatched = 0;
        for (page_id, handle) in claimed {
            match self.queue.enqueue(&handle, &Task::ComparePage { page_id }) {
                Ok(()) => dispatched += 1,
                Err(e) => {
                    warn!(page_id, "Failed to queue page comparison: {}", e);
                    page_repo::release_claim(&self.db, page_id, handle.as_str())?;
                }
            }
        }

        if dispatched > 0 {
            debug!(dispatched, "Dispatched pages");
        }
        Ok(dispatched)
    }
}
