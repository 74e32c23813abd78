use tracing::{debug, info, info_span, warn};

use crate::db::file_repo::{self, JobFileRow};
use crate::db::job_repo;
use crate::db::page_repo::{self, NewPageResult};
use crate::db::{JobStatus, PageStatus, TextStatus};
use crate::queue::Task;
use crate::sanitize;
use crate::storage::SetSide;

use super::error::PipelineError;
use super::runner::Pipeline;

impl Pipeline {
    /// Creates one page result per page index of every file, marks the job
    /// running and kicks off dispatch and text extraction.
    ///
    /// A no-op on cancelled jobs. Failures of the enumeration itself mark
    /// the job `failed`.
    pub fn run_job(&self, job_id: &str) -> Result<(), PipelineError> {
        let _span = info_span!("pipeline.enumerate", job_id = %job_id).entered();

        let job = self.job(job_id)?;
        if job.status == JobStatus::Cancelled {
            debug!("Job is cancelled, skipping enumeration");
            return Ok(());
        }

        // A resubmitted run_job may find the pages already in place.
        let has_files = !file_repo::list_for_job(&self.db, job_id)?.is_empty();
        if has_files && !file_repo::any_without_pages(&self.db, job_id)? {
            debug!("Job is already enumerated");
            self.dispatch_pages(job_id)?;
            self.try_complete_job(job_id)?;
            return Ok(());
        }

        let files = match self.enumerate_pages(job_id) {
            Ok(Some(files)) => files,
            Ok(None) => {
                debug!("Job was cancelled during enumeration");
                return Ok(());
            }
            Err(e) => {
                warn!("Enumeration failed: {}", e);
                self.db.with_conn(|conn| {
                    job_repo::update_status_unless_cancelled_in(conn, job_id, JobStatus::Failed)
                })?;
                return Err(e);
            }
        };

        self.dispatch_pages(job_id)?;
        self.queue_text_extraction(&files)?;
        // Jobs with no files, or only missing pages, have nothing to wait for.
        self.try_complete_job(job_id)?;
        Ok(())
    }

    /// Returns `None` if the job was cancelled while its pages were being
    /// counted.
    fn enumerate_pages(&self, job_id: &str) -> Result<Option<Vec<JobFileRow>>, PipelineError> {
        let files = file_repo::list_for_job(&self.db, job_id)?;

        let mut pages = Vec::new();
        for file in &files {
            pages.extend(self.pages_for_file(job_id, file)?);
        }

        page_repo::replace_for_job(&self.db, job_id, &pages)?;
        let cancelled = self.db.with_transaction(|tx| {
            if job_repo::status_in(tx, job_id)? == Some(JobStatus::Cancelled) {
                page_repo::cancel_unfinished_in(tx, job_id)?;
                return Ok(true);
            }
            job_repo::update_status_in(tx, job_id, JobStatus::Running)?;
            Ok(false)
        })?;
        if cancelled {
            return Ok(None);
        }

        info!(files = files.len(), pages = pages.len(), "Enumerated pages");
        Ok(Some(files))
    }

    fn pages_for_file(
        &self,
        job_id: &str,
        file: &JobFileRow,
    ) -> Result<Vec<NewPageResult>, PipelineError> {
        if file.is_missing() {
            return Ok(vec![sentinel(file, file.missing_in_set_a, file.missing_in_set_b)]);
        }

        let count_a = self.page_count(job_id, SetSide::A, file.set_a_path.as_deref())?;
        let count_b = self.page_count(job_id, SetSide::B, file.set_b_path.as_deref())?;

        let (count_a, count_b) = match (count_a, count_b) {
            (Some(a), Some(b)) => (a, b),
            (a, b) => return Ok(vec![sentinel(file, a.is_none(), b.is_none())]),
        };

        let max_pages = count_a.max(count_b);
        if max_pages == 0 {
            return Ok(vec![sentinel(file, true, true)]);
        }

        Ok((0..max_pages)
            .map(|page_index| {
                let missing_in_set_a = page_index >= count_a;
                let missing_in_set_b = page_index >= count_b;
                NewPageResult {
                    job_file_id: file.id.clone(),
                    page_index,
                    status: if missing_in_set_a || missing_in_set_b {
                        PageStatus::Missing
                    } else {
                        PageStatus::Pending
                    },
                    missing_in_set_a,
                    missing_in_set_b,
                }
            })
            .collect())
    }

    /// Page count of one side, or `None` when the document cannot be opened.
    fn page_count(
        &self,
        job_id: &str,
        side: SetSide,
        relative_path: Option<&str>,
    ) -> Result<Option<u32>, PipelineError> {
        let Some(relative_path) = relative_path else {
            return Ok(None);
        };
        let path = self.storage.resolve(job_id, side, relative_path)?;

        match self.storage.open_document(&path) {
            Ok(count) => Ok(Some(count)),
            Err(e) => {
                warn!(
                    side = %side,
                    file = %sanitize::redact_path(&path),
                    "Treating unopenable document as missing: {}",
                    e
                );
                Ok(None)
            }
        }
    }

    fn queue_text_extraction(&self, files: &[JobFileRow]) -> Result<(), PipelineError> {
        for file in files {
            if file.missing_in_set_a && file.missing_in_set_b {
                file_repo::set_text_status(&self.db, &file.id, TextStatus::Missing, None)?;
                continue;
            }

            let task = Task::ExtractText {
                file_id: file.id.clone(),
            };
            if let Err(e) = self.queue.submit(&task) {
                warn!(file_id = %file.id, "Failed to queue text extraction: {}", e);
                file_repo::set_text_status(
                    &self.db,
                    &file.id,
                    TextStatus::Failed,
                    Some(&e.to_string()),
                )?;
            }
        }
        Ok(())
    }
}

/// The single index-0 `missing` row of a file that has no comparable pages.
fn sentinel(file: &JobFileRow, missing_in_set_a: bool, missing_in_set_b: bool) -> NewPageResult {
    NewPageResult {
        job_file_id: file.id.clone(),
        page_index: 0,
        status: PageStatus::Missing,
        missing_in_set_a,
        missing_in_set_b,
    }
}
