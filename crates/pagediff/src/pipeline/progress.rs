use serde::Serialize;

use crate::db::page_repo;
use crate::db::{JobStatus, PageStatus};

use super::error::PipelineError;
use super::runner::Pipeline;

/// Page counts of a job by status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageCounts {
    pub pending: u64,
    pub running: u64,
    pub done: u64,
    pub failed: u64,
    pub incompatible_size: u64,
    pub missing: u64,
}

impl PageCounts {
    fn add(&mut self, status: PageStatus, count: u64) {
        match status {
            PageStatus::Pending => self.pending += count,
            PageStatus::Running => self.running += count,
            PageStatus::Done => self.done += count,
            PageStatus::Failed => self.failed += count,
            PageStatus::IncompatibleSize => self.incompatible_size += count,
            PageStatus::Missing => self.missing += count,
        }
    }

    pub fn total(&self) -> u64 {
        self.unfinished() + self.finished()
    }

    pub fn unfinished(&self) -> u64 {
        self.pending + self.running
    }

    pub fn finished(&self) -> u64 {
        self.done + self.failed + self.incompatible_size + self.missing
    }
}

/// Snapshot of how far a job has got.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobProgress {
    pub job_id: String,
    pub status: JobStatus,
    pub total: u64,
    pub finished: u64,
    /// Whole percent, rounded down. Zero for a job without pages.
    pub percent: u8,
    pub counts: PageCounts,
}

impl JobProgress {
    fn new(job_id: &str, status: JobStatus, counts: PageCounts) -> Self {
        let total = counts.total();
        let finished = counts.finished();
        let percent = if total == 0 {
            0
        } else {
            (finished * 100 / total) as u8
        };
        Self {
            job_id: job_id.to_string(),
            status,
            total,
            finished,
            percent,
            counts,
        }
    }
}

impl Pipeline {
    pub fn progress(&self, job_id: &str) -> Result<JobProgress, PipelineError> {
        let job = self.job(job_id)?;
        let mut counts = PageCounts::default();
        for (status, count) in page_repo::count_by_status(&self.db, job_id)? {
            counts.add(status, count);
        }
        Ok(JobProgress::new(job_id, job.status, counts))
    }
}
