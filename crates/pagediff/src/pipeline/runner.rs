use std::sync::Arc;
use std::time::Duration;

use tracing::{info, info_span, warn};

use crate::broadcast::PageEventBroadcaster;
use crate::config::Config;
use crate::db::file_repo::{self, JobFileRow};
use crate::db::job_repo::{self, JobRow};
use crate::db::page_repo::{self, PageResultRow};
use crate::db::{Database, JobStatus};
use crate::pairing::pair_paths;
use crate::queue::{Task, TaskHandle, TaskQueue};
use crate::storage::{FsStorage, SetSide, StorageProvider};
use crate::text::{
    DisabledTextExtractor, HttpExtractorSettings, HttpTextExtractor, TextExtractor,
};

use super::config::PipelineConfig;
use super::error::PipelineError;

/// The page-diff pipeline.
///
/// Holds no orchestration state of its own: every operation reads and
/// writes the database, so any number of `Pipeline`s in any number of
/// processes can serve the same jobs.
pub struct Pipeline {
    pub(super) config: Arc<PipelineConfig>,
    pub(super) db: Database,
    pub(super) storage: Arc<dyn StorageProvider>,
    pub(super) queue: Arc<dyn TaskQueue>,
    pub(super) text: Arc<dyn TextExtractor>,
    pub(super) events: PageEventBroadcaster,
}

impl Pipeline {
    /// Production constructor: filesystem storage and the HTTP text
    /// extractor (or a disabled one) built from config.
    pub fn from_config(
        config: &Config,
        db: Database,
        queue: Arc<dyn TaskQueue>,
    ) -> Result<Self, PipelineError> {
        let storage = Arc::new(FsStorage::new(config.data_directory()));
        let text: Arc<dyn TextExtractor> = if config.text_extraction.enabled {
            Arc::new(HttpTextExtractor::new(&HttpExtractorSettings {
                url: config.text_extraction.url.clone(),
                timeout: Duration::from_secs(config.text_extraction.timeout_secs),
                connect_timeout: Duration::from_secs(config.text_extraction.connect_timeout_secs),
            })?)
        } else {
            Arc::new(DisabledTextExtractor)
        };

        Ok(Self::new(
            Arc::new(PipelineConfig::from_config(config)),
            db,
            storage,
            queue,
            text,
        ))
    }

    /// Constructor with injected collaborators.
    pub fn new(
        config: Arc<PipelineConfig>,
        db: Database,
        storage: Arc<dyn StorageProvider>,
        queue: Arc<dyn TaskQueue>,
        text: Arc<dyn TextExtractor>,
    ) -> Self {
        Self {
            config,
            db,
            storage,
            queue,
            text,
            events: PageEventBroadcaster::default(),
        }
    }

    pub fn with_events(mut self, events: PageEventBroadcaster) -> Self {
        self.events = events;
        self
    }

    pub fn events(&self) -> &PageEventBroadcaster {
        &self.events
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn create_job(
        &self,
        owner: &str,
        set_a_label: Option<&str>,
        set_b_label: Option<&str>,
    ) -> Result<JobRow, PipelineError> {
        let mut job = JobRow::new(owner);
        job.set_a_label = set_a_label.map(str::to_string);
        job.set_b_label = set_b_label.map(str::to_string);
        job_repo::insert(&self.db, &job)?;
        info!(job_id = %job.id, "Created job {}", job.display_id());
        Ok(job)
    }

    pub fn set_labels(
        &self,
        job_id: &str,
        set_a_label: Option<&str>,
        set_b_label: Option<&str>,
    ) -> Result<(), PipelineError> {
        if !job_repo::set_labels(&self.db, job_id, set_a_label, set_b_label)? {
            return Err(PipelineError::JobNotFound(job_id.to_string()));
        }
        Ok(())
    }

    pub fn job(&self, job_id: &str) -> Result<JobRow, PipelineError> {
        job_repo::find_by_id(&self.db, job_id)?
            .ok_or_else(|| PipelineError::JobNotFound(job_id.to_string()))
    }

    pub fn jobs_for_owner(&self, owner: &str) -> Result<Vec<JobRow>, PipelineError> {
        Ok(job_repo::list_for_owner(&self.db, owner)?)
    }

    pub fn files(&self, job_id: &str) -> Result<Vec<JobFileRow>, PipelineError> {
        Ok(file_repo::list_for_job(&self.db, job_id)?)
    }

    pub fn pages(&self, file_id: &str) -> Result<Vec<PageResultRow>, PipelineError> {
        Ok(page_repo::list_for_file(&self.db, file_id)?)
    }

    /// Pairs the uploaded trees, recreates the job's files and queues
    /// enumeration.
    pub fn start_job(&self, job_id: &str) -> Result<TaskHandle, PipelineError> {
        let _span = info_span!("pipeline.start_job", job_id = %job_id).entered();

        let job = self.job(job_id)?;
        if job.status == JobStatus::Running {
            return Err(PipelineError::JobRunning(job_id.to_string()));
        }

        let set_a = self.storage.list_files(job_id, SetSide::A)?;
        let set_b = self.storage.list_files(job_id, SetSide::B)?;
        let files: Vec<JobFileRow> = pair_paths(&set_a, &set_b)
            .iter()
            .map(|pairing| JobFileRow::from_pairing(job_id, pairing))
            .collect();

        self.db.with_transaction(|tx| {
            file_repo::delete_for_job_in(tx, job_id)?;
            file_repo::insert_many_in(tx, &files)?;
            job_repo::set_has_diffs_in(tx, job_id, false)?;
            job_repo::update_status_in(tx, job_id, JobStatus::Running)?;
            Ok(())
        })?;

        info!(
            files = files.len(),
            set_a = set_a.len(),
            set_b = set_b.len(),
            "Paired job files"
        );

        match self.queue.submit(&Task::RunJob {
            job_id: job_id.to_string(),
        }) {
            Ok(handle) => Ok(handle),
            Err(e) => {
                warn!("Failed to queue enumeration: {}", e);
                job_repo::update_status(&self.db, job_id, JobStatus::Failed)?;
                Err(e.into())
            }
        }
    }

    /// Re-drives every running job after a restart.
    ///
    /// Jobs whose files were never enumerated get their `run_job` task
    /// submitted again; a duplicate of a still-queued one is harmless.
    pub fn resume(&self) -> Result<usize, PipelineError> {
        let running = job_repo::list_ids_with_status(&self.db, JobStatus::Running)?;
        for job_id in &running {
            if file_repo::any_without_pages(&self.db, job_id)? {
                info!(job_id = %job_id, "Resubmitting enumeration");
                self.queue.submit(&Task::RunJob {
                    job_id: job_id.clone(),
                })?;
                continue;
            }
            self.dispatch_pages(job_id)?;
            self.try_complete_job(job_id)?;
        }
        if !running.is_empty() {
            info!("Resumed {} running jobs", running.len());
        }
        Ok(running.len())
    }
}
