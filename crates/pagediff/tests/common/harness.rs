//! Test harness wiring a `Pipeline` to in-memory collaborators.
//!
//! Tasks submitted by the pipeline land in a `RecordingQueue`; tests drive
//! them one at a time with `run_next` or to quiescence with `run_all`, which
//! makes every interleaving the tests care about reproducible.

#![allow(dead_code)]

use std::sync::Arc;

use pagediff::db::file_repo::JobFileRow;
use pagediff::db::job_repo::JobRow;
use pagediff::db::page_repo::PageResultRow;
use pagediff::{Database, Pipeline, PipelineConfig, SetSide, Task, TaskQueue};

use super::builders::PipelineConfigBuilder;
use super::fakes::{FakeDocument, FakeStorage, FakeTextExtractor, RecordingQueue};

pub struct TestHarness {
    pub pipeline: Pipeline,
    pub storage: Arc<FakeStorage>,
    pub queue: Arc<RecordingQueue>,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_config(PipelineConfigBuilder::new().build())
    }

    pub fn with_batch_size(size: u32) -> Self {
        Self::with_config(PipelineConfigBuilder::new().page_batch_size(size).build())
    }

    pub fn with_config(config: PipelineConfig) -> Self {
        let db = Database::open_in_memory().expect("Failed to create test database");
        let storage = Arc::new(FakeStorage::new());
        let queue = Arc::new(RecordingQueue::new());
        let pipeline = Pipeline::new(
            Arc::new(config),
            db,
            Arc::clone(&storage) as Arc<dyn pagediff::StorageProvider>,
            Arc::clone(&queue) as Arc<dyn TaskQueue>,
            Arc::new(FakeTextExtractor),
        );
        Self {
            pipeline,
            storage,
            queue,
        }
    }

    /// Creates a job and uploads `documents` as `(side, relative path, doc)`.
    pub fn job_with(&self, documents: Vec<(SetSide, &str, FakeDocument)>) -> JobRow {
        let job = self
            .pipeline
            .create_job("alice", Some("v1"), Some("v2"))
            .expect("Failed to create job");
        for (side, path, document) in documents {
            self.storage.put(&job.id, side, path, document);
        }
        job
    }

    /// Uploads the same document on both sides.
    pub fn both(path: &str, document: FakeDocument) -> Vec<(SetSide, &str, FakeDocument)> {
        vec![
            (SetSide::A, path, document.clone()),
            (SetSide::B, path, document),
        ]
    }

    /// Runs the oldest queued task. Returns `false` when the queue is empty.
    pub fn run_next(&self) -> bool {
        let Some((handle, task)) = self.queue.pop() else {
            return false;
        };
        let result = match task {
            Task::RunJob { job_id } => self.pipeline.run_job(&job_id),
            Task::ComparePage { page_id } => self.pipeline.compare_page(page_id, Some(&handle)),
            Task::ExtractText { file_id } => self.pipeline.extract_text(&file_id),
        };
        result.expect("task returned an error");
        true
    }

    /// Runs tasks until the queue is empty. Returns how many ran.
    pub fn run_all(&self) -> usize {
        let mut ran = 0;
        while self.run_next() {
            ran += 1;
            assert!(ran < 10_000, "queue never drained");
        }
        ran
    }

    /// Starts the job and runs everything it produces.
    pub fn run_job_to_end(&self, job_id: &str) {
        self.pipeline.start_job(job_id).expect("Failed to start job");
        self.run_all();
    }

    pub fn job(&self, job_id: &str) -> JobRow {
        self.pipeline.job(job_id).expect("job not found")
    }

    pub fn file(&self, job_id: &str, relative_path: &str) -> JobFileRow {
        self.pipeline
            .files(job_id)
            .unwrap()
            .into_iter()
            .find(|f| f.relative_path == relative_path)
            .unwrap_or_else(|| panic!("file {} not found", relative_path))
    }

    pub fn pages(&self, job_id: &str, relative_path: &str) -> Vec<PageResultRow> {
        let file = self.file(job_id, relative_path);
        self.pipeline.pages(&file.id).unwrap()
    }

    pub fn all_pages(&self, job_id: &str) -> Vec<PageResultRow> {
        pagediff::db::page_repo::list_for_job(self.pipeline.database(), job_id).unwrap()
    }

    /// Pending or running pages that carry a task handle.
    pub fn in_flight(&self, job_id: &str) -> usize {
        self.all_pages(job_id)
            .iter()
            .filter(|p| p.status.is_unfinished() && p.task_handle.is_some())
            .count()
    }
}
