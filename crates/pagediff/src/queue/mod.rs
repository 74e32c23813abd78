//! Work queue seam between the pipeline and the worker pool.

pub mod sqlite;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::QueueError;

pub use sqlite::{ClaimedTask, SqliteTaskQueue};

/// A unit of background work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "task", rename_all = "snake_case")]
pub enum Task {
    /// Enumerate the pages of every file in a job.
    RunJob { job_id: String },
    /// Compare one page result.
    ComparePage { page_id: i64 },
    /// Extract the text of both sides of one job file.
    ExtractText { file_id: String },
}

impl Task {
    pub fn name(&self) -> &'static str {
        match self {
            Task::RunJob { .. } => "run_job",
            Task::ComparePage { .. } => "compare_page",
            Task::ExtractText { .. } => "extract_text",
        }
    }
}

/// Opaque identifier of a submitted task.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaskHandle(String);

impl TaskHandle {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for TaskHandle {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Producer side of the task queue.
pub trait TaskQueue: Send + Sync {
    /// Enqueues `task` under a caller-chosen handle.
    fn enqueue(&self, handle: &TaskHandle, task: &Task) -> Result<(), QueueError>;

    /// Best-effort revoke. Only a task no worker has claimed yet is
    /// prevented from running; returns whether that happened.
    fn revoke(&self, handle: &TaskHandle) -> Result<bool, QueueError>;

    fn submit(&self, task: &Task) -> Result<TaskHandle, QueueError> {
        let handle = TaskHandle::generate();
        self.enqueue(&handle, task)?;
        Ok(handle)
    }
}
