use std::sync::Arc;

use crate::pipeline::{Pipeline, PipelineError};
use crate::queue::{ClaimedTask, Task};

/// Routes claimed tasks to the pipeline operation they name.
pub struct TaskRunner {
    pipeline: Arc<Pipeline>,
}

impl TaskRunner {
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        Self { pipeline }
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn run(&self, claimed: &ClaimedTask) -> Result<(), PipelineError> {
        match &claimed.task {
            Task::RunJob { job_id } => self.pipeline.run_job(job_id),
            Task::ComparePage { page_id } => {
                self.pipeline.compare_page(*page_id, Some(&claimed.handle))
            }
            Task::ExtractText { file_id } => self.pipeline.extract_text(file_id),
        }
    }
}
