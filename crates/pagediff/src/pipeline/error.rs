use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Job {0} is cancelled")]
    JobCancelled(String),

    #[error("Job {0} is already running")]
    JobRunning(String),

    #[error("Database operation failed: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Storage failed: {0}")]
    Storage(#[from] crate::error::StorageError),

    #[error("Document failed: {0}")]
    Document(#[from] crate::error::DocumentError),

    #[error("Overlay failed: {0}")]
    Diff(#[from] crate::error::DiffError),

    #[error("Task queue failed: {0}")]
    Queue(#[from] crate::error::QueueError),

    #[error("Text extraction failed: {0}")]
    Text(#[from] crate::error::TextError),
}
