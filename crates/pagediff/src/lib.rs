pub mod broadcast;
pub mod config;
pub mod db;
pub mod diff;
pub mod error;
pub mod pairing;
pub mod pipeline;
pub mod queue;
pub mod sanitize;
pub mod storage;
pub mod telemetry;
pub mod text;
pub mod worker;

pub use broadcast::{PageEvent, PageEventBroadcaster};
pub use config::{load_config, Config};
pub use db::{Database, DatabaseError, JobStatus, PageStatus, TextStatus};
pub use error::{
    ConfigError, DiffError, DocumentError, PagediffError, QueueError, Result, StorageError,
    TextError, WorkerError,
};
pub use pairing::{pair_paths, FilePairing};
pub use pipeline::{JobProgress, Pipeline, PipelineConfig, PipelineError};
pub use queue::{SqliteTaskQueue, Task, TaskHandle, TaskQueue};
pub use storage::{FsStorage, SetSide, StorageProvider};
pub use text::{HttpTextExtractor, TextExtractor};
pub use worker::{TaskRunner, WorkerPool};
