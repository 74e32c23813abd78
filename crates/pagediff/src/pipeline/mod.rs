//! Durable page-diff orchestration.
//!
//! Every operation is an `impl Pipeline` block in its own module and works
//! purely from database state, so tasks can be redelivered and workers can
//! restart at any point.

pub mod comparer;
pub mod completion;
pub mod config;
pub mod control;
pub mod dispatcher;
pub mod enumerator;
pub mod error;
pub mod progress;
pub mod runner;
pub mod text;

pub use config::PipelineConfig;
pub use error::PipelineError;
pub use progress::{JobProgress, PageCounts};
pub use runner::Pipeline;
