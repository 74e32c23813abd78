//! Shared test utilities for pagediff integration tests.
//!
//! This module provides:
//! - `TestHarness` wiring a `Pipeline` to in-memory collaborators
//! - fake storage, queue and text extractor implementations
//! - raster builders for synthetic pages

pub mod builders;
pub mod fakes;
pub mod harness;

#[allow(unused_imports)]
pub use builders::*;
#[allow(unused_imports)]
pub use fakes::{FakeDocument, FakeStorage, FakeTextExtractor, RecordingQueue};
#[allow(unused_imports)]
pub use harness::TestHarness;
