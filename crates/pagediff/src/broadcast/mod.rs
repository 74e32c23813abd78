//! In-process event streaming for observers of the pipeline.

pub mod page_events;

pub use page_events::{PageEvent, PageEventBroadcaster};
