//! Page event broadcaster: one event per terminal page write.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::db::PageStatus;

/// A page result reached a terminal status.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageEvent {
    pub job_id: String,
    pub file_id: String,
    pub page_id: i64,
    pub page_index: u32,
    pub status: PageStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl PageEvent {
    pub fn new(
        job_id: &str,
        file_id: &str,
        page_id: i64,
        page_index: u32,
        status: PageStatus,
    ) -> Self {
        Self {
            job_id: job_id.to_string(),
            file_id: file_id.to_string(),
            page_id,
            page_index,
            status,
            diff_score: None,
            error: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_score(mut self, diff_score: Option<f64>) -> Self {
        self.diff_score = diff_score;
        self
    }

    pub fn with_error(mut self, error: Option<&str>) -> Self {
        self.error = error.map(str::to_string);
        self
    }
}

/// Broadcasts page events to any number of subscribers.
#[derive(Clone)]
pub struct PageEventBroadcaster {
    sender: Arc<broadcast::Sender<PageEvent>>,
}

impl PageEventBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn send(&self, event: PageEvent) {
        // No active receivers is fine
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PageEvent> {
        self.sender.subscribe()
    }
}

impl Default for PageEventBroadcaster {
    fn default() -> Self {
        Self::new(256)
    }
}
