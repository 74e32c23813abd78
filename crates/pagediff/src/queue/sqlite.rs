use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender};
use log::{debug, warn};

use super::{Task, TaskHandle, TaskQueue};
use crate::db::{task_repo, timestamp_secs_ago, Database};
use crate::error::QueueError;

/// A task handed to a worker.
#[derive(Debug, Clone, PartialEq)]
pub struct ClaimedTask {
    pub handle: TaskHandle,
    pub task: Task,
    pub attempts: u32,
}

/// Durable task queue stored in the `tasks` table.
///
/// Any process sharing the database file can claim from it. Local
/// submissions also ping a wake channel so idle workers in this process
/// don't wait out their poll interval.
#[derive(Clone)]
pub struct SqliteTaskQueue {
    db: Database,
    lease_secs: u64,
    wake_tx: Sender<()>,
    wake_rx: Receiver<()>,
}

impl SqliteTaskQueue {
    pub fn new(db: Database, lease_secs: u64) -> Self {
        let (wake_tx, wake_rx) = bounded(1);
        Self {
            db,
            lease_secs,
            wake_tx,
            wake_rx,
        }
    }

    /// Blocks until woken or `timeout` elapses.
    pub fn wait_for_work(&self, timeout: Duration) {
        let _ = self.wake_rx.recv_timeout(timeout);
    }

    /// Claims the next deliverable task. A payload that cannot be decoded
    /// is failed in place and reported as an error.
    pub fn claim_next(&self, worker: &str) -> Result<Option<ClaimedTask>, QueueError> {
        let cutoff = timestamp_secs_ago(self.lease_secs);
        let Some(row) = task_repo::claim_next(&self.db, worker, &cutoff)? else {
            return Ok(None);
        };

        if row.attempts > 1 {
            debug!("Redelivering task {} (attempt {})", row.id, row.attempts);
        }

        match serde_json::from_str::<Task>(&row.payload) {
            Ok(task) => Ok(Some(ClaimedTask {
                handle: TaskHandle::from(row.id),
                task,
                attempts: row.attempts,
            })),
            Err(source) => {
                task_repo::fail(&self.db, &row.id, &source.to_string())?;
                Err(QueueError::Decode {
                    handle: row.id,
                    source,
                })
            }
        }
    }

    pub fn complete(&self, handle: &TaskHandle) -> Result<(), QueueError> {
        if !task_repo::complete(&self.db, handle.as_str())? {
            warn!("Task {} was no longer claimed when completing", handle);
        }
        Ok(())
    }

    /// Drops finished task rows older than `retention_secs`.
    pub fn prune_finished(&self, retention_secs: u64) -> Result<usize, QueueError> {
        let cutoff = timestamp_secs_ago(retention_secs);
        let pruned = task_repo::prune_finished(&self.db, &cutoff)?;
        if pruned > 0 {
            debug!("Pruned {} finished tasks", pruned);
        }
        Ok(pruned)
    }

    pub fn fail(&self, handle: &TaskHandle, error: &str) -> Result<(), QueueError> {
        if !task_repo::fail(&self.db, handle.as_str(), error)? {
            warn!("Task {} was no longer claimed when failing", handle);
        }
        Ok(())
    }
}

impl TaskQueue for SqliteTaskQueue {
    fn enqueue(&self, handle: &TaskHandle, task: &Task) -> Result<(), QueueError> {
        let payload = serde_json::to_string(task).map_err(QueueError::Encode)?;
        task_repo::insert(&self.db, handle.as_str(), task.name(), &payload)?;
        // Full means a wake-up is already pending.
        let _ = self.wake_tx.try_send(());
        Ok(())
    }

    fn revoke(&self, handle: &TaskHandle) -> Result<bool, QueueError> {
        Ok(task_repo::revoke(&self.db, handle.as_str())?)
    }
}
