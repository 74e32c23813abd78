use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, error, info, warn};

use crate::error::WorkerError;
use crate::queue::SqliteTaskQueue;
use crate::sanitize;
use crate::worker::runner::TaskRunner;

/// Threads that claim tasks from the durable queue and run them.
pub struct WorkerPool {
    workers: Vec<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
}

impl WorkerPool {
    pub fn start(
        queue: Arc<SqliteTaskQueue>,
        runner: Arc<TaskRunner>,
        worker_count: usize,
        poll_interval: Duration,
    ) -> Result<Self, WorkerError> {
        if worker_count == 0 {
            return Err(WorkerError::NoWorkers);
        }
        let shutdown = Arc::new(AtomicBool::new(false));
        let worker_prefix = format!("{}-{}", hostname_or_local(), std::process::id());

        let mut workers = Vec::with_capacity(worker_count);
        for worker_id in 0..worker_count {
            let queue = Arc::clone(&queue);
            let runner = Arc::clone(&runner);
            let shutdown_flag = Arc::clone(&shutdown);
            let name = format!("{}-w{}", worker_prefix, worker_id);

            let handle = thread::Builder::new()
                .name(format!("pagediff-worker-{}", worker_id))
                .spawn(move || run_worker(name, queue, runner, shutdown_flag, poll_interval))
                .map_err(|e| WorkerError::SpawnFailed(e.to_string()))?;
            workers.push(handle);
        }

        info!("Started {} workers", worker_count);

        Ok(Self { workers, shutdown })
    }

    pub fn shutdown(&self) {
        info!("Shutting down worker pool...");
        self.shutdown.store(true, Ordering::Relaxed);
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }

    /// Joins all worker threads. Call after [`WorkerPool::shutdown`].
    pub fn wait(self) {
        for (i, worker) in self.workers.into_iter().enumerate() {
            if let Err(e) = worker.join() {
                error!("Worker {} panicked: {:?}", i, e);
            } else {
                debug!("Worker {} finished", i);
            }
        }

        info!("All workers have stopped");
    }
}

fn run_worker(
    name: String,
    queue: Arc<SqliteTaskQueue>,
    runner: Arc<TaskRunner>,
    shutdown: Arc<AtomicBool>,
    poll_interval: Duration,
) {
    debug!("Worker {} started", name);

    loop {
        if shutdown.load(Ordering::Relaxed) {
            debug!("Worker {} received shutdown signal", name);
            break;
        }

        let claimed = match queue.claim_next(&name) {
            Ok(Some(claimed)) => claimed,
            Ok(None) => {
                queue.wait_for_work(poll_interval);
                continue;
            }
            Err(e) => {
                error!("Worker {} failed to claim a task: {}", name, e);
                queue.wait_for_work(poll_interval);
                continue;
            }
        };

        debug!(
            "Worker {} running {} task {}",
            name,
            claimed.task.name(),
            sanitize::short_id(claimed.handle.as_str())
        );

        let ack = match runner.run(&claimed) {
            Ok(()) => queue.complete(&claimed.handle),
            Err(e) => {
                warn!("Task {} ({}) failed: {}", claimed.handle, claimed.task.name(), e);
                queue.fail(&claimed.handle, &e.to_string())
            }
        };
        if let Err(e) = ack {
            error!("Worker {} failed to acknowledge task {}: {}", name, claimed.handle, e);
        }
    }

    debug!("Worker {} stopped", name);
}

fn hostname_or_local() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "local".to_string())
}
