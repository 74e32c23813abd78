use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use crossbeam_channel::{bounded, RecvTimeoutError};
use tracing::{error, info, warn};

use pagediff::config::{apply_env_overrides, default_config_path, load_config};
use pagediff::telemetry::{init_logging, LogFormat};
use pagediff::{
    Config, Database, PagediffError, Pipeline, SqliteTaskQueue, TaskQueue, TaskRunner,
    WorkerError, WorkerPool,
};

#[derive(Parser, Debug)]
#[command(version, about = "Runs page-diff workers against the shared job database")]
struct Args {
    /// Path to the JSON config file (defaults to ~/.pagediff/config.json).
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Overrides `worker_count` from the config.
    #[arg(long, short)]
    workers: Option<usize>,

    /// Emit logs as JSON lines.
    #[arg(long, default_value_t = false)]
    json_logs: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let format = if args.json_logs {
        LogFormat::Json
    } else {
        LogFormat::Text
    };
    if let Err(e) = init_logging(format) {
        eprintln!("Failed to initialize logging: {}", e);
        return ExitCode::FAILURE;
    }

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("pagediff-worker failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<(), PagediffError> {
    let mut config = resolve_config(args.config)?;
    apply_env_overrides(&mut config)?;
    if let Some(workers) = args.workers {
        config.worker_count = workers;
    }

    info!(
        "Starting pagediff-worker v{} with {} workers",
        env!("CARGO_PKG_VERSION"),
        config.worker_count
    );

    let db = Database::open(&config.database_path())?;
    let queue = Arc::new(SqliteTaskQueue::new(
        db.clone(),
        config.dispatch.task_lease_secs,
    ));
    let pipeline = Arc::new(Pipeline::from_config(
        &config,
        db,
        Arc::clone(&queue) as Arc<dyn TaskQueue>,
    )?);

    pipeline.resume()?;

    let (shutdown_tx, shutdown_rx) = bounded::<()>(1);
    ctrlc::set_handler(move || {
        let _ = shutdown_tx.try_send(());
    })
    .map_err(|e| WorkerError::Signal(e.to_string()))?;

    let pool = WorkerPool::start(
        Arc::clone(&queue),
        Arc::new(TaskRunner::new(Arc::clone(&pipeline))),
        config.worker_count,
        config.dispatch.poll_interval(),
    )?;

    let sweep_interval = Duration::from_secs((config.dispatch.stale_page_timeout_secs / 4).max(1));
    loop {
        match shutdown_rx.recv_timeout(sweep_interval) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {
                match pipeline.reclaim_stale_pages() {
                    Ok(0) => {}
                    Ok(jobs) => warn!("Reclaimed stale pages in {} jobs", jobs),
                    Err(e) => error!("Stale page sweep failed: {}", e),
                }
                if let Err(e) = queue.prune_finished(config.dispatch.task_retention_secs) {
                    error!("Task prune failed: {}", e);
                }
            }
        }
    }

    pool.shutdown();
    pool.wait();
    info!("pagediff-worker stopped");
    Ok(())
}

fn resolve_config(path: Option<PathBuf>) -> Result<Config, PagediffError> {
    if let Some(path) = path {
        return Ok(load_config(path)?);
    }

    match default_config_path() {
        Some(path) if path.is_file() => Ok(load_config(path)?),
        _ => {
            info!("No config file found, using defaults");
            Ok(Config::with_data_directory("~/.pagediff/data"))
        }
    }
}
