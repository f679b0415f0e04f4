use std::sync::Arc;

use vidqueue::backend::BackendCatalog;
use vidqueue::config::Config;
use vidqueue::pipeline::{JobManager, JsonFileStorage};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = Config::from_env()?;
    let _log_guard = vidqueue::logging::init_logging(config.log_dir.as_deref())?;

    tracing::info!(
        "Starting vidqueue with {} workers, state file {}",
        config.workers,
        config.state_file.display()
    );

    let catalog = Arc::new(BackendCatalog::with_defaults(&config.backend_paths));
    let storage = Arc::new(JsonFileStorage::new(&config.state_file));
    let manager = JobManager::new(config.manager_config(), storage, catalog);

    manager.recover_jobs()?;
    manager.start(config.workers)?;

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown requested, waiting for in-flight jobs");
    manager.stop().await;

    let stats = manager.stats();
    tracing::info!(
        "vidqueue stopped: {} pending, {} completed, {} failed, {} cancelled",
        stats.pending,
        stats.completed,
        stats.failed,
        stats.cancelled
    );

    Ok(())
}
