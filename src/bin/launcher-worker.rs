//! Privileged worker process. Serves launcher commands over stdin/stdout;
//! logs go to stderr.

use std::path::PathBuf;
use std::sync::Arc;

use launcher_lib::api::types::ApiError;
use launcher_lib::commands;
use launcher_lib::config::{self, LauncherConfig};
use launcher_lib::protocols::stdio;
use launcher_lib::versions::manager::VersionManager;
use launcher_lib::versions::source;

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    if let Err(e) = run().await {
        log::error!("Worker failed: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), ApiError> {
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(config::default_config_path);
    let config = LauncherConfig::load_or_default(&config_path)?;
    log::info!(
        "Worker starting: config={}, install_dir={}",
        config_path.display(),
        config.worker.install_dir.display()
    );

    let manager = Arc::new(VersionManager::new(config.worker.install_dir.clone())?);
    let source = source::from_config(&config.worker)?;
    let endpoint = stdio::bridge_worker(tokio::io::stdin(), tokio::io::stdout());

    commands::serve(endpoint, manager, source, config.worker.executable.clone()).await;
    log::info!("Worker stopped");
    Ok(())
}
