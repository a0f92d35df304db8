//! Watch command - run on the stored schedule until interrupted

use anyhow::{Context, Result};
use std::path::PathBuf;

use crate::args::WatchArgs;
use crate::commands::run::build_stack;
use crate::config::AppConfig;

pub async fn execute(_args: WatchArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = AppConfig::load(config_path.as_deref())?;
    let (coordinator, scheduler) = build_stack(&config).await?;

    match scheduler.reload().await? {
        Some(next) => tracing::info!(next_run = %next, "Schedule installed"),
        None => tracing::warn!(
            "No enabled schedule found; set one with `jobcast schedule set` and restart"
        ),
    }

    tokio::signal::ctrl_c()
        .await
        .context("Failed to install Ctrl+C handler")?;

    if coordinator.status().running {
        tracing::info!("Shutdown requested, stopping the active run");
        coordinator.request_stop();
    }
    tracing::info!("Shutting down");

    Ok(())
}
