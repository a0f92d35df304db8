//! History command - list recent runs

use anyhow::Result;
use std::path::PathBuf;

use crate::args::HistoryArgs;
use crate::commands::run::build_stack;
use crate::config::AppConfig;

pub async fn execute(args: HistoryArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = AppConfig::load(config_path.as_deref())?;
    let (coordinator, _scheduler) = build_stack(&config).await?;

    let records = coordinator.run_history(args.limit).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    if records.is_empty() {
        println!("No runs recorded yet");
        return Ok(());
    }

    println!(
        "{:<27} {:>6} {:>9} {:>8} {:>9}",
        "started", "found", "accepted", "skipped", "duration"
    );
    for record in records {
        println!(
            "{:<27} {:>6} {:>9} {:>8} {:>8.1}s{}",
            record.started_at.to_string(),
            record.stats.total_found(),
            record.stats.total_accepted(),
            record.stats.total_skipped(),
            record.stats.duration_secs,
            if record.stats.stopped_by_user {
                "  (stopped)"
            } else {
                ""
            }
        );
    }

    Ok(())
}
