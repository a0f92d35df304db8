//! Summary command - aggregate run statistics over a time range

use anyhow::Result;
use jobcast_domain::SummaryRange;
use std::path::PathBuf;

use crate::args::SummaryArgs;
use crate::commands::run::build_stack;
use crate::config::AppConfig;

pub async fn execute(args: SummaryArgs, config_path: Option<PathBuf>) -> Result<()> {
    let range = args
        .range
        .parse::<SummaryRange>()
        .map_err(|e| anyhow::anyhow!("{} (expected today, week, or month)", e))?;

    let config = AppConfig::load(config_path.as_deref())?;
    let (coordinator, _scheduler) = build_stack(&config).await?;

    let summary = coordinator.summary(range).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("Runs:     {}", summary.runs);
    println!("Found:    {}", summary.found);
    println!("Accepted: {}", summary.accepted);
    println!("Skipped:  {}", summary.skips.total());
    println!(
        "Sends:    blog {}, telegram {}, whatsapp {}",
        summary.channel_sends.blog, summary.channel_sends.telegram, summary.channel_sends.whatsapp
    );
    match summary.last_run {
        Some(last) => println!("Last run: {}", last),
        None => println!("Last run: never"),
    }

    Ok(())
}
