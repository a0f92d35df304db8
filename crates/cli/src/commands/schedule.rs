//! Schedule command - show or change the stored schedule

use anyhow::{Result, bail};
use jobcast_domain::{Frequency, ScheduleConfig};
use std::path::PathBuf;

use crate::args::{ScheduleArgs, ScheduleCommands, ScheduleSetArgs};
use crate::commands::run::{build_stack, parse_sources};
use crate::config::AppConfig;

pub async fn execute(args: ScheduleArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = AppConfig::load(config_path.as_deref())?;
    let (_coordinator, scheduler) = build_stack(&config).await?;

    match args.command {
        ScheduleCommands::Show { json } => {
            let schedule = scheduler.get_schedule().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&schedule)?);
            } else {
                print_schedule(&schedule);
            }
        }
        ScheduleCommands::Set(set_args) => {
            let mut schedule = scheduler.get_schedule().await?;
            apply_set_args(&mut schedule, &set_args)?;
            let saved = scheduler.set_schedule(schedule).await?;

            match saved.next_run {
                Some(next) => println!("Schedule saved; next run at {}", next),
                None => println!("Schedule saved; disabled, no next run"),
            }
        }
    }

    Ok(())
}

fn apply_set_args(schedule: &mut ScheduleConfig, args: &ScheduleSetArgs) -> Result<()> {
    if args.enable {
        schedule.enabled = true;
    }
    if args.disable {
        schedule.enabled = false;
    }
    if let Some(at) = &args.at {
        schedule.time = at.clone();
        if schedule.time_of_day().is_none() {
            bail!("Invalid time of day: {} (expected HH:MM)", at);
        }
    }
    if let Some(frequency) = &args.frequency {
        schedule.frequency = frequency
            .parse::<Frequency>()
            .map_err(|e| anyhow::anyhow!("{} (expected hourly, daily, or weekly)", e))?;
    }
    if let Some(max_jobs) = args.max_jobs {
        schedule.run.max_postings = max_jobs;
    }
    if !args.sources.is_empty() {
        schedule.run.sources = parse_sources(&args.sources)?;
    }
    if let Some(publish_blog) = args.publish_blog {
        schedule.run.publish_blog = publish_blog;
    }
    if let Some(send_telegram) = args.send_telegram {
        schedule.run.send_telegram = send_telegram;
    }
    if let Some(send_whatsapp) = args.send_whatsapp {
        schedule.run.send_whatsapp = send_whatsapp;
    }
    if let Some(use_shortener) = args.use_shortener {
        schedule.run.use_shortener = use_shortener;
    }
    if let Some(enhanced) = args.enhanced {
        schedule.run.enhanced_extraction = enhanced;
    }
    Ok(())
}

fn print_schedule(schedule: &ScheduleConfig) {
    println!(
        "Schedule: {}",
        if schedule.enabled { "enabled" } else { "disabled" }
    );
    println!("  time:       {}", schedule.time);
    println!("  frequency:  {}", schedule.frequency.as_str());
    match schedule.next_run {
        Some(next) => println!("  next run:   {}", next),
        None => println!("  next run:   none"),
    }
    println!("  max jobs:   {}", schedule.run.max_postings);
    let sources: Vec<&str> = schedule.run.sources.iter().map(|s| s.as_str()).collect();
    println!("  sources:    {}", sources.join(", "));
    println!(
        "  channels:   blog={} telegram={} whatsapp={}",
        schedule.run.publish_blog, schedule.run.send_telegram, schedule.run.send_whatsapp
    );
    println!(
        "  shortener={} enhanced={}",
        schedule.run.use_shortener, schedule.run.enhanced_extraction
    );
}
