//! CLI argument definitions

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// jobcast: aggregate job postings, filter and deduplicate them, and publish
/// to a blog and chat channels
#[derive(Parser, Debug)]
#[command(name = "jobcast")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Execute one pipeline run and print its statistics
    Run(RunArgs),

    /// Start the scheduler and run on the stored schedule
    Watch(WatchArgs),

    /// Show or change the stored schedule
    Schedule(ScheduleArgs),

    /// List recent runs
    History(HistoryArgs),

    /// Aggregate run statistics over a time range
    Summary(SummaryArgs),

    /// Configuration management
    Config(ConfigArgs),
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Posting ceiling for this run (defaults to the configured value)
    #[arg(long)]
    pub max_jobs: Option<usize>,

    /// Restrict extraction to these sources (wuzzuf, indeed); repeatable
    #[arg(long = "source")]
    pub sources: Vec<String>,

    /// Publish each posting's document to the blog
    #[arg(long)]
    pub publish_blog: bool,

    /// Send each posting's broadcast message to Telegram
    #[arg(long)]
    pub send_telegram: bool,

    /// Send each posting's broadcast message to WhatsApp
    #[arg(long)]
    pub send_whatsapp: bool,

    /// Keep full links instead of shortening them
    #[arg(long)]
    pub no_shorten: bool,

    /// Fetch detail pages for requirements and skills
    #[arg(long)]
    pub enhanced: bool,

    /// Output final statistics as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct WatchArgs {}

#[derive(Args, Debug)]
pub struct ScheduleArgs {
    #[command(subcommand)]
    pub command: ScheduleCommands,
}

#[derive(Subcommand, Debug)]
pub enum ScheduleCommands {
    /// Show the stored schedule and its next run time
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Save a new schedule and recompute the next run time
    Set(ScheduleSetArgs),
}

#[derive(Args, Debug)]
pub struct ScheduleSetArgs {
    /// Enable the schedule
    #[arg(long, conflicts_with = "disable")]
    pub enable: bool,

    /// Disable the schedule
    #[arg(long)]
    pub disable: bool,

    /// Time of day as HH:MM
    #[arg(long)]
    pub at: Option<String>,

    /// hourly, daily, or weekly
    #[arg(long)]
    pub frequency: Option<String>,

    /// Posting ceiling for scheduled runs
    #[arg(long)]
    pub max_jobs: Option<usize>,

    /// Sources for scheduled runs (wuzzuf, indeed); repeatable
    #[arg(long = "source")]
    pub sources: Vec<String>,

    /// Publish to the blog on scheduled runs (true/false)
    #[arg(long, num_args = 1)]
    pub publish_blog: Option<bool>,

    /// Send to Telegram on scheduled runs (true/false)
    #[arg(long, num_args = 1)]
    pub send_telegram: Option<bool>,

    /// Send to WhatsApp on scheduled runs (true/false)
    #[arg(long, num_args = 1)]
    pub send_whatsapp: Option<bool>,

    /// Shorten links on scheduled runs (true/false)
    #[arg(long, num_args = 1)]
    pub use_shortener: Option<bool>,

    /// Fetch detail pages on scheduled runs (true/false)
    #[arg(long, num_args = 1)]
    pub enhanced: Option<bool>,
}

#[derive(Args, Debug)]
pub struct HistoryArgs {
    /// Maximum number of runs to list
    #[arg(long, default_value_t = 20)]
    pub limit: u32,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct SummaryArgs {
    /// today, week, or month
    #[arg(long, default_value = "today")]
    pub range: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Generate example configuration file
    Init {
        /// Path to write config file
        #[arg(long, default_value = "./config.toml")]
        path: PathBuf,

        /// Overwrite existing file
        #[arg(long)]
        force: bool,
    },
}
