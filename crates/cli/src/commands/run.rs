//! Run command - execute one pipeline run

use anyhow::{Context, Result, bail};
use jobcast_adapters::{
    blog::BlogPublisher,
    shortener::TinyUrlShortener,
    sources::{IndeedSource, WuzzufSource},
    store::SqlitePostingStore,
    telegram::TelegramPublisher,
    whatsapp::WhatsAppPublisher,
};
use jobcast_domain::{
    ChannelPublisher, Clock, JobSource, PostingStore, RunConfig, RunStats, Shortener, SourceId,
    SystemClock,
    filter::{KeywordEntry, KeywordTable, LocaleRule, PostingFilter},
    usecases::{AssetCatalog, Pipeline, RenderConfig, Renderer, RunCoordinator, Scheduler},
};
use secrecy::SecretString;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::args::RunArgs;
use crate::config::{AppConfig, ContentConfig};

pub async fn execute(args: RunArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = AppConfig::load(config_path.as_deref())?;
    let (coordinator, _scheduler) = build_stack(&config).await?;

    let run_config = run_config_from(&config, &args)?;
    tracing::info!(
        max_postings = run_config.max_postings,
        sources = ?run_config.sources,
        publish_blog = run_config.publish_blog,
        send_telegram = run_config.send_telegram,
        send_whatsapp = run_config.send_whatsapp,
        "Starting run"
    );

    let stats = coordinator.run_once(run_config).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        print_stats(&stats);
    }

    Ok(())
}

/// Build the full adapter stack behind a coordinator and scheduler
pub(crate) async fn build_stack(config: &AppConfig) -> Result<(RunCoordinator, Scheduler)> {
    let store: Arc<dyn PostingStore> = Arc::new(
        SqlitePostingStore::new(&config.general.state_db_path)
            .await
            .context("Failed to initialize SQLite posting store")?,
    );

    let mut sources: Vec<Arc<dyn JobSource>> = Vec::new();
    if config.sources.wuzzuf.enabled {
        sources.push(Arc::new(match &config.sources.wuzzuf.base_url {
            Some(base) => WuzzufSource::with_base_url(base),
            None => WuzzufSource::new(),
        }));
    }
    if config.sources.indeed.enabled {
        sources.push(Arc::new(match &config.sources.indeed.base_url {
            Some(base) => IndeedSource::with_base_url(base),
            None => IndeedSource::new(),
        }));
    }
    if sources.is_empty() {
        bail!("No sources enabled in configuration");
    }

    let blog: Arc<dyn ChannelPublisher> = Arc::new(build_blog_publisher(config)?);
    let telegram: Arc<dyn ChannelPublisher> = Arc::new(build_telegram_publisher(config)?);
    let whatsapp: Arc<dyn ChannelPublisher> = Arc::new(build_whatsapp_publisher(config)?);
    let shortener: Arc<dyn Shortener> = Arc::new(build_shortener(config));

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let filter = PostingFilter::new(build_keyword_table(config), LocaleRule::egypt());
    let renderer = Renderer::new(RenderConfig {
        promo_whatsapp: config.content.promo_whatsapp.clone(),
        promo_telegram: config.content.promo_telegram.clone(),
        max_requirements: config.content.max_requirements,
        assets: build_asset_catalog(&config.content),
        ..Default::default()
    });

    let pipeline = Pipeline::new(
        sources,
        Arc::clone(&store),
        blog,
        telegram,
        whatsapp,
        shortener,
        Arc::clone(&clock),
        filter,
        renderer,
        config.general.dedup_seed_limit,
    );

    let coordinator = RunCoordinator::new(pipeline, Arc::clone(&store), Arc::clone(&clock));
    let scheduler = Scheduler::new(coordinator.clone(), store, clock);

    Ok((coordinator, scheduler))
}

pub(crate) fn load_api_key(env_var: &str, purpose: &str) -> Result<SecretString> {
    std::env::var(env_var)
        .map(|value| SecretString::new(value.into()))
        .with_context(|| format!("Missing {} token: set {}", purpose, env_var))
}

fn build_blog_publisher(config: &AppConfig) -> Result<BlogPublisher> {
    if !config.blog.enabled {
        return Ok(BlogPublisher::disabled());
    }
    if config.blog.blog_id.is_empty() {
        bail!("Blog publishing enabled but blog_id is not set");
    }
    let token = load_api_key(&config.blog.token_env, "blog")?;
    Ok(BlogPublisher::with_base_url(
        token,
        "https://blogger.googleapis.com".to_string(),
        config.blog.blog_id.clone(),
        config.blog.verify_attempts,
        Duration::from_secs(config.blog.verify_delay_secs),
        true,
    ))
}

fn build_telegram_publisher(config: &AppConfig) -> Result<TelegramPublisher> {
    if !config.telegram.enabled {
        return Ok(TelegramPublisher::disabled());
    }
    if config.telegram.chat_id.is_empty() {
        bail!("Telegram enabled but chat_id is not set");
    }
    let token = load_api_key(&config.telegram.bot_token_env, "telegram")?;
    Ok(TelegramPublisher::new(token, config.telegram.chat_id.clone()))
}

fn build_whatsapp_publisher(config: &AppConfig) -> Result<WhatsAppPublisher> {
    if !config.whatsapp.enabled {
        return Ok(WhatsAppPublisher::disabled());
    }
    if config.whatsapp.phone_number_id.is_empty() || config.whatsapp.recipient.is_empty() {
        bail!("WhatsApp enabled but phone_number_id or recipient is not set");
    }
    let token = load_api_key(&config.whatsapp.api_token_env, "whatsapp")?;
    Ok(WhatsAppPublisher::new(
        token,
        config.whatsapp.phone_number_id.clone(),
        config.whatsapp.recipient.clone(),
    ))
}

/// Shortening is best-effort all the way down: a missing token only
/// degrades runs that actually ask for shortening.
fn build_shortener(config: &AppConfig) -> TinyUrlShortener {
    let token = if config.shortener.enabled {
        match load_api_key(&config.shortener.api_token_env, "shortener") {
            Ok(token) => token,
            Err(error) => {
                tracing::warn!(%error, "Shortener token missing, shortening will fall back");
                SecretString::new("".into())
            }
        }
    } else {
        SecretString::new("".into())
    };
    TinyUrlShortener::new(token, config.shortener.passthrough_domains.clone())
}

fn build_keyword_table(config: &AppConfig) -> KeywordTable {
    let configured: Vec<KeywordEntry> = config
        .filter
        .keywords
        .iter()
        .map(|entry| {
            let variants: Vec<&str> = entry.variants.iter().map(String::as_str).collect();
            KeywordEntry::new(entry.keyword.clone(), &variants)
        })
        .collect();

    if config.filter.replace_keywords && !configured.is_empty() {
        return KeywordTable::new(configured);
    }

    let mut table = KeywordTable::default_table();
    table.extend(configured);
    table
}

fn build_asset_catalog(content: &ContentConfig) -> AssetCatalog {
    let Some(dir) = &content.assets_dir else {
        return AssetCatalog::empty();
    };

    let mut files = Vec::new();
    match std::fs::read_dir(dir) {
        Ok(entries) => {
            for entry in entries.flatten() {
                let name = entry.file_name().to_string_lossy().to_string();
                let extension = name.rsplit('.').next().unwrap_or("").to_lowercase();
                if matches!(extension.as_str(), "png" | "jpg" | "jpeg" | "gif" | "webp") {
                    files.push(name);
                }
            }
        }
        Err(error) => {
            tracing::debug!(%error, dir = %dir.display(), "Assets directory not readable");
        }
    }
    files.sort();

    AssetCatalog::new(content.asset_base_url.clone(), files)
}

pub(crate) fn parse_sources(raw: &[String]) -> Result<Vec<SourceId>> {
    raw.iter()
        .map(|value| {
            value
                .parse::<SourceId>()
                .map_err(|e| anyhow::anyhow!("{} (expected wuzzuf or indeed)", e))
        })
        .collect()
}

fn run_config_from(config: &AppConfig, args: &RunArgs) -> Result<RunConfig> {
    let sources = if args.sources.is_empty() {
        let mut enabled = Vec::new();
        if config.sources.wuzzuf.enabled {
            enabled.push(SourceId::Wuzzuf);
        }
        if config.sources.indeed.enabled {
            enabled.push(SourceId::Indeed);
        }
        enabled
    } else {
        parse_sources(&args.sources)?
    };

    Ok(RunConfig {
        max_postings: args.max_jobs.unwrap_or(config.general.max_postings),
        sources,
        publish_blog: args.publish_blog,
        send_telegram: args.send_telegram,
        send_whatsapp: args.send_whatsapp,
        use_shortener: config.shortener.enabled && !args.no_shorten,
        enhanced_extraction: args.enhanced,
    })
}

pub(crate) fn print_stats(stats: &RunStats) {
    println!("Run finished in {:.1}s", stats.duration_secs);
    if stats.stopped_by_user {
        println!("Stopped by user before completion");
    }

    println!("{:<10} {:>6} {:>9} {:>8}", "source", "found", "accepted", "skipped");
    for (source, tally) in &stats.sources {
        println!(
            "{:<10} {:>6} {:>9} {:>8}",
            source.as_str(),
            tally.found,
            tally.accepted,
            tally.skipped()
        );
    }

    let skips = stats.skip_totals();
    let reasons: Vec<(&str, u32)> = vec![
        ("no_keyword_match", skips.no_keyword_match),
        ("wrong_locale", skips.wrong_locale),
        ("not_recent", skips.not_recent),
        ("duplicate", skips.duplicate),
        ("missing_link", skips.missing_link),
        ("missing_title", skips.missing_title),
        ("parse_error", skips.parse_error),
        ("quota_reached", skips.quota_reached),
        ("variety_skip", skips.variety_skip),
    ];
    let listed: Vec<String> = reasons
        .into_iter()
        .filter(|(_, count)| *count > 0)
        .map(|(name, count)| format!("{} {}", name, count))
        .collect();
    if !listed.is_empty() {
        println!("Skip reasons: {}", listed.join(", "));
    }

    println!(
        "Channel sends: blog {}, telegram {}, whatsapp {}",
        stats.channel_sends.blog, stats.channel_sends.telegram, stats.channel_sends.whatsapp
    );
}
