//! Configuration loading and management

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub filter: FilterConfig,

    #[serde(default)]
    pub sources: SourcesConfig,

    #[serde(default)]
    pub content: ContentConfig,

    #[serde(default)]
    pub blog: BlogConfig,

    #[serde(default)]
    pub telegram: TelegramConfig,

    #[serde(default)]
    pub whatsapp: WhatsAppConfig,

    #[serde(default)]
    pub shortener: ShortenerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_state_db_path")]
    pub state_db_path: PathBuf,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Default posting ceiling for a run
    #[serde(default = "default_max_postings")]
    pub max_postings: usize,

    /// How many historical links seed the in-process dedup set
    #[serde(default = "default_dedup_seed_limit")]
    pub dedup_seed_limit: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Extra keyword entries merged over the built-in table
    #[serde(default)]
    pub keywords: Vec<KeywordConfig>,

    /// Replace the built-in keyword table instead of extending it
    #[serde(default)]
    pub replace_keywords: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordConfig {
    pub keyword: String,
    #[serde(default)]
    pub variants: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesConfig {
    #[serde(default)]
    pub wuzzuf: SourceConfig,

    #[serde(default)]
    pub indeed: SourceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Override the site base URL (used in tests)
    #[serde(default)]
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentConfig {
    /// Static WhatsApp channel-promotion link for broadcast messages
    #[serde(default)]
    pub promo_whatsapp: String,

    /// Static Telegram channel-promotion link for broadcast messages
    #[serde(default)]
    pub promo_telegram: String,

    #[serde(default = "default_max_requirements")]
    pub max_requirements: usize,

    /// Directory scanned for keyword header images
    #[serde(default)]
    pub assets_dir: Option<PathBuf>,

    /// Public base URL the asset file names resolve under
    #[serde(default)]
    pub asset_base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlogConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub blog_id: String,

    #[serde(default = "default_blog_token_env")]
    pub token_env: String,

    #[serde(default = "default_verify_attempts")]
    pub verify_attempts: u32,

    #[serde(default = "default_verify_delay_secs")]
    pub verify_delay_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_telegram_token_env")]
    pub bot_token_env: String,

    /// Channel id, e.g. "@my_channel" or "-100123456789"
    #[serde(default)]
    pub chat_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhatsAppConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_whatsapp_token_env")]
    pub api_token_env: String,

    #[serde(default)]
    pub phone_number_id: String,

    #[serde(default)]
    pub recipient: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShortenerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_shortener_token_env")]
    pub api_token_env: String,

    #[serde(default = "default_passthrough_domains")]
    pub passthrough_domains: Vec<String>,
}

// Default value functions

fn default_state_db_path() -> PathBuf {
    PathBuf::from("./jobcast.sqlite")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_postings() -> usize {
    6
}

fn default_dedup_seed_limit() -> u32 {
    5000
}

fn default_true() -> bool {
    true
}

fn default_max_requirements() -> usize {
    6
}

fn default_blog_token_env() -> String {
    "JOBCAST_BLOG_TOKEN".to_string()
}

fn default_verify_attempts() -> u32 {
    3
}

fn default_verify_delay_secs() -> u64 {
    2
}

fn default_telegram_token_env() -> String {
    "JOBCAST_TELEGRAM_BOT_TOKEN".to_string()
}

fn default_whatsapp_token_env() -> String {
    "JOBCAST_WHATSAPP_TOKEN".to_string()
}

fn default_shortener_token_env() -> String {
    "JOBCAST_TINYURL_TOKEN".to_string()
}

fn default_passthrough_domains() -> Vec<String> {
    vec!["indeed.com".to_string()]
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            state_db_path: default_state_db_path(),
            log_level: default_log_level(),
            max_postings: default_max_postings(),
            dedup_seed_limit: default_dedup_seed_limit(),
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            base_url: None,
        }
    }
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            wuzzuf: SourceConfig::default(),
            indeed: SourceConfig::default(),
        }
    }
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            promo_whatsapp: String::new(),
            promo_telegram: String::new(),
            max_requirements: default_max_requirements(),
            assets_dir: None,
            asset_base_url: String::new(),
        }
    }
}

impl Default for BlogConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            blog_id: String::new(),
            token_env: default_blog_token_env(),
            verify_attempts: default_verify_attempts(),
            verify_delay_secs: default_verify_delay_secs(),
        }
    }
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bot_token_env: default_telegram_token_env(),
            chat_id: String::new(),
        }
    }
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_token_env: default_whatsapp_token_env(),
            phone_number_id: String::new(),
            recipient: String::new(),
        }
    }
}

impl Default for ShortenerConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            api_token_env: default_shortener_token_env(),
            passthrough_domains: default_passthrough_domains(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file and environment
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        let default_path = PathBuf::from("./config.toml");
        let path = config_path.unwrap_or(&default_path);

        if path.exists() {
            builder = builder.add_source(config::File::from(path));
        } else if config_path.is_some() {
            anyhow::bail!("Config file not found: {}", path.display());
        }

        builder = builder.add_source(
            config::Environment::with_prefix("JOBCAST")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Generate example configuration as TOML string
    pub fn example_toml() -> String {
        r#"# jobcast configuration

[general]
state_db_path = "./jobcast.sqlite"
log_level = "info"
max_postings = 6
dedup_seed_limit = 5000

[filter]
# Extra keyword entries merged over the built-in table.
# replace_keywords = true replaces the table entirely.
# [[filter.keywords]]
# keyword = "Rust"
# variants = ["rustacean", "systems programming"]

[sources.wuzzuf]
enabled = true

[sources.indeed]
enabled = true

[content]
promo_whatsapp = ""
promo_telegram = ""
max_requirements = 6
# assets_dir = "./assets"
# asset_base_url = "https://example.com/assets"

[blog]
enabled = false
blog_id = ""
token_env = "JOBCAST_BLOG_TOKEN"
verify_attempts = 3
verify_delay_secs = 2

[telegram]
enabled = false
bot_token_env = "JOBCAST_TELEGRAM_BOT_TOKEN"
chat_id = "@your_channel"

[whatsapp]
enabled = false
api_token_env = "JOBCAST_WHATSAPP_TOKEN"
phone_number_id = ""
recipient = ""

[shortener]
enabled = true
api_token_env = "JOBCAST_TINYURL_TOKEN"
passthrough_domains = ["indeed.com"]
"#
        .to_string()
    }
}
