//! Port definitions (traits) for external dependencies
//!
//! These traits define the boundaries between the domain and external systems.
//! Adapters implement these traits to connect to real infrastructure.

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;

use crate::model::{
    AcceptedPosting, Artifact, Channel, RunRecord, RunStats, ScheduleConfig, SourceId,
};

/// Error type for source extraction
#[derive(Debug, Error)]
pub enum SourceError {
    /// The source could not be reached or refused to serve the search page.
    /// Recoverable: the run continues with the remaining sources.
    #[error("source unavailable: {0}")]
    Unavailable(String),
    #[error("rate limited")]
    RateLimited,
}

/// Cards an extractor saw but could not turn into a [`RawPosting`]
///
/// [`RawPosting`]: crate::model::RawPosting
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractionSkips {
    pub missing_link: u32,
    pub missing_title: u32,
    pub parse_error: u32,
}

impl ExtractionSkips {
    pub fn total(&self) -> u32 {
        self.missing_link + self.missing_title + self.parse_error
    }
}

/// Result of one search-page extraction.
///
/// A partially parseable page is not an error: whatever parsed is in
/// `postings` and the rest is accounted for in `skipped`, so
/// `postings.len() + skipped.total() == cards_seen`.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub postings: Vec<crate::model::RawPosting>,
    pub cards_seen: u32,
    pub skipped: ExtractionSkips,
}

/// Per-fetch extraction options, taken from the active [`RunConfig`]
///
/// [`RunConfig`]: crate::model::RunConfig
#[derive(Debug, Clone, Copy)]
pub struct FetchOptions {
    /// Upper bound on postings worth returning for this query
    pub limit: usize,
    /// Fetch detail pages for requirements/skills instead of card snippets
    pub enhanced: bool,
}

/// Port for extracting postings from one listing site
#[async_trait]
pub trait JobSource: Send + Sync {
    /// Fetch postings matching a search keyword
    async fn fetch(&self, query: &str, options: &FetchOptions)
    -> Result<Extraction, SourceError>;

    /// Which source this adapter extracts from
    fn id(&self) -> SourceId;
}

/// Error type for durable store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(String),
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Log severity for entries persisted via [`PostingStore::append_log`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Info => "info",
            LogLevel::Warning => "warning",
            LogLevel::Error => "error",
        }
    }
}

/// Port for the durable store: posting history, settings, and run logs
#[async_trait]
pub trait PostingStore: Send + Sync {
    /// Whether a posting with this canonical link was ever accepted
    async fn link_exists(&self, link: &str) -> Result<bool, StoreError>;

    /// Persist an accepted posting
    async fn insert_posting(&self, posting: &AcceptedPosting) -> Result<(), StoreError>;

    /// Most recently accepted links, newest first, for seeding the dedup set
    async fn recent_links(&self, limit: u32) -> Result<Vec<String>, StoreError>;

    async fn get_setting(&self, key: &str) -> Result<Option<serde_json::Value>, StoreError>;

    async fn put_setting(&self, key: &str, value: &serde_json::Value) -> Result<(), StoreError>;

    /// Append a structured log entry
    async fn append_log(
        &self,
        level: LogLevel,
        message: &str,
        metadata: serde_json::Value,
    ) -> Result<(), StoreError>;

    /// Persist the final statistics of a finished run
    async fn record_run(
        &self,
        started_at: OffsetDateTime,
        stats: &RunStats,
    ) -> Result<(), StoreError>;

    /// Finished runs, newest first
    async fn run_history(&self, limit: u32) -> Result<Vec<RunRecord>, StoreError>;
}

/// Settings key the schedule configuration is stored under
pub const SCHEDULE_SETTING_KEY: &str = "schedule";

/// Read the stored [`ScheduleConfig`], falling back to defaults when unset
pub async fn load_schedule(store: &dyn PostingStore) -> Result<ScheduleConfig, StoreError> {
    match store.get_setting(SCHEDULE_SETTING_KEY).await? {
        Some(value) => {
            serde_json::from_value(value).map_err(|e| StoreError::Serialization(e.to_string()))
        }
        None => Ok(ScheduleConfig::default()),
    }
}

/// Error type for publisher operations
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("API error: {0}")]
    Api(String),
    #[error("rate limited")]
    RateLimited,
    #[error("authentication failed: {0}")]
    Auth(String),
    /// The content host accepted the post but the published URL never
    /// became reachable within the retry budget.
    #[error("published URL never became reachable: {url}")]
    VerificationFailed { url: String },
}

/// Result of a successful publish operation
#[derive(Debug, Clone)]
pub struct ChannelPost {
    /// Link to the published content, when the channel produces one
    pub link: Option<String>,
}

/// Port for publishing an artifact to one channel.
///
/// A broadcast channel reads `artifact.broadcast_text`; the content host
/// reads `artifact.title` and `artifact.document_html`. Failure on one
/// channel never blocks the others.
#[async_trait]
pub trait ChannelPublisher: Send + Sync {
    async fn publish(&self, artifact: &Artifact) -> Result<ChannelPost, PublishError>;

    /// Whether this publisher is configured to actually send
    fn is_enabled(&self) -> bool;

    fn channel(&self) -> Channel;
}

/// Error type for the URL shortener
#[derive(Debug, Error)]
pub enum ShortenError {
    #[error("API error: {0}")]
    Api(String),
    #[error("network error: {0}")]
    Network(String),
}

/// Port for the best-effort link shortener.
///
/// Callers fall back to the original URL on any error; an adapter must
/// return pass-through domains unchanged without a network round-trip.
#[async_trait]
pub trait Shortener: Send + Sync {
    async fn shorten(&self, url: &str) -> Result<String, ShortenError>;
}

/// Port for time/clock operations (enables deterministic testing)
pub trait Clock: Send + Sync {
    /// Get the current time
    fn now(&self) -> OffsetDateTime;
}

/// Real clock implementation
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}
