//! Domain models and value objects

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Identifier for a job listing source
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum SourceId {
    Wuzzuf,
    Indeed,
}

impl SourceId {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceId::Wuzzuf => "wuzzuf",
            SourceId::Indeed => "indeed",
        }
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SourceId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "wuzzuf" => Ok(SourceId::Wuzzuf),
            "indeed" => Ok(SourceId::Indeed),
            other => Err(format!("unknown source: {}", other)),
        }
    }
}

/// Which heading the extractor found the bulleted section under.
///
/// Priority order when several are present: Requirements > Skills >
/// Responsibilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionLabel {
    #[default]
    Requirements,
    Skills,
    Responsibilities,
}

impl SectionLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SectionLabel::Requirements => "Requirements",
            SectionLabel::Skills => "Skills",
            SectionLabel::Responsibilities => "Responsibilities",
        }
    }
}

/// One job listing extracted from a source search page.
///
/// Extractors guarantee `title` and `link` are non-empty; a card missing
/// either is dropped and counted, never returned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawPosting {
    /// Posting title
    pub title: String,
    /// Hiring company, when the card exposes one
    pub company: Option<String>,
    /// Location text as shown on the card
    pub location: String,
    /// Description text (detail page or card snippet)
    pub description: String,
    /// Bulleted requirement/skill strings
    pub requirements: Vec<String>,
    /// Which heading `requirements` came from
    #[serde(default)]
    pub section_label: SectionLabel,
    /// Skill badges, when the detail page exposes them
    #[serde(default)]
    pub skills: Vec<String>,
    /// Canonical posting URL; the natural key across all runs
    pub link: String,
    /// Source the posting came from
    pub source: SourceId,
    /// Search keyword that produced this posting
    pub keyword: String,
    /// Raw recency marker text (e.g. "2 hours ago"), if the card carried one
    pub posted: Option<String>,
}

/// Delivery state for a single publishing channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelStatus {
    #[default]
    NotAttempted,
    Sent,
    Failed,
}

/// Per-channel delivery outcomes for one posting
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PublishOutcome {
    pub blog: ChannelStatus,
    pub telegram: ChannelStatus,
    pub whatsapp: ChannelStatus,
}

/// A posting that passed filtering and deduplication.
///
/// Mutated only by the content generator and publishers (derived fields and
/// channel statuses); terminal once the run that created it ends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcceptedPosting {
    #[serde(flatten)]
    pub posting: RawPosting,
    /// URL-safe slug derived from the title
    pub slug: String,
    /// Link shown to end users: verified blog URL when available, otherwise
    /// the source link, shortened when the shortener is enabled
    pub canonical_link: String,
    /// Shortened form of the canonical link, when shortening succeeded
    pub short_link: Option<String>,
    /// Verified content-host URL, when the blog publish succeeded
    pub hosted_url: Option<String>,
    #[serde(default)]
    pub outcome: PublishOutcome,
    #[serde(with = "time::serde::rfc3339")]
    pub accepted_at: OffsetDateTime,
}

/// A publishing channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Blog,
    Telegram,
    WhatsApp,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Blog => "blog",
            Channel::Telegram => "telegram",
            Channel::WhatsApp => "whatsapp",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration for one pipeline run; immutable for its duration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Stop accepting once this many postings were accepted
    #[serde(default = "default_max_postings")]
    pub max_postings: usize,
    /// Sources to extract from, in order
    #[serde(default = "default_sources")]
    pub sources: Vec<SourceId>,
    #[serde(default)]
    pub publish_blog: bool,
    #[serde(default)]
    pub send_telegram: bool,
    #[serde(default)]
    pub send_whatsapp: bool,
    /// Shorten the canonical link before broadcasting
    #[serde(default = "default_true")]
    pub use_shortener: bool,
    /// Fetch detail pages for requirements/skills instead of card snippets
    #[serde(default)]
    pub enhanced_extraction: bool,
}

fn default_max_postings() -> usize {
    6
}

fn default_sources() -> Vec<SourceId> {
    vec![SourceId::Wuzzuf, SourceId::Indeed]
}

fn default_true() -> bool {
    true
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_postings: default_max_postings(),
            sources: default_sources(),
            publish_blog: false,
            send_telegram: false,
            send_whatsapp: false,
            use_shortener: default_true(),
            enhanced_extraction: false,
        }
    }
}

/// Reason a card or posting was not accepted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NoKeywordMatch,
    WrongLocale,
    NotRecent,
    Duplicate,
    MissingLink,
    MissingTitle,
    ParseError,
    QuotaReached,
    VarietySkip,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::NoKeywordMatch => "no_keyword_match",
            SkipReason::WrongLocale => "wrong_locale",
            SkipReason::NotRecent => "not_recent",
            SkipReason::Duplicate => "duplicate",
            SkipReason::MissingLink => "missing_link",
            SkipReason::MissingTitle => "missing_title",
            SkipReason::ParseError => "parse_error",
            SkipReason::QuotaReached => "quota_reached",
            SkipReason::VarietySkip => "variety_skip",
        }
    }
}

/// Skip counters, one per reason
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkipCounts {
    #[serde(default)]
    pub no_keyword_match: u32,
    #[serde(default)]
    pub wrong_locale: u32,
    #[serde(default)]
    pub not_recent: u32,
    #[serde(default)]
    pub duplicate: u32,
    #[serde(default)]
    pub missing_link: u32,
    #[serde(default)]
    pub missing_title: u32,
    #[serde(default)]
    pub parse_error: u32,
    #[serde(default)]
    pub quota_reached: u32,
    #[serde(default)]
    pub variety_skip: u32,
}

impl SkipCounts {
    pub fn bump(&mut self, reason: SkipReason) {
        self.add(reason, 1);
    }

    pub fn add(&mut self, reason: SkipReason, count: u32) {
        let slot = match reason {
            SkipReason::NoKeywordMatch => &mut self.no_keyword_match,
            SkipReason::WrongLocale => &mut self.wrong_locale,
            SkipReason::NotRecent => &mut self.not_recent,
            SkipReason::Duplicate => &mut self.duplicate,
            SkipReason::MissingLink => &mut self.missing_link,
            SkipReason::MissingTitle => &mut self.missing_title,
            SkipReason::ParseError => &mut self.parse_error,
            SkipReason::QuotaReached => &mut self.quota_reached,
            SkipReason::VarietySkip => &mut self.variety_skip,
        };
        *slot = slot.saturating_add(count);
    }

    pub fn total(&self) -> u32 {
        self.no_keyword_match
            + self.wrong_locale
            + self.not_recent
            + self.duplicate
            + self.missing_link
            + self.missing_title
            + self.parse_error
            + self.quota_reached
            + self.variety_skip
    }

    pub fn merge(&mut self, other: &SkipCounts) {
        self.no_keyword_match += other.no_keyword_match;
        self.wrong_locale += other.wrong_locale;
        self.not_recent += other.not_recent;
        self.duplicate += other.duplicate;
        self.missing_link += other.missing_link;
        self.missing_title += other.missing_title;
        self.parse_error += other.parse_error;
        self.quota_reached += other.quota_reached;
        self.variety_skip += other.variety_skip;
    }
}

/// Per-source accounting for one run.
///
/// Invariant: `accepted + skips.total() == found` once the source finishes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceTally {
    /// Cards seen on search pages, parseable or not
    pub found: u32,
    pub accepted: u32,
    #[serde(default)]
    pub skips: SkipCounts,
}

impl SourceTally {
    pub fn skipped(&self) -> u32 {
        self.skips.total()
    }
}

/// Per-channel send counters
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ChannelSends {
    #[serde(default)]
    pub blog: u32,
    #[serde(default)]
    pub telegram: u32,
    #[serde(default)]
    pub whatsapp: u32,
}

impl ChannelSends {
    pub fn bump(&mut self, channel: Channel) {
        match channel {
            Channel::Blog => self.blog += 1,
            Channel::Telegram => self.telegram += 1,
            Channel::WhatsApp => self.whatsapp += 1,
        }
    }

    pub fn merge(&mut self, other: &ChannelSends) {
        self.blog += other.blog;
        self.telegram += other.telegram;
        self.whatsapp += other.whatsapp;
    }
}

/// Statistics for one run, owned by the coordinator until the run ends
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunStats {
    #[serde(default)]
    pub sources: BTreeMap<SourceId, SourceTally>,
    #[serde(default)]
    pub channel_sends: ChannelSends,
    #[serde(default)]
    pub stopped_by_user: bool,
    #[serde(default)]
    pub duration_secs: f64,
}

impl RunStats {
    pub fn tally_mut(&mut self, source: SourceId) -> &mut SourceTally {
        self.sources.entry(source).or_default()
    }

    pub fn total_found(&self) -> u32 {
        self.sources.values().map(|t| t.found).sum()
    }

    pub fn total_accepted(&self) -> u32 {
        self.sources.values().map(|t| t.accepted).sum()
    }

    pub fn total_skipped(&self) -> u32 {
        self.sources.values().map(|t| t.skipped()).sum()
    }

    pub fn skip_totals(&self) -> SkipCounts {
        let mut totals = SkipCounts::default();
        for tally in self.sources.values() {
            totals.merge(&tally.skips);
        }
        totals
    }
}

/// Persisted summary of a finished run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub started_at: OffsetDateTime,
    pub stats: RunStats,
}

/// How often the scheduler fires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    Hourly,
    Daily,
    Weekly,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Hourly => "hourly",
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
        }
    }
}

impl std::str::FromStr for Frequency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "hourly" => Ok(Frequency::Hourly),
            "daily" => Ok(Frequency::Daily),
            "weekly" => Ok(Frequency::Weekly),
            other => Err(format!("unknown frequency: {}", other)),
        }
    }
}

/// Recurring-run configuration, stored under the `schedule` settings key
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Time of day as "HH:MM" (the minute alone matters for hourly runs)
    #[serde(default = "default_schedule_time")]
    pub time: String,
    #[serde(default = "default_frequency")]
    pub frequency: Frequency,
    #[serde(flatten)]
    pub run: RunConfig,
    /// Computed at save time; informational for the control surface
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub next_run: Option<OffsetDateTime>,
}

fn default_schedule_time() -> String {
    "10:00".to_string()
}

fn default_frequency() -> Frequency {
    Frequency::Daily
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            time: default_schedule_time(),
            frequency: default_frequency(),
            run: RunConfig::default(),
            next_run: None,
        }
    }
}

impl ScheduleConfig {
    /// Parse the configured "HH:MM" time of day
    pub fn time_of_day(&self) -> Option<(u8, u8)> {
        let (hour, minute) = self.time.split_once(':')?;
        let hour: u8 = hour.trim().parse().ok()?;
        let minute: u8 = minute.trim().parse().ok()?;
        if hour > 23 || minute > 59 {
            return None;
        }
        Some((hour, minute))
    }
}

/// Publishable content for one accepted posting.
///
/// `broadcast_text` is finalized only after the blog publish decides the
/// canonical link; the document does not depend on it.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub title: String,
    pub broadcast_text: String,
    pub document_html: String,
}

/// Aggregation window for run summaries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryRange {
    Today,
    Week,
    Month,
}

impl std::str::FromStr for SummaryRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "today" => Ok(SummaryRange::Today),
            "week" => Ok(SummaryRange::Week),
            "month" => Ok(SummaryRange::Month),
            other => Err(format!("unknown summary range: {}", other)),
        }
    }
}

/// Aggregated run statistics over a [`SummaryRange`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSummary {
    pub runs: u32,
    pub found: u32,
    pub accepted: u32,
    pub skips: SkipCounts,
    pub channel_sends: ChannelSends,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub last_run: Option<OffsetDateTime>,
}
