//! Pipeline use case - one extraction → filter → dedup → publish pass
//!
//! Sources are processed sequentially and one accepted posting per keyword
//! keeps the output varied. Whenever a keyword's card list is cut short
//! (quota hit, variety rule, stop request) the remaining cards are counted
//! under a skip reason so per-source accounting stays conservative:
//! `accepted + skips == found`.

use std::sync::Arc;

use crate::filter::{FilterVerdict, PostingFilter};
use crate::model::{
    AcceptedPosting, Artifact, Channel, ChannelStatus, PublishOutcome, RawPosting, RunConfig,
    RunStats, SkipReason,
};
use crate::ports::{
    ChannelPublisher, Clock, FetchOptions, JobSource, LogLevel, PostingStore, Shortener,
    StoreError,
};
use crate::usecases::coordinator::RunState;
use crate::usecases::dedup::DedupGate;
use crate::usecases::render::{Renderer, make_slug};

/// Errors fatal to a whole run
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    /// The durable store was unavailable at run start or run end; the run
    /// aborts cleanly and the coordinator returns to Idle.
    #[error("durable store unavailable: {0}")]
    Store(#[from] StoreError),
}

/// One pipeline execution over all configured sources
#[derive(Clone)]
pub struct Pipeline {
    sources: Vec<Arc<dyn JobSource>>,
    store: Arc<dyn PostingStore>,
    blog: Arc<dyn ChannelPublisher>,
    telegram: Arc<dyn ChannelPublisher>,
    whatsapp: Arc<dyn ChannelPublisher>,
    shortener: Arc<dyn Shortener>,
    clock: Arc<dyn Clock>,
    filter: PostingFilter,
    renderer: Renderer,
    dedup_seed_limit: u32,
}

impl Pipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        sources: Vec<Arc<dyn JobSource>>,
        store: Arc<dyn PostingStore>,
        blog: Arc<dyn ChannelPublisher>,
        telegram: Arc<dyn ChannelPublisher>,
        whatsapp: Arc<dyn ChannelPublisher>,
        shortener: Arc<dyn Shortener>,
        clock: Arc<dyn Clock>,
        filter: PostingFilter,
        renderer: Renderer,
        dedup_seed_limit: u32,
    ) -> Self {
        Self {
            sources,
            store,
            blog,
            telegram,
            whatsapp,
            shortener,
            clock,
            filter,
            renderer,
            dedup_seed_limit,
        }
    }

    /// Execute one run. The stop flag on `state` is consulted once per
    /// posting; mid-extraction and mid-publish work always completes.
    pub async fn execute(
        &self,
        config: &RunConfig,
        state: &RunState,
    ) -> Result<RunStats, RunError> {
        let started = std::time::Instant::now();
        let mut stats = RunStats::default();

        let dedup = DedupGate::seed(Arc::clone(&self.store), self.dedup_seed_limit).await?;

        let keywords: Vec<String> = self.filter.keywords.keywords().map(String::from).collect();
        let options = FetchOptions {
            limit: config.max_postings,
            enhanced: config.enhanced_extraction,
        };
        let mut accepted_total = 0usize;
        let mut stopped = false;

        'sources: for source in &self.sources {
            if !config.sources.contains(&source.id()) {
                continue;
            }
            let source_id = source.id();

            'keywords: for keyword in &keywords {
                if stopped || accepted_total >= config.max_postings {
                    break 'sources;
                }

                let extraction = match source.fetch(keyword, &options).await {
                    Ok(extraction) => extraction,
                    Err(error) => {
                        tracing::warn!(
                            source = %source_id,
                            keyword = %keyword,
                            %error,
                            "Source unavailable, continuing with remaining sources"
                        );
                        self.log_best_effort(
                            LogLevel::Warning,
                            &format!("Source {} unavailable: {}", source_id, error),
                            serde_json::json!({ "source": source_id.as_str() }),
                        )
                        .await;
                        continue 'sources;
                    }
                };

                {
                    let tally = stats.tally_mut(source_id);
                    tally.found += extraction.cards_seen;
                    tally
                        .skips
                        .add(SkipReason::MissingLink, extraction.skipped.missing_link);
                    tally
                        .skips
                        .add(SkipReason::MissingTitle, extraction.skipped.missing_title);
                    tally
                        .skips
                        .add(SkipReason::ParseError, extraction.skipped.parse_error);
                }
                if extraction.skipped.total() > 0 {
                    tracing::info!(
                        source = %source_id,
                        keyword = %keyword,
                        parsed = extraction.postings.len(),
                        unparsed = extraction.skipped.total(),
                        "Partial extraction"
                    );
                }

                let postings = extraction.postings;
                let total = postings.len();
                let mut accepted_for_keyword = false;

                for (index, posting) in postings.into_iter().enumerate() {
                    let remaining = (total - index) as u32;

                    if state.stop_requested() {
                        stats
                            .tally_mut(source_id)
                            .skips
                            .add(SkipReason::QuotaReached, remaining);
                        stopped = true;
                        break 'sources;
                    }
                    if accepted_total >= config.max_postings {
                        stats
                            .tally_mut(source_id)
                            .skips
                            .add(SkipReason::QuotaReached, remaining);
                        break 'sources;
                    }
                    if accepted_for_keyword {
                        stats
                            .tally_mut(source_id)
                            .skips
                            .add(SkipReason::VarietySkip, remaining);
                        continue 'keywords;
                    }

                    match self.filter.check(&posting) {
                        FilterVerdict::Rejected(reason) => {
                            tracing::debug!(
                                title = %posting.title,
                                reason = reason.as_str(),
                                "Posting skipped"
                            );
                            stats.tally_mut(source_id).skips.bump(reason);
                            continue;
                        }
                        FilterVerdict::Accepted => {}
                    }

                    if dedup.is_duplicate(&posting.link).await {
                        tracing::debug!(title = %posting.title, "Posting skipped, duplicate");
                        stats.tally_mut(source_id).skips.bump(SkipReason::Duplicate);
                        continue;
                    }

                    tracing::info!(
                        title = %posting.title,
                        source = %source_id,
                        keyword = %keyword,
                        "Posting accepted"
                    );

                    let accepted = self.publish_posting(posting, config, &mut stats).await;
                    dedup.mark_accepted(&accepted.posting.link);
                    if let Err(error) = self.store.insert_posting(&accepted).await {
                        tracing::warn!(
                            %error,
                            link = %accepted.posting.link,
                            "Failed to persist accepted posting"
                        );
                    }

                    stats.tally_mut(source_id).accepted += 1;
                    accepted_total += 1;
                    accepted_for_keyword = true;
                }
            }
        }

        if stopped {
            stats.stopped_by_user = true;
            tracing::info!(accepted = accepted_total, "Run stopped by user");
        }
        stats.duration_secs = started.elapsed().as_secs_f64();

        tracing::info!(
            found = stats.total_found(),
            accepted = stats.total_accepted(),
            skipped = stats.total_skipped(),
            duration_secs = stats.duration_secs,
            "Pipeline finished"
        );

        Ok(stats)
    }

    /// Render and fan out one accepted posting.
    ///
    /// Channel order matters: the blog publish decides the canonical link
    /// before the broadcast text is finalized. Failure on any channel is
    /// recorded and never blocks the others.
    async fn publish_posting(
        &self,
        posting: RawPosting,
        config: &RunConfig,
        stats: &mut RunStats,
    ) -> AcceptedPosting {
        let slug = make_slug(&posting.title);
        let document_html = self.renderer.render_document(&posting);
        let mut artifact = Artifact {
            title: posting.title.clone(),
            broadcast_text: String::new(),
            document_html,
        };

        let mut outcome = PublishOutcome::default();
        let mut hosted_url = None;

        if config.publish_blog && self.blog.is_enabled() {
            match self.blog.publish(&artifact).await {
                Ok(post) => {
                    outcome.blog = ChannelStatus::Sent;
                    stats.channel_sends.bump(Channel::Blog);
                    hosted_url = post.link;
                }
                Err(error) => {
                    outcome.blog = ChannelStatus::Failed;
                    tracing::warn!(
                        %error,
                        title = %posting.title,
                        "Blog publish failed, falling back to source link"
                    );
                }
            }
        }

        // Canonical link precedence: verified blog URL, then source link.
        let base_link = hosted_url.clone().unwrap_or_else(|| posting.link.clone());
        let (canonical_link, short_link) = if config.use_shortener {
            match self.shortener.shorten(&base_link).await {
                Ok(short) => {
                    let short_link = (short != base_link).then(|| short.clone());
                    (short, short_link)
                }
                Err(error) => {
                    tracing::warn!(%error, "Shortener failed, using unshortened link");
                    (base_link.clone(), None)
                }
            }
        } else {
            (base_link.clone(), None)
        };

        artifact.broadcast_text = self.renderer.render_broadcast(&posting, &canonical_link);

        for publisher in [&self.telegram, &self.whatsapp] {
            let channel = publisher.channel();
            let enabled = match channel {
                Channel::Telegram => config.send_telegram,
                Channel::WhatsApp => config.send_whatsapp,
                Channel::Blog => false,
            };
            if !enabled || !publisher.is_enabled() {
                continue;
            }
            let status = match publisher.publish(&artifact).await {
                Ok(_) => {
                    stats.channel_sends.bump(channel);
                    ChannelStatus::Sent
                }
                Err(error) => {
                    tracing::warn!(
                        %error,
                        channel = %channel,
                        title = %posting.title,
                        "Broadcast failed"
                    );
                    ChannelStatus::Failed
                }
            };
            match channel {
                Channel::Telegram => outcome.telegram = status,
                Channel::WhatsApp => outcome.whatsapp = status,
                Channel::Blog => {}
            }
        }

        AcceptedPosting {
            slug,
            canonical_link,
            short_link,
            hosted_url,
            outcome,
            accepted_at: self.clock.now(),
            posting,
        }
    }

    async fn log_best_effort(
        &self,
        level: LogLevel,
        message: &str,
        metadata: serde_json::Value,
    ) {
        if let Err(error) = self.store.append_log(level, message, metadata).await {
            tracing::debug!(%error, "Failed to append run log entry");
        }
    }
}
