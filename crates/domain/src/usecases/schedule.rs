//! Scheduler - owns at most one recurring trigger derived from stored config
//!
//! The trigger is an explicit task that sleeps until the computed next fire
//! time and asks the coordinator to start a run. On any configuration change
//! the existing trigger is removed before a new one is installed, so two
//! triggers can never coexist. A fire that finds a run already active is a
//! logged no-op: not queued, not retried.

use std::sync::{Arc, Mutex};

use time::OffsetDateTime;
use tokio::task::JoinHandle;

use crate::model::{Frequency, ScheduleConfig};
use crate::ports::{Clock, PostingStore, SCHEDULE_SETTING_KEY, StoreError, load_schedule};
use crate::usecases::coordinator::{RunCoordinator, StartOutcome};

/// Next fire time strictly after `now`, or None when the schedule is
/// disabled or its time of day does not parse.
pub fn compute_next_run(config: &ScheduleConfig, now: OffsetDateTime) -> Option<OffsetDateTime> {
    if !config.enabled {
        return None;
    }
    let (hour, minute) = config.time_of_day()?;
    let at = time::Time::from_hms(hour, minute, 0).ok()?;

    match config.frequency {
        Frequency::Hourly => {
            let candidate = now.replace_time(time::Time::from_hms(now.hour(), minute, 0).ok()?);
            Some(if candidate <= now {
                candidate + time::Duration::hours(1)
            } else {
                candidate
            })
        }
        Frequency::Daily => {
            let candidate = now.replace_time(at);
            Some(if candidate <= now {
                candidate + time::Duration::days(1)
            } else {
                candidate
            })
        }
        Frequency::Weekly => {
            // Fires on Mondays.
            let days_ahead = (7 - now.weekday().number_days_from_monday() as i64) % 7;
            let candidate = (now + time::Duration::days(days_ahead)).replace_time(at);
            Some(if candidate <= now {
                candidate + time::Duration::weeks(1)
            } else {
                candidate
            })
        }
    }
}

/// Maintains the single recurring trigger and the stored schedule setting
#[derive(Clone)]
pub struct Scheduler {
    coordinator: RunCoordinator,
    store: Arc<dyn PostingStore>,
    clock: Arc<dyn Clock>,
    trigger: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl Scheduler {
    pub fn new(
        coordinator: RunCoordinator,
        store: Arc<dyn PostingStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            coordinator,
            store,
            clock,
            trigger: Arc::new(Mutex::new(None)),
        }
    }

    /// Read the stored schedule and (re)install the trigger.
    ///
    /// Called at startup and after every settings change.
    pub async fn reload(&self) -> Result<Option<OffsetDateTime>, StoreError> {
        let config = load_schedule(self.store.as_ref()).await?;
        Ok(self.install(config))
    }

    /// The stored schedule with a freshly computed next-run timestamp
    pub async fn get_schedule(&self) -> Result<ScheduleConfig, StoreError> {
        let mut config = load_schedule(self.store.as_ref()).await?;
        config.next_run = compute_next_run(&config, self.clock.now());
        Ok(config)
    }

    /// Persist a new schedule, recompute its next-run timestamp, and
    /// reinstall the trigger
    pub async fn set_schedule(
        &self,
        mut config: ScheduleConfig,
    ) -> Result<ScheduleConfig, StoreError> {
        config.next_run = compute_next_run(&config, self.clock.now());
        let value = serde_json::to_value(&config)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        self.store.put_setting(SCHEDULE_SETTING_KEY, &value).await?;
        self.install(config.clone());
        Ok(config)
    }

    /// Whether a trigger is currently installed
    pub fn has_trigger(&self) -> bool {
        self.trigger
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .is_some()
    }

    /// Remove any existing trigger, then install one when the schedule is
    /// enabled. Returns the next fire time of the installed trigger.
    fn install(&self, config: ScheduleConfig) -> Option<OffsetDateTime> {
        let mut slot = self
            .trigger
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(handle) = slot.take() {
            handle.abort();
            tracing::debug!("Removed existing schedule trigger");
        }

        let next = compute_next_run(&config, self.clock.now())?;
        tracing::info!(
            frequency = config.frequency.as_str(),
            time = %config.time,
            next_run = %next,
            "Installed schedule trigger"
        );

        let this = self.clone();
        *slot = Some(tokio::spawn(async move { this.trigger_loop(config).await }));
        Some(next)
    }

    async fn trigger_loop(&self, config: ScheduleConfig) {
        // `after` advances to each fire instant, keeping the sequence
        // strictly monotonic even when the sleep wakes slightly early.
        let mut after = self.clock.now();
        loop {
            let Some(next) = compute_next_run(&config, after) else {
                return;
            };

            let wait = next - self.clock.now();
            if wait.is_positive() {
                tokio::time::sleep(std::time::Duration::from_secs_f64(
                    wait.as_seconds_f64(),
                ))
                .await;
            }

            match self.coordinator.start_run(config.run.clone()) {
                StartOutcome::Accepted => {
                    tracing::info!(fired_at = %next, "Scheduled run started");
                }
                StartOutcome::AlreadyRunning => {
                    tracing::info!(
                        fired_at = %next,
                        "Scheduled fire skipped, a run is already active"
                    );
                }
            }

            after = next;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{KeywordEntry, KeywordTable, LocaleRule, PostingFilter};
    use crate::model::{
        AcceptedPosting, Artifact, Channel, RunConfig, RunRecord, RunStats, SourceId,
    };
    use crate::ports::{
        ChannelPost, ChannelPublisher, Extraction, FetchOptions, JobSource, LogLevel,
        PublishError, ShortenError, Shortener, SourceError,
    };
    use crate::usecases::pipeline::Pipeline;
    use crate::usecases::render::{RenderConfig, Renderer};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use time::macros::datetime;

    fn schedule(enabled: bool, time: &str, frequency: Frequency) -> ScheduleConfig {
        ScheduleConfig {
            enabled,
            time: time.to_string(),
            frequency,
            run: RunConfig::default(),
            next_run: None,
        }
    }

    #[test]
    fn daily_before_the_configured_time_fires_today() {
        let now = datetime!(2025-06-02 10:00 UTC);
        let next = compute_next_run(&schedule(true, "14:30", Frequency::Daily), now);
        assert_eq!(next, Some(datetime!(2025-06-02 14:30 UTC)));
    }

    #[test]
    fn daily_after_the_configured_time_fires_tomorrow() {
        let now = datetime!(2025-06-02 15:00 UTC);
        let next = compute_next_run(&schedule(true, "14:30", Frequency::Daily), now);
        assert_eq!(next, Some(datetime!(2025-06-03 14:30 UTC)));
    }

    #[test]
    fn daily_exactly_at_the_configured_time_fires_tomorrow() {
        let now = datetime!(2025-06-02 14:30 UTC);
        let next = compute_next_run(&schedule(true, "14:30", Frequency::Daily), now);
        assert_eq!(next, Some(datetime!(2025-06-03 14:30 UTC)));
    }

    #[test]
    fn hourly_fires_at_the_configured_minute() {
        let now = datetime!(2025-06-02 10:10 UTC);
        let next = compute_next_run(&schedule(true, "00:30", Frequency::Hourly), now);
        assert_eq!(next, Some(datetime!(2025-06-02 10:30 UTC)));

        let now = datetime!(2025-06-02 10:45 UTC);
        let next = compute_next_run(&schedule(true, "00:30", Frequency::Hourly), now);
        assert_eq!(next, Some(datetime!(2025-06-02 11:30 UTC)));
    }

    #[test]
    fn weekly_fires_next_monday() {
        // 2025-06-04 is a Wednesday; the following Monday is 2025-06-09.
        let now = datetime!(2025-06-04 09:00 UTC);
        let next = compute_next_run(&schedule(true, "08:00", Frequency::Weekly), now);
        assert_eq!(next, Some(datetime!(2025-06-09 08:00 UTC)));

        // Monday before the configured time fires the same day.
        let now = datetime!(2025-06-09 06:00 UTC);
        let next = compute_next_run(&schedule(true, "08:00", Frequency::Weekly), now);
        assert_eq!(next, Some(datetime!(2025-06-09 08:00 UTC)));

        // Monday after the configured time waits a full week.
        let now = datetime!(2025-06-09 09:00 UTC);
        let next = compute_next_run(&schedule(true, "08:00", Frequency::Weekly), now);
        assert_eq!(next, Some(datetime!(2025-06-16 08:00 UTC)));
    }

    #[test]
    fn disabled_schedule_has_no_next_run() {
        let now = datetime!(2025-06-02 10:00 UTC);
        assert_eq!(
            compute_next_run(&schedule(false, "14:30", Frequency::Daily), now),
            None
        );
    }

    #[test]
    fn unparseable_time_has_no_next_run() {
        let now = datetime!(2025-06-02 10:00 UTC);
        assert_eq!(
            compute_next_run(&schedule(true, "not-a-time", Frequency::Daily), now),
            None
        );
    }

    // Scheduler wiring tests with fakes.

    #[derive(Default)]
    struct SettingsStore {
        settings: std::sync::Mutex<HashMap<String, serde_json::Value>>,
    }

    #[async_trait]
    impl PostingStore for SettingsStore {
        async fn link_exists(&self, _link: &str) -> Result<bool, StoreError> {
            Ok(false)
        }

        async fn insert_posting(&self, _posting: &AcceptedPosting) -> Result<(), StoreError> {
            Ok(())
        }

        async fn recent_links(&self, _limit: u32) -> Result<Vec<String>, StoreError> {
            Ok(vec![])
        }

        async fn get_setting(&self, key: &str) -> Result<Option<serde_json::Value>, StoreError> {
            Ok(self.settings.lock().unwrap().get(key).cloned())
        }

        async fn put_setting(
            &self,
            key: &str,
            value: &serde_json::Value,
        ) -> Result<(), StoreError> {
            self.settings
                .lock()
                .unwrap()
                .insert(key.to_string(), value.clone());
            Ok(())
        }

        async fn append_log(
            &self,
            _level: LogLevel,
            _message: &str,
            _metadata: serde_json::Value,
        ) -> Result<(), StoreError> {
            Ok(())
        }

        async fn record_run(
            &self,
            _started_at: OffsetDateTime,
            _stats: &RunStats,
        ) -> Result<(), StoreError> {
            Ok(())
        }

        async fn run_history(&self, _limit: u32) -> Result<Vec<RunRecord>, StoreError> {
            Ok(vec![])
        }
    }

    struct EmptySource;

    #[async_trait]
    impl JobSource for EmptySource {
        async fn fetch(
            &self,
            _query: &str,
            _options: &FetchOptions,
        ) -> Result<Extraction, SourceError> {
            Ok(Extraction::default())
        }

        fn id(&self) -> SourceId {
            SourceId::Wuzzuf
        }
    }

    struct Disabled(Channel);

    #[async_trait]
    impl ChannelPublisher for Disabled {
        async fn publish(&self, _artifact: &Artifact) -> Result<ChannelPost, PublishError> {
            Err(PublishError::Api("disabled".into()))
        }

        fn is_enabled(&self) -> bool {
            false
        }

        fn channel(&self) -> Channel {
            self.0
        }
    }

    struct Identity;

    #[async_trait]
    impl Shortener for Identity {
        async fn shorten(&self, url: &str) -> Result<String, ShortenError> {
            Ok(url.to_string())
        }
    }

    struct FixedClock(OffsetDateTime);

    impl Clock for FixedClock {
        fn now(&self) -> OffsetDateTime {
            self.0
        }
    }

    fn scheduler() -> Scheduler {
        let store: Arc<dyn PostingStore> = Arc::new(SettingsStore::default());
        let clock: Arc<dyn Clock> = Arc::new(FixedClock(datetime!(2025-06-02 10:00 UTC)));
        let pipeline = Pipeline::new(
            vec![Arc::new(EmptySource)],
            Arc::clone(&store),
            Arc::new(Disabled(Channel::Blog)),
            Arc::new(Disabled(Channel::Telegram)),
            Arc::new(Disabled(Channel::WhatsApp)),
            Arc::new(Identity),
            Arc::clone(&clock),
            PostingFilter::new(
                KeywordTable::new(vec![KeywordEntry::new("QA", &[])]),
                LocaleRule::egypt(),
            ),
            Renderer::new(RenderConfig::default()),
            100,
        );
        let coordinator = RunCoordinator::new(pipeline, Arc::clone(&store), Arc::clone(&clock));
        Scheduler::new(coordinator, store, clock)
    }

    #[tokio::test]
    async fn reload_without_stored_schedule_installs_nothing() {
        let scheduler = scheduler();
        let next = scheduler.reload().await.unwrap();
        assert_eq!(next, None);
        assert!(!scheduler.has_trigger());
    }

    #[tokio::test]
    async fn set_schedule_persists_and_installs_a_single_trigger() {
        let scheduler = scheduler();

        let saved = scheduler
            .set_schedule(schedule(true, "14:30", Frequency::Daily))
            .await
            .unwrap();
        assert_eq!(saved.next_run, Some(datetime!(2025-06-02 14:30 UTC)));
        assert!(scheduler.has_trigger());

        // Round-trips through the settings store.
        let loaded = scheduler.get_schedule().await.unwrap();
        assert!(loaded.enabled);
        assert_eq!(loaded.time, "14:30");

        // Reinstalling replaces rather than stacks.
        scheduler
            .set_schedule(schedule(true, "16:00", Frequency::Daily))
            .await
            .unwrap();
        assert!(scheduler.has_trigger());

        // Disabling removes the trigger entirely.
        scheduler
            .set_schedule(schedule(false, "16:00", Frequency::Daily))
            .await
            .unwrap();
        assert!(!scheduler.has_trigger());
    }
}
