//! Run coordinator - owns the Idle/Running state machine around the pipeline
//!
//! At most one run may be active process-wide. Both the scheduler's trigger
//! and manual requests go through the same `try_start` guard, so two callers
//! can never both observe Idle and start. A request never queues: it is
//! accepted or rejected immediately.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::model::{RunConfig, RunRecord, RunStats, RunSummary, SummaryRange};
use crate::ports::{Clock, LogLevel, PostingStore, StoreError};
use crate::usecases::pipeline::{Pipeline, RunError};

/// Explicit run/stop state guarded by a single mutex.
///
/// `finish` clears both flags together, so a run can never leave a stale
/// stop request behind or stick in Running.
#[derive(Debug, Default)]
pub struct RunState {
    flags: Mutex<Flags>,
}

#[derive(Debug, Default)]
struct Flags {
    running: bool,
    stop_requested: bool,
}

impl RunState {
    /// Claim the Idle → Running transition; false when already Running
    pub fn try_start(&self) -> bool {
        let mut flags = self.lock();
        if flags.running {
            false
        } else {
            flags.running = true;
            flags.stop_requested = false;
            true
        }
    }

    /// Raise the cooperative stop flag; false when no run is active
    pub fn request_stop(&self) -> bool {
        let mut flags = self.lock();
        if flags.running {
            flags.stop_requested = true;
            true
        } else {
            false
        }
    }

    pub fn stop_requested(&self) -> bool {
        self.lock().stop_requested
    }

    pub fn is_running(&self) -> bool {
        self.lock().running
    }

    /// Return to Idle, clearing the stop flag in the same critical section
    pub fn finish(&self) {
        let mut flags = self.lock();
        flags.running = false;
        flags.stop_requested = false;
    }

    fn lock(&self) -> MutexGuard<'_, Flags> {
        self.flags.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Immediate answer to a run request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Accepted,
    AlreadyRunning,
}

/// Immediate answer to a stop request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    Acknowledged,
    NoRunActive,
}

/// Snapshot of the coordinator state for the control surface
#[derive(Debug, Clone, Copy)]
pub struct RunStatus {
    pub running: bool,
}

/// Error from a synchronous run request
#[derive(Debug, thiserror::Error)]
pub enum StartRunError {
    #[error("a run is already active")]
    AlreadyRunning,
    #[error(transparent)]
    Run(#[from] RunError),
}

const SUMMARY_SCAN_LIMIT: u32 = 500;

/// Coordinates pipeline runs and exposes the core control surface
#[derive(Clone)]
pub struct RunCoordinator {
    pipeline: Pipeline,
    store: Arc<dyn PostingStore>,
    clock: Arc<dyn Clock>,
    state: Arc<RunState>,
}

impl RunCoordinator {
    pub fn new(pipeline: Pipeline, store: Arc<dyn PostingStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            pipeline,
            store,
            clock,
            state: Arc::new(RunState::default()),
        }
    }

    /// Request a run; returns immediately with accepted/rejected.
    ///
    /// The pipeline executes on the runtime; failures surface through the
    /// log and history interfaces, never as a crashed caller.
    pub fn start_run(&self, config: RunConfig) -> StartOutcome {
        if !self.state.try_start() {
            tracing::info!("Run request rejected, a run is already active");
            return StartOutcome::AlreadyRunning;
        }

        let this = self.clone();
        tokio::spawn(async move {
            if let Err(error) = this.execute_claimed(config).await {
                tracing::error!(%error, "Run failed");
            }
        });

        StartOutcome::Accepted
    }

    /// Run synchronously and return the final statistics
    pub async fn run_once(&self, config: RunConfig) -> Result<RunStats, StartRunError> {
        if !self.state.try_start() {
            return Err(StartRunError::AlreadyRunning);
        }
        self.execute_claimed(config).await.map_err(StartRunError::Run)
    }

    /// Raise the cooperative stop flag; the run finishes its current posting
    pub fn request_stop(&self) -> StopOutcome {
        if self.state.request_stop() {
            tracing::info!("Stop requested, run will halt after the current posting");
            StopOutcome::Acknowledged
        } else {
            StopOutcome::NoRunActive
        }
    }

    pub fn status(&self) -> RunStatus {
        RunStatus {
            running: self.state.is_running(),
        }
    }

    pub async fn run_history(&self, limit: u32) -> Result<Vec<RunRecord>, StoreError> {
        self.store.run_history(limit).await
    }

    /// Aggregate persisted run records over a time range
    pub async fn summary(&self, range: SummaryRange) -> Result<RunSummary, StoreError> {
        let now = self.clock.now();
        let cutoff = match range {
            SummaryRange::Today => now.replace_time(time::Time::MIDNIGHT),
            SummaryRange::Week => now - time::Duration::days(7),
            SummaryRange::Month => now - time::Duration::days(30),
        };

        let records = self.store.run_history(SUMMARY_SCAN_LIMIT).await?;
        let mut summary = RunSummary::default();
        for record in records.into_iter().filter(|r| r.started_at >= cutoff) {
            summary.runs += 1;
            summary.found += record.stats.total_found();
            summary.accepted += record.stats.total_accepted();
            summary.skips.merge(&record.stats.skip_totals());
            summary.channel_sends.merge(&record.stats.channel_sends);
            if summary.last_run.is_none_or(|last| record.started_at > last) {
                summary.last_run = Some(record.started_at);
            }
        }
        Ok(summary)
    }

    /// Execute a run whose Running claim the caller already holds.
    ///
    /// The guard returns the state to Idle on every exit path, including
    /// errors raised anywhere in posting processing.
    async fn execute_claimed(&self, config: RunConfig) -> Result<RunStats, RunError> {
        let _guard = FinishGuard(&self.state);
        let started_at = self.clock.now();

        self.log_best_effort(
            LogLevel::Info,
            "Run started",
            serde_json::to_value(&config).unwrap_or_default(),
        )
        .await;

        let stats = match self.pipeline.execute(&config, &self.state).await {
            Ok(stats) => stats,
            Err(error) => {
                self.log_best_effort(
                    LogLevel::Error,
                    &format!("Run failed: {}", error),
                    serde_json::Value::Null,
                )
                .await;
                return Err(error);
            }
        };

        if let Err(error) = self.store.record_run(started_at, &stats).await {
            self.log_best_effort(
                LogLevel::Error,
                &format!("Run finished but stats could not be persisted: {}", error),
                serde_json::Value::Null,
            )
            .await;
            return Err(RunError::Store(error));
        }

        let message = if stats.stopped_by_user {
            format!(
                "Run stopped by user after {} accepted postings",
                stats.total_accepted()
            )
        } else {
            format!(
                "Run completed: {} accepted of {} found",
                stats.total_accepted(),
                stats.total_found()
            )
        };
        self.log_best_effort(
            LogLevel::Info,
            &message,
            serde_json::to_value(&stats).unwrap_or_default(),
        )
        .await;

        Ok(stats)
    }

    async fn log_best_effort(&self, level: LogLevel, message: &str, metadata: serde_json::Value) {
        if let Err(error) = self.store.append_log(level, message, metadata).await {
            tracing::debug!(%error, "Failed to append run log entry");
        }
    }
}

/// Returns the coordinator to Idle when dropped, even on panic
struct FinishGuard<'a>(&'a Arc<RunState>);

impl Drop for FinishGuard<'_> {
    fn drop(&mut self) {
        self.0.finish();
    }
}
