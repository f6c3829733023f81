//! Batch orchestrator: primary pass, retry wave and the control surface.
//!
//! The orchestrator processes one item at a time. It pulls from the
//! [`PendingQueue`], waits on the [`PauseGate`], hands the item to the
//! [`ItemProcessor`] and publishes [`ProgressSnapshot`]s. Items whose failure
//! is classified retryable are deferred to the [`RetryLedger`] and re-attempted
//! in waves once the queue is exhausted.
//!
//! Every control method takes `&self` and is safe to call from another task
//! while [`Orchestrator::run`] is in progress; wrap the orchestrator in an
//! [`Arc`] to share it.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use mixtape_core::{HttpItemProcessor, Orchestrator, OrchestratorConfig, WorkItem};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let orchestrator = Arc::new(Orchestrator::new(
//!     Arc::new(HttpItemProcessor::new()),
//!     OrchestratorConfig::default().with_output_root("./music"),
//! ));
//! let mut snapshots = orchestrator.subscribe();
//! tokio::spawn(async move {
//!     while let Ok(snapshot) = snapshots.recv().await {
//!         println!("{} {:.0}%", snapshot.phase, snapshot.percentage * 100.0);
//!     }
//! });
//!
//! let items = vec![WorkItem::new("https://example.com/a.mp3", "A")];
//! let summary = orchestrator.run(items, CancellationToken::new()).await?;
//! println!("completed: {}", summary.completed);
//! # Ok(())
//! # }
//! ```

mod error;
mod retry_wave;
mod task;

pub use error::OrchestratorError;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

use crate::config::OrchestratorConfig;
use crate::item::WorkItem;
use crate::pause::{PauseGate, PauseMode};
use crate::processor::ItemProcessor;
use crate::progress::{ProgressHub, ProgressSnapshot};
use crate::queue::PendingQueue;
use crate::resolver::MediaResolver;
use crate::retry::{RetryLedger, RetryPolicy};

/// Counts collected over one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Items completed in the primary pass.
    pub completed: usize,
    /// Items dropped after a terminal failure in the primary pass.
    pub failed: usize,
    /// Items deferred to the retry ledger by the primary pass.
    pub deferred: usize,
    /// Items whose attempt was cancelled through [`Orchestrator::skip_current`].
    pub skipped: usize,
    /// Attempts made by the retry wave.
    pub retry_attempts: usize,
    /// Deferred items that later succeeded.
    pub recovered: usize,
    /// Deferred items dropped from the ledger without succeeding.
    pub abandoned: usize,
    /// Inputs that failed resolution in [`Orchestrator::run_urls`].
    pub unresolved: usize,
    /// Output paths of every successful item, in completion order.
    pub outputs: Vec<PathBuf>,
    /// Wall-clock duration of the run.
    pub elapsed: Duration,
}

impl RunSummary {
    /// Items that ended up succeeding, in either pass.
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.completed + self.recovered
    }
}

/// Single-worker batch orchestrator.
pub struct Orchestrator {
    processor: Arc<dyn ItemProcessor>,
    config: OrchestratorConfig,
    queue: PendingQueue,
    gate: PauseGate,
    ledger: RetryLedger,
    policy: RetryPolicy,
    hub: ProgressHub,
    current: Mutex<Option<CancellationToken>>,
    running: AtomicBool,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("config", &self.config)
            .field("queue_len", &self.queue.len())
            .field("ledger_len", &self.ledger.len())
            .field("pause_mode", &self.gate.mode())
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

/// Resets the running flag and the active-attempt token when a run ends,
/// whichever way it ends.
struct RunGuard<'a> {
    orchestrator: &'a Orchestrator,
}

impl<'a> RunGuard<'a> {
    fn acquire(orchestrator: &'a Orchestrator) -> Result<Self, OrchestratorError> {
        orchestrator
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| OrchestratorError::AlreadyRunning)?;
        Ok(Self { orchestrator })
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.orchestrator.set_current(None);
        self.orchestrator.running.store(false, Ordering::Release);
    }
}

impl Orchestrator {
    /// Creates an orchestrator around `processor`.
    #[must_use]
    pub fn new(processor: Arc<dyn ItemProcessor>, config: OrchestratorConfig) -> Self {
        let policy = RetryPolicy::new(
            config.auto_retry_enabled,
            config.max_retries,
            config.retry_backoff,
        );
        let hub = ProgressHub::new(config.channel_capacity);
        Self {
            processor,
            config,
            queue: PendingQueue::new(),
            gate: PauseGate::new(),
            ledger: RetryLedger::new(),
            policy,
            hub,
            current: Mutex::new(None),
            running: AtomicBool::new(false),
        }
    }

    /// Returns the configuration the orchestrator was built with.
    #[must_use]
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    // ==================== Observers ====================

    /// Subscribes to progress snapshots.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressSnapshot> {
        self.hub.subscribe()
    }

    /// Subscribes to free-text log lines.
    #[must_use]
    pub fn subscribe_logs(&self) -> broadcast::Receiver<String> {
        self.hub.subscribe_logs()
    }

    /// Returns the most recently published snapshot.
    #[must_use]
    pub fn latest_snapshot(&self) -> Option<ProgressSnapshot> {
        self.hub.latest()
    }

    // ==================== Queue control ====================

    /// Appends items to the pending queue; a running batch picks them up.
    pub fn add(&self, items: impl IntoIterator<Item = WorkItem>) {
        self.queue.add(items);
    }

    /// Removes the first queued item with identifier `id`.
    pub fn remove(&self, id: &str) -> bool {
        self.queue.remove(id)
    }

    /// Moves a queued item; false when either index is out of range.
    pub fn move_item(&self, old_index: usize, new_index: usize) -> bool {
        self.queue.move_item(old_index, new_index)
    }

    /// Point-in-time copy of the items not yet pulled.
    #[must_use]
    pub fn pending_items(&self) -> Vec<WorkItem> {
        self.queue.pending()
    }

    // ==================== Pause control ====================

    /// Closes the global pause gate.
    pub fn pause(&self) {
        self.gate.pause();
        self.hub.log("Paused");
    }

    /// Opens the global pause gate.
    pub fn resume(&self) {
        self.gate.resume();
        self.hub.log("Resumed");
    }

    /// Suspends one item.
    pub fn pause_item(&self, id: &str) {
        self.gate.pause_item(id);
    }

    /// Releases one item; opens the global gate once no item is suspended.
    pub fn resume_item(&self, id: &str) {
        self.gate.resume_item(id);
    }

    /// Returns the combined pause state.
    #[must_use]
    pub fn pause_mode(&self) -> PauseMode {
        self.gate.mode()
    }

    // ==================== Retry control ====================

    /// Enables or disables automatic retries, effective on the next decision.
    pub fn set_auto_retry(&self, enabled: bool) {
        self.policy.set_auto_retry(enabled);
        info!(enabled, "auto-retry toggled");
    }

    /// Returns whether automatic retries are enabled.
    #[must_use]
    pub fn auto_retry(&self) -> bool {
        self.policy.auto_retry()
    }

    /// Point-in-time copy of the retry ledger.
    #[must_use]
    pub fn retry_ledger(&self) -> Vec<WorkItem> {
        self.ledger
            .snapshot()
            .iter()
            .map(|item| WorkItem::clone(item))
            .collect()
    }

    /// Retry attempts made so far for `id` in the current run.
    #[must_use]
    pub fn retry_attempts(&self, id: &str) -> u32 {
        self.ledger.attempts(id)
    }

    // ==================== Run control ====================

    /// Cancels the active attempt only; the batch moves on to the next item.
    ///
    /// Returns false when no attempt is in progress.
    pub fn skip_current(&self) -> bool {
        match self.lock_current().as_ref() {
            Some(token) => {
                token.cancel();
                self.hub.log("Skipping current item");
                true
            }
            None => false,
        }
    }

    /// Returns true while a run is in progress.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Processes `items` as one batch: the primary pass, then retry waves
    /// until the ledger is empty.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::Cancelled`] when `cancel` fires (also
    /// while paused) and [`OrchestratorError::AlreadyRunning`] when another
    /// run is in progress. Per-item failures never fail the run.
    #[instrument(skip(self, items, cancel), fields(items = items.len()))]
    pub async fn run(
        &self,
        items: Vec<WorkItem>,
        cancel: CancellationToken,
    ) -> Result<RunSummary, OrchestratorError> {
        let _guard = RunGuard::acquire(self)?;
        self.execute(items, &cancel, RunSummary::default()).await
    }

    /// Resolves each input through `resolver`, then runs the flattened items
    /// as one batch. Inputs that fail resolution are logged and skipped.
    ///
    /// # Errors
    ///
    /// Same as [`Orchestrator::run`]; cancellation during resolution is
    /// reported as [`OrchestratorError::Cancelled`].
    #[instrument(skip_all, fields(resolver = resolver.name()))]
    pub async fn run_urls<R, I, S>(
        &self,
        resolver: &R,
        inputs: I,
        cancel: CancellationToken,
    ) -> Result<RunSummary, OrchestratorError>
    where
        R: MediaResolver + ?Sized,
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let _guard = RunGuard::acquire(self)?;
        let mut summary = RunSummary::default();
        let mut items = Vec::new();

        for input in inputs {
            let input = input.as_ref();
            if cancel.is_cancelled() {
                self.hub.log("Cancelled");
                return Err(OrchestratorError::Cancelled);
            }
            match resolver.resolve(input, &cancel).await {
                Ok(resolved) => {
                    self.hub
                        .log(format!("Resolved {input}: {} item(s)", resolved.len()));
                    items.extend(resolved);
                }
                Err(error) if error.is_cancelled() || cancel.is_cancelled() => {
                    self.hub.log("Cancelled");
                    return Err(OrchestratorError::Cancelled);
                }
                Err(error) => {
                    summary.unresolved += 1;
                    self.hub.warn(format!("Skipping {input}: {error}"));
                }
            }
        }

        self.execute(items, &cancel, summary).await
    }

    async fn execute(
        &self,
        items: Vec<WorkItem>,
        cancel: &CancellationToken,
        mut summary: RunSummary,
    ) -> Result<RunSummary, OrchestratorError> {
        let started = Instant::now();
        self.queue.replace(items);
        self.ledger.clear();
        self.hub
            .log(format!("Starting batch of {} item(s)", self.queue.len()));

        let outcome = async {
            self.primary_pass(cancel, started, &mut summary).await?;
            if !self.ledger.is_empty() {
                self.retry_wave(cancel, started, &mut summary).await?;
            }
            Ok::<(), OrchestratorError>(())
        }
        .await;

        summary.elapsed = started.elapsed();
        match outcome {
            Ok(()) => {
                self.hub.log(format!(
                    "Batch finished: {} completed, {} recovered, {} failed, {} abandoned",
                    summary.completed, summary.recovered, summary.failed, summary.abandoned
                ));
                Ok(summary)
            }
            Err(error) => {
                self.hub.log("Cancelled");
                Err(error)
            }
        }
    }

    fn lock_current(&self) -> MutexGuard<'_, Option<CancellationToken>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_current(&self, token: Option<CancellationToken>) {
        *self.lock_current() = token;
    }
}
