//! Retry waves over the ledger, run after the primary pass.

use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use super::task::{Clock, Scale};
use super::{Orchestrator, OrchestratorError, RunSummary};
use crate::item::{OutputHints, WorkItem};
use crate::processor::ProcessError;
use crate::progress::Phase;
use crate::retry::{FailureType, RetryDecision, classify_failure};

impl Orchestrator {
    /// Repeats waves over the ledger until it is empty, auto-retry is turned
    /// off, or the batch is cancelled. Waves are separated by the configured
    /// backoff.
    #[instrument(skip_all, fields(deferred = self.ledger.len()))]
    pub(super) async fn retry_wave(
        &self,
        cancel: &CancellationToken,
        run_started: Instant,
        summary: &mut RunSummary,
    ) -> Result<(), OrchestratorError> {
        let mut wave = 0_u32;
        loop {
            if cancel.is_cancelled() {
                return Err(OrchestratorError::Cancelled);
            }
            let entries = self.ledger.snapshot();
            if entries.is_empty() {
                debug!(wave, "retry ledger drained");
                return Ok(());
            }

            wave += 1;
            info!(wave, entries = entries.len(), "starting retry wave");
            for item in entries {
                if cancel.is_cancelled() {
                    return Err(OrchestratorError::Cancelled);
                }
                self.retry_entry(&item, cancel, run_started, summary)
                    .await?;
            }

            if self.ledger.is_empty() {
                return Ok(());
            }
            let backoff = self.policy.backoff();
            debug!(wave, backoff_ms = backoff.as_millis(), "waiting before next wave");
            tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(OrchestratorError::Cancelled),
                () = tokio::time::sleep(backoff) => {}
            }
        }
    }

    async fn retry_entry(
        &self,
        item: &Arc<WorkItem>,
        cancel: &CancellationToken,
        run_started: Instant,
        summary: &mut RunSummary,
    ) -> Result<(), OrchestratorError> {
        let used = self.ledger.attempts(&item.id);
        if let RetryDecision::DoNotRetry { reason } =
            self.policy.should_retry(FailureType::Retryable, used)
        {
            self.abandon(item, &reason, summary);
            return Ok(());
        }

        self.gate.wait_for(&item.id, cancel).await?;

        let attempt = self.ledger.increment_and_get(&item.id);
        summary.retry_attempts += 1;
        let clock = Clock::start_item(run_started);
        self.publish(item, Phase::Retrying, 0.0, Scale::Single, clock);
        self.hub
            .log(format!("Retry {attempt} for {}", item.title));

        let hints = OutputHints::for_item(item);
        let item_cancel = cancel.child_token();
        self.set_current(Some(item_cancel.clone()));
        let (result, _) = self
            .attempt(item, &hints, &item_cancel, Scale::Single, clock)
            .await;
        self.set_current(None);

        match result {
            Ok(path) => {
                self.ledger.remove(&item.id);
                self.publish(item, Phase::Completed, 1.0, Scale::Single, clock);
                self.hub.log(format!(
                    "Completed after {attempt} retr{}: {}",
                    if attempt == 1 { "y" } else { "ies" },
                    item.title
                ));
                summary.recovered += 1;
                summary.outputs.push(path);
                Ok(())
            }
            Err(_) if cancel.is_cancelled() => Err(OrchestratorError::Cancelled),
            Err(_) if item_cancel.is_cancelled() => {
                self.ledger.remove(&item.id);
                self.hub.log(format!("Skipped: {}", item.title));
                summary.skipped += 1;
                Ok(())
            }
            Err(error) => {
                self.handle_retry_failure(item, attempt, &error, summary);
                Ok(())
            }
        }
    }

    fn handle_retry_failure(
        &self,
        item: &Arc<WorkItem>,
        attempt: u32,
        error: &ProcessError,
        summary: &mut RunSummary,
    ) {
        let failure = classify_failure(error);
        match self.policy.should_retry(failure, attempt) {
            RetryDecision::Retry { .. } => {
                self.hub
                    .warn(format!("Retry {attempt} failed for {}: {error}", item.title));
            }
            RetryDecision::DoNotRetry { reason } => {
                self.abandon(item, &format!("{reason}; last error: {error}"), summary);
            }
        }
    }

    fn abandon(&self, item: &WorkItem, reason: &str, summary: &mut RunSummary) {
        self.ledger.remove(&item.id);
        summary.abandoned += 1;
        self.hub
            .warn(format!("Giving up on {}: {reason}", item.title));
    }
}
