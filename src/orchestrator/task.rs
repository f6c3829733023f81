//! Primary pass and the single-attempt runner shared with the retry wave.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use super::{Orchestrator, OrchestratorError, RunSummary};
use crate::item::{OutputHints, WorkItem};
use crate::processor::{ProcessError, ProcessRequest, ProgressReporter};
use crate::progress::{Phase, ProgressSnapshot};
use crate::queue::Dequeued;
use crate::retry::{FailureType, classify_failure};

/// Fraction of an item's share reported when processing has finished and
/// only tagging is left.
const TAGGING_FRACTION: f64 = 0.95;

/// How an item's own fraction maps onto the published percentage.
#[derive(Debug, Clone, Copy)]
pub(super) enum Scale {
    /// Primary pass: `(position - 1 + fraction) / total`.
    Batch { position: usize, total: usize },
    /// Retry wave: the fraction itself.
    Single,
}

impl Scale {
    #[allow(clippy::cast_precision_loss)]
    fn percentage(self, fraction: f64) -> f64 {
        match self {
            Self::Batch { position, total } => {
                ((position.saturating_sub(1)) as f64 + fraction) / total.max(1) as f64
            }
            Self::Single => fraction,
        }
    }

    fn position(self) -> usize {
        match self {
            Self::Batch { position, .. } => position,
            Self::Single => 1,
        }
    }

    fn total(self) -> usize {
        match self {
            Self::Batch { total, .. } => total,
            Self::Single => 1,
        }
    }

    fn progress_phase(self) -> Phase {
        match self {
            Self::Batch { .. } => Phase::Downloading,
            Self::Single => Phase::Retrying,
        }
    }
}

/// Start instants for the elapsed-time fields.
#[derive(Debug, Clone, Copy)]
pub(super) struct Clock {
    pub(super) run_started: Instant,
    pub(super) item_started: Instant,
}

impl Clock {
    pub(super) fn start_item(run_started: Instant) -> Self {
        Self {
            run_started,
            item_started: Instant::now(),
        }
    }
}

impl Orchestrator {
    pub(super) async fn primary_pass(
        &self,
        cancel: &CancellationToken,
        run_started: Instant,
        summary: &mut RunSummary,
    ) -> Result<(), OrchestratorError> {
        loop {
            if cancel.is_cancelled() {
                return Err(OrchestratorError::Cancelled);
            }
            let Some(next) = self.queue.next() else {
                debug!("pending queue exhausted");
                return Ok(());
            };
            self.process_dequeued(next, cancel, run_started, summary)
                .await?;
        }
    }

    #[instrument(
        skip_all,
        fields(id = %next.item.id, position = next.position, total = next.total)
    )]
    async fn process_dequeued(
        &self,
        next: Dequeued,
        cancel: &CancellationToken,
        run_started: Instant,
        summary: &mut RunSummary,
    ) -> Result<(), OrchestratorError> {
        let Dequeued {
            item,
            position,
            total,
        } = next;
        let scale = Scale::Batch { position, total };

        self.gate.wait_for(&item.id, cancel).await?;

        let clock = Clock::start_item(run_started);
        let start = scale.percentage(0.0);
        self.publish(&item, Phase::Queued, start, scale, clock);
        self.publish(&item, Phase::Downloading, start, scale, clock);
        self.hub.log(format!("Downloading: {}", item.title));

        let hints = OutputHints::for_item(&item);
        let item_cancel = cancel.child_token();
        self.set_current(Some(item_cancel.clone()));
        let (result, last_percentage) = self
            .attempt(&item, &hints, &item_cancel, scale, clock)
            .await;
        self.set_current(None);

        match result {
            Ok(path) => {
                self.gate.wait_for(&item.id, cancel).await?;
                let tagging = scale.percentage(TAGGING_FRACTION).max(last_percentage);
                self.publish(&item, Phase::Tagging, tagging, scale, clock);
                self.publish(&item, Phase::Completed, scale.percentage(1.0), scale, clock);
                self.hub
                    .log(format!("Completed: {} -> {}", item.title, path.display()));
                summary.completed += 1;
                summary.outputs.push(path);
                Ok(())
            }
            Err(_) if cancel.is_cancelled() => Err(OrchestratorError::Cancelled),
            Err(_) if item_cancel.is_cancelled() => {
                self.hub.log(format!("Skipped: {}", item.title));
                summary.skipped += 1;
                Ok(())
            }
            Err(error) => {
                self.handle_primary_failure(&item, &error, summary);
                Ok(())
            }
        }
    }

    fn handle_primary_failure(
        &self,
        item: &Arc<WorkItem>,
        error: &ProcessError,
        summary: &mut RunSummary,
    ) {
        let retryable = classify_failure(error) == FailureType::Retryable;
        if retryable && self.policy.auto_retry() {
            self.ledger.record(Arc::clone(item));
            summary.deferred += 1;
            self.hub
                .warn(format!("Queued for retry: {} ({error})", item.title));
        } else {
            summary.failed += 1;
            self.hub.warn(format!("Failed: {}: {error}", item.title));
        }
    }

    /// Runs one processor attempt while forwarding its progress reports.
    ///
    /// Returns the processor result and the last percentage published for
    /// the attempt.
    pub(super) async fn attempt(
        &self,
        item: &Arc<WorkItem>,
        hints: &OutputHints,
        item_cancel: &CancellationToken,
        scale: Scale,
        clock: Clock,
    ) -> (Result<PathBuf, ProcessError>, f64) {
        let (tx, rx) = watch::channel(0.0);
        let finished = CancellationToken::new();
        let request = ProcessRequest {
            item,
            output_root: &self.config.output_root,
            quality: &self.config.quality_hint,
            hints,
        };

        let process = async {
            let result = self
                .processor
                .process(request, item_cancel.clone(), ProgressReporter::new(tx))
                .await;
            finished.cancel();
            result
        };
        let forward = self.forward_progress(item, rx, &finished, item_cancel, scale, clock);

        tokio::join!(process, forward)
    }

    /// Publishes the processor's latest fraction whenever it changes,
    /// honoring the pause gate, until the attempt has finished and its final
    /// fraction is published.
    ///
    /// Runs beside the processor future, so waiting on the gate here never
    /// stalls the processor itself. Fractions reported while paused collapse
    /// into the latest one.
    async fn forward_progress(
        &self,
        item: &Arc<WorkItem>,
        mut rx: watch::Receiver<f64>,
        finished: &CancellationToken,
        item_cancel: &CancellationToken,
        scale: Scale,
        clock: Clock,
    ) -> f64 {
        let mut last = scale.percentage(0.0);
        loop {
            tokio::select! {
                biased;
                changed = rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                () = finished.cancelled() => break,
            }
            if self.gate.wait_for(&item.id, item_cancel).await.is_err() {
                break;
            }
            let fraction = *rx.borrow_and_update();
            let percentage = scale.percentage(fraction);
            if percentage < last {
                continue;
            }
            last = percentage;
            self.publish(item, scale.progress_phase(), percentage, scale, clock);
        }
        last
    }

    pub(super) fn publish(
        &self,
        item: &Arc<WorkItem>,
        phase: Phase,
        percentage: f64,
        scale: Scale,
        clock: Clock,
    ) {
        self.hub.publish(ProgressSnapshot {
            item: Arc::clone(item),
            percentage: percentage.clamp(0.0, 1.0),
            phase,
            total: scale.total(),
            position: scale.position(),
            total_elapsed: clock.run_started.elapsed(),
            item_elapsed: clock.item_started.elapsed(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_scale_maps_fraction_into_item_share() {
        let scale = Scale::Batch {
            position: 2,
            total: 4,
        };
        assert!((scale.percentage(0.0) - 0.25).abs() < f64::EPSILON);
        assert!((scale.percentage(0.5) - 0.375).abs() < f64::EPSILON);
        assert!((scale.percentage(1.0) - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_single_scale_is_identity() {
        assert!((Scale::Single.percentage(0.3) - 0.3).abs() < f64::EPSILON);
        assert_eq!(Scale::Single.total(), 1);
        assert_eq!(Scale::Single.position(), 1);
        assert_eq!(Scale::Single.progress_phase(), Phase::Retrying);
    }

    #[test]
    fn test_tagging_fraction_of_last_item() {
        let scale = Scale::Batch {
            position: 3,
            total: 3,
        };
        let expected = (2.0 + TAGGING_FRACTION) / 3.0;
        assert!((scale.percentage(TAGGING_FRACTION) - expected).abs() < 1e-12);
    }
}
