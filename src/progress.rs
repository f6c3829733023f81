//! Progress snapshots and the hub that publishes them.
//!
//! Observers subscribe to two [`tokio::sync::broadcast`] streams: one of
//! [`ProgressSnapshot`]s and one of free-text log lines. Publishing goes
//! through a lock so observers never see a stale snapshot for one item after
//! a snapshot for the next.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::{info, trace, warn};

use crate::item::WorkItem;

/// Default buffer size of each broadcast stream.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Lifecycle phase carried by a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Pulled from the queue, not started yet.
    Queued,
    /// The processor is working on the item.
    Downloading,
    /// The processor finished; metadata is being finalized.
    Tagging,
    /// The item is done.
    Completed,
    /// The retry wave is re-attempting the item.
    Retrying,
}

impl Phase {
    /// Lowercase label used in logs and the CLI.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Downloading => "downloading",
            Self::Tagging => "tagging",
            Self::Completed => "completed",
            Self::Retrying => "retrying",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One progress observation.
#[derive(Debug, Clone)]
pub struct ProgressSnapshot {
    /// The item this snapshot is about.
    pub item: Arc<WorkItem>,
    /// Completion in `0.0..=1.0`. Batch-wide in the primary pass, per item in
    /// the retry wave.
    pub percentage: f64,
    /// Lifecycle phase.
    pub phase: Phase,
    /// Batch size observed when the item was pulled (1 in the retry wave).
    pub total: usize,
    /// 1-based position of the item in the batch (1 in the retry wave).
    pub position: usize,
    /// Time since the run started.
    pub total_elapsed: Duration,
    /// Time since the current item started.
    pub item_elapsed: Duration,
}

/// Serialized publisher for snapshots and log lines.
#[derive(Debug)]
pub struct ProgressHub {
    snapshots: broadcast::Sender<ProgressSnapshot>,
    logs: broadcast::Sender<String>,
    latest: Mutex<Option<ProgressSnapshot>>,
}

impl Default for ProgressHub {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

impl ProgressHub {
    /// Creates a hub whose streams buffer `capacity` entries per subscriber.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (snapshots, _) = broadcast::channel(capacity);
        let (logs, _) = broadcast::channel(capacity);
        Self {
            snapshots,
            logs,
            latest: Mutex::new(None),
        }
    }

    /// Subscribes to snapshots published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressSnapshot> {
        self.snapshots.subscribe()
    }

    /// Subscribes to log lines published from now on.
    #[must_use]
    pub fn subscribe_logs(&self) -> broadcast::Receiver<String> {
        self.logs.subscribe()
    }

    /// Publishes a snapshot. Having no subscriber is not an error.
    pub fn publish(&self, snapshot: ProgressSnapshot) {
        let mut latest = self.latest.lock().unwrap_or_else(PoisonError::into_inner);
        trace!(
            id = %snapshot.item.id,
            phase = %snapshot.phase,
            percentage = snapshot.percentage,
            "snapshot"
        );
        let _ = self.snapshots.send(snapshot.clone());
        *latest = Some(snapshot);
    }

    /// Returns the most recently published snapshot.
    #[must_use]
    pub fn latest(&self) -> Option<ProgressSnapshot> {
        self.latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Emits an informational log line.
    pub fn log(&self, message: impl Into<String>) {
        let message = message.into();
        info!("{message}");
        let _ = self.logs.send(message);
    }

    /// Emits a warning log line.
    pub fn warn(&self, message: impl Into<String>) {
        let message = message.into();
        warn!("{message}");
        let _ = self.logs.send(message);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn snapshot(phase: Phase, percentage: f64) -> ProgressSnapshot {
        ProgressSnapshot {
            item: Arc::new(WorkItem::new("a", "A")),
            percentage,
            phase,
            total: 1,
            position: 1,
            total_elapsed: Duration::ZERO,
            item_elapsed: Duration::ZERO,
        }
    }

    #[test]
    fn test_phase_labels() {
        assert_eq!(Phase::Queued.to_string(), "queued");
        assert_eq!(Phase::Retrying.as_str(), "retrying");
    }

    #[tokio::test]
    async fn test_publish_reaches_every_subscriber_in_order() {
        let hub = ProgressHub::default();
        let mut first = hub.subscribe();
        let mut second = hub.subscribe();

        hub.publish(snapshot(Phase::Queued, 0.0));
        hub.publish(snapshot(Phase::Downloading, 0.5));

        for rx in [&mut first, &mut second] {
            assert_eq!(rx.recv().await.unwrap().phase, Phase::Queued);
            assert_eq!(rx.recv().await.unwrap().phase, Phase::Downloading);
        }
    }

    #[test]
    fn test_publish_without_subscribers_updates_latest() {
        let hub = ProgressHub::new(4);
        assert!(hub.latest().is_none());
        hub.publish(snapshot(Phase::Completed, 1.0));
        assert_eq!(hub.latest().unwrap().phase, Phase::Completed);
    }

    #[tokio::test]
    async fn test_log_lines_are_broadcast() {
        let hub = ProgressHub::default();
        let mut logs = hub.subscribe_logs();
        hub.log("Downloading: A");
        hub.warn("Failed: B");
        assert_eq!(logs.recv().await.unwrap(), "Downloading: A");
        assert_eq!(logs.recv().await.unwrap(), "Failed: B");
    }
}
