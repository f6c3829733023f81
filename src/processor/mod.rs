//! Item processor contract: fetch, convert and tag one work item.
//!
//! The orchestrator never performs network transfer or transcoding itself. It
//! hands each [`WorkItem`] to an [`ItemProcessor`] together with the output
//! hints, a cancellation token and a [`ProgressReporter`], and interprets the
//! returned [`ProcessError`] through [`crate::retry::classify_failure`].
//!
//! [`HttpItemProcessor`] is a reference implementation that streams plain
//! HTTP(S) sources to disk.

mod error;
mod http;

pub use error::ProcessError;
pub use http::HttpItemProcessor;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::item::{OutputHints, WorkItem};

/// Everything a processor needs to handle one item.
#[derive(Debug, Clone, Copy)]
pub struct ProcessRequest<'a> {
    /// The item to process.
    pub item: &'a WorkItem,
    /// Root directory for output files.
    pub output_root: &'a Path,
    /// Target audio quality, e.g. `"320k"`.
    pub quality: &'a str,
    /// Folder and naming hints derived from the item.
    pub hints: &'a OutputHints,
}

/// Fire-and-forget sink for an item's own completion fraction.
///
/// Reporting never blocks the processor. Only the latest fraction is kept:
/// the orchestrator publishes it on its own schedule, honoring the pause
/// gate, so reports made while paused collapse into one. Reports after the
/// attempt has finished are dropped.
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    tx: Option<Arc<watch::Sender<f64>>>,
}

impl ProgressReporter {
    pub(crate) fn new(tx: watch::Sender<f64>) -> Self {
        Self {
            tx: Some(Arc::new(tx)),
        }
    }

    /// A reporter that discards every report.
    #[must_use]
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    /// Reports a completion fraction in `0.0..=1.0`; out-of-range values are clamped.
    pub fn report(&self, fraction: f64) {
        if let Some(tx) = &self.tx {
            let fraction = if fraction.is_nan() {
                0.0
            } else {
                fraction.clamp(0.0, 1.0)
            };
            let _ = tx.send(fraction);
        }
    }
}

/// Performs the download, transcode and tagging of one item.
///
/// Implementations must return promptly once `cancel` fires, should call
/// `progress` with non-decreasing fractions, and return the final output path
/// on success.
#[async_trait]
pub trait ItemProcessor: Send + Sync {
    /// Processes one item.
    async fn process(
        &self,
        request: ProcessRequest<'_>,
        cancel: CancellationToken,
        progress: ProgressReporter,
    ) -> Result<PathBuf, ProcessError>;
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_reporter_clamps_out_of_range_values() {
        let (tx, rx) = watch::channel(0.0);
        let reporter = ProgressReporter::new(tx);

        reporter.report(-0.5);
        assert!(rx.borrow().abs() < f64::EPSILON);
        reporter.report(7.0);
        assert!((*rx.borrow() - 1.0).abs() < f64::EPSILON);
        reporter.report(f64::NAN);
        assert!(rx.borrow().abs() < f64::EPSILON);
    }

    #[test]
    fn test_reporter_keeps_only_latest_fraction() {
        let (tx, mut rx) = watch::channel(0.0);
        let reporter = ProgressReporter::new(tx);
        for step in 1..=1_000 {
            reporter.report(f64::from(step) / 1_000.0);
        }

        assert!(rx.has_changed().unwrap());
        assert!((*rx.borrow_and_update() - 1.0).abs() < f64::EPSILON);
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn test_reporter_survives_closed_receiver() {
        let (tx, rx) = watch::channel(0.0);
        drop(rx);
        ProgressReporter::new(tx).report(0.5);
        ProgressReporter::disabled().report(0.5);
    }
}
