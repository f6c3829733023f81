//! Progress UI (bar) driven by orchestrator snapshots.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use mixtape_core::{Phase, ProgressSnapshot};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio_util::sync::CancellationToken;

/// Bar resolution: percentages are rendered in tenths of a percent.
const BAR_LENGTH: u64 = 1000;

/// Spawns the progress bar when requested.
///
/// The task ends when `stop` fires or the snapshot stream closes.
pub(crate) fn spawn_progress_ui(
    enabled: bool,
    mut snapshots: broadcast::Receiver<ProgressSnapshot>,
    stop: CancellationToken,
) -> Option<tokio::task::JoinHandle<()>> {
    if !enabled {
        return None;
    }
    Some(tokio::spawn(async move {
        let bar = ProgressBar::new(BAR_LENGTH);
        bar.set_style(
            ProgressStyle::with_template("{bar:30} {percent:>3}% {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        bar.enable_steady_tick(Duration::from_millis(120));

        loop {
            tokio::select! {
                () = stop.cancelled() => break,
                received = snapshots.recv() => match received {
                    Ok(snapshot) => render(&bar, &snapshot),
                    Err(RecvError::Lagged(_)) => {}
                    Err(RecvError::Closed) => break,
                },
            }
        }

        bar.finish_and_clear();
    }))
}

fn render(bar: &ProgressBar, snapshot: &ProgressSnapshot) {
    bar.set_position(bar_position(snapshot.percentage));
    bar.set_message(message(snapshot));
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
fn bar_position(percentage: f64) -> u64 {
    (percentage.clamp(0.0, 1.0) * BAR_LENGTH as f64).round() as u64
}

fn message(snapshot: &ProgressSnapshot) -> String {
    match snapshot.phase {
        Phase::Retrying => format!("retrying {}", snapshot.item.title),
        phase => format!(
            "[{}/{}] {phase} {}",
            snapshot.position, snapshot.total, snapshot.item.title
        ),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use mixtape_core::WorkItem;

    use super::*;

    fn snapshot(phase: Phase, percentage: f64) -> ProgressSnapshot {
        ProgressSnapshot {
            item: Arc::new(WorkItem::new("a", "Blue Monday")),
            percentage,
            phase,
            total: 3,
            position: 2,
            total_elapsed: Duration::ZERO,
            item_elapsed: Duration::ZERO,
        }
    }

    #[test]
    fn test_bar_position_scales_and_clamps() {
        assert_eq!(bar_position(0.5), 500);
        assert_eq!(bar_position(1.7), BAR_LENGTH);
        assert_eq!(bar_position(-1.0), 0);
    }

    #[test]
    fn test_message_formats_batch_and_retry_phases() {
        assert_eq!(
            message(&snapshot(Phase::Downloading, 0.4)),
            "[2/3] downloading Blue Monday"
        );
        assert_eq!(
            message(&snapshot(Phase::Retrying, 0.1)),
            "retrying Blue Monday"
        );
    }

    #[tokio::test]
    async fn test_disabled_ui_spawns_nothing() {
        let (_tx, rx) = broadcast::channel(4);
        assert!(spawn_progress_ui(false, rx, CancellationToken::new()).is_none());
    }

    #[tokio::test]
    async fn test_ui_task_ends_on_stop() {
        let (_tx, rx) = broadcast::channel(4);
        let stop = CancellationToken::new();
        let handle = spawn_progress_ui(true, rx, stop.clone()).unwrap();
        stop.cancel();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
