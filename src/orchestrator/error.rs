//! Errors surfaced by a batch run.

use thiserror::Error;

use crate::pause::WaitError;

/// Outcome of a run that did not finish normally.
///
/// Per-item failures never show up here; they are logged, counted in the
/// [`super::RunSummary`] and the batch moves on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum OrchestratorError {
    /// The batch cancellation token fired.
    #[error("batch cancelled")]
    Cancelled,

    /// Another run is already in progress on this orchestrator.
    #[error("a batch is already running on this orchestrator")]
    AlreadyRunning,
}

impl OrchestratorError {
    /// Returns true for [`OrchestratorError::Cancelled`].
    #[must_use]
    pub fn is_cancelled(self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl From<WaitError> for OrchestratorError {
    fn from(_: WaitError) -> Self {
        Self::Cancelled
    }
}
