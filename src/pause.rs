//! Two-level pause gate: one global gate plus a per-item suspend set.
//!
//! The gate state lives in a [`tokio::sync::watch`] channel so waiters sleep
//! until a control call changes it instead of polling. Every wait races the
//! caller's [`CancellationToken`] and fails with [`WaitError::Cancelled`] as
//! soon as the token fires.
//!
//! `resume_item` re-opens the global gate when the suspend set becomes empty,
//! even if the gate was never closed explicitly. `pause_item` never touches
//! the global gate.

use std::collections::HashSet;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Error returned when a pause wait is interrupted by cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum WaitError {
    /// The cancellation token fired while waiting.
    #[error("cancelled while waiting on the pause gate")]
    Cancelled,
}

/// Read model of the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseMode {
    /// Global gate open and no item suspended.
    Running,
    /// Global gate closed.
    Paused,
    /// Global gate open, at least one item suspended.
    ItemsPaused,
}

#[derive(Debug, Clone, Default)]
struct GateState {
    globally_paused: bool,
    suspended: HashSet<String>,
}

impl GateState {
    fn allows(&self, id: &str) -> bool {
        !self.globally_paused && !self.suspended.contains(id)
    }
}

/// Shared pause state observed cooperatively by the orchestrator loop.
#[derive(Debug)]
pub struct PauseGate {
    state: watch::Sender<GateState>,
}

impl Default for PauseGate {
    fn default() -> Self {
        Self::new()
    }
}

impl PauseGate {
    /// Creates an open gate with no suspended items.
    #[must_use]
    pub fn new() -> Self {
        let (state, _) = watch::channel(GateState::default());
        Self { state }
    }

    /// Closes the global gate.
    pub fn pause(&self) {
        self.state.send_modify(|state| state.globally_paused = true);
        debug!("global pause engaged");
    }

    /// Opens the global gate.
    pub fn resume(&self) {
        self.state.send_modify(|state| state.globally_paused = false);
        debug!("global pause released");
    }

    /// Suspends one item. Empty identifiers are ignored.
    pub fn pause_item(&self, id: &str) {
        if id.is_empty() {
            return;
        }
        self.state.send_modify(|state| {
            state.suspended.insert(id.to_string());
        });
        debug!(id, "item suspended");
    }

    /// Releases one item; opens the global gate when no suspended item is left.
    pub fn resume_item(&self, id: &str) {
        if id.is_empty() {
            return;
        }
        self.state.send_modify(|state| {
            state.suspended.remove(id);
            if state.suspended.is_empty() {
                state.globally_paused = false;
            }
        });
        debug!(id, "item released");
    }

    /// Returns true when the global gate is closed.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.state.borrow().globally_paused
    }

    /// Returns true when `id` is in the suspend set.
    #[must_use]
    pub fn is_item_paused(&self, id: &str) -> bool {
        self.state.borrow().suspended.contains(id)
    }

    /// Returns the combined gate mode.
    #[must_use]
    pub fn mode(&self) -> PauseMode {
        let state = self.state.borrow();
        if state.globally_paused {
            PauseMode::Paused
        } else if state.suspended.is_empty() {
            PauseMode::Running
        } else {
            PauseMode::ItemsPaused
        }
    }

    /// Blocks until the global gate is open and `id` is not suspended.
    ///
    /// # Errors
    ///
    /// Returns [`WaitError::Cancelled`] if `cancel` fires first, including when
    /// it was already cancelled on entry.
    pub async fn wait_for(&self, id: &str, cancel: &CancellationToken) -> Result<(), WaitError> {
        if cancel.is_cancelled() {
            return Err(WaitError::Cancelled);
        }
        let mut rx = self.state.subscribe();
        if rx.borrow_and_update().allows(id) {
            return Ok(());
        }
        debug!(id, "waiting on pause gate");
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(WaitError::Cancelled),
            // The sender lives as long as `self`, so the channel cannot close here.
            result = rx.wait_for(|state| state.allows(id)) => {
                result.map(|_| ()).map_err(|_| WaitError::Cancelled)
            }
        }
    }
}
