//! Failure classification, retry policy and the retry ledger.
//!
//! # Overview
//!
//! When the item processor fails, the error is classified into a
//! [`FailureType`]:
//! - [`FailureType::Retryable`] - access denial (`403` / `forbidden`) that may
//!   clear up later; the item is deferred to the [`RetryLedger`]
//! - [`FailureType::Terminal`] - anything else; the item is dropped
//!
//! The [`RetryPolicy`] then decides, per ledger entry and attempt count,
//! whether the retry wave should try again.
//!
//! # Example
//!
//! ```
//! use mixtape_core::processor::ProcessError;
//! use mixtape_core::retry::{classify_failure, FailureType, RetryDecision, RetryPolicy};
//!
//! let policy = RetryPolicy::new(true, 2, std::time::Duration::from_secs(5));
//! let error = ProcessError::http_status("https://example.com/a.mp3", 403);
//! let failure = classify_failure(&error);
//! assert_eq!(failure, FailureType::Retryable);
//!
//! match policy.should_retry(failure, 1) {
//!     RetryDecision::Retry { attempt } => assert_eq!(attempt, 2),
//!     RetryDecision::DoNotRetry { reason } => panic!("{reason}"),
//! }
//! ```

mod ledger;

pub use ledger::RetryLedger;

use std::error::Error as StdError;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::{debug, instrument};

use crate::processor::ProcessError;

/// Default pause between retry waves.
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_secs(5);

const FORBIDDEN_STATUS: u16 = 403;

/// Classification of an item-processor failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureType {
    /// Transient access denial; deferred to the retry ledger.
    Retryable,

    /// Any other failure; the item is dropped.
    Terminal,
}

/// Decision on whether a ledger entry gets another attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Attempt again in the next wave.
    Retry {
        /// Retry number this will be (1-based).
        attempt: u32,
    },

    /// Drop the entry from the ledger.
    DoNotRetry {
        /// Human-readable reason.
        reason: String,
    },
}

/// Retry knobs shared between the control surface and the retry wave.
///
/// `auto_retry` is read fresh on every decision so toggling it mid-run aborts
/// the remaining retries. `max_retries == 0` means unlimited.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    auto_retry: Arc<AtomicBool>,
    max_retries: u32,
    backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(true, 0, DEFAULT_RETRY_BACKOFF)
    }
}

impl RetryPolicy {
    /// Creates a policy.
    #[must_use]
    pub fn new(auto_retry: bool, max_retries: u32, backoff: Duration) -> Self {
        Self {
            auto_retry: Arc::new(AtomicBool::new(auto_retry)),
            max_retries,
            backoff,
        }
    }

    /// Returns whether automatic retries are currently enabled.
    #[must_use]
    pub fn auto_retry(&self) -> bool {
        self.auto_retry.load(Ordering::SeqCst)
    }

    /// Enables or disables automatic retries; observed by the next decision.
    pub fn set_auto_retry(&self, enabled: bool) {
        self.auto_retry.store(enabled, Ordering::SeqCst);
    }

    /// Returns the retry cap (0 = unlimited).
    #[must_use]
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Returns the pause between retry waves.
    #[must_use]
    pub fn backoff(&self) -> Duration {
        self.backoff
    }

    /// Decides whether an entry that has used `attempts` retries so far gets
    /// another one.
    #[instrument(level = "debug", skip(self), fields(max_retries = self.max_retries))]
    pub fn should_retry(&self, failure: FailureType, attempts: u32) -> RetryDecision {
        if failure == FailureType::Terminal {
            return RetryDecision::DoNotRetry {
                reason: "non-retryable failure".to_string(),
            };
        }

        if !self.auto_retry() {
            return RetryDecision::DoNotRetry {
                reason: "auto-retry disabled".to_string(),
            };
        }

        if self.max_retries > 0 && attempts >= self.max_retries {
            debug!(attempts, "retry cap reached");
            return RetryDecision::DoNotRetry {
                reason: format!("max retries ({}) exhausted", self.max_retries),
            };
        }

        RetryDecision::Retry {
            attempt: attempts + 1,
        }
    }
}

/// Classifies a processor failure by walking its source chain.
///
/// A [`ProcessError`] with structured fields is judged by those fields: an
/// HTTP status is retryable only when it is 403, and network, IO, source and
/// cancellation errors are terminal. Their messages embed URLs and paths,
/// which must not influence the outcome. Any other error in the chain is
/// retryable when its message contains `403` or, case-insensitively,
/// `forbidden`.
#[must_use]
pub fn classify_failure(error: &(dyn StdError + 'static)) -> FailureType {
    let mut current = Some(error);
    while let Some(error) = current {
        match error.downcast_ref::<ProcessError>() {
            Some(ProcessError::HttpStatus { status, .. }) => {
                return if *status == FORBIDDEN_STATUS {
                    FailureType::Retryable
                } else {
                    FailureType::Terminal
                };
            }
            Some(
                ProcessError::Cancelled
                | ProcessError::Network { .. }
                | ProcessError::Io { .. }
                | ProcessError::InvalidSource { .. },
            ) => return FailureType::Terminal,
            Some(ProcessError::Other { message, .. }) => {
                if is_access_denial(message) {
                    return FailureType::Retryable;
                }
            }
            None => {
                if is_access_denial(&error.to_string()) {
                    return FailureType::Retryable;
                }
            }
        }
        current = error.source();
    }
    FailureType::Terminal
}

fn is_access_denial(message: &str) -> bool {
    message.contains("403") || message.to_lowercase().contains("forbidden")
}
