//! Error type for media resolution.

use thiserror::Error;

/// Errors returned by a [`super::MediaResolver`].
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The input cannot be handled by this resolver.
    #[error("cannot resolve '{input}': {reason}")]
    InvalidInput {
        /// The raw input.
        input: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The input was understood but listing it failed.
    #[error("resolution failed for '{input}': {message}")]
    ResolutionFailed {
        /// The raw input.
        input: String,
        /// Failure description.
        message: String,
    },

    /// The cancellation token fired during resolution.
    #[error("resolution cancelled")]
    Cancelled,
}

impl ResolveError {
    /// Creates an invalid-input error.
    pub fn invalid_input(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            input: input.into(),
            reason: reason.into(),
        }
    }

    /// Creates a resolution-failed error.
    pub fn resolution_failed(input: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ResolutionFailed {
            input: input.into(),
            message: message.into(),
        }
    }

    /// Returns true for [`ResolveError::Cancelled`].
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
