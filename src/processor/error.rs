//! Error types returned by item processors.

use std::error::Error as StdError;
use std::path::PathBuf;

use thiserror::Error;

/// Boxed cause carried by [`ProcessError::Other`].
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Errors an [`super::ItemProcessor`] can return for one attempt.
///
/// The orchestrator classifies [`ProcessError::HttpStatus`] by its status
/// code and treats the other structured variants as terminal. For
/// [`ProcessError::Other`] the message and its source chain are part of the
/// contract: a mention of `403` or `forbidden` makes the failure retryable.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// The attempt observed its cancellation token.
    #[error("processing cancelled")]
    Cancelled,

    /// Non-success HTTP response.
    #[error("HTTP {status} fetching {url}")]
    HttpStatus {
        /// The requested URL.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// Network-level failure (DNS, connection reset, TLS, ...).
    #[error("network error fetching {url}: {source}")]
    Network {
        /// The requested URL.
        url: String,
        /// The underlying client error.
        #[source]
        source: reqwest::Error,
    },

    /// Local file system failure while writing output.
    #[error("IO error writing to {path}: {source}")]
    Io {
        /// The path being written.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The item carries no usable source.
    #[error("item {id} has no usable source: {reason}")]
    InvalidSource {
        /// Identifier of the offending item.
        id: String,
        /// Why the source is unusable.
        reason: String,
    },

    /// Any other failure, optionally wrapping its cause.
    #[error("{message}")]
    Other {
        /// Human-readable description.
        message: String,
        /// Underlying cause, if any.
        #[source]
        source: Option<BoxError>,
    },
}

impl ProcessError {
    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates a network error.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates an invalid-source error.
    pub fn invalid_source(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidSource {
            id: id.into(),
            reason: reason.into(),
        }
    }

    /// Creates a free-form error without a cause.
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a free-form error wrapping `source`.
    pub fn wrap(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Other {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Returns true for [`ProcessError::Cancelled`].
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_http_status_message_contains_code() {
        let error = ProcessError::http_status("https://example.com/a.mp3", 403);
        assert_eq!(error.to_string(), "HTTP 403 fetching https://example.com/a.mp3");
    }

    #[test]
    fn test_wrap_exposes_source() {
        let inner = std::io::Error::other("403 Forbidden");
        let error = ProcessError::wrap("stream failed", inner);
        assert_eq!(error.to_string(), "stream failed");
        assert_eq!(error.source().unwrap().to_string(), "403 Forbidden");
    }

    #[test]
    fn test_is_cancelled() {
        assert!(ProcessError::Cancelled.is_cancelled());
        assert!(!ProcessError::other("x").is_cancelled());
    }
}
