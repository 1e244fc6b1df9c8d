//! Errors raised while talking to the time-tracking backend.

use thiserror::Error;

/// Result type alias for backend operations.
pub type Result<T> = std::result::Result<T, NetworkError>;

/// The backend could not be reached or answered unusably.
///
/// None of these is fatal to the agent: callers log them and treat the
/// operation as having produced nothing this tick.
#[derive(Debug, Error)]
pub enum NetworkError {
    /// The request did not complete within its timeout.
    #[error("{operation} timed out after {timeout_ms}ms")]
    Timeout {
        operation: &'static str,
        timeout_ms: u64,
    },

    /// Connection, TLS or I/O failure.
    #[error("{operation} failed: {message}")]
    Transport {
        operation: &'static str,
        message: String,
    },

    /// The backend answered with a non-success HTTP status.
    #[error("{operation} returned HTTP {status}")]
    Status { operation: &'static str, status: u16 },

    /// The response body could not be interpreted.
    #[error("Invalid {operation} response: {message}")]
    Decode {
        operation: &'static str,
        message: String,
    },
}

impl NetworkError {
    pub(crate) fn from_reqwest(operation: &'static str, timeout_ms: u64, error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout {
                operation,
                timeout_ms,
            }
        } else {
            Self::Transport {
                operation,
                message: error.to_string(),
            }
        }
    }

    /// Returns `true` if the backend was never reached or did not answer in
    /// time.
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Transport { .. })
    }
}
