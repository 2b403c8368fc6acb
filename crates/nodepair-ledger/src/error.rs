//! Error types for the ledger and rendezvous channel.

use thiserror::Error;

/// A result type using `LedgerError`.
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Errors that can occur while talking to the shared ledger.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The request never produced a response (connection refused, reset, timeout).
    #[error("transport error: {0}")]
    Transport(String),

    /// The ledger API answered with an error status.
    #[error("ledger API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error message from the response body, or a generic one.
        message: String,
    },

    /// A value could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A blocking wait was cancelled by its caller.
    #[error("wait cancelled")]
    Cancelled,
}

impl LedgerError {
    /// Returns true if this error is a caller-requested cancellation rather than a fault.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Returns true if this error might be resolved by retrying.
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Api { status, .. } => *status >= 500,
            Self::Serialization(_) | Self::Cancelled => false,
        }
    }
}

impl From<reqwest::Error> for LedgerError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::Serialization(e.to_string())
        } else {
            Self::Transport(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancellation_is_not_a_fault() {
        assert!(LedgerError::Cancelled.is_cancelled());
        assert!(!LedgerError::Cancelled.is_retriable());
        assert!(!LedgerError::Transport("refused".into()).is_cancelled());
    }

    #[test]
    fn retriable_errors() {
        assert!(LedgerError::Transport("reset".into()).is_retriable());
        assert!(LedgerError::Api {
            status: 503,
            message: "busy".into()
        }
        .is_retriable());
        assert!(!LedgerError::Api {
            status: 400,
            message: "bad key".into()
        }
        .is_retriable());
        assert!(!LedgerError::Serialization("eof".into()).is_retriable());
    }
}
