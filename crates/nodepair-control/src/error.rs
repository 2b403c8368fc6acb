//! Error types for the enrollment handshake.
//!
//! Every failure of `install`, `register`, `setup` and `get-kubeconfig` ends up
//! here. None of them is retried automatically; the operator re-runs the
//! command.

use nodepair_core::CoreError;
use nodepair_ledger::LedgerError;
use nodepair_qr::QrError;
use thiserror::Error;

use crate::lifecycle::EnrollmentState;

/// A result type using `ControlError`.
pub type Result<T> = std::result::Result<T, ControlError>;

/// Errors that can occur while pairing, installing or querying the ledger.
#[derive(Debug, Error)]
pub enum ControlError {
    /// The operator aborted the pairing from the node's console.
    #[error("pairing aborted")]
    Cancelled,

    /// A payload arrived but it was empty.
    #[error("no configuration, stopping installation")]
    EmptyConfiguration,

    /// The rendezvous ledger failed.
    #[error("rendezvous failed: {0}")]
    Transport(LedgerError),

    /// The external install procedure failed.
    #[error("installation failed: {0}")]
    InstallProcedure(String),

    /// The enrollment state machine was driven out of order.
    #[error("invalid enrollment transition: cannot transition from {from:?} to {to:?}")]
    InvalidTransition {
        /// The current state.
        from: EnrollmentState,
        /// The requested target state.
        to: EnrollmentState,
    },

    /// Token generation, parsing or freshness failed.
    #[error(transparent)]
    Token(CoreError),

    /// A token could not be read from an image.
    #[error(transparent)]
    Qr(#[from] QrError),

    /// A local file or process could not be accessed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Local settings are unusable.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ControlError {
    /// Returns true if the operator aborted, as opposed to a fault.
    #[must_use]
    pub const fn is_abort(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Returns true if re-running the same command might succeed.
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_retriable(),
            Self::Cancelled | Self::EmptyConfiguration => true,
            Self::InstallProcedure(_)
            | Self::InvalidTransition { .. }
            | Self::Token(_)
            | Self::Qr(_)
            | Self::Io(_)
            | Self::Config(_) => false,
        }
    }
}

impl From<LedgerError> for ControlError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::Cancelled => Self::Cancelled,
            other => Self::Transport(other),
        }
    }
}

impl From<CoreError> for ControlError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::EmptyConfiguration => Self::EmptyConfiguration,
            other => Self::Token(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ledger_cancellation_becomes_abort() {
        let err = ControlError::from(LedgerError::Cancelled);
        assert!(err.is_abort());

        let err = ControlError::from(LedgerError::Transport("refused".into()));
        assert!(!err.is_abort());
        assert!(matches!(err, ControlError::Transport(_)));
    }

    #[test]
    fn empty_configuration_keeps_its_identity() {
        let err = ControlError::from(CoreError::EmptyConfiguration);
        assert!(matches!(err, ControlError::EmptyConfiguration));
        assert_eq!(err.to_string(), "no configuration, stopping installation");

        let err = ControlError::from(CoreError::EntropyFailure("no rng".into()));
        assert!(matches!(err, ControlError::Token(_)));
    }

    #[test]
    fn retriable_errors() {
        assert!(ControlError::Cancelled.is_retriable());
        assert!(ControlError::Transport(LedgerError::Transport("reset".into())).is_retriable());
        assert!(!ControlError::InstallProcedure("exit 1".into()).is_retriable());
        assert!(!ControlError::Config("bad".into()).is_retriable());
    }
}
