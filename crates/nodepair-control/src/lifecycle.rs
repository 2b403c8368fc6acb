//! Enrollment state machine.
//!
//! This module defines the states a node goes through while waiting for its
//! configuration and the transitions allowed between them.
//!
//! # State Machine
//!
//! ```text
//!     ┌────────┐  generate token   ┌────────────┐  show QR, start watcher
//!     │  Idle  │──────────────────▶│ TokenReady │─────────────────────┐
//!     └───┬────┘                   └────────────┘                     │
//!         │ (entropy failure)                                         ▼
//!         │                                                    ┌─────────────┐
//!         │                     ┌──────────────────────────────│   Waiting   │
//!         │                     │ payload          abort       └──────┬──────┘
//!         │                     ▼                    │                │ empty payload /
//!         │              ┌─────────────┐       ┌─────▼─────┐          │ transport error
//!         │              │  Succeeded  │       │  Aborted  │          ▼
//!         │              └──────┬──────┘       └─────┬─────┘    ┌──────────┐
//!         └─────────────────────┼────────────────────┼─────────▶│  Failed  │
//!                               │ install + reboot   │          └────┬─────┘
//!                               ▼                    ▼               │
//!                         ┌──────────────────────────────────────────▼─┐
//!                         │                  Terminal                  │
//!                         └────────────────────────────────────────────┘
//! ```

use crate::error::{ControlError, Result};

/// States of one enrollment attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnrollmentState {
    /// Nothing has happened yet.
    Idle,
    /// A token exists but is not yet shown.
    TokenReady,
    /// The token is shown and the node waits for a payload or an abort.
    Waiting,
    /// The operator aborted from the console.
    Aborted,
    /// The wait ended without a usable configuration.
    Failed,
    /// A non-empty configuration was received.
    Succeeded,
    /// The attempt is over.
    Terminal,
}

/// Validates a state transition and returns the target state if valid.
///
/// # Errors
///
/// Returns `ControlError::InvalidTransition` if the transition is not allowed.
pub fn validate_transition(from: EnrollmentState, to: EnrollmentState) -> Result<EnrollmentState> {
    if is_valid_transition(from, to) {
        Ok(to)
    } else {
        Err(ControlError::InvalidTransition { from, to })
    }
}

/// Check if a state transition is valid according to the state machine.
#[must_use]
pub const fn is_valid_transition(from: EnrollmentState, to: EnrollmentState) -> bool {
    use EnrollmentState::{Aborted, Failed, Idle, Succeeded, Terminal, TokenReady, Waiting};

    matches!(
        (from, to),
        (Idle, TokenReady)
            // entropy failure leaves no token to show
            | (Idle, Failed)
            | (TokenReady, Waiting)
            | (Waiting, Aborted | Failed | Succeeded)
            | (Aborted | Failed | Succeeded, Terminal)
    )
}

/// Returns true if the state decides the outcome of the wait.
#[must_use]
pub const fn is_outcome(state: EnrollmentState) -> bool {
    matches!(
        state,
        EnrollmentState::Aborted | EnrollmentState::Failed | EnrollmentState::Succeeded
    )
}

/// Returns true if no further transition is possible.
#[must_use]
pub const fn is_terminal(state: EnrollmentState) -> bool {
    matches!(state, EnrollmentState::Terminal)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_is_valid() {
        use EnrollmentState::*;

        assert!(is_valid_transition(Idle, TokenReady));
        assert!(is_valid_transition(TokenReady, Waiting));
        assert!(is_valid_transition(Waiting, Succeeded));
        assert!(is_valid_transition(Succeeded, Terminal));
    }

    #[test]
    fn wait_can_end_three_ways() {
        use EnrollmentState::*;

        for outcome in [Aborted, Failed, Succeeded] {
            assert!(is_valid_transition(Waiting, outcome));
            assert!(is_valid_transition(outcome, Terminal));
            assert!(is_outcome(outcome));
        }
    }

    #[test]
    fn invalid_transitions() {
        use EnrollmentState::*;

        // Can't skip showing the token
        assert!(!is_valid_transition(TokenReady, Succeeded));
        // Can't leave a decided outcome for another one
        assert!(!is_valid_transition(Aborted, Succeeded));
        assert!(!is_valid_transition(Succeeded, Failed));
        // Terminal is final
        assert!(!is_valid_transition(Terminal, Idle));
        assert!(is_terminal(Terminal));
    }

    #[test]
    fn validate_transition_err() {
        let result = validate_transition(EnrollmentState::Aborted, EnrollmentState::Succeeded);

        match result {
            Err(ControlError::InvalidTransition { from, to }) => {
                assert_eq!(from, EnrollmentState::Aborted);
                assert_eq!(to, EnrollmentState::Succeeded);
            }
            _ => panic!("expected InvalidTransition error"),
        }
    }
}
