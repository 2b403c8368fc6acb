//! Common error types for nodepair.
//!
//! This module provides the errors raised by token handling and payload decoding.

use thiserror::Error;

/// A result type using `CoreError`.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Core errors that can occur throughout the enrollment system.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// The OS entropy source failed; no token can be produced.
    #[error("entropy source failure: {0}")]
    EntropyFailure(String),

    /// A token could not be parsed.
    #[error("invalid token: {0}")]
    InvalidToken(String),

    /// A token is older than its allowed lifetime.
    #[error("token expired: issued {age_secs}s ago, lifetime is {ttl_secs}s")]
    TokenExpired {
        /// Seconds since the token was issued.
        age_secs: i64,
        /// Allowed lifetime in seconds.
        ttl_secs: u64,
    },

    /// A configuration payload arrived but contained no entries.
    #[error("no configuration, stopping installation")]
    EmptyConfiguration,
}
