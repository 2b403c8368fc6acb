//! Pairing tokens.
//!
//! A [`Token`] is the sole correlation key between the node being installed and
//! the operator's `register` command. It is shown on the node's console as a QR
//! code and used verbatim as the rendezvous key.
//!
//! Wire format (41 bytes before encoding, URL-safe base64 without padding):
//! - 1 byte: version (currently 1)
//! - 32 bytes: OS entropy
//! - 8 bytes: issue time (Unix seconds, big-endian i64)

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Current wire format version.
const TOKEN_VERSION: u8 = 1;

/// Number of random bytes carried by every token.
pub const TOKEN_ENTROPY_BYTES: usize = 32;

const RAW_LEN: usize = 1 + TOKEN_ENTROPY_BYTES + 8;

/// An unguessable, time-stamped pairing token.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Token {
    random: [u8; TOKEN_ENTROPY_BYTES],
    issued_at: i64,
    encoded: String,
}

impl Token {
    /// Generate a fresh token from OS entropy, stamped with the current time.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::EntropyFailure` if the OS random source fails.
    pub fn generate() -> Result<Self> {
        Self::generate_at(Utc::now())
    }

    /// Generate a fresh token stamped with `issued_at`.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::EntropyFailure` if the OS random source fails.
    pub fn generate_at(issued_at: DateTime<Utc>) -> Result<Self> {
        let mut random = [0u8; TOKEN_ENTROPY_BYTES];
        OsRng
            .try_fill_bytes(&mut random)
            .map_err(|e| CoreError::EntropyFailure(e.to_string()))?;

        Ok(Self::from_parts(random, issued_at.timestamp()))
    }

    /// Build a token from its parts.
    ///
    /// Useful for creating predictable tokens in tests.
    #[must_use]
    pub fn from_parts(random: [u8; TOKEN_ENTROPY_BYTES], issued_at: i64) -> Self {
        let mut raw = Vec::with_capacity(RAW_LEN);
        raw.push(TOKEN_VERSION);
        raw.extend_from_slice(&random);
        raw.extend_from_slice(&issued_at.to_be_bytes());

        Self {
            random,
            issued_at,
            encoded: URL_SAFE_NO_PAD.encode(raw),
        }
    }

    /// Parse a token from its text form.
    ///
    /// Surrounding whitespace is ignored, so text pasted from a terminal or
    /// decoded from a QR code with a trailing newline still parses.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidToken` if the text is not valid base64, has the
    /// wrong length, or carries an unknown version.
    pub fn parse(s: &str) -> Result<Self> {
        let raw = URL_SAFE_NO_PAD
            .decode(s.trim())
            .map_err(|_| CoreError::InvalidToken("not url-safe base64".to_string()))?;

        if raw.len() != RAW_LEN {
            return Err(CoreError::InvalidToken(format!(
                "expected {RAW_LEN} bytes, got {}",
                raw.len()
            )));
        }
        if raw[0] != TOKEN_VERSION {
            return Err(CoreError::InvalidToken(format!(
                "unsupported version {}",
                raw[0]
            )));
        }

        let mut random = [0u8; TOKEN_ENTROPY_BYTES];
        random.copy_from_slice(&raw[1..=TOKEN_ENTROPY_BYTES]);
        let mut ts = [0u8; 8];
        ts.copy_from_slice(&raw[1 + TOKEN_ENTROPY_BYTES..]);

        Ok(Self::from_parts(random, i64::from_be_bytes(ts)))
    }

    /// Return the token text (the rendezvous key).
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.encoded
    }

    /// Return the random portion of the token.
    #[must_use]
    pub const fn entropy(&self) -> &[u8; TOKEN_ENTROPY_BYTES] {
        &self.random
    }

    /// Return the issue time as Unix seconds.
    #[must_use]
    pub const fn issued_at(&self) -> i64 {
        self.issued_at
    }

    /// Seconds elapsed between issue and `now`. Negative if issued in the future.
    #[must_use]
    pub fn age_secs(&self, now: DateTime<Utc>) -> i64 {
        now.timestamp().saturating_sub(self.issued_at)
    }

    /// Returns true if the token is older than `ttl` at `now`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        let ttl_secs = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
        self.age_secs(now) > ttl_secs
    }

    /// Check that the token is still within `ttl`.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::TokenExpired` if the token is older than `ttl`.
    pub fn check_fresh(&self, now: DateTime<Utc>, ttl: Duration) -> Result<()> {
        if self.is_expired(now, ttl) {
            return Err(CoreError::TokenExpired {
                age_secs: self.age_secs(now),
                ttl_secs: ttl.as_secs(),
            });
        }
        Ok(())
    }

    /// Short, non-reversible fingerprint for logs.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let hash = blake3::hash(self.encoded.as_bytes());
        hex::encode(&hash.as_bytes()[..8])
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print the secret itself.
        write!(f, "Token({})", self.fingerprint())
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encoded)
    }
}

impl FromStr for Token {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Token {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<Token> for String {
    fn from(token: Token) -> Self {
        token.encoded
    }
}

impl AsRef<str> for Token {
    fn as_ref(&self) -> &str {
        &self.encoded
    }
}
