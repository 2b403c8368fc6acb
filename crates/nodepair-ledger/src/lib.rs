//! Rendezvous over the shared peer-to-peer ledger.
//!
//! The peer network exposes a replicated key-value ledger organised in buckets.
//! This crate wraps it behind the [`Ledger`] trait and builds the token-keyed
//! [`RendezvousChannel`] on top.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   publish(token, payload)   ┌──────────────────┐
//! │  register    │────────────────────────────▶│                  │
//! │  (operator)  │                             │ RendezvousChannel│
//! └──────────────┘                             │                  │
//! ┌──────────────┐   receive(token, cancel)    │                  │
//! │  install     │◀────────────────────────────│                  │
//! │  (node)      │                             └────────┬─────────┘
//! └──────────────┘                                      │
//!                                              ┌────────▼─────────┐
//!                                              │  Ledger (trait)  │
//!                                              └────────┬─────────┘
//!                                     ┌─────────────────┴───────────┐
//!                              ┌──────▼──────┐               ┌──────▼───────┐
//!                              │ HttpLedger  │               │ MemoryLedger │
//!                              │ (peer API)  │               │ (in-process) │
//!                              └─────────────┘               └──────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use nodepair_core::{NodeConfig, Token};
//! use nodepair_ledger::{HttpLedger, RendezvousChannel};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let ledger = Arc::new(HttpLedger::new("127.0.0.1:8080")?);
//! let channel = RendezvousChannel::new(ledger, "nodepair");
//!
//! let token: Token = "token-text-from-the-qr-code".parse()?;
//! let payload = NodeConfig::new("/dev/sda", "#cloud-config").to_payload();
//! channel.publish(&token, &payload).await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod channel;
pub mod error;
pub mod http;
pub mod keys;
pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

pub use channel::{RendezvousChannel, DEFAULT_POLL_INTERVAL};
pub use error::{LedgerError, Result};
pub use http::HttpLedger;
pub use memory::MemoryLedger;

/// The key-value surface of the peer network.
///
/// Values are JSON documents; their meaning is up to the caller.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Read `key` from `bucket`, `None` if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the ledger cannot be reached or answers with an error.
    async fn get(&self, bucket: &str, key: &str) -> Result<Option<Value>>;

    /// Write `value` to `key` in `bucket`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the ledger cannot be reached or rejects the write.
    async fn put(&self, bucket: &str, key: &str, value: &Value) -> Result<()>;

    /// Remove `key` from `bucket`. Removing a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the ledger cannot be reached or rejects the delete.
    async fn delete(&self, bucket: &str, key: &str) -> Result<()>;
}

#[async_trait]
impl<L: Ledger + ?Sized> Ledger for Arc<L> {
    async fn get(&self, bucket: &str, key: &str) -> Result<Option<Value>> {
        (**self).get(bucket, key).await
    }

    async fn put(&self, bucket: &str, key: &str, value: &Value) -> Result<()> {
        (**self).put(bucket, key, value).await
    }

    async fn delete(&self, bucket: &str, key: &str) -> Result<()> {
        (**self).delete(bucket, key).await
    }
}
