//! Token-addressed rendezvous over the ledger.
//!
//! The sender publishes a configuration payload under the pairing token; the
//! receiver polls that key until the payload shows up or its wait is
//! cancelled. The channel never inspects payload contents.

use std::sync::Arc;
use std::time::Duration;

use nodepair_core::{Payload, Token};
use tokio_util::sync::CancellationToken;

use crate::error::{LedgerError, Result};
use crate::keys;
use crate::Ledger;

/// Default delay between two polls of the pairing key.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Publish/receive endpoint for configuration payloads.
#[derive(Clone)]
pub struct RendezvousChannel {
    ledger: Arc<dyn Ledger>,
    bucket: String,
    poll_interval: Duration,
}

impl RendezvousChannel {
    /// Create a channel on `ledger` using the pairing bucket of `namespace`.
    #[must_use]
    pub fn new(ledger: Arc<dyn Ledger>, namespace: &str) -> Self {
        Self {
            ledger,
            bucket: keys::pairing_bucket(namespace),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Set the delay between polls while receiving.
    #[must_use]
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Bucket the payloads are stored in.
    #[must_use]
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Store `payload` under `token`.
    ///
    /// Returns once the ledger accepted the write; delivery to the receiver is
    /// not confirmed.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be encoded or the write fails.
    pub async fn publish(&self, token: &Token, payload: &Payload) -> Result<()> {
        let value =
            serde_json::to_value(payload).map_err(|e| LedgerError::Serialization(e.to_string()))?;

        self.ledger.put(&self.bucket, token.as_str(), &value).await?;

        tracing::info!(
            token = %token.fingerprint(),
            keys = payload.len(),
            "Published pairing payload"
        );
        Ok(())
    }

    /// Wait for a payload under `token`.
    ///
    /// There is no timeout: the wait ends when a payload appears, `cancel`
    /// fires, or the ledger fails. A received payload is removed from the
    /// ledger so the token cannot be served twice.
    ///
    /// # Errors
    ///
    /// - `LedgerError::Cancelled` if `cancel` fired first
    /// - any transport or decoding error from the ledger, unchanged
    pub async fn receive(&self, token: &Token, cancel: &CancellationToken) -> Result<Payload> {
        tracing::debug!(token = %token.fingerprint(), bucket = %self.bucket, "Waiting for pairing payload");

        loop {
            let found = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(LedgerError::Cancelled),
                found = self.ledger.get(&self.bucket, token.as_str()) => found?,
            };

            if let Some(value) = found {
                let payload: Payload = serde_json::from_value(value)
                    .map_err(|e| LedgerError::Serialization(e.to_string()))?;
                self.discard(token).await;
                tracing::info!(
                    token = %token.fingerprint(),
                    keys = payload.len(),
                    "Received pairing payload"
                );
                return Ok(payload);
            }

            tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(LedgerError::Cancelled),
                () = tokio::time::sleep(self.poll_interval) => {}
            }
        }
    }

    async fn discard(&self, token: &Token) {
        if let Err(e) = self.ledger.delete(&self.bucket, token.as_str()).await {
            tracing::warn!(
                token = %token.fingerprint(),
                error = %e,
                "Failed to remove consumed pairing payload"
            );
        }
    }
}

impl std::fmt::Debug for RendezvousChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RendezvousChannel")
            .field("bucket", &self.bucket)
            .field("poll_interval", &self.poll_interval)
            .finish_non_exhaustive()
    }
}
