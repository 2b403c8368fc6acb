//! HTTP client for the peer network's ledger API.
//!
//! The local network daemon exposes its shared key-value ledger over HTTP:
//!
//! - `GET    {api}/api/ledger/{bucket}/{key}` returns the JSON value, 404 if absent
//! - `PUT    {api}/api/ledger/{bucket}/{key}` stores the JSON request body
//! - `DELETE {api}/api/ledger/{bucket}/{key}` removes the key

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use serde_json::Value;

use crate::error::{LedgerError, Result};
use crate::Ledger;

/// Error response from the ledger API.
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
}

/// HTTP client for the ledger API.
#[derive(Debug, Clone)]
pub struct HttpLedger {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpLedger {
    /// Create a new ledger client.
    ///
    /// `api` may be a full URL or a bare `host:port`, in which case plain HTTP
    /// is assumed.
    ///
    /// # Errors
    ///
    /// Returns an error if `api` is not a usable base URL or the HTTP client
    /// cannot be created.
    pub fn new(api: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| LedgerError::Transport(format!("failed to create HTTP client: {e}")))?;

        Self::with_client(client, api)
    }

    /// Create a new ledger client with a custom reqwest client.
    ///
    /// # Errors
    ///
    /// Returns an error if `api` is not a usable base URL.
    pub fn with_client(client: reqwest::Client, api: &str) -> Result<Self> {
        Ok(Self {
            client,
            base_url: normalize_base_url(api)?,
        })
    }

    /// Get the base URL of the ledger API.
    #[must_use]
    pub fn base_url(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }

    fn key_url(&self, bucket: &str, key: &str) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| LedgerError::Transport(format!("not a base URL: {}", self.base_url)))?
            .pop_if_empty()
            .extend(["api", "ledger", bucket, key]);
        Ok(url)
    }

    /// Handle API error responses.
    async fn handle_error(response: reqwest::Response) -> LedgerError {
        let status = response.status();
        let message = response
            .json::<ErrorResponse>()
            .await
            .map(|e| e.error)
            .unwrap_or_else(|_| format!("ledger returned status {status}"));
        LedgerError::Api {
            status: status.as_u16(),
            message,
        }
    }
}

fn normalize_base_url(api: &str) -> Result<Url> {
    let api = api.trim().trim_end_matches('/');
    let with_scheme = if api.contains("://") {
        api.to_string()
    } else {
        format!("http://{api}")
    };

    Url::parse(&with_scheme)
        .map_err(|e| LedgerError::Transport(format!("invalid ledger API address {api:?}: {e}")))
}

#[async_trait]
impl Ledger for HttpLedger {
    async fn get(&self, bucket: &str, key: &str) -> Result<Option<Value>> {
        let url = self.key_url(bucket, key)?;
        let response = self.client.get(url).send().await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let value: Value = response.json().await?;
                Ok((!value.is_null()).then_some(value))
            }
            _ => Err(Self::handle_error(response).await),
        }
    }

    async fn put(&self, bucket: &str, key: &str, value: &Value) -> Result<()> {
        let url = self.key_url(bucket, key)?;
        let response = self.client.put(url).json(value).send().await?;

        if response.status().is_success() {
            tracing::debug!(bucket, "Stored ledger value");
            Ok(())
        } else {
            let err = Self::handle_error(response).await;
            tracing::error!(bucket, error = %err, "Failed to store ledger value");
            Err(err)
        }
    }

    async fn delete(&self, bucket: &str, key: &str) -> Result<()> {
        let url = self.key_url(bucket, key)?;
        let response = self.client.delete(url).send().await?;

        if response.status().is_success() || response.status() == StatusCode::NOT_FOUND {
            Ok(())
        } else {
            Err(Self::handle_error(response).await)
        }
    }
}
