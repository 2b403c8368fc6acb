//! In-process ledger.
//!
//! Both sides of a handshake can share one `MemoryLedger` through an `Arc`,
//! which makes it the substrate of choice for tests and single-host runs.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;

use crate::error::Result;
use crate::Ledger;

/// A ledger held entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    entries: RwLock<HashMap<(String, String), Value>>,
}

impl MemoryLedger {
    /// Create an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys across all buckets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Returns true if `key` exists in `bucket`.
    #[must_use]
    pub fn contains(&self, bucket: &str, key: &str) -> bool {
        self.entries
            .read()
            .contains_key(&(bucket.to_string(), key.to_string()))
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    async fn get(&self, bucket: &str, key: &str) -> Result<Option<Value>> {
        Ok(self
            .entries
            .read()
            .get(&(bucket.to_string(), key.to_string()))
            .cloned())
    }

    async fn put(&self, bucket: &str, key: &str, value: &Value) -> Result<()> {
        self.entries
            .write()
            .insert((bucket.to_string(), key.to_string()), value.clone());
        Ok(())
    }

    async fn delete(&self, bucket: &str, key: &str) -> Result<()> {
        self.entries
            .write()
            .remove(&(bucket.to_string(), key.to_string()));
        Ok(())
    }
}
