//! Cluster kubeconfig lookup.
//!
//! Control-plane nodes store their kubeconfig in the ledger, base64-encoded,
//! together with their address. The stored document points at the loopback
//! address; the copy handed to the operator points at the control plane.

use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use base64::Engine;
use nodepair_ledger::{keys, Ledger};
use serde_json::Value;

use crate::error::Result;

const LOOPBACK: &str = "127.0.0.1";

fn text(value: Option<Value>) -> String {
    match value {
        Some(Value::String(s)) => s,
        None | Some(Value::Null) => String::new(),
        Some(other) => other.to_string(),
    }
}

fn decode(encoded: &str) -> String {
    let encoded = encoded.trim();
    let bytes = URL_SAFE
        .decode(encoded)
        .or_else(|_| STANDARD.decode(encoded));

    match bytes {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(e) => {
            tracing::warn!(error = %e, "Stored kubeconfig is not valid base64");
            String::new()
        }
    }
}

/// Fetch the control-plane kubeconfig, rewritten to the control-plane address.
///
/// Decoding problems are not fatal: an undecodable document yields an empty
/// string.
///
/// If no control-plane address is stored (missing or empty), the document is
/// returned unchanged and keeps pointing at the loopback address. The loopback
/// address is never replaced with an empty string.
///
/// # Errors
///
/// Returns `ControlError::Transport` if either ledger read fails.
pub async fn fetch(ledger: &dyn Ledger, namespace: &str) -> Result<String> {
    let encoded = ledger
        .get(&keys::bucket(namespace, keys::KUBECONFIG), keys::MASTER_ROLE)
        .await?;
    let master_ip = ledger
        .get(&keys::bucket(namespace, keys::MASTER), keys::IP)
        .await?;

    let kubeconfig = decode(&text(encoded));
    let master_ip = text(master_ip);

    if master_ip.is_empty() {
        tracing::warn!("Control-plane address unknown, kubeconfig left unchanged");
        return Ok(kubeconfig);
    }

    Ok(kubeconfig.replace(LOOPBACK, &master_ip))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use nodepair_ledger::MemoryLedger;
    use serde_json::json;

    use super::*;

    async fn seed(kubeconfig: Option<&str>, ip: Option<&str>) -> Arc<MemoryLedger> {
        let ledger = Arc::new(MemoryLedger::new());
        if let Some(kubeconfig) = kubeconfig {
            ledger
                .put("nodepair-kubeconfig", "master", &json!(kubeconfig))
                .await
                .unwrap();
        }
        if let Some(ip) = ip {
            ledger
                .put("nodepair-master", "ip", &json!(ip))
                .await
                .unwrap();
        }
        ledger
    }

    #[tokio::test]
    async fn loopback_is_replaced_by_master_address() {
        let encoded = URL_SAFE.encode("server: https://127.0.0.1:6443");
        let ledger = seed(Some(&encoded), Some("10.0.0.5")).await;

        let kubeconfig = fetch(ledger.as_ref(), "nodepair").await.unwrap();

        assert!(kubeconfig.contains("https://10.0.0.5:6443"));
        assert!(!kubeconfig.contains("127.0.0.1"));
    }

    #[tokio::test]
    async fn every_occurrence_is_replaced() {
        let encoded = STANDARD.encode("a: 127.0.0.1\nb: 127.0.0.1\n");
        let ledger = seed(Some(&encoded), Some("10.0.0.5")).await;

        let first = fetch(ledger.as_ref(), "nodepair").await.unwrap();
        let second = fetch(ledger.as_ref(), "nodepair").await.unwrap();

        assert_eq!(first, "a: 10.0.0.5\nb: 10.0.0.5\n");
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn undecodable_document_is_empty() {
        let ledger = seed(Some("%%% not base64 %%%"), Some("10.0.0.5")).await;
        assert_eq!(fetch(ledger.as_ref(), "nodepair").await.unwrap(), "");
    }

    #[tokio::test]
    async fn missing_entries_are_empty() {
        let ledger = seed(None, None).await;
        assert_eq!(fetch(ledger.as_ref(), "nodepair").await.unwrap(), "");
    }

    #[tokio::test]
    async fn unknown_address_leaves_document() {
        let encoded = URL_SAFE.encode("server: https://127.0.0.1:6443");
        let ledger = seed(Some(&encoded), None).await;

        assert_eq!(
            fetch(ledger.as_ref(), "nodepair").await.unwrap(),
            "server: https://127.0.0.1:6443"
        );

        let ledger = seed(Some(&encoded), Some("")).await;
        assert_eq!(
            fetch(ledger.as_ref(), "nodepair").await.unwrap(),
            "server: https://127.0.0.1:6443"
        );
    }
}
