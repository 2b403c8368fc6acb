//! Bucket naming for the shared ledger.
//!
//! Every bucket this system touches is prefixed with a namespace so several
//! deployments can share one peer network without stepping on each other.

/// Default namespace for all buckets.
pub const DEFAULT_NAMESPACE: &str = "nodepair";

/// Bucket holding configuration payloads, keyed by pairing token.
pub const PAIRING: &str = "pairing";

/// Bucket holding cluster kubeconfigs, keyed by node role.
pub const KUBECONFIG: &str = "kubeconfig";

/// Bucket holding node addresses, keyed by address kind.
pub const MASTER: &str = "master";

/// Key under [`KUBECONFIG`] for the control-plane kubeconfig.
pub const MASTER_ROLE: &str = "master";

/// Key under [`MASTER`] for the control-plane IP address.
pub const IP: &str = "ip";

/// Encode a namespaced bucket name: `namespace-bucket`.
#[must_use]
pub fn bucket(namespace: &str, name: &str) -> String {
    format!("{namespace}-{name}")
}

/// Encode the pairing bucket for a namespace.
#[must_use]
pub fn pairing_bucket(namespace: &str) -> String {
    bucket(namespace, PAIRING)
}
