//! Enrollment configuration.
//!
//! Every field has a default matching a stock node image, so an empty document
//! (or `EnrollConfig::default()`) is a working configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// Settings shared by the enrollment commands.
#[derive(Debug, Clone, Deserialize)]
pub struct EnrollConfig {
    /// Namespace prefixed to every ledger bucket.
    #[serde(default = "EnrollConfig::default_namespace")]
    pub namespace: String,

    /// Delay between two polls of the pairing key, in milliseconds.
    #[serde(default = "EnrollConfig::default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Pause between the instructions and the QR code, in seconds.
    #[serde(default = "EnrollConfig::default_start_delay")]
    pub start_delay_secs: u64,

    /// Maximum token age accepted by `register`, in seconds.
    #[serde(default = "EnrollConfig::default_token_ttl")]
    pub token_ttl_secs: u64,

    /// Service unit that owns the console, restarted when pairing is aborted.
    #[serde(default = "EnrollConfig::default_console_unit")]
    pub console_unit: String,

    /// Installer executable run with the received configuration.
    #[serde(default = "EnrollConfig::default_install_command")]
    pub install_command: PathBuf,

    /// Service unit of the peer network daemon.
    #[serde(default = "EnrollConfig::default_substrate_unit")]
    pub substrate_unit: String,

    /// Environment file read by the peer network daemon unit.
    #[serde(default = "EnrollConfig::default_substrate_env_file")]
    pub substrate_env_file: PathBuf,

    /// Shell command capturing the screen; `{output}` is replaced by the image path.
    #[serde(default = "EnrollConfig::default_capture_command")]
    pub capture_command: String,
}

impl EnrollConfig {
    fn default_namespace() -> String {
        nodepair_ledger::keys::DEFAULT_NAMESPACE.to_string()
    }

    const fn default_poll_interval() -> u64 {
        2000
    }

    const fn default_start_delay() -> u64 {
        5
    }

    const fn default_token_ttl() -> u64 {
        3600 // 1 hour
    }

    fn default_console_unit() -> String {
        "getty@tty1".to_string()
    }

    fn default_install_command() -> PathBuf {
        PathBuf::from("/usr/sbin/nodepair-install")
    }

    fn default_substrate_unit() -> String {
        "edgevpn".to_string()
    }

    fn default_substrate_env_file() -> PathBuf {
        PathBuf::from("/etc/systemd/system.conf.d/edgevpn-nodepair.env")
    }

    fn default_capture_command() -> String {
        "import -window root {output}".to_string()
    }

    /// Get the poll interval as a `Duration`.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Get the start delay as a `Duration`.
    #[must_use]
    pub fn start_delay(&self) -> Duration {
        Duration::from_secs(self.start_delay_secs)
    }

    /// Get the token lifetime as a `Duration`.
    #[must_use]
    pub fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.token_ttl_secs)
    }
}

impl Default for EnrollConfig {
    fn default() -> Self {
        Self {
            namespace: Self::default_namespace(),
            poll_interval_ms: Self::default_poll_interval(),
            start_delay_secs: Self::default_start_delay(),
            token_ttl_secs: Self::default_token_ttl(),
            console_unit: Self::default_console_unit(),
            install_command: Self::default_install_command(),
            substrate_unit: Self::default_substrate_unit(),
            substrate_env_file: Self::default_substrate_env_file(),
            capture_command: Self::default_capture_command(),
        }
    }
}
