//! Node configuration delivered during enrollment.
//!
//! On the wire the configuration is a flat string-to-string mapping (the
//! [`Payload`]); the `reboot` flag is encoded by the mere presence of its key.
//! Inside the program it is the typed [`NodeConfig`].

use std::collections::BTreeMap;

use crate::error::{CoreError, Result};

/// The wire form of a configuration: string keys to string values.
pub type Payload = BTreeMap<String, String>;

/// Payload key holding the target install device.
pub const DEVICE_KEY: &str = "device";

/// Payload key holding the cloud-config document.
pub const CLOUD_CONFIG_KEY: &str = "cc";

/// Payload key whose presence requests a reboot right after installation.
pub const REBOOT_KEY: &str = "reboot";

/// Typed installation configuration for a node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeConfig {
    /// Block device to install onto (e.g. `/dev/sda`).
    pub device: String,
    /// Cloud-config document applied by the installer.
    pub cloud_config: String,
    /// Reboot immediately after installation, without prompting.
    pub reboot: bool,
    /// Payload keys this version does not interpret, passed through untouched.
    pub extra: BTreeMap<String, String>,
}

impl NodeConfig {
    /// Create a configuration for `device` with the given cloud-config.
    #[must_use]
    pub fn new(device: impl Into<String>, cloud_config: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            cloud_config: cloud_config.into(),
            reboot: false,
            extra: BTreeMap::new(),
        }
    }

    /// Set the reboot flag.
    #[must_use]
    pub fn with_reboot(mut self, reboot: bool) -> Self {
        self.reboot = reboot;
        self
    }

    /// Encode into the wire mapping.
    #[must_use]
    pub fn to_payload(&self) -> Payload {
        let mut payload = self.extra.clone();
        payload.insert(DEVICE_KEY.to_string(), self.device.clone());
        payload.insert(CLOUD_CONFIG_KEY.to_string(), self.cloud_config.clone());
        if self.reboot {
            payload.insert(REBOOT_KEY.to_string(), String::new());
        }
        payload
    }

    /// Decode from the wire mapping.
    ///
    /// Missing `device` or `cc` keys decode as empty strings; rejecting those is
    /// left to the installer. Any key other than the three known ones is kept in
    /// [`NodeConfig::extra`].
    ///
    /// # Errors
    ///
    /// Returns `CoreError::EmptyConfiguration` if the mapping has no entries.
    pub fn from_payload(mut payload: Payload) -> Result<Self> {
        if payload.is_empty() {
            return Err(CoreError::EmptyConfiguration);
        }

        let device = payload.remove(DEVICE_KEY).unwrap_or_default();
        let cloud_config = payload.remove(CLOUD_CONFIG_KEY).unwrap_or_default();
        let reboot = payload.remove(REBOOT_KEY).is_some();

        Ok(Self {
            device,
            cloud_config,
            reboot,
            extra: payload,
        })
    }
}
