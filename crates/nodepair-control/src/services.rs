//! Service-manager hooks.
//!
//! Enrollment touches the host's init system in two places: restarting the
//! console when pairing is aborted, and rebooting once the node is installed.
//! Both are best-effort; failures are logged and the caller carries on.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

/// Trait for the host's service manager.
///
/// This trait abstracts the init system, allowing for recording
/// implementations in tests.
#[async_trait]
pub trait ServiceManager: Send + Sync {
    /// Restart the named unit.
    async fn restart_unit(&self, unit: &str);

    /// Reboot the machine.
    async fn reboot(&self);
}

/// `systemctl`-backed service manager.
#[derive(Debug, Clone, Default)]
pub struct SystemdServiceManager;

impl SystemdServiceManager {
    /// Create a new systemd service manager.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    async fn run(program: &str, args: &[&str]) {
        let status = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .status()
            .await;

        match status {
            Ok(status) if status.success() => {
                tracing::debug!(program, ?args, "Service command succeeded");
            }
            Ok(status) => {
                tracing::warn!(program, ?args, code = ?status.code(), "Service command failed");
            }
            Err(e) => {
                tracing::warn!(program, ?args, error = %e, "Failed to run service command");
            }
        }
    }
}

#[async_trait]
impl ServiceManager for SystemdServiceManager {
    async fn restart_unit(&self, unit: &str) {
        tracing::info!(unit, "Restarting unit");
        Self::run("systemctl", &["restart", unit]).await;
    }

    async fn reboot(&self) {
        tracing::info!("Rebooting");
        Self::run("reboot", &[]).await;
    }
}
