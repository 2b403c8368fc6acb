//! Install gate.
//!
//! Once a configuration is received, the node hands it to an external install
//! procedure. The procedure itself is opaque; this module only decides how the
//! configuration is passed to it.

use std::io::Write;
use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use nodepair_core::NodeConfig;
use tokio::process::Command;

use crate::error::{ControlError, Result};

/// Trait for the component that installs a received configuration.
#[async_trait]
pub trait InstallGate: Send + Sync {
    /// Install the node with `config`.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::InstallProcedure` if the install did not complete.
    async fn install(&self, config: &NodeConfig) -> Result<()>;
}

/// Runs an installer executable.
///
/// The cloud-config is written to a temporary file and the installer is
/// invoked as `<program> [args..] --cloud-init <file> <device>`. The
/// configuration is also exported as environment variables:
///
/// | Variable                   | Value                              |
/// |----------------------------|------------------------------------|
/// | `NODEPAIR_DEVICE`          | target device                      |
/// | `NODEPAIR_CLOUD_CONFIG`    | cloud-config text                  |
/// | `NODEPAIR_REBOOT`          | `true` or `false`                  |
/// | `NODEPAIR_EXTRA_<KEY>`     | any additional payload entry       |
#[derive(Debug, Clone)]
pub struct ScriptInstaller {
    program: PathBuf,
    args: Vec<String>,
}

impl ScriptInstaller {
    /// Create an installer running `program`.
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Arguments placed before the generated ones.
    #[must_use]
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }
}

fn extra_env_name(key: &str) -> String {
    let suffix: String = key
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    format!("NODEPAIR_EXTRA_{suffix}")
}

#[async_trait]
impl InstallGate for ScriptInstaller {
    async fn install(&self, config: &NodeConfig) -> Result<()> {
        if config.device.trim().is_empty() {
            return Err(ControlError::InstallProcedure(
                "device must be specified".to_string(),
            ));
        }

        let mut cloud_init = tempfile::Builder::new()
            .prefix("nodepair-")
            .suffix(".yaml")
            .tempfile()?;
        cloud_init.write_all(config.cloud_config.as_bytes())?;
        cloud_init.flush()?;

        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .arg("--cloud-init")
            .arg(cloud_init.path())
            .arg(&config.device)
            .env("NODEPAIR_DEVICE", &config.device)
            .env("NODEPAIR_CLOUD_CONFIG", &config.cloud_config)
            .env("NODEPAIR_REBOOT", config.reboot.to_string())
            .stdin(Stdio::null());
        for (key, value) in &config.extra {
            command.env(extra_env_name(key), value);
        }

        tracing::info!(
            program = %self.program.display(),
            device = %config.device,
            "Running installer"
        );

        let status = command.status().await.map_err(|e| {
            ControlError::InstallProcedure(format!("{}: {e}", self.program.display()))
        })?;

        if !status.success() {
            return Err(ControlError::InstallProcedure(match status.code() {
                Some(code) => format!("installer exited with status {code}"),
                None => "installer terminated by signal".to_string(),
            }));
        }

        tracing::info!(device = %config.device, "Installation completed");
        Ok(())
    }
}
