//! Unattended node setup.
//!
//! A node image may ship a cloud-config with a pre-shared network token. When
//! one is found, the peer network daemon is configured with it and restarted,
//! so the node joins the network without a pairing step.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::Result;
use crate::services::ServiceManager;
use crate::types::EnrollConfig;

/// Variable carrying the network token in the daemon's environment file.
pub const TOKEN_ENV_VAR: &str = "EDGEVPNTOKEN";

/// Result of a setup run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetupOutcome {
    /// A token was found in `source` and the daemon reconfigured.
    Configured {
        /// Cloud-config file the token was read from.
        source: PathBuf,
    },
    /// No file carried a token.
    NothingToDo,
}

#[derive(Debug, Default, Deserialize)]
struct CloudConfig {
    #[serde(default)]
    nodepair: Section,
}

#[derive(Debug, Default, Deserialize)]
struct Section {
    #[serde(default)]
    network_token: Option<String>,
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml" | "yml")
    )
}

/// Cloud-config files in `dir`, in name order.
fn cloud_configs(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && is_yaml(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn network_token(path: &Path) -> Option<String> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Cannot read cloud-config");
            return None;
        }
    };

    match serde_yaml::from_str::<CloudConfig>(&text) {
        Ok(config) => config
            .nodepair
            .network_token
            .filter(|t| !t.trim().is_empty()),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Skipping invalid cloud-config");
            None
        }
    }
}

/// Configure the peer network daemon from the cloud-configs in `dir`.
///
/// The first file, in name order, with a non-empty `nodepair.network_token`
/// wins. A missing directory is not an error.
///
/// # Errors
///
/// Returns `ControlError::Io` if the directory cannot be listed or the
/// environment file cannot be written.
pub async fn setup(
    dir: &Path,
    config: &EnrollConfig,
    services: &dyn ServiceManager,
) -> Result<SetupOutcome> {
    if !dir.is_dir() {
        tracing::debug!(dir = %dir.display(), "No cloud-config directory");
        return Ok(SetupOutcome::NothingToDo);
    }

    let found = cloud_configs(dir)?
        .into_iter()
        .find_map(|path| network_token(&path).map(|token| (path, token)));

    let Some((source, token)) = found else {
        tracing::info!(dir = %dir.display(), "No network token found");
        return Ok(SetupOutcome::NothingToDo);
    };

    let env_file = &config.substrate_env_file;
    if let Some(parent) = env_file.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(env_file, format!("{TOKEN_ENV_VAR}={}\n", token.trim()))?;

    tracing::info!(
        source = %source.display(),
        env_file = %env_file.display(),
        "Network token configured"
    );
    services.restart_unit(&config.substrate_unit).await;

    Ok(SetupOutcome::Configured { source })
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use parking_lot::Mutex;

    use super::*;

    #[derive(Default)]
    struct RecordingServices {
        restarted: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ServiceManager for RecordingServices {
        async fn restart_unit(&self, unit: &str) {
            self.restarted.lock().push(unit.to_string());
        }

        async fn reboot(&self) {}
    }

    fn config(root: &Path) -> EnrollConfig {
        EnrollConfig {
            substrate_env_file: root.join("conf.d/edgevpn-nodepair.env"),
            ..EnrollConfig::default()
        }
    }

    #[tokio::test]
    async fn token_is_written_and_daemon_restarted() {
        let oem = tempfile::tempdir().unwrap();
        let etc = tempfile::tempdir().unwrap();
        std::fs::write(oem.path().join("00_base.yaml"), "#cloud-config\nhostname: edge\n")
            .unwrap();
        std::fs::write(
            oem.path().join("10_network.yml"),
            "#cloud-config\nnodepair:\n  network_token: abc123\n",
        )
        .unwrap();

        let config = config(etc.path());
        let services = RecordingServices::default();
        let outcome = setup(oem.path(), &config, &services).await.unwrap();

        assert_eq!(
            outcome,
            SetupOutcome::Configured {
                source: oem.path().join("10_network.yml")
            }
        );
        assert_eq!(
            std::fs::read_to_string(&config.substrate_env_file).unwrap(),
            "EDGEVPNTOKEN=abc123\n"
        );
        assert_eq!(*services.restarted.lock(), vec!["edgevpn".to_string()]);
    }

    #[tokio::test]
    async fn invalid_and_unrelated_files_are_skipped() {
        let oem = tempfile::tempdir().unwrap();
        let etc = tempfile::tempdir().unwrap();
        std::fs::write(oem.path().join("broken.yaml"), "nodepair: [unclosed\n").unwrap();
        std::fs::write(
            oem.path().join("notes.txt"),
            "nodepair:\n  network_token: ignored\n",
        )
        .unwrap();

        let config = config(etc.path());
        let services = RecordingServices::default();
        let outcome = setup(oem.path(), &config, &services).await.unwrap();

        assert_eq!(outcome, SetupOutcome::NothingToDo);
        assert!(!config.substrate_env_file.exists());
        assert!(services.restarted.lock().is_empty());
    }

    #[tokio::test]
    async fn missing_directory_is_nothing_to_do() {
        let etc = tempfile::tempdir().unwrap();
        let services = RecordingServices::default();

        let outcome = setup(Path::new("/nonexistent/oem"), &config(etc.path()), &services)
            .await
            .unwrap();

        assert_eq!(outcome, SetupOutcome::NothingToDo);
    }
}
