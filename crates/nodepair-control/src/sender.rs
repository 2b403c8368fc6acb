//! Operator side of the handshake.
//!
//! `register` resolves the node's token, wraps the operator's configuration
//! into a payload and publishes it under that token. The token can be typed,
//! given as the path of a photo of the node's screen, or omitted, in which
//! case a [`TokenReader`] scans the local screen for the QR code.

use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use nodepair_core::{NodeConfig, Token};
use nodepair_ledger::RendezvousChannel;
use tokio::process::Command;

use crate::error::{ControlError, Result};

/// Trait for obtaining a token when none is given on the command line.
#[async_trait]
pub trait TokenReader: Send + Sync {
    /// Read the token currently displayed by the node.
    ///
    /// # Errors
    ///
    /// Returns an error if no token could be captured or decoded.
    async fn read_token(&self) -> Result<Token>;
}

/// Captures the screen with an external command and scans it for a QR code.
///
/// `{output}` in the command is replaced with the path of a temporary PNG the
/// command is expected to write.
#[derive(Debug, Clone)]
pub struct CommandCaptureReader {
    command: String,
}

impl CommandCaptureReader {
    /// Create a reader running `command` through `sh -c`.
    #[must_use]
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

#[async_trait]
impl TokenReader for CommandCaptureReader {
    async fn read_token(&self) -> Result<Token> {
        let dir = tempfile::tempdir()?;
        let shot = dir.path().join("screen.png");
        let command = self
            .command
            .replace("{output}", &shot.to_string_lossy());

        tracing::debug!(%command, "Capturing screen");
        let status = Command::new("sh")
            .arg("-c")
            .arg(&command)
            .stdin(Stdio::null())
            .status()
            .await?;

        if !status.success() {
            return Err(ControlError::Io(std::io::Error::other(format!(
                "screen capture failed: `{command}` exited with {status}"
            ))));
        }

        Ok(nodepair_qr::decode_image(&shot)?)
    }
}

/// Turn a command-line token argument into a token.
///
/// An empty or missing argument defers to `reader`. An argument naming an
/// existing file is scanned as an image. Anything else is parsed as the
/// token text.
///
/// # Errors
///
/// Returns an error if the token cannot be read, scanned or parsed.
pub async fn resolve_token(arg: Option<&str>, reader: &dyn TokenReader) -> Result<Token> {
    match arg.map(str::trim).filter(|a| !a.is_empty()) {
        None => reader.read_token().await,
        Some(arg) if Path::new(arg).is_file() => {
            tracing::debug!(path = arg, "Reading token from image");
            Ok(nodepair_qr::decode_image(Path::new(arg))?)
        }
        Some(arg) => Ok(Token::parse(arg)?),
    }
}

/// Read the operator's configuration file.
///
/// A missing path or an unreadable file yields an empty configuration; the
/// node decides whether that is acceptable.
#[must_use]
pub fn read_config(path: Option<&Path>) -> Vec<u8> {
    let Some(path) = path else {
        return Vec::new();
    };

    match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Cannot read configuration file");
            Vec::new()
        }
    }
}

/// Publishes configurations to waiting nodes.
#[derive(Clone)]
pub struct Sender {
    channel: RendezvousChannel,
    reader: Arc<dyn TokenReader>,
    token_ttl: Duration,
}

impl Sender {
    /// Create a sender publishing on `channel`.
    #[must_use]
    pub fn new(channel: RendezvousChannel, reader: Arc<dyn TokenReader>) -> Self {
        Self {
            channel,
            reader,
            token_ttl: Duration::from_secs(3600),
        }
    }

    /// Refuse tokens older than `ttl`.
    #[must_use]
    pub fn with_token_ttl(mut self, ttl: Duration) -> Self {
        self.token_ttl = ttl;
        self
    }

    /// Send a configuration to the node showing `token_arg`.
    ///
    /// Returns the token the payload was published under. Delivery is not
    /// confirmed: the node picks the payload up on its next poll.
    ///
    /// # Errors
    ///
    /// - token errors from [`resolve_token`]
    /// - `ControlError::Token` if the token has expired
    /// - `ControlError::Transport` if the ledger rejects the write
    pub async fn send(
        &self,
        token_arg: Option<&str>,
        device: &str,
        config: &[u8],
        reboot: bool,
    ) -> Result<Token> {
        let token = resolve_token(token_arg, self.reader.as_ref()).await?;
        token.check_fresh(Utc::now(), self.token_ttl)?;

        let node = NodeConfig::new(device, String::from_utf8_lossy(config)).with_reboot(reboot);
        self.channel.publish(&token, &node.to_payload()).await?;

        tracing::info!(token = %token.fingerprint(), device, reboot, "Registration payload sent");
        Ok(token)
    }
}

impl std::fmt::Debug for Sender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sender")
            .field("channel", &self.channel)
            .field("token_ttl", &self.token_ttl)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use nodepair_core::CoreError;
    use nodepair_ledger::{keys, Ledger, MemoryLedger};

    use super::*;

    struct FixedReader(Token);

    #[async_trait]
    impl TokenReader for FixedReader {
        async fn read_token(&self) -> Result<Token> {
            Ok(self.0.clone())
        }
    }

    struct NoReader;

    #[async_trait]
    impl TokenReader for NoReader {
        async fn read_token(&self) -> Result<Token> {
            panic!("reader must not be used");
        }
    }

    fn setup(reader: Arc<dyn TokenReader>) -> (Arc<MemoryLedger>, Sender) {
        let ledger = Arc::new(MemoryLedger::new());
        let channel = RendezvousChannel::new(ledger.clone(), keys::DEFAULT_NAMESPACE);
        (ledger, Sender::new(channel, reader))
    }

    #[tokio::test]
    async fn typed_token_is_published() {
        let token = Token::generate().unwrap();
        let (ledger, sender) = setup(Arc::new(NoReader));

        let sent = sender
            .send(Some(token.as_str()), "/dev/sda", b"foo: bar", false)
            .await
            .unwrap();
        assert_eq!(sent, token);

        let stored = ledger
            .get("nodepair-pairing", token.as_str())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            stored,
            serde_json::json!({"device": "/dev/sda", "cc": "foo: bar"})
        );
    }

    #[tokio::test]
    async fn empty_argument_uses_reader() {
        let token = Token::generate().unwrap();
        let (ledger, sender) = setup(Arc::new(FixedReader(token.clone())));

        sender.send(Some("  "), "/dev/sda", b"", true).await.unwrap();
        assert!(ledger.contains("nodepair-pairing", token.as_str()));
    }

    #[tokio::test]
    async fn photo_path_is_scanned() {
        let token = Token::generate().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let photo = dir.path().join("node.png");
        nodepair_qr::render_luma(&token, 6)
            .unwrap()
            .save(&photo)
            .unwrap();

        let (ledger, sender) = setup(Arc::new(NoReader));
        let photo_arg = photo.to_string_lossy().into_owned();
        sender
            .send(Some(&photo_arg), "/dev/sda", b"", false)
            .await
            .unwrap();

        assert!(ledger.contains("nodepair-pairing", token.as_str()));
    }

    #[tokio::test]
    async fn expired_token_is_refused() {
        let token = Token::generate_at(Utc::now() - chrono::Duration::hours(2)).unwrap();
        let (ledger, sender) = setup(Arc::new(NoReader));

        let err = sender
            .send(Some(token.as_str()), "/dev/sda", b"", false)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ControlError::Token(CoreError::TokenExpired { .. })
        ));
        assert!(ledger.is_empty());
    }

    #[tokio::test]
    async fn garbage_token_is_refused() {
        let (_ledger, sender) = setup(Arc::new(NoReader));
        let err = sender
            .send(Some("not-a-token"), "/dev/sda", b"", false)
            .await
            .unwrap_err();
        assert!(matches!(err, ControlError::Token(CoreError::InvalidToken(_))));
    }

    #[tokio::test]
    async fn failing_capture_command_is_reported() {
        let reader = CommandCaptureReader::new("exit 1");
        assert!(matches!(
            reader.read_token().await,
            Err(ControlError::Io(_))
        ));
    }

    #[test]
    fn config_file_is_read_tolerantly() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "foo: bar").unwrap();

        assert_eq!(read_config(Some(&path)), b"foo: bar");
        assert!(read_config(Some(&dir.path().join("missing.yaml"))).is_empty());
        assert!(read_config(None).is_empty());
    }
}
