//! End-to-end handshake tests: a node and an operator sharing one ledger.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use nodepair_control::{
    AbortSignal, ControlError, EnrollConfig, EnrollmentSession, EnrollmentState, EnrollmentUi,
    InstallGate, NodeConfig, Payload, Result, Sender, ServiceManager, Token, TokenReader,
};
use nodepair_ledger::{keys, Ledger, MemoryLedger, RendezvousChannel};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[derive(Default)]
struct RecordingInstaller {
    payloads: Mutex<Vec<Payload>>,
}

#[async_trait]
impl InstallGate for RecordingInstaller {
    async fn install(&self, config: &NodeConfig) -> Result<()> {
        self.payloads.lock().push(config.to_payload());
        Ok(())
    }
}

#[derive(Default)]
struct RecordingServices {
    restarted: Mutex<Vec<String>>,
    reboots: Mutex<u32>,
}

#[async_trait]
impl ServiceManager for RecordingServices {
    async fn restart_unit(&self, unit: &str) {
        self.restarted.lock().push(unit.to_string());
    }

    async fn reboot(&self) {
        *self.reboots.lock() += 1;
    }
}

/// Fires after a delay, or never.
struct ConsoleKey(Option<Duration>);

#[async_trait]
impl AbortSignal for ConsoleKey {
    async fn aborted(&self, cancel: CancellationToken) -> bool {
        let Some(after) = self.0 else {
            cancel.cancelled().await;
            return false;
        };

        tokio::select! {
            () = cancel.cancelled() => false,
            () = tokio::time::sleep(after) => true,
        }
    }
}

/// Hands the displayed token to the test, as the operator's camera would.
struct Screen {
    shown: mpsc::UnboundedSender<Token>,
}

#[async_trait]
impl EnrollmentUi for Screen {
    fn show_instructions(&self, _start_delay: Duration) {}

    fn show_token(&self, token: &Token) {
        let _ = self.shown.send(token.clone());
    }

    fn waiting_started(&self) {}

    fn waiting_finished(&self) {}

    fn installing(&self, _config: &NodeConfig) {}

    async fn acknowledge(&self, _prompt: &str) {}
}

/// Reads the token off the node's screen.
struct Camera {
    screen: tokio::sync::Mutex<mpsc::UnboundedReceiver<Token>>,
}

#[async_trait]
impl TokenReader for Camera {
    async fn read_token(&self) -> Result<Token> {
        self.screen
            .lock()
            .await
            .recv()
            .await
            .ok_or_else(|| ControlError::Config("screen closed".into()))
    }
}

struct World {
    ledger: Arc<MemoryLedger>,
    installer: Arc<RecordingInstaller>,
    services: Arc<RecordingServices>,
    node: EnrollmentSession,
    camera: Arc<Camera>,
}

fn world(abort: ConsoleKey) -> World {
    let ledger = Arc::new(MemoryLedger::new());
    let installer = Arc::new(RecordingInstaller::default());
    let services = Arc::new(RecordingServices::default());
    let (shown, screen) = mpsc::unbounded_channel();

    let config = EnrollConfig {
        start_delay_secs: 0,
        poll_interval_ms: 5,
        ..EnrollConfig::default()
    };

    let node = EnrollmentSession::new(
        ledger.clone(),
        installer.clone(),
        services.clone(),
        Arc::new(abort),
        Arc::new(Screen { shown }),
        config,
    );

    World {
        ledger,
        installer,
        services,
        node,
        camera: Arc::new(Camera {
            screen: tokio::sync::Mutex::new(screen),
        }),
    }
}

fn operator(ledger: &Arc<MemoryLedger>, camera: Arc<Camera>) -> Sender {
    Sender::new(
        RendezvousChannel::new(ledger.clone(), keys::DEFAULT_NAMESPACE),
        camera,
    )
}

#[tokio::test]
async fn scanned_token_delivers_configuration_to_installer() {
    let World {
        ledger,
        installer,
        services,
        mut node,
        camera,
    } = world(ConsoleKey(None));

    let waiting = tokio::spawn(async move {
        let result = node.run().await;
        (result, node.state())
    });

    let sender = operator(&ledger, camera);
    let token = sender
        .send(Some(""), "node-1", b"foo: bar", true)
        .await
        .unwrap();

    let (result, state) = waiting.await.unwrap();
    result.unwrap();
    assert_eq!(state, EnrollmentState::Terminal);

    let expected: Payload = [
        ("device".to_string(), "node-1".to_string()),
        ("cc".to_string(), "foo: bar".to_string()),
        ("reboot".to_string(), String::new()),
    ]
    .into_iter()
    .collect();
    assert_eq!(*installer.payloads.lock(), vec![expected]);
    assert_eq!(*services.reboots.lock(), 1);

    // the token cannot be served twice
    assert!(ledger
        .get("nodepair-pairing", token.as_str())
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn console_abort_never_installs() {
    let World {
        installer,
        services,
        mut node,
        ..
    } = world(ConsoleKey(Some(Duration::from_millis(1))));

    let err = node.run().await.unwrap_err();

    assert!(err.is_abort());
    assert_eq!(node.state(), EnrollmentState::Terminal);
    assert!(installer.payloads.lock().is_empty());
    assert_eq!(*services.restarted.lock(), vec!["getty@tty1".to_string()]);
    assert_eq!(*services.reboots.lock(), 0);
}

#[tokio::test]
async fn payload_for_another_node_is_ignored() {
    let World {
        ledger,
        installer,
        mut node,
        camera,
        ..
    } = world(ConsoleKey(Some(Duration::from_millis(100))));

    let waiting = tokio::spawn(async move { node.run().await });
    let _shown = camera.read_token().await.unwrap();

    let stranger = Token::generate().unwrap();
    RendezvousChannel::new(ledger.clone(), keys::DEFAULT_NAMESPACE)
        .publish(&stranger, &NodeConfig::new("/dev/sdb", "").to_payload())
        .await
        .unwrap();

    let err = waiting.await.unwrap().unwrap_err();
    assert!(err.is_abort());
    assert!(installer.payloads.lock().is_empty());
    assert!(ledger.contains("nodepair-pairing", stranger.as_str()));
}

#[tokio::test]
async fn empty_payload_never_installs() {
    let World {
        ledger,
        installer,
        services,
        mut node,
        camera,
    } = world(ConsoleKey(None));

    let waiting = tokio::spawn(async move { node.run().await });
    let token = camera.read_token().await.unwrap();
    RendezvousChannel::new(ledger.clone(), keys::DEFAULT_NAMESPACE)
        .publish(&token, &Payload::new())
        .await
        .unwrap();

    let err = waiting.await.unwrap().unwrap_err();
    assert!(matches!(err, ControlError::EmptyConfiguration));
    assert!(!err.is_abort());
    assert!(installer.payloads.lock().is_empty());
    assert_eq!(*services.reboots.lock(), 0);
}

#[tokio::test]
async fn kubeconfig_points_at_control_plane() {
    use base64::Engine;

    let ledger = MemoryLedger::new();
    let encoded =
        base64::engine::general_purpose::URL_SAFE.encode("server: https://127.0.0.1:6443");
    ledger
        .put("nodepair-kubeconfig", "master", &serde_json::json!(encoded))
        .await
        .unwrap();
    ledger
        .put("nodepair-master", "ip", &serde_json::json!("10.0.0.5"))
        .await
        .unwrap();

    let first = nodepair_control::kubeconfig::fetch(&ledger, "nodepair")
        .await
        .unwrap();
    let second = nodepair_control::kubeconfig::fetch(&ledger, "nodepair")
        .await
        .unwrap();

    assert!(first.contains("https://10.0.0.5:6443"));
    assert!(!first.contains("127.0.0.1"));
    assert_eq!(first, second);
}
