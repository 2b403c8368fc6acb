//! Node side of the handshake.
//!
//! An [`EnrollmentSession`] drives one installation attempt through the
//! [lifecycle](crate::lifecycle): it generates a token, shows it, waits for a
//! payload while a console watcher listens for an abort, and hands a
//! non-empty configuration to the install gate.
//!
//! The wait is a race between two participants. The payload receiver runs
//! inline; the console watcher is a spawned task. Both write into one
//! [`Verdict`], so only the first outcome is acted upon.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use nodepair_core::{NodeConfig, Payload, Token};
use nodepair_ledger::{Ledger, LedgerError, RendezvousChannel};
use tokio_util::sync::CancellationToken;

use crate::error::{ControlError, Result};
use crate::install::InstallGate;
use crate::lifecycle::{validate_transition, EnrollmentState};
use crate::services::ServiceManager;
use crate::types::EnrollConfig;
use crate::verdict::Verdict;

/// Prompt shown after installation, before rebooting.
pub const REBOOT_PROMPT: &str = "Installation completed, press any key to reboot";

/// Trait for the operator's abort request on the node's console.
#[async_trait]
pub trait AbortSignal: Send + Sync {
    /// Wait for an abort request.
    ///
    /// Returns `true` if the operator asked to abort, `false` if `cancel`
    /// fired first.
    async fn aborted(&self, cancel: CancellationToken) -> bool;
}

/// Trait for what the node shows while enrolling.
#[async_trait]
pub trait EnrollmentUi: Send + Sync {
    /// Show the instructions, before the token appears.
    fn show_instructions(&self, start_delay: Duration);

    /// Show the token, usually as a QR code.
    fn show_token(&self, token: &Token);

    /// The wait for a payload began.
    fn waiting_started(&self);

    /// The wait ended, whatever the outcome.
    fn waiting_finished(&self);

    /// Installation is about to run with `config`.
    fn installing(&self, config: &NodeConfig);

    /// Show `prompt` and wait for the operator to acknowledge it.
    async fn acknowledge(&self, prompt: &str);
}

/// How the wait ended.
#[derive(Debug)]
enum WaitOutcome {
    Received(Payload),
    Aborted,
    Failed(LedgerError),
}

/// One enrollment attempt on the node.
pub struct EnrollmentSession {
    channel: RendezvousChannel,
    installer: Arc<dyn InstallGate>,
    services: Arc<dyn ServiceManager>,
    abort: Arc<dyn AbortSignal>,
    ui: Arc<dyn EnrollmentUi>,
    config: EnrollConfig,
    state: EnrollmentState,
}

impl EnrollmentSession {
    /// Create an enrollment waiting on `ledger`.
    #[must_use]
    pub fn new(
        ledger: Arc<dyn Ledger>,
        installer: Arc<dyn InstallGate>,
        services: Arc<dyn ServiceManager>,
        abort: Arc<dyn AbortSignal>,
        ui: Arc<dyn EnrollmentUi>,
        config: EnrollConfig,
    ) -> Self {
        let channel = RendezvousChannel::new(ledger, &config.namespace)
            .with_poll_interval(config.poll_interval());

        Self {
            channel,
            installer,
            services,
            abort,
            ui,
            config,
            state: EnrollmentState::Idle,
        }
    }

    /// Current state of the attempt.
    #[must_use]
    pub const fn state(&self) -> EnrollmentState {
        self.state
    }

    fn transition(&mut self, to: EnrollmentState) -> Result<()> {
        let from = self.state;
        self.state = validate_transition(from, to)?;
        tracing::debug!(?from, ?to, "Enrollment transition");
        Ok(())
    }

    /// End the attempt in `outcome` and return `error`.
    fn fail(&mut self, outcome: EnrollmentState, error: ControlError) -> ControlError {
        if let Err(e) = self
            .transition(outcome)
            .and_then(|()| self.transition(EnrollmentState::Terminal))
        {
            return e;
        }
        error
    }

    /// Run the attempt to completion.
    ///
    /// On success the node has been installed and the reboot requested; the
    /// installed configuration is returned.
    ///
    /// # Errors
    ///
    /// - `ControlError::Token` if no token could be generated
    /// - `ControlError::Cancelled` if the operator aborted
    /// - `ControlError::EmptyConfiguration` if the payload was empty
    /// - `ControlError::Transport` if the ledger failed while waiting
    /// - `ControlError::InstallProcedure` if installation failed
    pub async fn run(&mut self) -> Result<NodeConfig> {
        let token = match Token::generate() {
            Ok(token) => token,
            Err(e) => {
                self.transition(EnrollmentState::Failed)?;
                self.transition(EnrollmentState::Terminal)?;
                return Err(e.into());
            }
        };
        self.transition(EnrollmentState::TokenReady)?;

        self.ui.show_instructions(self.config.start_delay());
        tokio::time::sleep(self.config.start_delay()).await;
        self.ui.show_token(&token);

        self.ui.waiting_started();
        self.transition(EnrollmentState::Waiting)?;
        let outcome = self.wait(&token).await;
        self.ui.waiting_finished();

        let config = match outcome {
            WaitOutcome::Received(payload) => match NodeConfig::from_payload(payload) {
                Ok(config) => config,
                Err(e) => return Err(self.fail(EnrollmentState::Failed, e.into())),
            },
            WaitOutcome::Aborted => {
                return Err(self.fail(EnrollmentState::Aborted, ControlError::Cancelled));
            }
            WaitOutcome::Failed(e) => {
                return Err(self.fail(EnrollmentState::Failed, e.into()));
            }
        };
        self.transition(EnrollmentState::Succeeded)?;

        self.ui.installing(&config);
        let installed = self.installer.install(&config).await;
        self.transition(EnrollmentState::Terminal)?;
        installed?;

        self.ui.acknowledge(REBOOT_PROMPT).await;
        self.services.reboot().await;

        Ok(config)
    }

    async fn wait(&self, token: &Token) -> WaitOutcome {
        let verdict = Arc::new(Verdict::new());

        let watcher = {
            let verdict = Arc::clone(&verdict);
            let abort = Arc::clone(&self.abort);
            let services = Arc::clone(&self.services);
            let console_unit = self.config.console_unit.clone();
            let cancel = verdict.child_token();

            tokio::spawn(async move {
                if abort.aborted(cancel).await && verdict.settle(WaitOutcome::Aborted) {
                    tracing::info!("Pairing aborted from console");
                    services.restart_unit(&console_unit).await;
                }
            })
        };

        match self.channel.receive(token, &verdict.child_token()).await {
            Ok(payload) => {
                if !verdict.settle(WaitOutcome::Received(payload)) {
                    tracing::warn!(
                        token = %token.fingerprint(),
                        "Payload arrived after abort, discarding"
                    );
                }
            }
            // only the verdict cancels the receive, so it is already decided
            Err(LedgerError::Cancelled) => {}
            Err(e) => {
                verdict.settle(WaitOutcome::Failed(e));
            }
        }

        if let Err(e) = watcher.await {
            tracing::warn!(error = %e, "Console watcher task failed");
        }

        verdict.wait().await.unwrap_or(WaitOutcome::Aborted)
    }
}

impl std::fmt::Debug for EnrollmentSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnrollmentSession")
            .field("channel", &self.channel)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
