//! Enrollment handshake for nodepair.
//!
//! This crate holds the logic of both sides of the pairing: the node waiting
//! for its configuration, and the operator sending it. It coordinates the
//! ledger, the QR transcoder and the host collaborators (installer, service
//! manager, console).
//!
//! # Architecture
//!
//! ```text
//!       operator                                          node
//! ┌───────────────────┐                       ┌─────────────────────────────┐
//! │      Sender       │                       │      EnrollmentSession      │
//! │  resolve token    │                       │  ┌───────────┐ ┌─────────┐  │
//! │  (text/photo/scan)│                       │  │  receive  │ │ watcher │  │
//! └─────────┬─────────┘                       │  └─────┬─────┘ └────┬────┘  │
//!           │ publish                         │        └─▶ Verdict ◀┘       │
//!           ▼                                 └──────────────┬──────────────┘
//! ┌─────────────────────────────────────────┐                │
//! │        RendezvousChannel (ledger)       │◀───────────────┘ poll
//! └─────────────────────────────────────────┘
//!                                                            │ Succeeded
//!                                                            ▼
//!                                             ┌─────────────────────────────┐
//!                                             │ InstallGate → ServiceManager│
//!                                             └─────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use nodepair_control::{CommandCaptureReader, EnrollConfig, Sender};
//! use nodepair_ledger::{HttpLedger, RendezvousChannel};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = EnrollConfig::default();
//! let ledger = Arc::new(HttpLedger::new("127.0.0.1:8080")?);
//! let channel = RendezvousChannel::new(ledger, &config.namespace);
//!
//! let sender = Sender::new(
//!     channel,
//!     Arc::new(CommandCaptureReader::new(config.capture_command.clone())),
//! );
//! sender
//!     .send(Some("photo-of-node.png"), "/dev/sda", b"#cloud-config", false)
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! # State Machine
//!
//! The node goes `Idle` → `TokenReady` → `Waiting` → one of `Aborted`,
//! `Failed`, `Succeeded` → `Terminal`. See the [`lifecycle`] module.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod install;
pub mod kubeconfig;
pub mod lifecycle;
pub mod sender;
pub mod services;
pub mod session;
pub mod setup;
pub mod types;
pub mod verdict;

pub use error::{ControlError, Result};
pub use install::{InstallGate, ScriptInstaller};
pub use lifecycle::EnrollmentState;
pub use sender::{read_config, resolve_token, CommandCaptureReader, Sender, TokenReader};
pub use services::{ServiceManager, SystemdServiceManager};
pub use session::{AbortSignal, EnrollmentSession, EnrollmentUi, REBOOT_PROMPT};
pub use setup::{setup, SetupOutcome};
pub use types::EnrollConfig;
pub use verdict::Verdict;

// Re-export commonly used types from dependencies for convenience
pub use nodepair_core::{NodeConfig, Payload, Token};
