//! Core types for nodepair enrollment.
//!
//! This crate provides the foundational types shared by both sides of the
//! enrollment handshake:
//!
//! - **Tokens**: unguessable, time-stamped pairing identifiers
//! - **Configuration**: the typed node configuration and its wire mapping
//! - **Error types**: errors raised while handling the above
//!
//! # Example
//!
//! ```
//! use nodepair_core::{NodeConfig, Token};
//!
//! // The node generates a token and shows it as a QR code
//! let token = Token::generate().unwrap();
//!
//! // The operator parses it back from text
//! let parsed: Token = token.to_string().parse().unwrap();
//! assert_eq!(parsed, token);
//!
//! // and addresses a configuration to it
//! let payload = NodeConfig::new("/dev/sda", "#cloud-config").to_payload();
//! assert_eq!(payload["device"], "/dev/sda");
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod token;

pub use config::{NodeConfig, Payload, CLOUD_CONFIG_KEY, DEVICE_KEY, REBOOT_KEY};
pub use error::{CoreError, Result};
pub use token::{Token, TOKEN_ENTROPY_BYTES};
