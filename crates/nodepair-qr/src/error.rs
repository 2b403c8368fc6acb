//! QR transcoding errors.

use nodepair_core::CoreError;
use thiserror::Error;

/// A result type using `QrError`.
pub type Result<T> = std::result::Result<T, QrError>;

/// Errors that can occur while rendering or scanning a token.
#[derive(Debug, Error)]
pub enum QrError {
    /// The token could not be encoded as a QR symbol.
    #[error("QR encode failed: {0}")]
    Encode(String),

    /// The captured image could not be loaded.
    #[error("cannot load image: {0}")]
    Image(String),

    /// No QR code was found in the image.
    #[error("no QR code found in image")]
    NotFound,

    /// A QR code was found but could not be read.
    #[error("QR decode failed: {0}")]
    Decode(String),

    /// The QR code does not carry a pairing token.
    #[error(transparent)]
    Token(#[from] CoreError),
}
