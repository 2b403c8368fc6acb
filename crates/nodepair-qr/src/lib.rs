//! QR transcoding of pairing tokens.
//!
//! The node shows its token as a QR code on the console; the operator either
//! types the token or hands `register` a photo or screenshot of the screen.
//! This crate owns the token/text boundary only: rendering is done by
//! `qrcode`, scanning by `rqrr`, image loading by `image`.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;

use std::path::Path;

use image::{GrayImage, Luma};
use nodepair_core::Token;
use qrcode::render::unicode::Dense1x2;
use qrcode::QrCode;

pub use error::{QrError, Result};

/// Render `token` as QR text for a console.
///
/// Two modules are packed per character cell, colours inverted so the code
/// reads correctly on a dark background.
///
/// # Errors
///
/// Returns `QrError::Encode` if the token does not fit in a QR code.
pub fn encode(token: &Token) -> Result<String> {
    let code = QrCode::new(token.as_str().as_bytes()).map_err(|e| QrError::Encode(e.to_string()))?;

    Ok(code
        .render::<Dense1x2>()
        .dark_color(Dense1x2::Light)
        .light_color(Dense1x2::Dark)
        .quiet_zone(true)
        .build())
}

/// Render `token` as a greyscale bitmap, `module_px` pixels per module.
///
/// # Errors
///
/// Returns `QrError::Encode` if the token does not fit in a QR code.
pub fn render_luma(token: &Token, module_px: u32) -> Result<GrayImage> {
    let code = QrCode::new(token.as_str().as_bytes()).map_err(|e| QrError::Encode(e.to_string()))?;

    Ok(code
        .render::<Luma<u8>>()
        .module_dimensions(module_px, module_px)
        .build())
}

/// Scan a greyscale image for a QR code carrying a token.
///
/// Every detected grid is tried; the first one that decodes to a valid token
/// wins.
///
/// # Errors
///
/// - `QrError::NotFound` if no QR grid is present
/// - `QrError::Decode` or `QrError::Token` for the last grid tried, if no
///   grid carries a token
pub fn decode_luma(image: &GrayImage) -> Result<Token> {
    let (width, height) = image.dimensions();
    let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(
        width as usize,
        height as usize,
        |x, y| {
            #[allow(clippy::cast_possible_truncation)]
            let pixel = image.get_pixel(x as u32, y as u32);
            pixel.0[0]
        },
    );

    let grids = prepared.detect_grids();
    if grids.is_empty() {
        return Err(QrError::NotFound);
    }

    let mut last_error = None;
    for grid in &grids {
        let content = match grid.decode() {
            Ok((_meta, content)) => content,
            Err(e) => {
                last_error = Some(QrError::Decode(e.to_string()));
                continue;
            }
        };

        match Token::parse(&content) {
            Ok(token) => {
                tracing::debug!(grids = grids.len(), "Decoded token from QR grid");
                return Ok(token);
            }
            Err(e) => {
                tracing::debug!(error = %e, "QR grid does not carry a token");
                last_error = Some(QrError::Token(e));
            }
        }
    }

    Err(last_error.unwrap_or_else(|| QrError::Decode(String::new())))
}

/// Load an image file (PNG or JPEG) and scan it for a token.
///
/// # Errors
///
/// Returns `QrError::Image` if the file cannot be read or decoded, otherwise
/// the errors of [`decode_luma`].
pub fn decode_image(path: &Path) -> Result<Token> {
    let image = image::open(path)
        .map_err(|e| QrError::Image(format!("{}: {e}", path.display())))?
        .to_luma8();

    decode_luma(&image)
}
