// SPDX-License-Identifier: MPL-2.0

//! Still photo pipeline
//!
//! ```text
//! Capture backend → StillFrame → decode → asset store (JPEG encode + commit)
//! ```
//!
//! Decoding runs on the capture queue right after the frame arrives, so a
//! corrupt frame is reported as a capture failure before anything reaches
//! the persistence queue.

pub mod encoding;

pub use encoding::{EncodedImage, EncodingQuality, PhotoEncoder};

use crate::backends::camera::types::{StillFormat, StillFrame};
use crate::errors::SessionError;
use image::{DynamicImage, RgbaImage};
use tracing::debug;

/// Decode a captured still into an image
pub fn decode_still(frame: &StillFrame) -> Result<DynamicImage, SessionError> {
    let image = match frame.format {
        StillFormat::Jpeg => {
            image::load_from_memory_with_format(&frame.data, image::ImageFormat::Jpeg)
                .map_err(|e| SessionError::CaptureFailure(format!("JPEG decode failed: {}", e)))?
        }
        StillFormat::Rgba => {
            let rgba = RgbaImage::from_raw(frame.width, frame.height, frame.data.to_vec())
                .ok_or_else(|| {
                    SessionError::CaptureFailure(format!(
                        "RGBA buffer of {} bytes does not fit {}x{}",
                        frame.data.len(),
                        frame.width,
                        frame.height
                    ))
                })?;
            DynamicImage::ImageRgba8(rgba)
        }
    };

    debug!(
        width = image.width(),
        height = image.height(),
        format = ?frame.format,
        "Still frame decoded"
    );
    Ok(image)
}
