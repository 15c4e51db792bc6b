// SPDX-License-Identifier: GPL-3.0-only

//! JPEG encoding for committed photos

use image::DynamicImage;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Encoding quality settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EncodingQuality {
    /// Low quality (high compression)
    Low,
    /// Medium quality (balanced)
    Medium,
    /// High quality (low compression)
    #[default]
    High,
    /// Maximum quality (minimal compression)
    Maximum,
}

impl EncodingQuality {
    /// Get JPEG quality value (0-100)
    pub fn jpeg_quality(&self) -> u8 {
        match self {
            EncodingQuality::Low => 60,
            EncodingQuality::Medium => 80,
            EncodingQuality::High => 92,
            EncodingQuality::Maximum => 98,
        }
    }
}

/// Encoded image data ready for saving
#[derive(Debug, Clone)]
pub struct EncodedImage {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl EncodedImage {
    /// File extension for the encoded data
    pub fn extension(&self) -> &'static str {
        "jpg"
    }
}

/// Photo encoder
#[derive(Debug, Clone, Copy, Default)]
pub struct PhotoEncoder {
    quality: EncodingQuality,
}

impl PhotoEncoder {
    pub fn new(quality: EncodingQuality) -> Self {
        Self { quality }
    }

    /// Encode as baseline JPEG, dropping any alpha channel
    pub fn encode(&self, image: &DynamicImage) -> Result<EncodedImage, image::ImageError> {
        let rgb = image.to_rgb8();
        let mut data = Vec::new();

        image::codecs::jpeg::JpegEncoder::new_with_quality(&mut data, self.quality.jpeg_quality())
            .encode_image(&rgb)?;

        debug!(
            width = rgb.width(),
            height = rgb.height(),
            size = data.len(),
            "JPEG encoding complete"
        );

        Ok(EncodedImage {
            data,
            width: rgb.width(),
            height: rgb.height(),
        })
    }
}
