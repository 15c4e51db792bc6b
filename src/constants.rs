// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Capture session quality presets
///
/// The session picks the first preset in a descending preference list that
/// both the active video device and the session support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionPreset {
    /// Highest quality the device offers for video
    High,
    /// Balanced quality, typically 480p
    Medium,
    /// Lowest quality, suitable for sharing over slow links
    Low,
}

impl SessionPreset {
    /// All presets, best first
    pub const ALL: [SessionPreset; 3] = [
        SessionPreset::High,
        SessionPreset::Medium,
        SessionPreset::Low,
    ];

    /// Get display name for the preset
    pub fn display_name(&self) -> &'static str {
        match self {
            SessionPreset::High => "High",
            SessionPreset::Medium => "Medium",
            SessionPreset::Low => "Low",
        }
    }

    /// Nominal output resolution (width, height) for the preset
    ///
    /// - High: 1920x1080
    /// - Medium: 640x480
    /// - Low: 192x144
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            SessionPreset::High => (1920, 1080),
            SessionPreset::Medium => (640, 480),
            SessionPreset::Low => (192, 144),
        }
    }
}

impl std::fmt::Display for SessionPreset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Serialized queue names (also used as OS thread names)
pub mod queues {
    /// Session mutation, device settings and capture initiation
    pub const CAPTURE: &str = "cameraman-session";
    /// Asset library commits
    pub const SAVING: &str = "cameraman-saving";
}

/// Zoom limits
pub mod zoom {
    /// Lower bound for any zoom factor
    pub const MIN_FACTOR: f64 = 1.0;
    /// Default configured upper bound
    pub const DEFAULT_MAX_SCALE: f64 = 5.0;
}

/// Recording defaults
pub mod recording {
    use super::Duration;

    /// File extension for scratch recordings
    pub const FILE_EXTENSION: &str = "mov";
    /// Default maximum duration before the shutter stops a recording
    pub const DEFAULT_MAX_DURATION: Duration = Duration::from_secs(15);
}

/// Asset library layout
pub mod library {
    /// Index file name inside the library directory
    pub const INDEX_FILE: &str = "library.json";
    /// Sub-directory holding committed photos
    pub const PHOTOS_DIR: &str = "photos";
    /// Sub-directory holding committed videos
    pub const VIDEOS_DIR: &str = "videos";
    /// Default library directory name under the user's pictures folder
    pub const DEFAULT_DIR_NAME: &str = "cameraman";
}

/// Timing constants for hardware interaction
pub mod timing {
    use super::Duration;

    /// Maximum wait for a still frame from a running pipeline
    pub const STILL_CAPTURE_TIMEOUT: Duration = Duration::from_secs(5);
    /// Maximum wait for a recording to flush after stop
    pub const RECORDING_FINALIZE_TIMEOUT: Duration = Duration::from_secs(10);
}

/// Application information utilities
pub mod app_info {
    /// Get the application version from build-time environment
    pub fn version() -> &'static str {
        env!("GIT_VERSION")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_descend_in_resolution() {
        let mut previous = u32::MAX;
        for preset in SessionPreset::ALL {
            let (w, h) = preset.dimensions();
            assert!(w * h < previous);
            previous = w * h;
        }
    }
}
