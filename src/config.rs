// SPDX-License-Identifier: GPL-3.0-only

use crate::constants::{SessionPreset, library, recording, zoom};
use crate::errors::ConfigError;
use crate::pipelines::photo::EncodingQuality;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Configuration file name inside the application config directory
const CONFIG_FILE: &str = "config.json";

/// Backend used to drive capture hardware
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub enum BackendKind {
    /// Scripted in-process devices (no hardware needed)
    #[default]
    Simulated,
    /// GStreamer device monitor and pipelines
    GStreamer,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Pinch-to-zoom enabled at all
    pub zoom_allowed: bool,
    /// Upper bound for the zoom factor, on top of the device limit
    pub max_zoom_scale: f64,
    /// Attach the caller's location to committed assets
    pub record_location: bool,
    /// Attach the microphone (and ask for microphone permission)
    pub request_microphone: bool,
    /// Session presets in order of preference
    pub preferred_presets: Vec<SessionPreset>,
    /// Enable video stabilization on the movie connection when supported
    pub video_stabilization: bool,
    /// JPEG quality for committed photos
    pub photo_quality: EncodingQuality,
    /// Recording length after which the shutter stops recording
    pub max_recording_duration_secs: u64,
    /// Directory for in-progress recordings (system temp dir when unset)
    pub scratch_dir: Option<PathBuf>,
    /// Asset library location (user pictures dir when unset)
    pub library_dir: Option<PathBuf>,
    /// Capture backend
    pub backend: BackendKind,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            zoom_allowed: true,
            max_zoom_scale: zoom::DEFAULT_MAX_SCALE,
            record_location: true,
            request_microphone: true,
            preferred_presets: SessionPreset::ALL.to_vec(),
            video_stabilization: true,
            photo_quality: EncodingQuality::High,
            max_recording_duration_secs: recording::DEFAULT_MAX_DURATION.as_secs(),
            scratch_dir: None,
            library_dir: None,
            backend: BackendKind::default(),
        }
    }
}

impl Config {
    /// Default location of the configuration file
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|dir| dir.join("cameraman").join(CONFIG_FILE))
            .ok_or(ConfigError::NoConfigDir)
    }

    /// Load from `path`, failing on unreadable or malformed files
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&contents)?;
        debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Load the user's configuration, falling back to defaults
    pub fn load() -> Self {
        let path = match Self::default_path() {
            Ok(path) => path,
            Err(e) => {
                warn!(error = %e, "Using default configuration");
                return Self::default();
            }
        };

        if !path.exists() {
            debug!(path = %path.display(), "No configuration file, using defaults");
            return Self::default();
        }

        match Self::load_from(&path) {
            Ok(config) => config,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring invalid configuration");
                Self::default()
            }
        }
    }

    /// Write the configuration as pretty JSON, creating parent directories
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Write to the default location
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::default_path()?;
        self.save_to(&path)?;
        debug!(path = %path.display(), "Saved configuration");
        Ok(())
    }

    /// Effective upper zoom bound, never below 1.0
    pub fn zoom_ceiling(&self) -> f64 {
        self.max_zoom_scale.max(zoom::MIN_FACTOR)
    }

    pub fn max_recording_duration(&self) -> Duration {
        Duration::from_secs(self.max_recording_duration_secs)
    }

    /// Directory for scratch recordings
    pub fn scratch_dir(&self) -> PathBuf {
        self.scratch_dir.clone().unwrap_or_else(std::env::temp_dir)
    }

    /// Directory of the asset library
    pub fn library_dir(&self) -> PathBuf {
        self.library_dir.clone().unwrap_or_else(|| {
            dirs::picture_dir()
                .or_else(dirs::home_dir)
                .unwrap_or_else(std::env::temp_dir)
                .join(library::DEFAULT_DIR_NAME)
        })
    }

    /// Presets to try, best first; an empty list falls back to all presets
    pub fn presets(&self) -> Vec<SessionPreset> {
        if self.preferred_presets.is_empty() {
            SessionPreset::ALL.to_vec()
        } else {
            self.preferred_presets.clone()
        }
    }
}
