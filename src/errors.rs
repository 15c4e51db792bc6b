// SPDX-License-Identifier: MPL-2.0

//! Error types for the capture session
//!
//! Nothing in here crosses the coordinator boundary as a hard failure.
//! [`SessionError`] values are logged and then turned into "no asset"
//! completions, observer notifications or silent no-ops.

use crate::backends::camera::BackendError;
use crate::permission::AuthorizationStatus;
use std::fmt;

/// Result type alias using StoreError
pub type StoreResult<T> = Result<T, StoreError>;

/// Failure taxonomy of the capture session
#[derive(Debug, Clone, PartialEq)]
pub enum SessionError {
    /// Camera permission is not granted; the operation never started
    Unavailable(AuthorizationStatus),
    /// The device or mode does not support the requested setting
    Unsupported(String),
    /// Still capture, frame decode or recording failed in hardware
    CaptureFailure(String),
    /// The asset store rejected the commit
    PersistFailure(String),
    /// The request conflicts with the current recording state
    InvalidStateTransition(String),
}

/// Asset store errors
#[derive(Debug, Clone, PartialEq)]
pub enum StoreError {
    /// The source media could not be read or encoded
    InvalidMedia(String),
    /// The library index is missing or corrupt
    Index(String),
    /// Filesystem error while writing the asset
    Io(String),
}

/// Configuration file errors
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// No configuration directory on this platform
    NoConfigDir,
    /// Reading or writing the file failed
    Io(String),
    /// The file is not valid configuration JSON
    Parse(String),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::Unavailable(status) => {
                write!(f, "Camera unavailable (authorization: {})", status)
            }
            SessionError::Unsupported(msg) => write!(f, "Unsupported: {}", msg),
            SessionError::CaptureFailure(msg) => write!(f, "Capture failed: {}", msg),
            SessionError::PersistFailure(msg) => write!(f, "Persist failed: {}", msg),
            SessionError::InvalidStateTransition(msg) => {
                write!(f, "Invalid state transition: {}", msg)
            }
        }
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::InvalidMedia(msg) => write!(f, "Invalid media: {}", msg),
            StoreError::Index(msg) => write!(f, "Library index error: {}", msg),
            StoreError::Io(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::NoConfigDir => write!(f, "No configuration directory available"),
            ConfigError::Io(msg) => write!(f, "Configuration I/O error: {}", msg),
            ConfigError::Parse(msg) => write!(f, "Invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for SessionError {}
impl std::error::Error for StoreError {}
impl std::error::Error for ConfigError {}

impl From<BackendError> for SessionError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Unsupported(msg) => SessionError::Unsupported(msg),
            BackendError::RecordingInProgress => {
                SessionError::InvalidStateTransition(err.to_string())
            }
            other => SessionError::CaptureFailure(other.to_string()),
        }
    }
}

impl From<StoreError> for SessionError {
    fn from(err: StoreError) -> Self {
        SessionError::PersistFailure(err.to_string())
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Index(err.to_string())
    }
}

impl From<image::ImageError> for StoreError {
    fn from(err: image::ImageError) -> Self {
        StoreError::InvalidMedia(err.to_string())
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::Parse(err.to_string())
    }
}
