// SPDX-License-Identifier: GPL-3.0-only
// Shared types for camera backend abstraction

//! Shared types for capture backends

use crate::constants::SessionPreset;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, TryLockError};
use std::time::Instant;

/// Kind of media a capture device produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaType {
    Video,
    Audio,
}

/// Physical facing of a capture device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DevicePosition {
    /// Facing the user (selfie camera)
    Front,
    /// Facing away from the user
    Back,
    /// External or unknown placement
    #[default]
    Unspecified,
}

impl DevicePosition {
    /// Parse a location property value ("front", "back", "external")
    pub fn from_location(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "front" | "user" => DevicePosition::Front,
            "back" | "rear" | "environment" => DevicePosition::Back,
            _ => DevicePosition::Unspecified,
        }
    }
}

impl std::fmt::Display for DevicePosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DevicePosition::Front => write!(f, "front"),
            DevicePosition::Back => write!(f, "back"),
            DevicePosition::Unspecified => write!(f, "unspecified"),
        }
    }
}

/// Flash operating mode for still capture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FlashMode {
    /// Flash never fires
    #[default]
    Off,
    /// Flash fires for every still
    On,
    /// Flash fires when the scene is dark
    Auto,
}

/// Point of interest in normalized preview coordinates (0.0 - 1.0)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FocusPoint {
    pub x: f64,
    pub y: f64,
}

impl FocusPoint {
    /// Create a point, clamping both coordinates into the unit square
    pub fn new(x: f64, y: f64) -> Self {
        let clamp = |v: f64| if v.is_finite() { v.clamp(0.0, 1.0) } else { 0.5 };
        Self {
            x: clamp(x),
            y: clamp(y),
        }
    }
}

/// Device description as reported by hardware discovery
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    /// Stable identifier (device path or node name)
    pub id: String,
    /// Human readable name
    pub name: String,
    pub media: MediaType,
    pub position: DevicePosition,
    /// Default device for its media type
    pub is_default: bool,
    pub has_flash: bool,
    /// Flash modes the device can be set to
    pub flash_modes: Vec<FlashMode>,
    /// Device accepts a focus point of interest
    pub focus_point_supported: bool,
    /// Presets the sensor can deliver
    pub presets: Vec<SessionPreset>,
    /// Largest zoom factor of the active format
    pub max_zoom_factor: f64,
}

impl DeviceDescriptor {
    /// Video device with no optional capabilities
    pub fn video(id: impl Into<String>, name: impl Into<String>, position: DevicePosition) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            media: MediaType::Video,
            position,
            is_default: false,
            has_flash: false,
            flash_modes: vec![FlashMode::Off],
            focus_point_supported: false,
            presets: SessionPreset::ALL.to_vec(),
            max_zoom_factor: 1.0,
        }
    }

    /// Audio input device
    pub fn audio(id: impl Into<String>, name: impl Into<String>, is_default: bool) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            media: MediaType::Audio,
            position: DevicePosition::Unspecified,
            is_default,
            has_flash: false,
            flash_modes: Vec::new(),
            focus_point_supported: false,
            presets: Vec::new(),
            max_zoom_factor: 1.0,
        }
    }
}

/// Mutable per-device settings guarded by the configuration lock
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceSettings {
    pub flash_mode: FlashMode,
    pub focus_point: Option<FocusPoint>,
    pub zoom_factor: f64,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            flash_mode: FlashMode::Off,
            focus_point: None,
            zoom_factor: 1.0,
        }
    }
}

/// An opened capture input
///
/// Clones share the same settings, the way several handles to one
/// physical device do. Two inputs are equal when they refer to the same
/// device id.
#[derive(Debug, Clone)]
pub struct CameraDevice {
    descriptor: DeviceDescriptor,
    settings: Arc<Mutex<DeviceSettings>>,
}

impl CameraDevice {
    pub fn new(descriptor: DeviceDescriptor) -> Self {
        Self {
            descriptor,
            settings: Arc::new(Mutex::new(DeviceSettings::default())),
        }
    }

    pub fn descriptor(&self) -> &DeviceDescriptor {
        &self.descriptor
    }

    pub fn id(&self) -> &str {
        &self.descriptor.id
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn media(&self) -> MediaType {
        self.descriptor.media
    }

    pub fn position(&self) -> DevicePosition {
        self.descriptor.position
    }

    pub fn is_video(&self) -> bool {
        self.descriptor.media == MediaType::Video
    }

    pub fn has_flash(&self) -> bool {
        self.descriptor.has_flash
    }

    pub fn supports_flash_mode(&self, mode: FlashMode) -> bool {
        self.descriptor.flash_modes.contains(&mode)
    }

    pub fn supports_focus_point(&self) -> bool {
        self.descriptor.focus_point_supported
    }

    pub fn supports_preset(&self, preset: SessionPreset) -> bool {
        self.descriptor.presets.contains(&preset)
    }

    pub fn max_zoom_factor(&self) -> f64 {
        self.descriptor.max_zoom_factor
    }

    /// Copy of the current settings
    pub fn settings(&self) -> DeviceSettings {
        self.settings
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Take the exclusive configuration lock
    ///
    /// Fails with [`BackendError::DeviceBusy`] if another holder has it.
    /// The lock is released when the returned guard is dropped.
    pub fn lock_for_configuration(&self) -> BackendResult<DeviceLock<'_>> {
        match self.settings.try_lock() {
            Ok(guard) => Ok(DeviceLock { guard }),
            Err(TryLockError::Poisoned(poisoned)) => Ok(DeviceLock {
                guard: poisoned.into_inner(),
            }),
            Err(TryLockError::WouldBlock) => Err(BackendError::DeviceBusy(self.name().to_string())),
        }
    }
}

impl PartialEq for CameraDevice {
    fn eq(&self, other: &Self) -> bool {
        self.descriptor.id == other.descriptor.id
    }
}

impl Eq for CameraDevice {}

/// Exclusive configuration access to a device
pub struct DeviceLock<'a> {
    guard: MutexGuard<'a, DeviceSettings>,
}

impl std::ops::Deref for DeviceLock<'_> {
    type Target = DeviceSettings;

    fn deref(&self) -> &DeviceSettings {
        &self.guard
    }
}

impl std::ops::DerefMut for DeviceLock<'_> {
    fn deref_mut(&mut self) -> &mut DeviceSettings {
        &mut self.guard
    }
}

/// Outputs a capture session can feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutputKind {
    /// Single still frames
    StillImage,
    /// Encoded movie files
    MovieFile,
}

/// Video stabilization on the movie connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StabilizationMode {
    #[default]
    Off,
    Auto,
}

/// Orientation of the video connection relative to the sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum VideoOrientation {
    #[default]
    Portrait,
    PortraitUpsideDown,
    LandscapeRight,
    LandscapeLeft,
}

impl VideoOrientation {
    fn as_u8(self) -> u8 {
        match self {
            VideoOrientation::Portrait => 0,
            VideoOrientation::PortraitUpsideDown => 1,
            VideoOrientation::LandscapeRight => 2,
            VideoOrientation::LandscapeLeft => 3,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => VideoOrientation::PortraitUpsideDown,
            2 => VideoOrientation::LandscapeRight,
            3 => VideoOrientation::LandscapeLeft,
            _ => VideoOrientation::Portrait,
        }
    }
}

/// Handle to the preview surface's video connection
///
/// The UI layer updates the orientation when the device rotates; captures
/// and recordings read it when they are issued.
#[derive(Debug, Clone)]
pub struct PreviewConnection {
    orientation: Arc<AtomicU8>,
}

impl PreviewConnection {
    pub fn new(orientation: VideoOrientation) -> Self {
        Self {
            orientation: Arc::new(AtomicU8::new(orientation.as_u8())),
        }
    }

    pub fn orientation(&self) -> VideoOrientation {
        VideoOrientation::from_u8(self.orientation.load(Ordering::Acquire))
    }

    pub fn set_orientation(&self, orientation: VideoOrientation) {
        self.orientation.store(orientation.as_u8(), Ordering::Release);
    }
}

impl Default for PreviewConnection {
    fn default() -> Self {
        Self::new(VideoOrientation::default())
    }
}

/// Per-capture connection settings handed to the backend
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ConnectionSettings {
    pub orientation: VideoOrientation,
    /// Flip the output horizontally (front camera recordings)
    pub mirrored: bool,
    pub stabilization: StabilizationMode,
    pub flash_mode: FlashMode,
}

/// Complete session layout applied to the hardware in one step
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionConfiguration {
    /// Active inputs in attach order
    pub inputs: Vec<CameraDevice>,
    /// Active outputs in attach order
    pub outputs: Vec<OutputKind>,
    pub preset: Option<SessionPreset>,
    pub stabilization: StabilizationMode,
}

impl SessionConfiguration {
    /// The attached video input, if any
    pub fn video_input(&self) -> Option<&CameraDevice> {
        self.inputs.iter().find(|input| input.is_video())
    }

    /// The attached audio input, if any
    pub fn audio_input(&self) -> Option<&CameraDevice> {
        self.inputs.iter().find(|input| !input.is_video())
    }

    pub fn has_output(&self, output: OutputKind) -> bool {
        self.outputs.contains(&output)
    }

    /// Check structural invariants: at most one input per media type and no
    /// duplicate inputs or outputs
    pub fn validate(&self) -> BackendResult<()> {
        let video = self.inputs.iter().filter(|i| i.is_video()).count();
        let audio = self.inputs.len() - video;
        if video > 1 {
            return Err(BackendError::ConfigurationRejected(
                "more than one video input".to_string(),
            ));
        }
        if audio > 1 {
            return Err(BackendError::ConfigurationRejected(
                "more than one audio input".to_string(),
            ));
        }
        for (index, output) in self.outputs.iter().enumerate() {
            if self.outputs[..index].contains(output) {
                return Err(BackendError::ConfigurationRejected(format!(
                    "duplicate output {:?}",
                    output
                )));
            }
        }
        Ok(())
    }
}

/// Pixel layout of a captured still
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StillFormat {
    /// JPEG bitstream
    Jpeg,
    /// Tightly packed RGBA, 4 bytes per pixel
    Rgba,
}

/// A single captured still frame
#[derive(Debug, Clone)]
pub struct StillFrame {
    pub width: u32,
    pub height: u32,
    pub format: StillFormat,
    pub data: Arc<[u8]>,
    pub orientation: VideoOrientation,
    pub captured_at: Instant,
}

/// Invoked by the backend once a movie file is finalized
///
/// Receives the file path and, if the recording failed, the error. Backends
/// call it exactly once per successful `start_recording`, from any thread.
pub type RecordingFinished = Box<dyn FnOnce(PathBuf, Option<BackendError>) + Send + 'static>;

/// Result type for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

/// Error types for backend operations
#[derive(Debug, Clone, PartialEq)]
pub enum BackendError {
    /// Backend is not available on this system
    NotAvailable(String),
    /// Capture device not found
    DeviceNotFound(String),
    /// Device is locked by another configuration holder
    DeviceBusy(String),
    /// Setting or output not supported by the hardware
    Unsupported(String),
    /// Session layout refused by the hardware
    ConfigurationRejected(String),
    /// The session is not running
    NotRunning,
    /// Still capture failed
    CaptureFailed(String),
    /// Recording already in progress
    RecordingInProgress,
    /// No recording in progress
    NoRecordingInProgress,
    /// General I/O error
    Io(String),
    /// Other errors
    Other(String),
}

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendError::NotAvailable(msg) => write!(f, "Backend not available: {}", msg),
            BackendError::DeviceNotFound(msg) => write!(f, "Device not found: {}", msg),
            BackendError::DeviceBusy(msg) => write!(f, "Device busy: {}", msg),
            BackendError::Unsupported(msg) => write!(f, "Not supported: {}", msg),
            BackendError::ConfigurationRejected(msg) => {
                write!(f, "Configuration rejected: {}", msg)
            }
            BackendError::NotRunning => write!(f, "Session is not running"),
            BackendError::CaptureFailed(msg) => write!(f, "Capture failed: {}", msg),
            BackendError::RecordingInProgress => write!(f, "Recording already in progress"),
            BackendError::NoRecordingInProgress => write!(f, "No recording in progress"),
            BackendError::Io(msg) => write!(f, "I/O error: {}", msg),
            BackendError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for BackendError {}

impl From<std::io::Error> for BackendError {
    fn from(err: std::io::Error) -> Self {
        BackendError::Io(err.to_string())
    }
}
