// SPDX-License-Identifier: MPL-2.0

//! Capture backend abstraction
//!
//! ```text
//! ┌─────────────────────┐
//! │      CameraMan      │  ← serialized command queue
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │   CaptureSession    │  ← begin/commit transactions, preset choice
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │ CaptureBackend Trait│  ← hardware interface
//! └──────────┬──────────┘
//!            │
//!      ┌─────┴──────┐
//!      ▼            ▼
//! ┌─────────┐ ┌──────────┐
//! │Simulated│ │GStreamer │
//! └─────────┘ └──────────┘
//! ```

pub mod enumeration;
#[cfg(feature = "gstreamer")]
pub mod gstreamer_backend;
pub mod simulated;
pub mod types;

pub use enumeration::DeviceSet;
pub use simulated::{SimulatedBackend, SimulatedConfig, SimulatedProbe};
pub use types::*;

use crate::config::BackendKind;
use crate::constants::SessionPreset;
use std::path::Path;

/// Hardware capture pipeline
///
/// Backends are only ever driven from the capture queue, so methods take
/// `&mut self` without further synchronization. Session layout changes
/// arrive as a complete [`SessionConfiguration`] through
/// [`apply_configuration`](CaptureBackend::apply_configuration); a backend
/// either applies all of it or none of it.
pub trait CaptureBackend: Send {
    // ===== Enumeration =====

    /// All capture devices currently attached, video and audio
    fn discover_devices(&self) -> Vec<DeviceDescriptor>;

    /// Open a device handle for use as a session input
    fn open_device(&self, descriptor: &DeviceDescriptor) -> BackendResult<CameraDevice>;

    // ===== Capabilities =====

    /// Whether `device` can join the session described by `current`
    fn can_add_input(&self, current: &SessionConfiguration, device: &CameraDevice) -> bool;

    /// Whether `output` can be attached to the session described by `current`
    fn can_add_output(&self, current: &SessionConfiguration, output: OutputKind) -> bool;

    /// Whether the session itself can run at `preset`
    fn can_set_preset(&self, preset: SessionPreset) -> bool;

    /// Whether the movie connection supports stabilization
    fn supports_video_stabilization(&self) -> bool;

    // ===== Lifecycle =====

    /// Atomically replace the session layout
    fn apply_configuration(&mut self, configuration: &SessionConfiguration) -> BackendResult<()>;

    /// Start frames flowing
    fn start_running(&mut self) -> BackendResult<()>;

    /// Stop the session; must be safe to call when already stopped
    fn stop_running(&mut self);

    fn is_running(&self) -> bool;

    // ===== Capture =====

    /// Capture a single still frame, blocking until it is available
    fn capture_still(&mut self, connection: &ConnectionSettings) -> BackendResult<StillFrame>;

    /// Begin writing a movie file to `path`
    ///
    /// `on_finish` fires once the file is finalized, after
    /// [`stop_recording`](CaptureBackend::stop_recording) or when the
    /// hardware ends the recording on its own.
    fn start_recording(
        &mut self,
        path: &Path,
        connection: &ConnectionSettings,
        on_finish: RecordingFinished,
    ) -> BackendResult<()>;

    /// Ask the hardware to stop writing; finalization completes asynchronously
    fn stop_recording(&mut self) -> BackendResult<()>;

    fn is_recording(&self) -> bool;
}

/// Create a backend of the requested kind
pub fn create_backend(kind: BackendKind) -> BackendResult<Box<dyn CaptureBackend>> {
    match kind {
        BackendKind::Simulated => Ok(Box::new(SimulatedBackend::new(SimulatedConfig::default()))),
        #[cfg(feature = "gstreamer")]
        BackendKind::GStreamer => Ok(Box::new(gstreamer_backend::GStreamerBackend::new()?)),
        #[cfg(not(feature = "gstreamer"))]
        BackendKind::GStreamer => Err(BackendError::NotAvailable(
            "built without the gstreamer feature".to_string(),
        )),
    }
}
