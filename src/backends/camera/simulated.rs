// SPDX-License-Identifier: GPL-3.0-only

//! In-process capture backend
//!
//! Behaves like a phone with a back camera (flash, zoom), a front camera
//! and a microphone. Stills are synthesized JPEG frames and recordings are
//! small placeholder files. Failures and recording completion can be
//! scripted, and a [`SimulatedProbe`] exposes what the session did to the
//! hardware.

use super::CaptureBackend;
use super::types::*;
use crate::constants::SessionPreset;
use image::{ImageBuffer, Rgb};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;
use tracing::{debug, info};

/// Placeholder content written to simulated movie files
const MOVIE_HEADER: &[u8] = b"\0\0\0\x14ftypqt  \0\0\0\0qt  ";

/// Scripted hardware behavior
#[derive(Debug, Clone)]
pub struct SimulatedConfig {
    /// Devices reported by discovery
    pub devices: Vec<DeviceDescriptor>,
    /// Device ids whose open fails
    pub unopenable: Vec<String>,
    /// Outputs the session accepts
    pub supported_outputs: Vec<OutputKind>,
    /// Presets the session accepts
    pub session_presets: Vec<SessionPreset>,
    /// Movie connection supports stabilization
    pub stabilization: bool,
    /// Still capture returns an error
    pub fail_still_capture: bool,
    /// Still capture returns bytes that do not decode
    pub corrupt_stills: bool,
    /// Starting a recording fails
    pub fail_recording: bool,
    /// Recordings only finish when [`SimulatedProbe::finish_recording`] is called
    pub manual_recording_finish: bool,
    /// Still frame dimensions
    pub frame_size: (u32, u32),
}

impl Default for SimulatedConfig {
    fn default() -> Self {
        let mut back = DeviceDescriptor::video("sim-back", "Simulated Back Camera", DevicePosition::Back);
        back.is_default = true;
        back.has_flash = true;
        back.flash_modes = vec![FlashMode::Off, FlashMode::On, FlashMode::Auto];
        back.focus_point_supported = true;
        back.max_zoom_factor = 10.0;

        let mut front =
            DeviceDescriptor::video("sim-front", "Simulated Front Camera", DevicePosition::Front);
        front.presets = vec![SessionPreset::Medium, SessionPreset::Low];

        let microphone = DeviceDescriptor::audio("sim-mic", "Simulated Microphone", true);

        Self {
            devices: vec![back, front, microphone],
            unopenable: Vec::new(),
            supported_outputs: vec![OutputKind::StillImage, OutputKind::MovieFile],
            session_presets: SessionPreset::ALL.to_vec(),
            stabilization: true,
            fail_still_capture: false,
            corrupt_stills: false,
            fail_recording: false,
            manual_recording_finish: false,
            frame_size: (64, 48),
        }
    }
}

struct ActiveRecording {
    path: PathBuf,
    on_finish: RecordingFinished,
    stopped: bool,
}

#[derive(Default)]
struct ProbeState {
    applied: Vec<SessionConfiguration>,
    running: bool,
    start_count: usize,
    stills_captured: usize,
    recordings_started: usize,
    recording: Option<ActiveRecording>,
    last_connection: Option<ConnectionSettings>,
    fail_still_capture: Option<bool>,
}

/// Read-only view on the simulated hardware, shared with the backend
#[derive(Clone, Default)]
pub struct SimulatedProbe {
    state: Arc<Mutex<ProbeState>>,
}

impl SimulatedProbe {
    fn lock(&self) -> MutexGuard<'_, ProbeState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Every configuration committed to the hardware, oldest first
    pub fn applied_configurations(&self) -> Vec<SessionConfiguration> {
        self.lock().applied.clone()
    }

    /// The configuration currently applied
    pub fn current(&self) -> SessionConfiguration {
        self.lock().applied.last().cloned().unwrap_or_default()
    }

    pub fn is_running(&self) -> bool {
        self.lock().running
    }

    /// Number of times the session was started
    pub fn start_count(&self) -> usize {
        self.lock().start_count
    }

    pub fn stills_captured(&self) -> usize {
        self.lock().stills_captured
    }

    /// Number of movie files the hardware began writing
    pub fn recordings_started(&self) -> usize {
        self.lock().recordings_started
    }

    /// A recording is being written (stopped but unfinished counts as not writing)
    pub fn is_recording(&self) -> bool {
        self.lock()
            .recording
            .as_ref()
            .is_some_and(|recording| !recording.stopped)
    }

    /// Connection settings of the last capture or recording
    pub fn last_connection(&self) -> Option<ConnectionSettings> {
        self.lock().last_connection
    }

    /// Override the scripted still capture outcome
    pub fn set_fail_still_capture(&self, fail: bool) {
        self.lock().fail_still_capture = Some(fail);
    }

    /// Finalize the current recording, reporting `error` if given
    ///
    /// Returns false when no recording exists.
    pub fn finish_recording(&self, error: Option<BackendError>) -> bool {
        let recording = self.lock().recording.take();
        match recording {
            Some(recording) => {
                debug!(path = %recording.path.display(), "Simulated recording finalized");
                (recording.on_finish)(recording.path, error);
                true
            }
            None => false,
        }
    }
}

/// Capture backend with scripted devices
pub struct SimulatedBackend {
    config: SimulatedConfig,
    probe: SimulatedProbe,
    configuration: SessionConfiguration,
}

impl SimulatedBackend {
    pub fn new(config: SimulatedConfig) -> Self {
        Self {
            config,
            probe: SimulatedProbe::default(),
            configuration: SessionConfiguration::default(),
        }
    }

    /// Handle for observing the hardware from outside the session
    pub fn probe(&self) -> SimulatedProbe {
        self.probe.clone()
    }

    fn synthesize_jpeg(&self) -> BackendResult<Vec<u8>> {
        let (width, height) = self.config.frame_size;
        let frame = ImageBuffer::from_fn(width, height, |x, y| {
            Rgb([
                (x * 255 / width.max(1)) as u8,
                (y * 255 / height.max(1)) as u8,
                128u8,
            ])
        });

        let mut buffer = Vec::new();
        image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buffer, 90)
            .encode_image(&frame)
            .map_err(|e| BackendError::CaptureFailed(e.to_string()))?;
        Ok(buffer)
    }
}

impl CaptureBackend for SimulatedBackend {
    fn discover_devices(&self) -> Vec<DeviceDescriptor> {
        self.config.devices.clone()
    }

    fn open_device(&self, descriptor: &DeviceDescriptor) -> BackendResult<CameraDevice> {
        if self.config.unopenable.contains(&descriptor.id) {
            return Err(BackendError::DeviceBusy(descriptor.name.clone()));
        }
        if !self.config.devices.iter().any(|d| d.id == descriptor.id) {
            return Err(BackendError::DeviceNotFound(descriptor.id.clone()));
        }
        Ok(CameraDevice::new(descriptor.clone()))
    }

    fn can_add_input(&self, current: &SessionConfiguration, device: &CameraDevice) -> bool {
        let known = self.config.devices.iter().any(|d| d.id == device.id());
        let duplicate = current.inputs.contains(device);
        known && !duplicate
    }

    fn can_add_output(&self, current: &SessionConfiguration, output: OutputKind) -> bool {
        self.config.supported_outputs.contains(&output) && !current.has_output(output)
    }

    fn can_set_preset(&self, preset: SessionPreset) -> bool {
        self.config.session_presets.contains(&preset)
    }

    fn supports_video_stabilization(&self) -> bool {
        self.config.stabilization
    }

    fn apply_configuration(&mut self, configuration: &SessionConfiguration) -> BackendResult<()> {
        configuration.validate()?;
        if let Some(output) = configuration
            .outputs
            .iter()
            .find(|o| !self.config.supported_outputs.contains(o))
        {
            return Err(BackendError::Unsupported(format!("{:?} output", output)));
        }

        self.configuration = configuration.clone();
        self.probe.lock().applied.push(configuration.clone());
        debug!(
            inputs = configuration.inputs.len(),
            outputs = configuration.outputs.len(),
            preset = ?configuration.preset,
            "Simulated session reconfigured"
        );
        Ok(())
    }

    fn start_running(&mut self) -> BackendResult<()> {
        let mut state = self.probe.lock();
        if !state.running {
            state.running = true;
            state.start_count += 1;
            info!("Simulated session running");
        }
        Ok(())
    }

    fn stop_running(&mut self) {
        let mut state = self.probe.lock();
        if state.running {
            state.running = false;
            info!("Simulated session stopped");
        }
    }

    fn is_running(&self) -> bool {
        self.probe.lock().running
    }

    fn capture_still(&mut self, connection: &ConnectionSettings) -> BackendResult<StillFrame> {
        {
            let mut state = self.probe.lock();
            if !state.running {
                return Err(BackendError::NotRunning);
            }
            if !self.configuration.has_output(OutputKind::StillImage) {
                return Err(BackendError::Unsupported("no still image output".to_string()));
            }
            state.last_connection = Some(*connection);
            let fail = state
                .fail_still_capture
                .unwrap_or(self.config.fail_still_capture);
            if fail {
                return Err(BackendError::CaptureFailed("simulated sensor error".to_string()));
            }
            state.stills_captured += 1;
        }

        let data = if self.config.corrupt_stills {
            vec![0xFF, 0xD8, 0x00, 0x01, 0x02]
        } else {
            self.synthesize_jpeg()?
        };

        let (width, height) = self.config.frame_size;
        Ok(StillFrame {
            width,
            height,
            format: StillFormat::Jpeg,
            data: Arc::from(data),
            orientation: connection.orientation,
            captured_at: Instant::now(),
        })
    }

    fn start_recording(
        &mut self,
        path: &Path,
        connection: &ConnectionSettings,
        on_finish: RecordingFinished,
    ) -> BackendResult<()> {
        let mut state = self.probe.lock();
        if !state.running {
            return Err(BackendError::NotRunning);
        }
        if state.recording.is_some() {
            return Err(BackendError::RecordingInProgress);
        }
        if self.config.fail_recording {
            return Err(BackendError::Io("simulated disk failure".to_string()));
        }

        std::fs::write(path, MOVIE_HEADER)?;

        state.recordings_started += 1;
        state.last_connection = Some(*connection);
        state.recording = Some(ActiveRecording {
            path: path.to_path_buf(),
            on_finish,
            stopped: false,
        });
        info!(path = %path.display(), mirrored = connection.mirrored, "Simulated recording started");
        Ok(())
    }

    fn stop_recording(&mut self) -> BackendResult<()> {
        {
            let mut state = self.probe.lock();
            match state.recording.as_mut() {
                Some(recording) if !recording.stopped => recording.stopped = true,
                _ => return Err(BackendError::NoRecordingInProgress),
            }
        }

        if !self.config.manual_recording_finish {
            self.probe.finish_recording(None);
        }
        Ok(())
    }

    fn is_recording(&self) -> bool {
        self.probe.is_recording()
    }
}
