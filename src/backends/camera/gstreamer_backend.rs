// SPDX-License-Identifier: GPL-3.0-only

//! GStreamer capture backend
//!
//! Devices come from a `DeviceMonitor`. While the session runs, a preview
//! pipeline feeds an appsink holding the latest RGBA frame; stills are
//! pulled from it. Recording tears the preview down (the device has one
//! consumer) and runs an encode pipeline:
//!
//! ```text
//! src ─ videoconvert ─ [videoflip] ─ x264enc ─┐
//!                                              ├─ qtmux ─ filesink
//! mic ─ audioconvert ─ audioresample ─ aac ────┘
//! ```
//!
//! Stopping sends EOS. A watcher thread waits for EOS or an error on the
//! bus, shuts the pipeline down and reports the finished file, so
//! finalization never blocks the capture queue.

use super::CaptureBackend;
use super::types::*;
use crate::constants::{SessionPreset, timing};
use gstreamer as gst;
use gstreamer::prelude::*;
use gstreamer_app as gst_app;
use gstreamer_video as gst_video;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Property keys that may carry a stable device identifier
const ID_KEYS: &[&str] = &["object.path", "api.v4l2.path", "device.path", "node.name"];

/// Property keys that may carry the physical facing
const LOCATION_KEYS: &[&str] = &["api.libcamera.location", "device.location"];

/// AAC encoders in order of preference
const AAC_ENCODERS: &[&str] = &["avenc_aac", "fdkaacenc", "voaacenc"];

fn make(factory: &str) -> BackendResult<gst::Element> {
    gst::ElementFactory::make(factory)
        .build()
        .map_err(|e| BackendError::NotAvailable(format!("Failed to create {}: {}", factory, e)))
}

fn other<E: std::fmt::Display>(context: &str) -> impl FnOnce(E) -> BackendError + '_ {
    move |e| BackendError::Other(format!("{}: {}", context, e))
}

struct Preview {
    pipeline: gst::Pipeline,
    appsink: gst_app::AppSink,
}

impl Drop for Preview {
    fn drop(&mut self) {
        let _ = self.pipeline.set_state(gst::State::Null);
    }
}

struct ActiveRecording {
    pipeline: gst::Pipeline,
    /// Set when EOS was sent
    stop_requested: Arc<Mutex<Option<Instant>>>,
    /// Set by the watcher once the file is finalized
    finished: Arc<AtomicBool>,
}

/// Capture backend on top of GStreamer device providers
pub struct GStreamerBackend {
    devices: Mutex<HashMap<String, gst::Device>>,
    configuration: SessionConfiguration,
    running: bool,
    preview: Option<Preview>,
    recording: Option<ActiveRecording>,
}

impl GStreamerBackend {
    pub fn new() -> BackendResult<Self> {
        gst::init().map_err(|e| BackendError::NotAvailable(format!("GStreamer init failed: {}", e)))?;
        info!("GStreamer capture backend initialized");
        Ok(Self {
            devices: Mutex::new(HashMap::new()),
            configuration: SessionConfiguration::default(),
            running: false,
            preview: None,
            recording: None,
        })
    }

    fn device_cache(&self) -> MutexGuard<'_, HashMap<String, gst::Device>> {
        self.devices.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn gst_device(&self, input: &CameraDevice) -> BackendResult<gst::Device> {
        self.device_cache()
            .get(input.id())
            .cloned()
            .ok_or_else(|| BackendError::DeviceNotFound(input.id().to_string()))
    }

    fn ensure_preview(&mut self) -> BackendResult<()> {
        if self.preview.is_some() {
            return Ok(());
        }
        let input = self
            .configuration
            .video_input()
            .cloned()
            .ok_or_else(|| BackendError::ConfigurationRejected("no video input".to_string()))?;
        let device = self.gst_device(&input)?;
        let (width, height) = self
            .configuration
            .preset
            .unwrap_or(SessionPreset::Medium)
            .dimensions();

        let pipeline = gst::Pipeline::new();
        let source = device
            .create_element(None)
            .map_err(other("Failed to create camera source"))?;
        let convert = make("videoconvert")?;
        let scale = make("videoscale")?;
        let caps = gst::Caps::builder("video/x-raw")
            .field("format", "RGBA")
            .field("width", width as i32)
            .field("height", height as i32)
            .build();
        let capsfilter = gst::ElementFactory::make("capsfilter")
            .property("caps", &caps)
            .build()
            .map_err(other("Failed to create capsfilter"))?;
        let sink = make("appsink")?;
        let appsink = sink
            .clone()
            .dynamic_cast::<gst_app::AppSink>()
            .map_err(|_| BackendError::Other("Failed to cast to AppSink".to_string()))?;
        appsink.set_property("max-buffers", 1u32);
        appsink.set_property("drop", true);
        appsink.set_property("sync", false);

        let elements = [&source, &convert, &scale, &capsfilter, &sink];
        pipeline
            .add_many(elements)
            .map_err(other("Failed to assemble preview"))?;
        gst::Element::link_many(elements).map_err(other("Failed to link preview"))?;
        pipeline
            .set_state(gst::State::Playing)
            .map_err(other("Failed to start preview"))?;

        info!(camera = %input.name(), width, height, "Preview pipeline running");
        self.preview = Some(Preview { pipeline, appsink });
        Ok(())
    }

    fn build_recording(
        &self,
        path: &Path,
        connection: &ConnectionSettings,
    ) -> BackendResult<gst::Pipeline> {
        let input = self
            .configuration
            .video_input()
            .cloned()
            .ok_or_else(|| BackendError::ConfigurationRejected("no video input".to_string()))?;
        let device = self.gst_device(&input)?;

        let pipeline = gst::Pipeline::new();
        let source = device
            .create_element(None)
            .map_err(other("Failed to create camera source"))?;
        let convert = make("videoconvert")?;
        let encoder = gst::ElementFactory::make("x264enc")
            .property_from_str("tune", "zerolatency")
            .build()
            .map_err(other("Failed to create x264enc"))?;
        let muxer = make("qtmux")?;
        let filesink = gst::ElementFactory::make("filesink")
            .property("location", path.to_string_lossy().to_string())
            .build()
            .map_err(other("Failed to create filesink"))?;

        let flip;
        let mut video: Vec<&gst::Element> = vec![&source, &convert];
        if connection.mirrored {
            flip = gst::ElementFactory::make("videoflip")
                .property_from_str("method", "horizontal-flip")
                .build()
                .map_err(other("Failed to create videoflip"))?;
            video.push(&flip);
        }
        video.extend([&encoder, &muxer, &filesink]);

        pipeline
            .add_many(video.iter().copied())
            .map_err(other("Failed to assemble recording"))?;
        gst::Element::link_many(video.iter().copied()).map_err(other("Failed to link recording"))?;

        if let Some(audio) = self.configuration.audio_input() {
            match self.build_audio_branch(&pipeline, audio, &muxer) {
                Ok(()) => debug!(microphone = %audio.name(), "Audio branch attached"),
                Err(e) => warn!(error = %e, "Recording without audio"),
            }
        }

        Ok(pipeline)
    }

    fn build_audio_branch(
        &self,
        pipeline: &gst::Pipeline,
        audio: &CameraDevice,
        muxer: &gst::Element,
    ) -> BackendResult<()> {
        let device = self.gst_device(audio)?;
        let encoder = AAC_ENCODERS
            .iter()
            .find_map(|name| gst::ElementFactory::make(name).build().ok())
            .ok_or_else(|| BackendError::Unsupported("no AAC encoder".to_string()))?;
        let source = device
            .create_element(None)
            .map_err(other("Failed to create microphone source"))?;
        let convert = make("audioconvert")?;
        let resample = make("audioresample")?;

        let elements = [&source, &convert, &resample, &encoder];
        pipeline
            .add_many(elements)
            .map_err(other("Failed to assemble audio branch"))?;
        gst::Element::link_many(elements).map_err(other("Failed to link audio branch"))?;
        encoder
            .link(muxer)
            .map_err(other("Failed to link audio encoder to muxer"))?;
        Ok(())
    }
}

fn describe(device: &gst::Device, index: usize) -> Option<DeviceDescriptor> {
    let class = device.device_class();
    let props = device.properties();
    let prop = |key: &str| {
        props
            .as_ref()
            .and_then(|p| p.get::<String>(key).ok())
            .filter(|value| !value.is_empty())
    };

    let name = device.display_name().to_string();
    let id = ID_KEYS
        .iter()
        .find_map(|&key| prop(key))
        .unwrap_or_else(|| format!("{}#{}", name, index));

    if class.contains("Video/Source") {
        let position = LOCATION_KEYS
            .iter()
            .find_map(|&key| prop(key))
            .map(|location| DevicePosition::from_location(&location))
            .unwrap_or_default();
        let mut descriptor = DeviceDescriptor::video(id, name, position);
        descriptor.presets = supported_presets(device);
        Some(descriptor)
    } else if class.contains("Audio/Source") {
        let is_default = props
            .as_ref()
            .and_then(|p| p.get::<bool>("is-default").ok())
            .unwrap_or(false);
        Some(DeviceDescriptor::audio(id, name, is_default))
    } else {
        None
    }
}

/// Presets whose frame fits the device's largest raw resolution
fn supported_presets(device: &gst::Device) -> Vec<SessionPreset> {
    let largest = device.caps().and_then(|caps| {
        caps.iter()
            .filter_map(|s| Some((s.get::<i32>("width").ok()?, s.get::<i32>("height").ok()?)))
            .max_by_key(|&(w, h)| i64::from(w) * i64::from(h))
    });

    let presets: Vec<_> = SessionPreset::ALL
        .iter()
        .copied()
        .filter(|preset| {
            let (w, h) = preset.dimensions();
            largest.is_none_or(|(max_w, max_h)| w as i32 <= max_w && h as i32 <= max_h)
        })
        .collect();

    if presets.is_empty() {
        vec![SessionPreset::Low]
    } else {
        presets
    }
}

/// Desktop webcams rarely report a facing: the first becomes the back
/// camera, the second the front camera
fn assign_unspecified_positions(descriptors: &mut [DeviceDescriptor]) {
    for position in [DevicePosition::Back, DevicePosition::Front] {
        let taken = descriptors
            .iter()
            .any(|d| d.media == MediaType::Video && d.position == position);
        if taken {
            continue;
        }
        if let Some(descriptor) = descriptors
            .iter_mut()
            .find(|d| d.media == MediaType::Video && d.position == DevicePosition::Unspecified)
        {
            debug!(device = %descriptor.name, %position, "Assigned camera position");
            descriptor.position = position;
        }
    }
}

/// Copy an RGBA sample into a tightly packed buffer
fn still_from_sample(sample: &gst::Sample, orientation: VideoOrientation) -> BackendResult<StillFrame> {
    let buffer = sample
        .buffer()
        .ok_or_else(|| BackendError::CaptureFailed("no buffer in sample".to_string()))?;
    let caps = sample
        .caps()
        .ok_or_else(|| BackendError::CaptureFailed("no caps in sample".to_string()))?;
    let info = gst_video::VideoInfo::from_caps(caps).map_err(other("Failed to read video info"))?;
    let map = buffer.map_readable().map_err(other("Failed to map buffer"))?;

    let width = info.width();
    let height = info.height();
    let stride = info.stride()[0] as usize;
    let row = width as usize * 4;
    let data = map.as_slice();
    if height == 0 || stride < row || data.len() < stride * (height as usize - 1) + row {
        return Err(BackendError::CaptureFailed("truncated frame".to_string()));
    }

    let mut pixels = Vec::with_capacity(row * height as usize);
    for line in data.chunks(stride).take(height as usize) {
        pixels.extend_from_slice(&line[..row]);
    }

    Ok(StillFrame {
        width,
        height,
        format: StillFormat::Rgba,
        data: Arc::from(pixels),
        orientation,
        captured_at: Instant::now(),
    })
}

/// Wait for the recording pipeline to finish and report the file
fn watch_recording(
    pipeline: gst::Pipeline,
    path: PathBuf,
    stop_requested: Arc<Mutex<Option<Instant>>>,
    finished: Arc<AtomicBool>,
    on_finish: RecordingFinished,
) {
    let outcome = match pipeline.bus() {
        None => Some(BackendError::Other("recording pipeline has no bus".to_string())),
        Some(bus) => loop {
            if let Some(message) = bus.timed_pop_filtered(
                gst::ClockTime::from_mseconds(100),
                &[gst::MessageType::Eos, gst::MessageType::Error],
            ) {
                match message.view() {
                    gst::MessageView::Eos(_) => break None,
                    gst::MessageView::Error(err) => {
                        error!(
                            error = %err.error(),
                            debug = ?err.debug(),
                            source = ?err.src().map(|s| s.name()),
                            "Recording pipeline error"
                        );
                        break Some(BackendError::Other(err.error().to_string()));
                    }
                    _ => {}
                }
            }

            let stopped_at = *stop_requested.lock().unwrap_or_else(|e| e.into_inner());
            if stopped_at.is_some_and(|at| at.elapsed() > timing::RECORDING_FINALIZE_TIMEOUT) {
                warn!("Recording did not finalize in time");
                break Some(BackendError::Io("finalize timed out".to_string()));
            }
        },
    };

    let _ = pipeline.set_state(gst::State::Null);
    finished.store(true, Ordering::Release);
    info!(path = %path.display(), ok = outcome.is_none(), "Recording finalized");
    on_finish(path, outcome);
}

impl CaptureBackend for GStreamerBackend {
    fn discover_devices(&self) -> Vec<DeviceDescriptor> {
        let monitor = gst::DeviceMonitor::new();
        monitor.add_filter(Some("Video/Source"), None);
        monitor.add_filter(Some("Audio/Source"), None);
        if let Err(e) = monitor.start() {
            warn!(error = %e, "Device monitor failed to start");
            return Vec::new();
        }
        let devices: Vec<gst::Device> = monitor.devices().into_iter().collect();
        monitor.stop();

        let mut cache = self.device_cache();
        cache.clear();
        let mut descriptors = Vec::new();
        for (index, device) in devices.into_iter().enumerate() {
            let Some(mut descriptor) = describe(&device, index) else {
                continue;
            };
            if cache.contains_key(&descriptor.id) {
                descriptor.id = format!("{}#{}", descriptor.id, index);
            }
            cache.insert(descriptor.id.clone(), device);
            descriptors.push(descriptor);
        }
        drop(cache);

        assign_unspecified_positions(&mut descriptors);
        debug!(count = descriptors.len(), "GStreamer devices discovered");
        descriptors
    }

    fn open_device(&self, descriptor: &DeviceDescriptor) -> BackendResult<CameraDevice> {
        if !self.device_cache().contains_key(&descriptor.id) {
            return Err(BackendError::DeviceNotFound(descriptor.id.clone()));
        }
        Ok(CameraDevice::new(descriptor.clone()))
    }

    fn can_add_input(&self, current: &SessionConfiguration, device: &CameraDevice) -> bool {
        self.device_cache().contains_key(device.id()) && !current.inputs.contains(device)
    }

    fn can_add_output(&self, current: &SessionConfiguration, output: OutputKind) -> bool {
        !current.has_output(output)
    }

    fn can_set_preset(&self, _preset: SessionPreset) -> bool {
        true
    }

    fn supports_video_stabilization(&self) -> bool {
        false
    }

    fn apply_configuration(&mut self, configuration: &SessionConfiguration) -> BackendResult<()> {
        configuration.validate()?;
        if self.is_recording() {
            return Err(BackendError::RecordingInProgress);
        }

        let input_changed = self.configuration.video_input() != configuration.video_input()
            || self.configuration.preset != configuration.preset;
        self.configuration = configuration.clone();

        if input_changed {
            self.preview = None;
            if self.running {
                self.ensure_preview()?;
            }
        }
        Ok(())
    }

    fn start_running(&mut self) -> BackendResult<()> {
        self.ensure_preview()?;
        self.running = true;
        Ok(())
    }

    fn stop_running(&mut self) {
        if self.preview.take().is_some() {
            info!("Preview pipeline stopped");
        }
        self.running = false;
    }

    fn is_running(&self) -> bool {
        self.running
    }

    fn capture_still(&mut self, connection: &ConnectionSettings) -> BackendResult<StillFrame> {
        if !self.running {
            return Err(BackendError::NotRunning);
        }
        if self.is_recording() {
            return Err(BackendError::RecordingInProgress);
        }
        self.ensure_preview()?;
        let preview = self
            .preview
            .as_ref()
            .ok_or_else(|| BackendError::CaptureFailed("preview unavailable".to_string()))?;

        let timeout = gst::ClockTime::from_mseconds(timing::STILL_CAPTURE_TIMEOUT.as_millis() as u64);
        let sample = preview
            .appsink
            .try_pull_sample(timeout)
            .ok_or_else(|| BackendError::CaptureFailed("no frame within timeout".to_string()))?;
        still_from_sample(&sample, connection.orientation)
    }

    fn start_recording(
        &mut self,
        path: &Path,
        connection: &ConnectionSettings,
        on_finish: RecordingFinished,
    ) -> BackendResult<()> {
        if !self.running {
            return Err(BackendError::NotRunning);
        }
        if let Some(recording) = &self.recording {
            if !recording.finished.load(Ordering::Acquire) {
                return Err(BackendError::RecordingInProgress);
            }
        }
        self.recording = None;

        // The camera has a single consumer
        self.preview = None;

        let pipeline = self.build_recording(path, connection)?;
        if let Err(e) = pipeline.set_state(gst::State::Playing) {
            let _ = pipeline.set_state(gst::State::Null);
            return Err(BackendError::Other(format!("Failed to start recording: {}", e)));
        }

        let stop_requested = Arc::new(Mutex::new(None));
        let finished = Arc::new(AtomicBool::new(false));
        {
            let pipeline = pipeline.clone();
            let path = path.to_path_buf();
            let stop_requested = Arc::clone(&stop_requested);
            let finished = Arc::clone(&finished);
            std::thread::Builder::new()
                .name("cameraman-recording".to_string())
                .spawn(move || watch_recording(pipeline, path, stop_requested, finished, on_finish))?;
        }

        info!(path = %path.display(), mirrored = connection.mirrored, "Recording pipeline running");
        self.recording = Some(ActiveRecording {
            pipeline,
            stop_requested,
            finished,
        });
        Ok(())
    }

    fn stop_recording(&mut self) -> BackendResult<()> {
        let recording = self
            .recording
            .as_ref()
            .filter(|r| !r.finished.load(Ordering::Acquire))
            .ok_or(BackendError::NoRecordingInProgress)?;

        let mut stop_requested = recording
            .stop_requested
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        if stop_requested.is_some() {
            return Err(BackendError::NoRecordingInProgress);
        }
        *stop_requested = Some(Instant::now());
        drop(stop_requested);

        info!("Sending EOS to recording pipeline");
        if !recording.pipeline.send_event(gst::event::Eos::new()) {
            warn!("Failed to send EOS event to recording pipeline");
        }
        Ok(())
    }

    fn is_recording(&self) -> bool {
        self.recording.as_ref().is_some_and(|r| {
            !r.finished.load(Ordering::Acquire)
                && r.stop_requested
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .is_none()
        })
    }
}

impl Drop for GStreamerBackend {
    fn drop(&mut self) {
        if let Some(recording) = &self.recording {
            if !recording.finished.load(Ordering::Acquire) {
                let _ = recording.pipeline.send_event(gst::event::Eos::new());
            }
        }
    }
}
