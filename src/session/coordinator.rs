// SPDX-License-Identifier: GPL-3.0-only

//! Capture session coordinator
//!
//! [`CameraMan`] is the single authority over the capture session. Every
//! session mutation, capture and recording request is queued on the
//! capture queue and runs there in submission order; commits to the asset
//! store run on a separate saving queue so storage I/O never stalls
//! capture. Callers get a [`Completion`] back immediately and await the
//! outcome on their own context.
//!
//! ```text
//!  caller ──dispatch──▶ capture queue ──frame/file──▶ saving queue
//!    ▲                  (SessionState)                (Persistence)
//!    └──────────────── Completion resolves exactly once ◀─────┘
//! ```

use super::completion::{CaptureKind, Completion, PendingCapture};
use super::configuration::CaptureSession;
use super::lease::{BackgroundTasks, NoBackgroundTasks, RecordingLease};
use super::observer::{NullObserver, SessionObserver};
use super::queue::{QueueHandle, SerialQueue};
use super::state::{RecordingState, SessionStatus, ZoomState};
use crate::backends::camera::{
    BackendError, CameraDevice, CaptureBackend, ConnectionSettings, DevicePosition, DeviceSet,
    FlashMode, FocusPoint, OutputKind, PreviewConnection, RecordingFinished, StabilizationMode,
    VideoOrientation,
};
use crate::config::Config;
use crate::constants::{SessionPreset, queues, timing};
use crate::errors::SessionError;
use crate::permission::{AuthorizationStatus, PermissionOracle, StaticPermissions};
use crate::pipelines::photo::decode_still;
use crate::pipelines::video::prepare_scratch_file;
use crate::storage::{AssetHandle, AssetStore, Location, Persistence};
use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Point-in-time view of the session, taken on the capture queue
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub running: bool,
    pub recording: bool,
    /// Facing of the active video input
    pub video_position: Option<DevicePosition>,
    pub audio_attached: bool,
    pub outputs: Vec<OutputKind>,
    pub preset: Option<SessionPreset>,
    pub stabilization: StabilizationMode,
    /// Zoom factor applied to the active video input
    pub zoom_factor: f64,
    pub flash_mode: Option<FlashMode>,
    pub focus_point: Option<FocusPoint>,
    /// Recordings whose movie file has not been finalized yet
    pub unfinished_recordings: usize,
}

/// Builder for [`CameraMan`]
pub struct CameraManBuilder {
    backend: Box<dyn CaptureBackend>,
    store: Arc<dyn AssetStore>,
    observer: Arc<dyn SessionObserver>,
    permissions: Arc<dyn PermissionOracle>,
    background: Arc<dyn BackgroundTasks>,
    config: Config,
    preview: PreviewConnection,
}

impl CameraManBuilder {
    pub fn observer(mut self, observer: Arc<dyn SessionObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn permissions(mut self, permissions: Arc<dyn PermissionOracle>) -> Self {
        self.permissions = permissions;
        self
    }

    pub fn background_tasks(mut self, background: Arc<dyn BackgroundTasks>) -> Self {
        self.background = background;
        self
    }

    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Preview surface whose orientation captures follow
    pub fn preview(mut self, preview: PreviewConnection) -> Self {
        self.preview = preview;
        self
    }

    /// Spawn both queues; fails only if a queue thread cannot be created
    pub fn build(self) -> std::io::Result<CameraMan> {
        let CameraManBuilder {
            backend,
            store,
            observer,
            permissions,
            background,
            config,
            preview,
        } = self;

        let config = Arc::new(config);
        let status = Arc::new(SessionStatus::default());

        let saving = SerialQueue::spawn(queues::SAVING, move |_| Persistence::new(store))?;

        let capture = {
            let persistence = saving.handle();
            let observer = Arc::clone(&observer);
            let permissions = Arc::clone(&permissions);
            let config = Arc::clone(&config);
            let status = Arc::clone(&status);
            let preview = preview.clone();
            SerialQueue::spawn(queues::CAPTURE, move |this| SessionState {
                session: CaptureSession::new(backend, config.presets()),
                devices: DeviceSet::default(),
                recording: RecordingState::Idle,
                in_flight: HashMap::new(),
                settle_waiters: Vec::new(),
                next_recording_id: 1,
                zoom: ZoomState::default(),
                persistence,
                this,
                observer,
                permissions,
                background,
                config,
                status,
                preview,
            })?
        };

        Ok(CameraMan {
            capture,
            saving,
            status,
            permissions,
            observer,
            config,
            preview,
        })
    }
}

/// Capture session coordinator
///
/// Dropping the coordinator stops the session and waits, up to
/// [`timing::RECORDING_FINALIZE_TIMEOUT`], for unfinished recordings to be
/// finalized and handed to the store. Jobs already queued still run
/// before the queues shut down.
pub struct CameraMan {
    // Declared before `saving` so capture shuts down first and its last
    // hand-offs still reach the store
    capture: SerialQueue<SessionState>,
    saving: SerialQueue<Persistence>,
    status: Arc<SessionStatus>,
    permissions: Arc<dyn PermissionOracle>,
    observer: Arc<dyn SessionObserver>,
    config: Arc<Config>,
    preview: PreviewConnection,
}

impl CameraMan {
    /// Start building a coordinator around `backend`, committing to `store`
    ///
    /// Defaults: no observer, all permissions granted, no background task
    /// support, default configuration.
    pub fn builder(backend: Box<dyn CaptureBackend>, store: Arc<dyn AssetStore>) -> CameraManBuilder {
        CameraManBuilder {
            backend,
            store,
            observer: Arc::new(NullObserver),
            permissions: Arc::new(StaticPermissions::granted()),
            background: Arc::new(NoBackgroundTasks),
            config: Config::default(),
            preview: PreviewConnection::default(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The preview connection captures take their orientation from
    pub fn preview_connection(&self) -> &PreviewConnection {
        &self.preview
    }

    // ===== Lifecycle =====

    /// Start the session if camera access is authorized, otherwise report
    /// [`session_unavailable`](SessionObserver::session_unavailable)
    pub fn setup(&self) {
        let status = self.permissions.camera_authorization_status();
        if status.is_authorized() {
            self.start();
        } else {
            let reason = SessionError::Unavailable(status);
            info!(%reason, "Camera not available");
            self.observer.session_unavailable();
        }
    }

    /// Ask the permission oracle for access, then start if granted
    pub fn request_access(&self) {
        let capture = self.capture.handle();
        let observer = Arc::clone(&self.observer);
        self.permissions.request_camera_access(
            self.config.request_microphone,
            Box::new(move |status: AuthorizationStatus| {
                if status.is_authorized() {
                    capture.dispatch(SessionState::start);
                } else {
                    info!(%status, "Camera access refused");
                    observer.session_unavailable();
                }
            }),
        );
    }

    /// Enumerate devices, configure the session and start it
    pub fn start(&self) {
        self.capture.dispatch(SessionState::start);
    }

    /// Halt the session; safe to call repeatedly
    pub fn stop(&self) {
        self.capture.dispatch(SessionState::stop);
    }

    /// Whether the session is running (eventually consistent)
    pub fn is_running(&self) -> bool {
        self.status.is_running()
    }

    // ===== Camera selection =====

    /// Swap between the front and back camera
    ///
    /// Resolves with the new camera's facing, or `None` when nothing was
    /// switched. Refused while a recording is in progress.
    pub fn switch_camera(&self) -> Completion<DevicePosition> {
        if self.status.is_recording() {
            let reason =
                SessionError::InvalidStateTransition("camera switch while recording".to_string());
            info!(%reason, "Camera switch refused");
            return Completion::ready(None);
        }

        let (resolver, completion) = Completion::pair();
        self.capture
            .dispatch(move |state| resolver.resolve(state.switch_camera()));
        completion
    }

    // ===== Capture =====

    /// Capture a still with `preview`'s orientation and commit it
    ///
    /// Resolves exactly once: with the committed asset, or `None` if
    /// capture, decoding or the commit failed.
    pub fn take_photo(
        &self,
        preview: &PreviewConnection,
        location: Option<Location>,
    ) -> Completion<AssetHandle> {
        let (resolver, completion) = Completion::pair();
        let pending = PendingCapture::new(CaptureKind::Photo, self.location(location), resolver);
        let orientation = preview.orientation();
        self.capture
            .dispatch(move |state| state.take_photo(orientation, pending));
        completion
    }

    /// Toggle recording: begin when idle, end without a waiting caller
    /// when already recording
    pub fn start_video_recording(&self) {
        self.capture.dispatch(|state| {
            if state.recording.is_recording() {
                state.end_recording(None);
            } else {
                state.begin_recording();
            }
        });
    }

    /// Begin writing a movie file
    ///
    /// Resolves to whether recording started. A request while already
    /// recording, or without a movie output, is a no-op.
    pub fn begin_recording(&self) -> Completion<bool> {
        let (resolver, completion) = Completion::pair();
        self.capture
            .dispatch(move |state| resolver.resolve(Some(state.begin_recording())));
        completion
    }

    /// End the active recording and commit the movie file
    ///
    /// Resolves once the hardware has finalized the file and the commit
    /// finished, with the asset or `None`. Resolves `None` right away when
    /// nothing is recording.
    pub fn end_recording(&self, location: Option<Location>) -> Completion<AssetHandle> {
        let (resolver, completion) = Completion::pair();
        let pending = PendingCapture::new(CaptureKind::Video, self.location(location), resolver);
        self.capture
            .dispatch(move |state| state.end_recording(Some(pending)));
        completion
    }

    /// Same as [`end_recording`](CameraMan::end_recording)
    pub fn stop_video_recording(&self, location: Option<Location>) -> Completion<AssetHandle> {
        self.end_recording(location)
    }

    /// Whether a recording is in progress (eventually consistent)
    pub fn is_video_recording(&self) -> bool {
        self.status.is_recording()
    }

    // ===== Device settings =====

    pub fn flash(&self, mode: FlashMode) {
        self.capture.dispatch(move |state| state.set_flash(mode));
    }

    pub fn focus(&self, point: FocusPoint) {
        self.capture.dispatch(move |state| state.set_focus(point));
    }

    /// Mark the start of a pinch gesture
    pub fn begin_zoom(&self) {
        self.capture.dispatch(|state| state.zoom.begin());
    }

    /// Zoom to `scale` times the factor at gesture start
    pub fn zoom(&self, scale: f64) {
        self.capture.dispatch(move |state| state.zoom(scale));
    }

    // ===== Introspection =====

    pub fn snapshot(&self) -> Completion<SessionSnapshot> {
        let (resolver, completion) = Completion::pair();
        self.capture
            .dispatch(move |state| resolver.resolve(Some(state.snapshot())));
        completion
    }

    /// Resolves once all queued capture work and the commits it handed to
    /// the saving queue have run
    pub fn flush(&self) -> impl Future<Output = ()> + Send + 'static {
        let capture = self.capture.barrier();
        let saving = self.saving.handle();
        async move {
            let _ = capture.await;
            let _ = saving.barrier().await;
        }
    }

    fn location(&self, location: Option<Location>) -> Option<Location> {
        location.filter(|_| self.config.record_location)
    }
}

impl Drop for CameraMan {
    fn drop(&mut self) {
        self.stop();
        if self.capture.is_current() {
            return;
        }

        // Finish callbacks arrive on the capture queue after the stop, so
        // shutting it down right away would drop them
        let (tx, rx) = mpsc::channel();
        if !self.capture.dispatch(move |state| state.notify_when_settled(tx)) {
            return;
        }
        match rx.recv_timeout(timing::RECORDING_FINALIZE_TIMEOUT) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {}
            Err(RecvTimeoutError::Timeout) => {
                warn!("Recordings still unfinished at shutdown, abandoning them");
            }
        }
    }
}

/// A recording whose movie file is still being written or finalized
struct InFlightRecording {
    lease: Option<RecordingLease>,
    /// Caller waiting for the asset; `None` until someone ends the recording
    pending: Option<PendingCapture>,
}

/// Everything the capture queue owns
struct SessionState {
    session: CaptureSession,
    devices: DeviceSet,
    recording: RecordingState,
    in_flight: HashMap<u64, InFlightRecording>,
    /// Signaled once `in_flight` drains
    settle_waiters: Vec<Sender<()>>,
    next_recording_id: u64,
    zoom: ZoomState,
    persistence: QueueHandle<Persistence>,
    this: QueueHandle<SessionState>,
    observer: Arc<dyn SessionObserver>,
    permissions: Arc<dyn PermissionOracle>,
    background: Arc<dyn BackgroundTasks>,
    config: Arc<Config>,
    status: Arc<SessionStatus>,
    preview: PreviewConnection,
}

impl SessionState {
    fn start(&mut self) {
        if self.session.is_running() {
            debug!("Session already running");
            return;
        }

        self.devices = DeviceSet::enumerate(self.session.backend());
        let Some(back) = self.devices.back.clone() else {
            self.start_failed(SessionError::Unsupported("no back camera".to_string()));
            return;
        };
        let audio = self.audio_input();
        let stabilize = self.config.video_stabilization;

        let configured = self.session.configure(|tx| {
            tx.clear();
            tx.add_input(&back)?;
            if let Some(audio) = &audio {
                if tx.can_add_input(audio) {
                    tx.add_input(audio)?;
                } else {
                    warn!(device = %audio.name(), "Audio input refused, recording without sound");
                }
            }
            for output in [OutputKind::StillImage, OutputKind::MovieFile] {
                if tx.can_add_output(output) {
                    tx.add_output(output)?;
                } else {
                    debug!(?output, "Output not supported");
                }
            }
            if stabilize && tx.set_stabilization(StabilizationMode::Auto).is_err() {
                debug!("Video stabilization not supported");
            }
            Ok(())
        });
        if let Err(e) = configured {
            self.start_failed(e.into());
            return;
        }

        self.input_changed(&back);

        if let Err(e) = self.session.start_running() {
            self.start_failed(e.into());
            return;
        }

        self.status.set_running(true);
        info!(camera = %back.name(), "Capture session started");
        self.observer.session_started();
    }

    /// Microphone input if wanted, authorized and present
    fn audio_input(&self) -> Option<CameraDevice> {
        if !self.config.request_microphone {
            return None;
        }
        let status = self.permissions.microphone_authorization_status();
        if !status.is_authorized() {
            info!(%status, "Microphone not authorized, recording without sound");
            return None;
        }
        if self.devices.audio.is_none() {
            warn!("No audio input found, recording without sound");
        }
        self.devices.audio.clone()
    }

    fn start_failed(&self, reason: SessionError) {
        error!(%reason, "Capture session failed to start");
        self.observer.session_start_failed(&reason);
    }

    fn stop(&mut self) {
        if self.recording.is_recording() {
            self.end_recording(None);
        }
        self.session.stop_running();
        if self.status.is_running() {
            info!("Capture session stopped");
        }
        self.status.set_running(false);
    }

    /// Bookkeeping after a new video input became active
    fn input_changed(&mut self, device: &CameraDevice) {
        self.zoom = ZoomState::at(device.settings().zoom_factor);
        self.observer.active_input_changed(device.has_flash());
    }

    fn switch_camera(&mut self) -> Option<DevicePosition> {
        if self.recording.is_recording() {
            info!("Camera switch refused, recording in progress");
            return None;
        }
        let current = self.session.current_input()?.clone();
        let Some(target) = self.devices.counterpart(&current).cloned() else {
            debug!(camera = %current.name(), "No camera to switch to");
            return None;
        };

        let switched = self.session.configure(|tx| {
            tx.remove_input(&current);
            tx.add_input(&target)
        });
        match switched {
            Ok(()) => {
                info!(from = %current.position(), to = %target.position(), "Switched camera");
                self.input_changed(&target);
                Some(target.position())
            }
            Err(e) => {
                warn!(error = %e, "Camera switch failed, keeping current camera");
                None
            }
        }
    }

    fn take_photo(&mut self, orientation: VideoOrientation, pending: PendingCapture) {
        if !self.session.has_output(OutputKind::StillImage) {
            warn!("No still image output, photo not taken");
            pending.resolve(None);
            return;
        }

        let connection = ConnectionSettings {
            orientation,
            flash_mode: self
                .session
                .current_input()
                .map(|device| device.settings().flash_mode)
                .unwrap_or_default(),
            ..Default::default()
        };

        let frame = match self.session.backend_mut().capture_still(&connection) {
            Ok(frame) => frame,
            Err(e) => {
                let reason = SessionError::from(e);
                warn!(%reason, "Still capture failed");
                pending.resolve(None);
                return;
            }
        };

        let image = match decode_still(&frame) {
            Ok(image) => image,
            Err(reason) => {
                warn!(%reason, "Captured frame could not be decoded");
                pending.resolve(None);
                return;
            }
        };

        debug!(width = image.width(), height = image.height(), "Still captured");
        // A refused dispatch drops `pending`, which resolves to `None`
        self.persistence
            .dispatch(move |persistence| persistence.save_photo(image, pending));
    }

    fn begin_recording(&mut self) -> bool {
        if !self.session.has_output(OutputKind::MovieFile) {
            debug!("No movie output, recording not started");
            return false;
        }
        if self.recording.is_recording() {
            debug!("Already recording");
            return false;
        }
        let Some(mirrored) = self
            .session
            .current_input()
            .map(|device| device.position() == DevicePosition::Front)
        else {
            return false;
        };

        let lease = RecordingLease::acquire(&self.background, "cameraman-recording");

        let file_path = match prepare_scratch_file(&self.config.scratch_dir()) {
            Ok(path) => path,
            Err(e) => {
                warn!(error = %e, "Could not prepare scratch file");
                return false;
            }
        };

        let id = self.next_recording_id;
        self.next_recording_id += 1;

        let connection = ConnectionSettings {
            orientation: self.preview.orientation(),
            mirrored,
            stabilization: self.session.configuration().stabilization,
            flash_mode: FlashMode::Off,
        };

        let this = self.this.clone();
        let on_finish: RecordingFinished = Box::new(move |path, error| {
            this.dispatch(move |state| state.recording_finished(id, path, error));
        });

        if let Err(e) = self
            .session
            .backend_mut()
            .start_recording(&file_path, &connection, on_finish)
        {
            let reason = SessionError::from(e);
            warn!(%reason, "Recording failed to start");
            if file_path.exists() {
                let _ = std::fs::remove_file(&file_path);
            }
            return false;
        }

        self.in_flight.insert(
            id,
            InFlightRecording {
                lease,
                pending: None,
            },
        );
        info!(recording = id, path = %file_path.display(), mirrored, "Recording started");
        self.recording = RecordingState::Recording {
            id,
            started_at: Instant::now(),
            file_path,
        };
        self.status.set_recording(true);
        true
    }

    fn end_recording(&mut self, pending: Option<PendingCapture>) {
        let RecordingState::Recording { id, started_at, .. } = self.recording.take() else {
            debug!("No recording to stop");
            if let Some(pending) = pending {
                pending.resolve(None);
            }
            return;
        };
        self.status.set_recording(false);

        // Resolved by the finish callback, which the backend always delivers
        match self.in_flight.get_mut(&id) {
            Some(entry) => entry.pending = pending,
            None => {
                if let Some(pending) = pending {
                    pending.resolve(None);
                }
            }
        }

        info!(
            recording = id,
            duration_ms = started_at.elapsed().as_millis() as u64,
            "Stopping recording"
        );
        if let Err(e) = self.session.backend_mut().stop_recording() {
            debug!(recording = id, error = %e, "Stop request not accepted, waiting for finish");
        }
    }

    fn recording_finished(&mut self, id: u64, path: PathBuf, error: Option<BackendError>) {
        if self.recording.id() == Some(id) {
            info!(recording = id, "Recording ended by the hardware");
            self.recording = RecordingState::Idle;
            self.status.set_recording(false);
        }

        let Some(InFlightRecording { lease, pending }) = self.in_flight.remove(&id) else {
            warn!(recording = id, "Finish for unknown recording");
            return;
        };
        drop(lease);
        if self.in_flight.is_empty() {
            for waiter in self.settle_waiters.drain(..) {
                let _ = waiter.send(());
            }
        }

        if let Some(e) = error {
            let reason = SessionError::from(e);
            warn!(recording = id, %reason, path = %path.display(), "Recording failed");
            if let Some(pending) = pending {
                pending.resolve(None);
            }
            return;
        }

        let location = pending.as_ref().and_then(|pending| pending.location);
        debug!(recording = id, path = %path.display(), "Recording finalized");
        self.persistence.dispatch(move |persistence| {
            persistence.save_video(path, location, pending);
        });
    }

    /// Signal `waiter` once no recording is left unfinished
    fn notify_when_settled(&mut self, waiter: Sender<()>) {
        if self.in_flight.is_empty() {
            let _ = waiter.send(());
        } else {
            debug!(unfinished = self.in_flight.len(), "Waiting for recordings to finish");
            self.settle_waiters.push(waiter);
        }
    }

    fn set_flash(&mut self, mode: FlashMode) {
        let Some(device) = self.session.current_input() else {
            return;
        };
        if !device.supports_flash_mode(mode) {
            debug!(?mode, camera = %device.name(), "Flash mode not supported");
            return;
        }
        match device.lock_for_configuration() {
            Ok(mut settings) => settings.flash_mode = mode,
            Err(e) => warn!(error = %e, "Could not lock device for flash"),
        }
    }

    fn set_focus(&mut self, point: FocusPoint) {
        let Some(device) = self.session.current_input() else {
            return;
        };
        if !device.supports_focus_point() {
            debug!(camera = %device.name(), "Focus point not supported");
            return;
        }
        match device.lock_for_configuration() {
            Ok(mut settings) => settings.focus_point = Some(point),
            Err(e) => warn!(error = %e, "Could not lock device for focus"),
        }
    }

    fn zoom(&mut self, scale: f64) {
        if !self.config.zoom_allowed || !scale.is_finite() {
            return;
        }
        let Some(device) = self.session.current_input() else {
            return;
        };
        // Front camera zoom is disabled
        if self.devices.back.as_ref() != Some(device) {
            return;
        }

        let ceiling = device.max_zoom_factor().min(self.config.zoom_ceiling());
        let factor = self.zoom.target(scale, ceiling);
        match device.lock_for_configuration() {
            Ok(mut settings) => {
                settings.zoom_factor = factor;
                self.zoom.factor = factor;
            }
            Err(e) => warn!(error = %e, "Could not lock device for zoom"),
        }
    }

    fn snapshot(&self) -> SessionSnapshot {
        let configuration = self.session.configuration();
        let video = configuration.video_input();
        let settings = video.map(|device| device.settings());
        SessionSnapshot {
            running: self.session.is_running(),
            recording: self.recording.is_recording(),
            video_position: video.map(|device| device.position()),
            audio_attached: configuration.audio_input().is_some(),
            outputs: configuration.outputs.clone(),
            preset: configuration.preset,
            stabilization: configuration.stabilization,
            zoom_factor: settings.as_ref().map_or(1.0, |s| s.zoom_factor),
            flash_mode: settings.as_ref().map(|s| s.flash_mode),
            focus_point: settings.and_then(|s| s.focus_point),
            unfinished_recordings: self.in_flight.len(),
        }
    }
}
