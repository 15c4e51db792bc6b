// SPDX-License-Identifier: GPL-3.0-only

//! Shutter button behavior
//!
//! On the photo tab a press takes a picture. On the video tab presses
//! alternate between starting and finishing a recording. A recording is
//! also finished when the app moves to the background or when it reaches
//! the duration limit.

use super::completion::Completion;
use super::coordinator::CameraMan;
use crate::storage::{AssetHandle, Location};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Capture mode selected in the UI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaptureTab {
    #[default]
    Photo,
    Video,
}

/// Outcome of a shutter press
#[derive(Debug)]
pub enum ShutterAction {
    /// A photo is being captured
    Photo(Completion<AssetHandle>),
    /// A recording was requested
    RecordingStarted,
    /// The recording is finishing; resolves with the committed video
    VideoFinished(Completion<AssetHandle>),
}

/// Recording started from the shutter
struct ShutterRecording {
    started: Instant,
    /// Outcome of the start request until it has been observed
    begun: Completion<bool>,
    confirmed: bool,
}

impl ShutterRecording {
    /// Whether the coordinator still has this recording running
    fn is_live(&mut self, camera: &CameraMan) -> bool {
        if !self.confirmed {
            match self.begun.try_take() {
                None => return true,
                Some(Some(true)) => self.confirmed = true,
                Some(_) => return false,
            }
        }
        camera.is_video_recording()
    }
}

/// Drives a [`CameraMan`] from shutter presses
pub struct ShutterController {
    camera: Arc<CameraMan>,
    limit: Duration,
    recording: Mutex<Option<ShutterRecording>>,
}

impl ShutterController {
    /// Recordings are limited to the camera's configured maximum duration
    pub fn new(camera: Arc<CameraMan>) -> Self {
        let limit = camera.config().max_recording_duration();
        Self::with_limit(camera, limit)
    }

    pub fn with_limit(camera: Arc<CameraMan>, limit: Duration) -> Self {
        Self {
            camera,
            limit,
            recording: Mutex::new(None),
        }
    }

    pub fn camera(&self) -> &Arc<CameraMan> {
        &self.camera
    }

    pub fn limit(&self) -> Duration {
        self.limit
    }

    /// Lock the recording slot, clearing it if the recording is gone
    fn current(&self) -> MutexGuard<'_, Option<ShutterRecording>> {
        let mut slot = self.recording.lock().unwrap_or_else(|e| e.into_inner());
        if slot.as_mut().is_some_and(|rec| !rec.is_live(&self.camera)) {
            debug!("Shutter recording ended outside the shutter");
            *slot = None;
        }
        slot
    }

    pub fn press(&self, tab: CaptureTab, location: Option<Location>) -> ShutterAction {
        match tab {
            CaptureTab::Photo => {
                let preview = self.camera.preview_connection();
                ShutterAction::Photo(self.camera.take_photo(preview, location))
            }
            CaptureTab::Video => {
                let mut slot = self.current();
                match slot.take() {
                    Some(rec) => {
                        info!(
                            elapsed_ms = rec.started.elapsed().as_millis() as u64,
                            "Shutter finishing recording"
                        );
                        ShutterAction::VideoFinished(self.camera.end_recording(location))
                    }
                    None => {
                        debug!("Shutter starting recording");
                        *slot = Some(ShutterRecording {
                            started: Instant::now(),
                            begun: self.camera.begin_recording(),
                            confirmed: false,
                        });
                        ShutterAction::RecordingStarted
                    }
                }
            }
        }
    }

    /// Whether the shutter is in its recording phase
    pub fn is_recording(&self) -> bool {
        self.current().is_some()
    }

    pub fn elapsed(&self) -> Option<Duration> {
        self.current().as_ref().map(|rec| rec.started.elapsed())
    }

    /// Time left before the limit stops the recording
    pub fn remaining(&self) -> Option<Duration> {
        self.elapsed().map(|elapsed| self.limit.saturating_sub(elapsed))
    }

    /// Finish a running recording when the app is backgrounded
    pub fn did_enter_background(
        &self,
        location: Option<Location>,
    ) -> Option<Completion<AssetHandle>> {
        let completion = self.finish(location)?;
        info!("Entered background, recording finished");
        Some(completion)
    }

    /// Finish the recording once it reached the duration limit
    pub fn enforce_limit(&self, location: Option<Location>) -> Option<Completion<AssetHandle>> {
        let reached = self.elapsed().is_some_and(|elapsed| elapsed >= self.limit);
        if !reached {
            return None;
        }
        let completion = self.finish(location)?;
        info!(limit_secs = self.limit.as_secs(), "Recording limit reached");
        Some(completion)
    }

    fn finish(&self, location: Option<Location>) -> Option<Completion<AssetHandle>> {
        self.current().take()?;
        Some(self.camera.end_recording(location))
    }
}
