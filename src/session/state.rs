// SPDX-License-Identifier: GPL-3.0-only

//! Coordinator state owned by the capture queue

use crate::constants::zoom::MIN_FACTOR;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

/// Movie recording lifecycle
///
/// Transitions only happen on the capture queue.
#[derive(Debug, Clone, Default)]
pub enum RecordingState {
    #[default]
    Idle,
    Recording {
        /// Identifies the recording across the asynchronous finish
        id: u64,
        started_at: Instant,
        file_path: PathBuf,
    },
}

impl RecordingState {
    pub fn is_recording(&self) -> bool {
        matches!(self, RecordingState::Recording { .. })
    }

    /// Id of the active recording
    pub fn id(&self) -> Option<u64> {
        match self {
            RecordingState::Recording { id, .. } => Some(*id),
            RecordingState::Idle => None,
        }
    }

    /// Time since the recording started
    pub fn elapsed(&self) -> Option<std::time::Duration> {
        match self {
            RecordingState::Recording { started_at, .. } => Some(started_at.elapsed()),
            RecordingState::Idle => None,
        }
    }

    /// Leave the recording state, returning what was active
    pub fn take(&mut self) -> RecordingState {
        std::mem::replace(self, RecordingState::Idle)
    }
}

/// Pinch zoom bookkeeping
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoomState {
    /// Factor currently applied to the device
    pub factor: f64,
    /// Factor captured when the gesture began
    pub starting_factor: f64,
}

impl Default for ZoomState {
    fn default() -> Self {
        Self::at(MIN_FACTOR)
    }
}

impl ZoomState {
    pub fn at(factor: f64) -> Self {
        Self {
            factor,
            starting_factor: factor,
        }
    }

    /// Start a gesture from the current factor
    pub fn begin(&mut self) {
        self.starting_factor = self.factor;
    }

    /// Factor for a gesture `scale`, clamped to `[1.0, ceiling]`
    ///
    /// A ceiling below 1.0 is treated as 1.0.
    pub fn target(&self, scale: f64, ceiling: f64) -> f64 {
        let ceiling = ceiling.max(MIN_FACTOR);
        (self.starting_factor * scale).clamp(MIN_FACTOR, ceiling)
    }
}

/// Read-anywhere mirror of coordinator state
///
/// Written on the capture queue. Reads from other threads are
/// eventually consistent and meant for UI mirroring only.
#[derive(Debug, Default)]
pub struct SessionStatus {
    recording: AtomicBool,
    running: AtomicBool,
}

impl SessionStatus {
    pub fn is_recording(&self) -> bool {
        self.recording.load(Ordering::Acquire)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub(crate) fn set_recording(&self, recording: bool) {
        self.recording.store(recording, Ordering::Release);
    }

    pub(crate) fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::Release);
    }
}
