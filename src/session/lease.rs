// SPDX-License-Identifier: GPL-3.0-only

//! Long-running work leases
//!
//! A recording may outlive the foreground UI. While a movie file is being
//! written the coordinator holds a [`RecordingLease`]; the platform keeps
//! the process alive until the lease is dropped. Dropping is the only way
//! to release it, so every exit path (finish, error, teardown) ends the
//! extended execution.

use std::sync::Arc;
use tracing::debug;

/// Platform hook for extended background execution
pub trait BackgroundTasks: Send + Sync {
    /// Whether the platform can keep work alive in the background
    fn is_supported(&self) -> bool;

    /// Begin a background task; `None` if the platform refused
    fn begin(&self, name: &str) -> Option<u64>;

    /// End a task started with [`begin`](BackgroundTasks::begin)
    fn end(&self, id: u64);
}

/// Platforms without background execution limits
#[derive(Debug, Default, Clone, Copy)]
pub struct NoBackgroundTasks;

impl BackgroundTasks for NoBackgroundTasks {
    fn is_supported(&self) -> bool {
        false
    }

    fn begin(&self, _name: &str) -> Option<u64> {
        None
    }

    fn end(&self, _id: u64) {}
}

/// Held while a recording is being written
#[must_use = "the lease is released as soon as it is dropped"]
pub struct RecordingLease {
    tasks: Arc<dyn BackgroundTasks>,
    id: u64,
}

impl RecordingLease {
    /// Best effort: `None` when unsupported or refused
    pub fn acquire(tasks: &Arc<dyn BackgroundTasks>, name: &str) -> Option<Self> {
        if !tasks.is_supported() {
            return None;
        }
        let id = tasks.begin(name)?;
        debug!(task = id, name, "Background task started");
        Some(Self {
            tasks: Arc::clone(tasks),
            id,
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Drop for RecordingLease {
    fn drop(&mut self) {
        debug!(task = self.id, "Background task ended");
        self.tasks.end(self.id);
    }
}

impl std::fmt::Debug for RecordingLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordingLease").field("id", &self.id).finish()
    }
}
