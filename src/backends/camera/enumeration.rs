// SPDX-License-Identifier: GPL-3.0-only

//! Capture device enumeration
//!
//! Partitions the backend's devices into the front camera, the back camera
//! and the default microphone. A device that cannot be opened is treated
//! as absent; enumeration itself never fails.

use super::CaptureBackend;
use super::types::{CameraDevice, DeviceDescriptor, DevicePosition, MediaType};
use tracing::{debug, info, warn};

/// Opened inputs available to the session
#[derive(Debug, Clone, Default)]
pub struct DeviceSet {
    pub front: Option<CameraDevice>,
    pub back: Option<CameraDevice>,
    pub audio: Option<CameraDevice>,
}

impl DeviceSet {
    /// Discover and open devices on `backend`
    pub fn enumerate(backend: &dyn CaptureBackend) -> Self {
        let descriptors = backend.discover_devices();
        debug!(count = descriptors.len(), "Discovered capture devices");

        let mut set = DeviceSet::default();

        for descriptor in descriptors.iter().filter(|d| d.media == MediaType::Video) {
            let slot = match descriptor.position {
                DevicePosition::Front => &mut set.front,
                DevicePosition::Back => &mut set.back,
                DevicePosition::Unspecified => {
                    debug!(device = %descriptor.name, "Skipping camera without known facing");
                    continue;
                }
            };
            if slot.is_some() {
                debug!(device = %descriptor.name, position = %descriptor.position, "Position already taken");
                continue;
            }
            *slot = open(backend, descriptor);
        }

        let audio = descriptors
            .iter()
            .filter(|d| d.media == MediaType::Audio)
            .max_by_key(|d| d.is_default);
        set.audio = audio.and_then(|descriptor| open(backend, descriptor));

        info!(
            front = set.front.as_ref().map(|d| d.name()),
            back = set.back.as_ref().map(|d| d.name()),
            audio = set.audio.as_ref().map(|d| d.name()),
            "Capture devices ready"
        );

        set
    }

    /// The video input on the other side of `current`
    pub fn counterpart(&self, current: &CameraDevice) -> Option<&CameraDevice> {
        if self.back.as_ref() == Some(current) {
            self.front.as_ref()
        } else {
            self.back.as_ref()
        }
    }
}

fn open(backend: &dyn CaptureBackend, descriptor: &DeviceDescriptor) -> Option<CameraDevice> {
    match backend.open_device(descriptor) {
        Ok(device) => Some(device),
        Err(e) => {
            warn!(device = %descriptor.name, error = %e, "Device unavailable");
            None
        }
    }
}
