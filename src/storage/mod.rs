// SPDX-License-Identifier: MPL-2.0

//! Asset persistence
//!
//! Captured photos and finished recordings are committed to an
//! [`AssetStore`]. The [`Persistence`] adapter owns the store on the
//! dedicated saving queue and turns every store failure into a "no asset"
//! completion, so storage errors never reach the capture side.

pub mod library;

pub use library::LibraryStore;

use crate::errors::StoreResult;
use crate::session::completion::PendingCapture;
use chrono::{DateTime, Utc};
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Opaque identifier of a committed asset
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetHandle(String);

impl AssetHandle {
    /// A new random handle
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string().to_uppercase())
    }

    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Geographic position attached to an asset
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    /// Meters above sea level
    pub altitude: Option<f64>,
    /// Radius of uncertainty in meters
    pub horizontal_accuracy: Option<f64>,
    /// When the fix was taken
    pub timestamp: DateTime<Utc>,
}

impl Location {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            altitude: None,
            horizontal_accuracy: None,
            timestamp: Utc::now(),
        }
    }
}

/// Media type of a committed asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssetKind {
    Photo,
    Video,
}

/// Stored metadata of a committed asset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetRecord {
    pub handle: AssetHandle,
    pub kind: AssetKind,
    /// File name relative to the kind's directory
    pub file_name: String,
    pub created_at: DateTime<Utc>,
    pub location: Option<Location>,
    /// Pixel dimensions for photos
    pub dimensions: Option<(u32, u32)>,
    pub size_bytes: u64,
}

/// Durable asset storage
///
/// Each commit is a single transaction: it either stores the media and its
/// metadata and returns a handle, or leaves the store unchanged.
pub trait AssetStore: Send + Sync {
    /// Commit a still image
    fn commit_image(
        &self,
        image: &DynamicImage,
        created_at: DateTime<Utc>,
        location: Option<&Location>,
    ) -> StoreResult<AssetHandle>;

    /// Commit a finished movie file; the store takes ownership of the file
    fn commit_video(
        &self,
        file: &Path,
        created_at: DateTime<Utc>,
        location: Option<&Location>,
    ) -> StoreResult<AssetHandle>;

    /// Look up a committed asset
    fn fetch(&self, handle: &AssetHandle) -> Option<AssetRecord>;
}

/// Persistence adapter living on the saving queue
pub struct Persistence {
    store: Arc<dyn AssetStore>,
}

impl Persistence {
    pub fn new(store: Arc<dyn AssetStore>) -> Self {
        Self { store }
    }

    /// Commit a decoded photo and resolve the pending capture
    pub fn save_photo(&mut self, image: DynamicImage, pending: PendingCapture) {
        let result = self
            .store
            .commit_image(&image, Utc::now(), pending.location.as_ref());

        match result {
            Ok(handle) => {
                info!(asset = %handle, "Photo committed");
                pending.resolve(self.fetchable(handle));
            }
            Err(e) => {
                warn!(error = %e, "Photo commit failed");
                pending.resolve(None);
            }
        }
    }

    /// Commit a finished recording
    ///
    /// Recordings stopped without a caller waiting (toggle stop, hardware
    /// ending on its own) are still committed; `pending` is `None` then.
    pub fn save_video(
        &mut self,
        file: PathBuf,
        location: Option<Location>,
        pending: Option<PendingCapture>,
    ) {
        let result = self.store.commit_video(&file, Utc::now(), location.as_ref());

        let asset = match result {
            Ok(handle) => {
                info!(asset = %handle, "Video committed");
                self.fetchable(handle)
            }
            Err(e) => {
                warn!(path = %file.display(), error = %e, "Video commit failed, scratch file kept");
                None
            }
        };

        if let Some(pending) = pending {
            pending.resolve(asset);
        }
    }

    /// Hand out only handles the store can resolve
    fn fetchable(&self, handle: AssetHandle) -> Option<AssetHandle> {
        if self.store.fetch(&handle).is_some() {
            Some(handle)
        } else {
            warn!(asset = %handle, "Committed asset cannot be fetched");
            None
        }
    }
}
