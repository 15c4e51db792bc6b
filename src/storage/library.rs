// SPDX-License-Identifier: MPL-2.0

//! Directory-backed asset library
//!
//! Layout:
//!
//! ```text
//! <root>/library.json      index of every committed asset
//! <root>/photos/<id>.jpg
//! <root>/videos/<id>.mov
//! ```
//!
//! Media files are written under a temporary name and renamed into place,
//! then the index is rewritten the same way. If the index cannot be
//! written the media file is rolled back, so the library never holds an
//! unindexed asset or an index entry without media.

use super::{AssetHandle, AssetKind, AssetRecord, AssetStore, Location};
use crate::constants::library::{INDEX_FILE, PHOTOS_DIR, VIDEOS_DIR};
use crate::errors::{StoreError, StoreResult};
use crate::pipelines::photo::{EncodingQuality, PhotoEncoder};
use chrono::{DateTime, Utc};
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

const INDEX_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct LibraryIndex {
    version: u32,
    assets: Vec<AssetRecord>,
}

impl Default for LibraryIndex {
    fn default() -> Self {
        Self {
            version: INDEX_VERSION,
            assets: Vec::new(),
        }
    }
}

/// Asset store keeping media files and a JSON index in one directory
pub struct LibraryStore {
    root: PathBuf,
    encoder: PhotoEncoder,
    index: Mutex<LibraryIndex>,
}

impl LibraryStore {
    /// Open (or create) the library at `root`
    pub fn open(root: impl Into<PathBuf>, quality: EncodingQuality) -> StoreResult<Self> {
        let root = root.into();
        std::fs::create_dir_all(root.join(PHOTOS_DIR))?;
        std::fs::create_dir_all(root.join(VIDEOS_DIR))?;

        let index_path = root.join(INDEX_FILE);
        let index = if index_path.exists() {
            let contents = std::fs::read_to_string(&index_path)?;
            let index: LibraryIndex = serde_json::from_str(&contents)?;
            if index.version != INDEX_VERSION {
                return Err(StoreError::Index(format!(
                    "unsupported index version {}",
                    index.version
                )));
            }
            index
        } else {
            LibraryIndex::default()
        };

        info!(
            root = %root.display(),
            assets = index.assets.len(),
            "Opened asset library"
        );

        Ok(Self {
            root,
            encoder: PhotoEncoder::new(quality),
            index: Mutex::new(index),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// All committed assets, oldest first
    pub fn list(&self) -> Vec<AssetRecord> {
        self.lock_index().assets.clone()
    }

    /// Absolute path of an asset's media file
    pub fn asset_path(&self, record: &AssetRecord) -> PathBuf {
        self.root.join(kind_dir(record.kind)).join(&record.file_name)
    }

    fn lock_index(&self) -> MutexGuard<'_, LibraryIndex> {
        self.index.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Append `record` and persist the index; the in-memory index is left
    /// untouched if persisting fails
    fn append(&self, index: &mut LibraryIndex, record: AssetRecord) -> StoreResult<()> {
        index.assets.push(record);
        if let Err(e) = self.write_index(index) {
            index.assets.pop();
            return Err(e);
        }
        Ok(())
    }

    fn write_index(&self, index: &LibraryIndex) -> StoreResult<()> {
        let json = serde_json::to_vec_pretty(index)?;
        let path = self.root.join(INDEX_FILE);
        write_atomically(&path, &json)
    }
}

impl AssetStore for LibraryStore {
    fn commit_image(
        &self,
        image: &DynamicImage,
        created_at: DateTime<Utc>,
        location: Option<&Location>,
    ) -> StoreResult<AssetHandle> {
        let encoded = self.encoder.encode(image)?;
        let handle = AssetHandle::generate();
        let file_name = format!("{}.{}", handle, encoded.extension());
        let path = self.root.join(PHOTOS_DIR).join(&file_name);

        let mut index = self.lock_index();
        write_atomically(&path, &encoded.data)?;

        let record = AssetRecord {
            handle: handle.clone(),
            kind: AssetKind::Photo,
            file_name,
            created_at,
            location: location.copied(),
            dimensions: Some((encoded.width, encoded.height)),
            size_bytes: encoded.data.len() as u64,
        };

        if let Err(e) = self.append(&mut index, record) {
            if let Err(cleanup) = std::fs::remove_file(&path) {
                warn!(path = %path.display(), error = %cleanup, "Rollback of photo failed");
            }
            return Err(e);
        }

        debug!(asset = %handle, path = %path.display(), "Photo stored");
        Ok(handle)
    }

    fn commit_video(
        &self,
        file: &Path,
        created_at: DateTime<Utc>,
        location: Option<&Location>,
    ) -> StoreResult<AssetHandle> {
        let metadata = std::fs::metadata(file)
            .map_err(|e| StoreError::InvalidMedia(format!("{}: {}", file.display(), e)))?;
        if !metadata.is_file() {
            return Err(StoreError::InvalidMedia(format!(
                "{} is not a file",
                file.display()
            )));
        }

        let handle = AssetHandle::generate();
        let extension = file
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or(crate::constants::recording::FILE_EXTENSION);
        let file_name = format!("{}.{}", handle, extension);
        let path = self.root.join(VIDEOS_DIR).join(&file_name);

        let mut index = self.lock_index();
        move_file(file, &path)?;

        let record = AssetRecord {
            handle: handle.clone(),
            kind: AssetKind::Video,
            file_name,
            created_at,
            location: location.copied(),
            dimensions: None,
            size_bytes: metadata.len(),
        };

        if let Err(e) = self.append(&mut index, record) {
            // Put the recording back where the caller left it
            if let Err(cleanup) = move_file(&path, file) {
                warn!(path = %path.display(), error = %cleanup, "Rollback of video failed");
            }
            return Err(e);
        }

        debug!(asset = %handle, path = %path.display(), "Video stored");
        Ok(handle)
    }

    fn fetch(&self, handle: &AssetHandle) -> Option<AssetRecord> {
        self.lock_index()
            .assets
            .iter()
            .find(|record| &record.handle == handle)
            .cloned()
    }
}

fn kind_dir(kind: AssetKind) -> &'static str {
    match kind {
        AssetKind::Photo => PHOTOS_DIR,
        AssetKind::Video => VIDEOS_DIR,
    }
}

/// Write `data` next to `path` and rename it into place
fn write_atomically(path: &Path, data: &[u8]) -> StoreResult<()> {
    let tmp = path.with_extension("partial");
    std::fs::write(&tmp, data)?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(e.into());
    }
    Ok(())
}

/// Rename, falling back to copy + delete across filesystems
fn move_file(from: &Path, to: &Path) -> StoreResult<()> {
    if std::fs::rename(from, to).is_ok() {
        return Ok(());
    }
    let tmp = to.with_extension("partial");
    std::fs::copy(from, &tmp)?;
    std::fs::rename(&tmp, to)?;
    if let Err(e) = std::fs::remove_file(from) {
        warn!(path = %from.display(), error = %e, "Could not remove moved source file");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    fn image() -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(16, 8, image::Rgb([10, 200, 30])))
    }

    #[test]
    fn test_index_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let handle = {
            let store = LibraryStore::open(dir.path(), EncodingQuality::Medium).unwrap();
            store.commit_image(&image(), Utc::now(), None).unwrap()
        };

        let reopened = LibraryStore::open(dir.path(), EncodingQuality::Medium).unwrap();
        let record = reopened.fetch(&handle).unwrap();
        assert_eq!(record.kind, AssetKind::Photo);
        assert_eq!(record.dimensions, Some((16, 8)));
        assert!(reopened.asset_path(&record).exists());
    }

    #[test]
    fn test_video_is_moved_into_library() {
        let dir = tempfile::tempdir().unwrap();
        let scratch = dir.path().join("scratch.mov");
        std::fs::write(&scratch, b"movie").unwrap();

        let store = LibraryStore::open(dir.path().join("lib"), EncodingQuality::High).unwrap();
        let handle = store.commit_video(&scratch, Utc::now(), None).unwrap();

        let record = store.fetch(&handle).unwrap();
        assert!(!scratch.exists());
        assert_eq!(record.size_bytes, 5);
        assert!(store.asset_path(&record).ends_with(format!("{}.mov", handle)));
    }

    #[test]
    fn test_missing_video_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = LibraryStore::open(dir.path(), EncodingQuality::High).unwrap();

        let result = store.commit_video(&dir.path().join("nope.mov"), Utc::now(), None);
        assert!(matches!(result, Err(StoreError::InvalidMedia(_))));
        assert!(store.list().is_empty());
    }

    #[test]
    fn test_corrupt_index_fails_open() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(INDEX_FILE), b"{ not json").unwrap();

        let result = LibraryStore::open(dir.path(), EncodingQuality::High);
        assert!(matches!(result, Err(StoreError::Index(_))));
    }
}
