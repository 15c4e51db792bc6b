// SPDX-License-Identifier: MPL-2.0

//! Integration tests for asset persistence

use cameraman::errors::{StoreError, StoreResult};
use cameraman::pipelines::photo::EncodingQuality;
use cameraman::session::{CaptureKind, Completion, PendingCapture};
use cameraman::storage::{AssetKind, AssetRecord, Persistence};
use cameraman::{AssetHandle, AssetStore, LibraryStore, Location};
use chrono::{DateTime, Utc};
use image::{DynamicImage, RgbImage};
use pollster::block_on;
use std::path::Path;
use std::sync::Arc;

fn image() -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_pixel(32, 24, image::Rgb([200, 40, 90])))
}

#[test]
fn test_location_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let mut location = Location::new(-33.8688, 151.2093);
    location.altitude = Some(58.0);
    location.horizontal_accuracy = Some(5.0);

    let handle = {
        let store = LibraryStore::open(dir.path(), EncodingQuality::Medium).unwrap();
        store.commit_image(&image(), Utc::now(), Some(&location)).unwrap()
    };

    let store = LibraryStore::open(dir.path(), EncodingQuality::Medium).unwrap();
    let record = store.fetch(&handle).unwrap();
    assert_eq!(record.location, Some(location));
    assert_eq!(record.dimensions, Some((32, 24)));
}

#[test]
fn test_committed_photo_is_a_readable_jpeg() {
    let dir = tempfile::tempdir().unwrap();
    let store = LibraryStore::open(dir.path(), EncodingQuality::High).unwrap();
    let handle = store.commit_image(&image(), Utc::now(), None).unwrap();

    let record = store.fetch(&handle).unwrap();
    let path = store.asset_path(&record);
    assert_eq!(path.extension().unwrap(), "jpg");

    let decoded = image::open(&path).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (32, 24));
    assert_eq!(record.size_bytes, std::fs::metadata(&path).unwrap().len());
}

#[test]
fn test_unknown_handle_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let store = LibraryStore::open(dir.path(), EncodingQuality::High).unwrap();
    assert!(store.fetch(&AssetHandle::from_string("missing")).is_none());
}

struct RejectingStore;

impl AssetStore for RejectingStore {
    fn commit_image(
        &self,
        _image: &DynamicImage,
        _created_at: DateTime<Utc>,
        _location: Option<&Location>,
    ) -> StoreResult<AssetHandle> {
        Err(StoreError::Io("disk full".to_string()))
    }

    fn commit_video(
        &self,
        _file: &Path,
        _created_at: DateTime<Utc>,
        _location: Option<&Location>,
    ) -> StoreResult<AssetHandle> {
        Err(StoreError::Io("disk full".to_string()))
    }

    fn fetch(&self, _handle: &AssetHandle) -> Option<AssetRecord> {
        None
    }
}

#[test]
fn test_rejected_photo_resolves_none() {
    let mut persistence = Persistence::new(Arc::new(RejectingStore));
    let (resolver, completion) = Completion::pair();
    let pending = PendingCapture::new(CaptureKind::Photo, None, resolver);

    persistence.save_photo(image(), pending);
    assert_eq!(block_on(completion), None);
}

#[test]
fn test_rejected_video_keeps_scratch_file() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("clip.mov");
    std::fs::write(&file, b"movie").unwrap();

    let mut persistence = Persistence::new(Arc::new(RejectingStore));
    let (resolver, completion) = Completion::pair();
    let pending = PendingCapture::new(CaptureKind::Video, None, resolver);

    persistence.save_video(file.clone(), None, Some(pending));
    assert_eq!(block_on(completion), None);
    assert!(file.exists());
}

#[test]
fn test_video_commit_without_waiting_caller() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(LibraryStore::open(dir.path().join("library"), EncodingQuality::High).unwrap());
    let file = dir.path().join("clip.mov");
    std::fs::write(&file, b"movie").unwrap();

    let mut persistence = Persistence::new(store.clone());
    persistence.save_video(file.clone(), Some(Location::new(1.0, 2.0)), None);

    let records = store.list();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].kind, AssetKind::Video);
    assert_eq!(records[0].size_bytes, 5);
    assert!(!file.exists());
}
