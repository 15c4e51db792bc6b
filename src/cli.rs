// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands
//!
//! This module provides command-line functionality for:
//! - Listing capture devices
//! - Taking photos
//! - Recording videos
//! - Listing the asset library

use cameraman::backends::camera::{MediaType, create_backend};
use cameraman::session::{ChannelObserver, SessionEvent};
use cameraman::{
    AssetHandle, CameraMan, CaptureTab, Completion, Config, LibraryStore, ShutterAction,
    ShutterController, StaticPermissions,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;

type CliResult = Result<(), Box<dyn std::error::Error>>;

/// List all capture devices reported by the backend
pub fn list_devices(config: &Config) -> CliResult {
    let backend = create_backend(config.backend)?;
    let devices = backend.discover_devices();

    if devices.is_empty() {
        println!("No capture devices found.");
        return Ok(());
    }

    println!("Cameras:");
    for device in devices.iter().filter(|d| d.media == MediaType::Video) {
        let presets: Vec<_> = device.presets.iter().map(|p| p.display_name()).collect();
        println!(
            "  {} [{}] facing {}, flash: {}, max zoom {:.1}x, presets: {}",
            device.name,
            device.id,
            device.position,
            if device.has_flash { "yes" } else { "no" },
            device.max_zoom_factor,
            presets.join(", ")
        );
    }

    println!();
    println!("Microphones:");
    for device in devices.iter().filter(|d| d.media == MediaType::Audio) {
        let default = if device.is_default { " (default)" } else { "" };
        println!("  {} [{}]{}", device.name, device.id, default);
    }

    Ok(())
}

/// Take a photo and print where it was stored
pub fn take_photo(config: Config) -> CliResult {
    let (camera, store, mut events) = open_camera(config)?;
    wait_until_started(&mut events)?;

    println!("Capturing...");
    let photo = camera.take_photo(camera.preview_connection(), None);
    report_asset(&store, photo, "Photo")
}

/// Record for `duration` seconds (or until Ctrl+C) and print where the
/// video was stored
pub fn record_video(config: Config, duration: u64) -> CliResult {
    let (camera, store, mut events) = open_camera(config)?;
    wait_until_started(&mut events)?;

    let stop_flag = Arc::new(AtomicBool::new(false));
    let stop_flag_clone = stop_flag.clone();
    ctrlc::set_handler(move || {
        stop_flag_clone.store(true, Ordering::SeqCst);
    })?;

    let shutter = ShutterController::with_limit(camera, Duration::from_secs(duration));
    shutter.press(CaptureTab::Video, None);

    println!();
    println!("Recording... (press Ctrl+C to stop early)");

    let video = loop {
        if stop_flag.load(Ordering::SeqCst) {
            println!();
            println!("Stopping early...");
            match shutter.press(CaptureTab::Video, None) {
                ShutterAction::VideoFinished(video) => break video,
                _ => return Err("recording was not running".into()),
            }
        }
        if let Some(video) = shutter.enforce_limit(None) {
            break video;
        }

        // Print progress
        let elapsed = shutter.elapsed().unwrap_or_default().as_secs();
        print!("\rRecording: {:02}:{:02}", elapsed / 60, elapsed % 60);
        std::io::Write::flush(&mut std::io::stdout())?;

        std::thread::sleep(Duration::from_millis(100));
    };
    println!();

    report_asset(&store, video, "Video")
}

/// List every asset in the library
pub fn list_library(config: &Config) -> CliResult {
    let store = LibraryStore::open(config.library_dir(), config.photo_quality)?;
    let records = store.list();

    if records.is_empty() {
        println!("Library at {} is empty.", store.root().display());
        return Ok(());
    }

    println!("Library: {}", store.root().display());
    println!();
    for record in records {
        let location = record
            .location
            .map(|l| format!(" at {:.5},{:.5}", l.latitude, l.longitude))
            .unwrap_or_default();
        println!(
            "  {:?} {} ({} bytes, {}){}",
            record.kind,
            record.handle,
            record.size_bytes,
            record.created_at.format("%Y-%m-%d %H:%M:%S"),
            location
        );
    }

    Ok(())
}

fn open_camera(
    config: Config,
) -> Result<
    (
        Arc<CameraMan>,
        Arc<LibraryStore>,
        UnboundedReceiver<SessionEvent>,
    ),
    Box<dyn std::error::Error>,
> {
    let backend = create_backend(config.backend)?;
    let store = Arc::new(LibraryStore::open(config.library_dir(), config.photo_quality)?);
    let (observer, events) = ChannelObserver::new();

    let camera = CameraMan::builder(backend, store.clone())
        .observer(Arc::new(observer))
        // Desktop capture stacks have no permission prompt
        .permissions(Arc::new(StaticPermissions::granted()))
        .config(config)
        .build()?;
    camera.setup();

    Ok((Arc::new(camera), store, events))
}

fn wait_until_started(events: &mut UnboundedReceiver<SessionEvent>) -> CliResult {
    while let Some(event) = events.blocking_recv() {
        match event {
            SessionEvent::Started => return Ok(()),
            SessionEvent::ActiveInputChanged { has_flash } => {
                tracing::debug!(has_flash, "Active camera changed");
            }
            SessionEvent::Unavailable => return Err("camera access is not authorized".into()),
            SessionEvent::StartFailed(reason) => return Err(reason.into()),
        }
    }
    Err("capture session closed before starting".into())
}

fn report_asset(store: &LibraryStore, asset: Completion<AssetHandle>, what: &str) -> CliResult {
    use cameraman::AssetStore;

    let handle = pollster::block_on(asset).ok_or_else(|| format!("{} was not saved", what))?;
    let record = store
        .fetch(&handle)
        .ok_or_else(|| format!("{} {} missing from library", what, handle))?;
    println!("{} saved: {}", what, store.asset_path(&record).display());
    Ok(())
}
