// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for the capture session coordinator

use cameraman::backends::camera::{
    BackendError, DevicePosition, FlashMode, FocusPoint, OutputKind, SimulatedBackend,
    SimulatedConfig, SimulatedProbe, StabilizationMode,
};
use cameraman::session::{BackgroundTasks, ChannelObserver};
use cameraman::storage::AssetKind;
use cameraman::{
    AssetStore, AuthorizationStatus, CameraMan, CaptureTab, Config, LibraryStore, Location,
    SessionEvent, SessionPreset, ShutterAction, ShutterController, StaticPermissions,
};
use pollster::block_on;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::mpsc::error::TryRecvError;

struct Harness {
    camera: Arc<CameraMan>,
    probe: SimulatedProbe,
    store: Arc<LibraryStore>,
    events: UnboundedReceiver<SessionEvent>,
    scratch: PathBuf,
    _dir: TempDir,
}

struct Options {
    sim: SimulatedConfig,
    permissions: StaticPermissions,
    background: Option<Arc<dyn BackgroundTasks>>,
    config: Config,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            sim: SimulatedConfig::default(),
            permissions: StaticPermissions::granted(),
            background: None,
            config: Config::default(),
        }
    }
}

fn harness(options: Options) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let scratch = dir.path().join("scratch");
    let mut config = options.config;
    config.scratch_dir = Some(scratch.clone());

    let store = Arc::new(LibraryStore::open(dir.path().join("library"), config.photo_quality).unwrap());
    let backend = SimulatedBackend::new(options.sim);
    let probe = backend.probe();
    let (observer, events) = ChannelObserver::new();

    let mut builder = CameraMan::builder(Box::new(backend), store.clone())
        .observer(Arc::new(observer))
        .permissions(Arc::new(options.permissions))
        .config(config);
    if let Some(background) = options.background {
        builder = builder.background_tasks(background);
    }

    Harness {
        camera: Arc::new(builder.build().unwrap()),
        probe,
        store,
        events,
        scratch,
        _dir: dir,
    }
}

/// Harness whose session is already running
fn running(options: Options) -> Harness {
    let mut h = harness(options);
    h.camera.setup();
    h.wait_started();
    h
}

impl Harness {
    fn wait_started(&mut self) {
        loop {
            match self.events.blocking_recv() {
                Some(SessionEvent::Started) => return,
                Some(SessionEvent::ActiveInputChanged { .. }) => continue,
                other => panic!("Unexpected session event: {:?}", other),
            }
        }
    }

    /// Wait for queued work, including finish callbacks that re-enter the
    /// capture queue and the commits they hand to the saving queue
    fn settle(&self) {
        block_on(self.camera.flush());
        block_on(self.camera.flush());
    }

    fn assets(&self, kind: AssetKind) -> usize {
        self.store.list().iter().filter(|r| r.kind == kind).count()
    }

    fn scratch_files(&self) -> usize {
        std::fs::read_dir(&self.scratch)
            .map(|entries| entries.count())
            .unwrap_or(0)
    }
}

// ===== Session start =====

#[test]
fn test_authorized_setup_configures_full_session() {
    let mut h = harness(Options::default());
    h.camera.setup();

    assert_eq!(
        h.events.blocking_recv(),
        Some(SessionEvent::ActiveInputChanged { has_flash: true })
    );
    assert_eq!(h.events.blocking_recv(), Some(SessionEvent::Started));

    let snapshot = block_on(h.camera.snapshot()).unwrap();
    assert!(snapshot.running);
    assert!(!snapshot.recording);
    assert_eq!(snapshot.video_position, Some(DevicePosition::Back));
    assert!(snapshot.audio_attached);
    assert_eq!(
        snapshot.outputs,
        vec![OutputKind::StillImage, OutputKind::MovieFile]
    );
    assert_eq!(snapshot.preset, Some(SessionPreset::High));
    assert_eq!(snapshot.stabilization, StabilizationMode::Auto);
    assert_eq!(h.probe.start_count(), 1);
    assert!(h.camera.is_running());
}

#[test]
fn test_unauthorized_setup_only_reports_unavailable() {
    let mut h = harness(Options {
        permissions: StaticPermissions::camera(AuthorizationStatus::Denied),
        ..Default::default()
    });
    h.camera.setup();
    h.settle();

    assert_eq!(h.events.try_recv(), Ok(SessionEvent::Unavailable));
    assert_eq!(h.events.try_recv(), Err(TryRecvError::Empty));
    assert_eq!(h.probe.start_count(), 0);
    assert!(h.probe.applied_configurations().is_empty());
    assert!(!h.camera.is_running());
}

#[test]
fn test_request_access_starts_once_granted() {
    let mut h = harness(Options {
        permissions: StaticPermissions::camera(AuthorizationStatus::NotDetermined),
        ..Default::default()
    });
    h.camera.request_access();
    h.wait_started();
    assert_eq!(h.probe.start_count(), 1);
}

#[test]
fn test_request_access_refused_reports_unavailable() {
    let mut h = harness(Options {
        permissions: StaticPermissions::camera(AuthorizationStatus::NotDetermined)
            .with_request_outcome(AuthorizationStatus::Denied),
        ..Default::default()
    });
    h.camera.request_access();
    h.settle();

    assert_eq!(h.events.try_recv(), Ok(SessionEvent::Unavailable));
    assert_eq!(h.probe.start_count(), 0);
}

#[test]
fn test_microphone_denied_records_without_audio() {
    let h = running(Options {
        permissions: StaticPermissions::new(
            AuthorizationStatus::Authorized,
            AuthorizationStatus::Denied,
        ),
        ..Default::default()
    });
    let snapshot = block_on(h.camera.snapshot()).unwrap();
    assert!(!snapshot.audio_attached);
    assert!(snapshot.running);
}

#[test]
fn test_missing_back_camera_fails_start() {
    let mut sim = SimulatedConfig::default();
    sim.devices.retain(|d| d.position != DevicePosition::Back);
    let mut h = harness(Options {
        sim,
        ..Default::default()
    });
    h.camera.setup();

    match h.events.blocking_recv() {
        Some(SessionEvent::StartFailed(_)) => {}
        other => panic!("Expected start failure, got {:?}", other),
    }
    assert_eq!(h.probe.start_count(), 0);
}

#[test]
fn test_restart_after_stop_rebuilds_session() {
    let mut h = running(Options::default());
    h.camera.stop();
    h.settle();
    assert!(!h.probe.is_running());
    assert!(!h.camera.is_running());

    h.camera.start();
    h.wait_started();
    let snapshot = block_on(h.camera.snapshot()).unwrap();
    assert_eq!(snapshot.video_position, Some(DevicePosition::Back));
    assert_eq!(snapshot.outputs.len(), 2);
    assert_eq!(h.probe.start_count(), 2);
}

// ===== Photos =====

#[test]
fn test_photo_commits_once() {
    let h = running(Options::default());
    let location = Location::new(52.52, 13.405);

    let handle = block_on(h.camera.take_photo(h.camera.preview_connection(), Some(location)))
        .expect("photo should be committed");

    let record = h.store.fetch(&handle).unwrap();
    assert_eq!(record.kind, AssetKind::Photo);
    assert_eq!(record.location.map(|l| l.latitude), Some(52.52));
    assert_eq!(h.probe.stills_captured(), 1);
    assert_eq!(h.assets(AssetKind::Photo), 1);
}

#[test]
fn test_photo_capture_failure_resolves_none() {
    let h = running(Options::default());
    h.probe.set_fail_still_capture(true);

    let photo = block_on(h.camera.take_photo(h.camera.preview_connection(), None));
    assert_eq!(photo, None);
    assert_eq!(h.assets(AssetKind::Photo), 0);

    // The session keeps working after a failed capture
    h.probe.set_fail_still_capture(false);
    let photo = block_on(h.camera.take_photo(h.camera.preview_connection(), None));
    assert!(photo.is_some());
}

#[test]
fn test_undecodable_still_resolves_none() {
    let mut sim = SimulatedConfig::default();
    sim.corrupt_stills = true;
    let h = running(Options {
        sim,
        ..Default::default()
    });

    let photo = block_on(h.camera.take_photo(h.camera.preview_connection(), None));
    assert_eq!(photo, None);
    assert_eq!(h.probe.stills_captured(), 1);
    assert!(h.store.list().is_empty());
}

#[test]
fn test_photo_without_still_output_resolves_none() {
    let mut sim = SimulatedConfig::default();
    sim.supported_outputs = vec![OutputKind::MovieFile];
    let h = running(Options {
        sim,
        ..Default::default()
    });

    let photo = block_on(h.camera.take_photo(h.camera.preview_connection(), None));
    assert_eq!(photo, None);
    assert_eq!(h.probe.stills_captured(), 0);
}

#[test]
fn test_location_dropped_when_not_recorded() {
    let h = running(Options {
        config: Config {
            record_location: false,
            ..Default::default()
        },
        ..Default::default()
    });

    let handle = block_on(h.camera.take_photo(
        h.camera.preview_connection(),
        Some(Location::new(48.85, 2.35)),
    ))
    .unwrap();
    assert_eq!(h.store.fetch(&handle).unwrap().location, None);
}

#[test]
fn test_flash_mode_reaches_still_capture() {
    let h = running(Options::default());
    h.camera.flash(FlashMode::On);
    block_on(h.camera.take_photo(h.camera.preview_connection(), None)).unwrap();

    assert_eq!(h.probe.last_connection().unwrap().flash_mode, FlashMode::On);
    let snapshot = block_on(h.camera.snapshot()).unwrap();
    assert_eq!(snapshot.flash_mode, Some(FlashMode::On));
}

#[test]
fn test_focus_point_applied_to_back_camera() {
    let h = running(Options::default());
    h.camera.focus(FocusPoint::new(0.25, 0.75));

    let snapshot = block_on(h.camera.snapshot()).unwrap();
    assert_eq!(snapshot.focus_point, Some(FocusPoint { x: 0.25, y: 0.75 }));
}

// ===== Recording =====

#[test]
fn test_recording_commits_video_and_cleans_scratch() {
    let h = running(Options::default());

    assert_eq!(block_on(h.camera.begin_recording()), Some(true));
    assert!(h.camera.is_video_recording());
    assert!(h.probe.is_recording());

    let location = Location::new(35.68, 139.69);
    let handle = block_on(h.camera.end_recording(Some(location))).expect("video committed");

    let record = h.store.fetch(&handle).unwrap();
    assert_eq!(record.kind, AssetKind::Video);
    assert_eq!(record.location.map(|l| l.longitude), Some(139.69));
    assert!(h.store.asset_path(&record).exists());
    assert_eq!(h.scratch_files(), 0);
    assert!(!h.camera.is_video_recording());
}

#[test]
fn test_toggle_never_starts_twice() {
    let h = running(Options::default());

    assert_eq!(block_on(h.camera.begin_recording()), Some(true));
    assert_eq!(block_on(h.camera.begin_recording()), Some(false));
    assert_eq!(h.probe.recordings_started(), 1);

    block_on(h.camera.end_recording(None)).unwrap();
    assert_eq!(h.probe.recordings_started(), 1);
}

#[test]
fn test_start_video_recording_toggles() {
    let h = running(Options::default());

    h.camera.start_video_recording();
    h.camera.start_video_recording();
    h.settle();

    assert_eq!(h.probe.recordings_started(), 1);
    assert!(!h.probe.is_recording());
    assert!(!h.camera.is_video_recording());
    assert_eq!(h.assets(AssetKind::Video), 1);
}

#[test]
fn test_end_without_recording_resolves_none() {
    let h = running(Options::default());
    assert_eq!(block_on(h.camera.end_recording(None)), None);
}

#[test]
fn test_recording_failure_to_start_leaves_nothing() {
    let mut sim = SimulatedConfig::default();
    sim.fail_recording = true;
    let h = running(Options {
        sim,
        ..Default::default()
    });

    assert_eq!(block_on(h.camera.begin_recording()), Some(false));
    assert!(!h.camera.is_video_recording());
    assert_eq!(h.scratch_files(), 0);
}

#[test]
fn test_recording_without_movie_output_is_refused() {
    let mut sim = SimulatedConfig::default();
    sim.supported_outputs = vec![OutputKind::StillImage];
    let h = running(Options {
        sim,
        ..Default::default()
    });

    assert_eq!(block_on(h.camera.begin_recording()), Some(false));
    assert_eq!(h.probe.recordings_started(), 0);
}

#[test]
fn test_stop_right_after_start_waits_for_finalization() {
    let mut sim = SimulatedConfig::default();
    sim.manual_recording_finish = true;
    let h = running(Options {
        sim,
        ..Default::default()
    });

    let started = h.camera.begin_recording();
    let mut video = h.camera.end_recording(None);
    assert_eq!(block_on(started), Some(true));
    h.settle();

    // Stopped but the file is not finalized yet
    assert_eq!(video.try_take(), None);
    let snapshot = block_on(h.camera.snapshot()).unwrap();
    assert!(!snapshot.recording);
    assert_eq!(snapshot.unfinished_recordings, 1);

    // A second stop has nothing to end
    assert_eq!(block_on(h.camera.end_recording(None)), None);

    assert!(h.probe.finish_recording(None));
    let handle = block_on(video).expect("video committed after finalization");
    assert_eq!(h.store.fetch(&handle).unwrap().kind, AssetKind::Video);
    assert_eq!(h.assets(AssetKind::Video), 1);
    assert!(!h.probe.finish_recording(None));
}

#[test]
fn test_hardware_ended_recording_resets_state() {
    let mut sim = SimulatedConfig::default();
    sim.manual_recording_finish = true;
    let h = running(Options {
        sim,
        ..Default::default()
    });

    assert_eq!(block_on(h.camera.begin_recording()), Some(true));
    assert!(h.probe.finish_recording(Some(BackendError::Io("disk full".to_string()))));
    h.settle();

    assert!(!h.camera.is_video_recording());
    let snapshot = block_on(h.camera.snapshot()).unwrap();
    assert!(!snapshot.recording);
    assert_eq!(snapshot.unfinished_recordings, 0);
    assert_eq!(h.assets(AssetKind::Video), 0);

    // A new recording can start afterwards
    assert_eq!(block_on(h.camera.begin_recording()), Some(true));
    let video = h.camera.end_recording(None);
    h.settle();
    assert!(h.probe.finish_recording(None));
    assert!(block_on(video).is_some());
}

#[test]
fn test_failed_finalization_resolves_waiting_caller_with_none() {
    let mut sim = SimulatedConfig::default();
    sim.manual_recording_finish = true;
    let h = running(Options {
        sim,
        ..Default::default()
    });

    assert_eq!(block_on(h.camera.begin_recording()), Some(true));
    let video = h.camera.end_recording(None);
    h.settle();
    assert!(h.probe.finish_recording(Some(BackendError::Other("encoder died".to_string()))));

    assert_eq!(block_on(video), None);
    assert_eq!(h.assets(AssetKind::Video), 0);
}

#[test]
fn test_stopping_session_commits_running_recording() {
    let h = running(Options::default());
    assert_eq!(block_on(h.camera.begin_recording()), Some(true));

    h.camera.stop();
    h.settle();

    assert!(!h.probe.is_running());
    assert!(!h.camera.is_video_recording());
    assert_eq!(h.assets(AssetKind::Video), 1);
}

#[test]
fn test_dropping_coordinator_commits_unfinished_recording() {
    for _ in 0..20 {
        let h = running(Options::default());
        assert_eq!(block_on(h.camera.begin_recording()), Some(true));
        let video = h.camera.end_recording(None);

        let Harness {
            camera,
            store,
            scratch,
            _dir,
            ..
        } = h;
        drop(camera);

        assert!(block_on(video).is_some());
        let videos = store.list().iter().filter(|r| r.kind == AssetKind::Video).count();
        assert_eq!(videos, 1);
        let leftover = std::fs::read_dir(&scratch).map(|e| e.count()).unwrap_or(0);
        assert_eq!(leftover, 0);
    }
}

#[test]
fn test_dropping_coordinator_commits_recording_in_progress() {
    let h = running(Options::default());
    assert_eq!(block_on(h.camera.begin_recording()), Some(true));

    let Harness { camera, store, _dir, .. } = h;
    drop(camera);

    let videos = store.list().iter().filter(|r| r.kind == AssetKind::Video).count();
    assert_eq!(videos, 1);
}

#[derive(Default)]
struct Tracker {
    next: AtomicU64,
    active: Mutex<Vec<u64>>,
}

impl BackgroundTasks for Tracker {
    fn is_supported(&self) -> bool {
        true
    }

    fn begin(&self, _name: &str) -> Option<u64> {
        let id = self.next.fetch_add(1, Ordering::SeqCst) + 1;
        self.active.lock().unwrap().push(id);
        Some(id)
    }

    fn end(&self, id: u64) {
        self.active.lock().unwrap().retain(|&active| active != id);
    }
}

#[test]
fn test_background_lease_held_until_finalized() {
    let tracker = Arc::new(Tracker::default());
    let mut sim = SimulatedConfig::default();
    sim.manual_recording_finish = true;
    let h = running(Options {
        sim,
        background: Some(tracker.clone() as Arc<dyn BackgroundTasks>),
        ..Default::default()
    });

    assert_eq!(block_on(h.camera.begin_recording()), Some(true));
    assert_eq!(tracker.active.lock().unwrap().len(), 1);

    let video = h.camera.end_recording(None);
    h.settle();
    assert_eq!(tracker.active.lock().unwrap().len(), 1);

    assert!(h.probe.finish_recording(None));
    assert!(block_on(video).is_some());
    assert!(tracker.active.lock().unwrap().is_empty());
}

// ===== Camera switching =====

#[test]
fn test_switch_camera_toggles_facing() {
    let mut h = running(Options::default());

    assert_eq!(block_on(h.camera.switch_camera()), Some(DevicePosition::Front));
    let snapshot = block_on(h.camera.snapshot()).unwrap();
    assert_eq!(snapshot.video_position, Some(DevicePosition::Front));
    assert_eq!(snapshot.preset, Some(SessionPreset::Medium));
    assert!(snapshot.audio_attached);
    assert_eq!(
        h.events.try_recv(),
        Ok(SessionEvent::ActiveInputChanged { has_flash: false })
    );

    assert_eq!(block_on(h.camera.switch_camera()), Some(DevicePosition::Back));
    let snapshot = block_on(h.camera.snapshot()).unwrap();
    assert_eq!(snapshot.video_position, Some(DevicePosition::Back));
    assert_eq!(snapshot.preset, Some(SessionPreset::High));
}

#[test]
fn test_switch_during_recording_is_refused() {
    let h = running(Options::default());

    let started = h.camera.begin_recording();
    let switched = h.camera.switch_camera();
    assert_eq!(block_on(started), Some(true));
    assert_eq!(block_on(switched), None);

    let snapshot = block_on(h.camera.snapshot()).unwrap();
    assert_eq!(snapshot.video_position, Some(DevicePosition::Back));
    assert!(snapshot.recording);

    block_on(h.camera.end_recording(None)).unwrap();
}

#[test]
fn test_front_camera_recording_is_mirrored() {
    let h = running(Options::default());
    block_on(h.camera.switch_camera()).unwrap();

    assert_eq!(block_on(h.camera.begin_recording()), Some(true));
    assert!(h.probe.last_connection().unwrap().mirrored);
    block_on(h.camera.end_recording(None)).unwrap();
}

#[test]
fn test_front_camera_ignores_unsupported_flash() {
    let h = running(Options::default());
    block_on(h.camera.switch_camera()).unwrap();

    h.camera.flash(FlashMode::On);
    let snapshot = block_on(h.camera.snapshot()).unwrap();
    assert_eq!(snapshot.flash_mode, Some(FlashMode::Off));
}

// ===== Zoom =====

#[test]
fn test_zoom_is_relative_to_gesture_start_and_clamped() {
    let h = running(Options::default());
    let zoom_factor = || block_on(h.camera.snapshot()).unwrap().zoom_factor;

    h.camera.begin_zoom();
    h.camera.zoom(2.0);
    assert_eq!(zoom_factor(), 2.0);

    h.camera.begin_zoom();
    h.camera.zoom(2.0);
    assert_eq!(zoom_factor(), 4.0);

    // Configured ceiling (5x) is below the device limit (10x)
    h.camera.zoom(100.0);
    assert_eq!(zoom_factor(), 5.0);

    h.camera.begin_zoom();
    h.camera.zoom(0.01);
    assert_eq!(zoom_factor(), 1.0);

    h.camera.begin_zoom();
    h.camera.zoom(3.0);
    assert_eq!(zoom_factor(), 3.0);

    // NaN is ignored, non-positive scales clamp to the floor
    h.camera.zoom(f64::NAN);
    assert_eq!(zoom_factor(), 3.0);
    h.camera.zoom(-3.0);
    assert_eq!(zoom_factor(), 1.0);
    h.camera.begin_zoom();
    h.camera.zoom(2.0);
    h.camera.zoom(0.0);
    assert_eq!(zoom_factor(), 1.0);
}

#[test]
fn test_zoom_disabled_by_config() {
    let h = running(Options {
        config: Config {
            zoom_allowed: false,
            ..Default::default()
        },
        ..Default::default()
    });

    h.camera.begin_zoom();
    h.camera.zoom(3.0);
    assert_eq!(block_on(h.camera.snapshot()).unwrap().zoom_factor, 1.0);
}

#[test]
fn test_front_camera_does_not_zoom() {
    let h = running(Options::default());
    block_on(h.camera.switch_camera()).unwrap();

    h.camera.begin_zoom();
    h.camera.zoom(3.0);
    assert_eq!(block_on(h.camera.snapshot()).unwrap().zoom_factor, 1.0);
}

// ===== Shutter =====

#[test]
fn test_shutter_toggles_recording() {
    let h = running(Options::default());
    let shutter = ShutterController::new(h.camera.clone());

    assert!(matches!(
        shutter.press(CaptureTab::Video, None),
        ShutterAction::RecordingStarted
    ));
    assert!(shutter.is_recording());

    let video = match shutter.press(CaptureTab::Video, None) {
        ShutterAction::VideoFinished(video) => video,
        _ => panic!("second press should finish the recording"),
    };
    assert!(block_on(video).is_some());
    assert!(!shutter.is_recording());
    assert_eq!(h.probe.recordings_started(), 1);
}

#[test]
fn test_shutter_photo_tab_takes_photo() {
    let h = running(Options::default());
    let shutter = ShutterController::new(h.camera.clone());

    match shutter.press(CaptureTab::Photo, None) {
        ShutterAction::Photo(photo) => assert!(block_on(photo).is_some()),
        _ => panic!("photo tab should take a photo"),
    }
    assert!(!shutter.is_recording());
}

#[test]
fn test_shutter_enforces_limit_once() {
    let h = running(Options::default());
    let shutter = ShutterController::with_limit(h.camera.clone(), Duration::ZERO);

    shutter.press(CaptureTab::Video, None);
    let video = shutter.enforce_limit(None).expect("limit reached");
    assert!(shutter.enforce_limit(None).is_none());
    assert!(block_on(video).is_some());
    assert_eq!(shutter.remaining(), None);
}

#[test]
fn test_shutter_background_finishes_recording() {
    let h = running(Options::default());
    let shutter = ShutterController::new(h.camera.clone());
    assert_eq!(shutter.limit(), Duration::from_secs(15));

    assert!(shutter.did_enter_background(None).is_none());

    shutter.press(CaptureTab::Video, None);
    assert!(shutter.remaining().unwrap() <= Duration::from_secs(15));
    let video = shutter.did_enter_background(None).expect("recording finished");
    assert!(block_on(video).is_some());
}

#[test]
fn test_shutter_recovers_from_failed_start() {
    let mut sim = SimulatedConfig::default();
    sim.fail_recording = true;
    let h = running(Options {
        sim,
        ..Default::default()
    });
    let shutter = ShutterController::new(h.camera.clone());

    assert!(matches!(
        shutter.press(CaptureTab::Video, None),
        ShutterAction::RecordingStarted
    ));
    h.settle();

    assert!(!shutter.is_recording());
    assert_eq!(shutter.elapsed(), None);
    assert!(shutter.did_enter_background(None).is_none());
    // The next press tries to start again instead of stopping
    assert!(matches!(
        shutter.press(CaptureTab::Video, None),
        ShutterAction::RecordingStarted
    ));
}

#[test]
fn test_shutter_follows_hardware_ended_recording() {
    let mut sim = SimulatedConfig::default();
    sim.manual_recording_finish = true;
    let h = running(Options {
        sim,
        ..Default::default()
    });
    let shutter = ShutterController::new(h.camera.clone());

    shutter.press(CaptureTab::Video, None);
    h.settle();
    assert!(shutter.is_recording());

    assert!(h.probe.finish_recording(Some(BackendError::Io("disk full".to_string()))));
    h.settle();
    assert!(!shutter.is_recording());
    assert!(shutter.did_enter_background(None).is_none());

    assert!(matches!(
        shutter.press(CaptureTab::Video, None),
        ShutterAction::RecordingStarted
    ));
    h.settle();
    assert!(shutter.is_recording());

    let video = match shutter.press(CaptureTab::Video, None) {
        ShutterAction::VideoFinished(video) => video,
        _ => panic!("second press should finish the recording"),
    };
    h.settle();
    assert!(h.probe.finish_recording(None));
    assert!(block_on(video).is_some());
    assert_eq!(h.probe.recordings_started(), 2);
}

#[test]
fn test_shutter_follows_session_stop() {
    let h = running(Options::default());
    let shutter = ShutterController::new(h.camera.clone());

    shutter.press(CaptureTab::Video, None);
    h.settle();
    assert!(shutter.is_recording());

    h.camera.stop();
    h.settle();
    assert!(!shutter.is_recording());
    assert_eq!(shutter.remaining(), None);
    assert_eq!(h.assets(AssetKind::Video), 1);
}

// ===== Observer =====

#[tokio::test]
async fn test_observer_events_arrive_in_order() {
    let mut h = harness(Options::default());
    h.camera.setup();

    assert_eq!(
        h.events.recv().await,
        Some(SessionEvent::ActiveInputChanged { has_flash: true })
    );
    assert_eq!(h.events.recv().await, Some(SessionEvent::Started));

    assert_eq!(h.camera.switch_camera().await, Some(DevicePosition::Front));
    assert_eq!(
        h.events.recv().await,
        Some(SessionEvent::ActiveInputChanged { has_flash: false })
    );
}
