// SPDX-License-Identifier: MPL-2.0

//! CameraMan - capture session coordinator
//!
//! This library owns a hardware capture session and exposes photo and
//! video capture as asynchronous operations that complete exactly once.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`session`]: The coordinator, its serialized queues and configuration transactions
//! - [`backends`]: Capture hardware abstraction (simulated and GStreamer)
//! - [`pipelines`]: Still decoding/encoding and scratch recording files
//! - [`storage`]: Asset persistence and the on-disk library
//! - [`permission`]: Camera and microphone authorization
//! - [`config`]: User configuration handling
//!
//! # Example
//!
//! ```no_run
//! use cameraman::backends::camera::{SimulatedBackend, SimulatedConfig};
//! use cameraman::pipelines::photo::EncodingQuality;
//! use cameraman::{CameraMan, LibraryStore};
//! use std::sync::Arc;
//!
//! let store = LibraryStore::open("/tmp/library", EncodingQuality::High).unwrap();
//! let backend = SimulatedBackend::new(SimulatedConfig::default());
//! let camera = CameraMan::builder(Box::new(backend), Arc::new(store))
//!     .build()
//!     .unwrap();
//!
//! camera.setup();
//! let photo = pollster::block_on(camera.take_photo(camera.preview_connection(), None));
//! println!("{:?}", photo);
//! ```

pub mod backends;
pub mod config;
pub mod constants;
pub mod errors;
pub mod permission;
pub mod pipelines;
pub mod session;
pub mod storage;

// Re-export commonly used types
pub use config::Config;
pub use constants::SessionPreset;
pub use errors::{SessionError, StoreError};
pub use permission::{AuthorizationStatus, PermissionOracle, StaticPermissions};
pub use session::{
    CameraMan, CameraManBuilder, CaptureTab, Completion, SessionEvent, SessionObserver,
    ShutterAction, ShutterController,
};
pub use storage::{AssetHandle, AssetStore, LibraryStore, Location};
