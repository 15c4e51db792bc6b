// SPDX-License-Identifier: GPL-3.0-only

//! Capture session coordination
//!
//! - [`queue`]: serialized execution contexts owning their state
//! - [`configuration`]: transactional session layout and preset choice
//! - [`coordinator`]: [`CameraMan`], the public entry point
//! - [`completion`]: exactly-once results for queued work
//! - [`shutter`]: shutter button toggle on top of the coordinator

pub mod completion;
pub mod configuration;
pub mod coordinator;
pub mod lease;
pub mod observer;
pub mod queue;
pub mod shutter;
pub mod state;

pub use completion::{CaptureKind, Completion, PendingCapture, Resolver};
pub use configuration::{CaptureSession, Transaction};
pub use coordinator::{CameraMan, CameraManBuilder, SessionSnapshot};
pub use lease::{BackgroundTasks, NoBackgroundTasks, RecordingLease};
pub use observer::{ChannelObserver, NullObserver, SessionEvent, SessionObserver};
pub use queue::{QueueHandle, SerialQueue};
pub use shutter::{CaptureTab, ShutterAction, ShutterController};
pub use state::{RecordingState, SessionStatus, ZoomState};
