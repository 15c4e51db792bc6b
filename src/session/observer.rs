// SPDX-License-Identifier: MPL-2.0

//! Session notifications
//!
//! The coordinator reports lifecycle changes through a [`SessionObserver`]
//! injected at construction. Callbacks arrive on the capture queue; use
//! [`ChannelObserver`] to hand them to whichever context drains the
//! receiving end.

use crate::errors::SessionError;
use tokio::sync::mpsc;
use tracing::debug;

/// Receiver of coordinator lifecycle notifications
///
/// Every method has an empty default so observers implement only what
/// they need.
pub trait SessionObserver: Send + Sync {
    /// Camera permission is missing; the session will not start
    fn session_unavailable(&self) {}

    /// The hardware session is running
    fn session_started(&self) {}

    /// A video input became active; `has_flash` tells whether it has a flash
    fn active_input_changed(&self, has_flash: bool) {
        let _ = has_flash;
    }

    /// The session could not be configured or started
    fn session_start_failed(&self, reason: &SessionError) {
        let _ = reason;
    }
}

/// Observer that ignores everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl SessionObserver for NullObserver {}

/// Owned form of an observer notification
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Unavailable,
    Started,
    ActiveInputChanged { has_flash: bool },
    StartFailed(SessionError),
}

/// Forwards notifications into a channel
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    sender: mpsc::UnboundedSender<SessionEvent>,
}

impl ChannelObserver {
    /// Observer plus the receiver its events are delivered to
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    fn send(&self, event: SessionEvent) {
        if self.sender.send(event).is_err() {
            debug!("Session event dropped, receiver closed");
        }
    }
}

impl SessionObserver for ChannelObserver {
    fn session_unavailable(&self) {
        self.send(SessionEvent::Unavailable);
    }

    fn session_started(&self) {
        self.send(SessionEvent::Started);
    }

    fn active_input_changed(&self, has_flash: bool) {
        self.send(SessionEvent::ActiveInputChanged { has_flash });
    }

    fn session_start_failed(&self, reason: &SessionError) {
        self.send(SessionEvent::StartFailed(reason.clone()));
    }
}
