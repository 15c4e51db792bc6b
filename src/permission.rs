// SPDX-License-Identifier: MPL-2.0

//! Capture permission oracle
//!
//! The coordinator never prompts the user itself. It asks a caller-supplied
//! [`PermissionOracle`] whether camera and microphone access are granted.

use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// Authorization status for a capture device class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AuthorizationStatus {
    /// The user has not been asked yet
    #[default]
    NotDetermined,
    /// Access is blocked by policy
    Restricted,
    /// The user refused access
    Denied,
    /// Access granted
    Authorized,
}

impl AuthorizationStatus {
    pub fn is_authorized(&self) -> bool {
        matches!(self, AuthorizationStatus::Authorized)
    }
}

impl std::fmt::Display for AuthorizationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthorizationStatus::NotDetermined => write!(f, "not determined"),
            AuthorizationStatus::Restricted => write!(f, "restricted"),
            AuthorizationStatus::Denied => write!(f, "denied"),
            AuthorizationStatus::Authorized => write!(f, "authorized"),
        }
    }
}

/// Source of truth for capture permissions
pub trait PermissionOracle: Send + Sync {
    /// Current camera authorization
    fn camera_authorization_status(&self) -> AuthorizationStatus;

    /// Current microphone authorization
    fn microphone_authorization_status(&self) -> AuthorizationStatus;

    /// Ask for camera (and, if `with_microphone`, microphone) access.
    ///
    /// `completion` is invoked once the user has answered, with the
    /// resulting camera status.
    fn request_camera_access(
        &self,
        with_microphone: bool,
        completion: Box<dyn FnOnce(AuthorizationStatus) + Send>,
    );
}

/// Oracle with fixed answers
///
/// Desktop capture stacks have no permission prompt, so the CLI grants
/// everything. Tests use it to script denied and restricted sessions.
#[derive(Debug)]
pub struct StaticPermissions {
    camera: Mutex<AuthorizationStatus>,
    microphone: Mutex<AuthorizationStatus>,
    /// Status a pending request resolves to
    grant_on_request: AuthorizationStatus,
}

impl StaticPermissions {
    pub fn new(camera: AuthorizationStatus, microphone: AuthorizationStatus) -> Self {
        Self {
            camera: Mutex::new(camera),
            microphone: Mutex::new(microphone),
            grant_on_request: AuthorizationStatus::Authorized,
        }
    }

    /// Everything authorized
    pub fn granted() -> Self {
        Self::new(AuthorizationStatus::Authorized, AuthorizationStatus::Authorized)
    }

    /// Camera access in the given state, microphone authorized
    pub fn camera(status: AuthorizationStatus) -> Self {
        Self::new(status, AuthorizationStatus::Authorized)
    }

    /// Status that `request_camera_access` resolves to
    pub fn with_request_outcome(mut self, outcome: AuthorizationStatus) -> Self {
        self.grant_on_request = outcome;
        self
    }
}

impl PermissionOracle for StaticPermissions {
    fn camera_authorization_status(&self) -> AuthorizationStatus {
        *self.camera.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn microphone_authorization_status(&self) -> AuthorizationStatus {
        *self.microphone.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn request_camera_access(
        &self,
        with_microphone: bool,
        completion: Box<dyn FnOnce(AuthorizationStatus) + Send>,
    ) {
        let outcome = self.grant_on_request;
        {
            let mut camera = self.camera.lock().unwrap_or_else(|e| e.into_inner());
            if *camera == AuthorizationStatus::NotDetermined {
                *camera = outcome;
            }
        }
        if with_microphone {
            let mut microphone = self.microphone.lock().unwrap_or_else(|e| e.into_inner());
            if *microphone == AuthorizationStatus::NotDetermined {
                *microphone = outcome;
            }
        }
        completion(self.camera_authorization_status());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn test_request_only_resolves_undetermined() {
        let oracle = StaticPermissions::new(
            AuthorizationStatus::NotDetermined,
            AuthorizationStatus::Denied,
        );
        let called = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&called);

        oracle.request_camera_access(
            true,
            Box::new(move |status| {
                assert_eq!(status, AuthorizationStatus::Authorized);
                flag.store(true, Ordering::SeqCst);
            }),
        );

        assert!(called.load(Ordering::SeqCst));
        assert!(oracle.camera_authorization_status().is_authorized());
        // An explicit denial is not overturned by a request
        assert_eq!(
            oracle.microphone_authorization_status(),
            AuthorizationStatus::Denied
        );
    }
}
