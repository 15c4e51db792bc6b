// SPDX-License-Identifier: GPL-3.0-only

//! Transactional session configuration
//!
//! Changes to the session layout are staged in a [`Transaction`] and
//! reach the backend in a single `apply_configuration` call on commit.
//! A transaction that is dropped without committing leaves the running
//! session untouched.

use crate::backends::camera::{
    BackendError, BackendResult, CameraDevice, CaptureBackend, OutputKind, SessionConfiguration,
    StabilizationMode,
};
use crate::constants::SessionPreset;
use tracing::{debug, info};

/// The hardware session plus its committed layout
pub struct CaptureSession {
    backend: Box<dyn CaptureBackend>,
    committed: SessionConfiguration,
    /// Preference order, best first
    presets: Vec<SessionPreset>,
}

impl CaptureSession {
    pub fn new(backend: Box<dyn CaptureBackend>, presets: Vec<SessionPreset>) -> Self {
        let presets = if presets.is_empty() {
            SessionPreset::ALL.to_vec()
        } else {
            presets
        };
        Self {
            backend,
            committed: SessionConfiguration::default(),
            presets,
        }
    }

    pub fn backend(&self) -> &dyn CaptureBackend {
        self.backend.as_ref()
    }

    pub fn backend_mut(&mut self) -> &mut dyn CaptureBackend {
        self.backend.as_mut()
    }

    /// Layout last committed to the hardware
    pub fn configuration(&self) -> &SessionConfiguration {
        &self.committed
    }

    /// Active video input
    pub fn current_input(&self) -> Option<&CameraDevice> {
        self.committed.video_input()
    }

    pub fn has_output(&self, output: OutputKind) -> bool {
        self.committed.has_output(output)
    }

    /// First preset in preference order that both `device` and the
    /// session support
    pub fn best_preset(&self, device: &CameraDevice) -> Option<SessionPreset> {
        self.presets
            .iter()
            .copied()
            .find(|&preset| device.supports_preset(preset) && self.backend.can_set_preset(preset))
    }

    /// Stage changes against the committed layout
    pub fn begin_configuration(&mut self) -> Transaction<'_> {
        let draft = self.committed.clone();
        Transaction {
            session: self,
            draft,
        }
    }

    /// Run `changes` in a transaction and commit it
    ///
    /// Nothing is applied if `changes` or the commit fails.
    pub fn configure<R>(
        &mut self,
        changes: impl FnOnce(&mut Transaction<'_>) -> BackendResult<R>,
    ) -> BackendResult<R> {
        let mut transaction = self.begin_configuration();
        let result = changes(&mut transaction)?;
        transaction.commit()?;
        Ok(result)
    }

    pub fn start_running(&mut self) -> BackendResult<()> {
        self.backend.start_running()
    }

    pub fn stop_running(&mut self) {
        self.backend.stop_running();
    }

    pub fn is_running(&self) -> bool {
        self.backend.is_running()
    }
}

/// Uncommitted session layout change
pub struct Transaction<'a> {
    session: &'a mut CaptureSession,
    draft: SessionConfiguration,
}

impl Transaction<'_> {
    /// Layout as it would be committed
    pub fn draft(&self) -> &SessionConfiguration {
        &self.draft
    }

    /// Detach every input and output
    pub fn clear(&mut self) {
        self.draft = SessionConfiguration::default();
    }

    pub fn can_add_input(&self, device: &CameraDevice) -> bool {
        if self.draft.inputs.contains(device) {
            return false;
        }
        let slot_taken = if device.is_video() {
            self.draft.video_input().is_some()
        } else {
            self.draft.audio_input().is_some()
        };
        !slot_taken && self.session.backend.can_add_input(&self.draft, device)
    }

    /// Attach `device`; video inputs also select the best preset for it
    pub fn add_input(&mut self, device: &CameraDevice) -> BackendResult<()> {
        if !self.can_add_input(device) {
            return Err(BackendError::ConfigurationRejected(format!(
                "cannot add input {}",
                device.name()
            )));
        }

        if device.is_video() {
            let preset = self.session.best_preset(device).ok_or_else(|| {
                BackendError::Unsupported(format!("no common preset for {}", device.name()))
            })?;
            debug!(device = %device.name(), %preset, "Selected session preset");
            self.draft.preset = Some(preset);
        }

        self.draft.inputs.push(device.clone());
        Ok(())
    }

    /// Detach `device`; returns false if it was not attached
    pub fn remove_input(&mut self, device: &CameraDevice) -> bool {
        let before = self.draft.inputs.len();
        self.draft.inputs.retain(|input| input != device);
        self.draft.inputs.len() != before
    }

    pub fn can_add_output(&self, output: OutputKind) -> bool {
        !self.draft.has_output(output) && self.session.backend.can_add_output(&self.draft, output)
    }

    pub fn add_output(&mut self, output: OutputKind) -> BackendResult<()> {
        if !self.can_add_output(output) {
            return Err(BackendError::Unsupported(format!("{:?} output", output)));
        }
        self.draft.outputs.push(output);
        Ok(())
    }

    /// Stabilization requires backend support and a movie output
    pub fn set_stabilization(&mut self, mode: StabilizationMode) -> BackendResult<()> {
        if mode == StabilizationMode::Auto
            && (!self.session.backend.supports_video_stabilization()
                || !self.draft.has_output(OutputKind::MovieFile))
        {
            return Err(BackendError::Unsupported("video stabilization".to_string()));
        }
        self.draft.stabilization = mode;
        Ok(())
    }

    /// Apply the staged layout to the hardware in one step
    pub fn commit(self) -> BackendResult<()> {
        let Transaction { session, draft } = self;
        draft.validate()?;
        session.backend.apply_configuration(&draft)?;

        info!(
            video = draft.video_input().map(|d| d.name()),
            audio = draft.audio_input().map(|d| d.name()),
            outputs = ?draft.outputs,
            preset = ?draft.preset,
            "Session configuration committed"
        );
        session.committed = draft;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::{DeviceSet, SimulatedBackend, SimulatedConfig, SimulatedProbe};

    fn session(config: SimulatedConfig) -> (CaptureSession, DeviceSet, SimulatedProbe) {
        let backend = SimulatedBackend::new(config);
        let probe = backend.probe();
        let devices = DeviceSet::enumerate(&backend);
        (
            CaptureSession::new(Box::new(backend), SessionPreset::ALL.to_vec()),
            devices,
            probe,
        )
    }

    #[test]
    fn test_dropped_transaction_applies_nothing() {
        let (mut session, devices, probe) = session(SimulatedConfig::default());
        {
            let mut tx = session.begin_configuration();
            tx.add_input(devices.back.as_ref().unwrap()).unwrap();
        }
        assert!(session.configuration().inputs.is_empty());
        assert!(probe.applied_configurations().is_empty());
    }

    #[test]
    fn test_commit_is_a_single_apply() {
        let (mut session, devices, probe) = session(SimulatedConfig::default());
        session
            .configure(|tx| {
                tx.add_input(devices.back.as_ref().unwrap())?;
                tx.add_input(devices.audio.as_ref().unwrap())?;
                tx.add_output(OutputKind::StillImage)?;
                tx.add_output(OutputKind::MovieFile)
            })
            .unwrap();

        let applied = probe.applied_configurations();
        assert_eq!(applied.len(), 1);
        assert_eq!(applied[0].inputs.len(), 2);
        assert_eq!(applied[0].preset, Some(SessionPreset::High));
    }

    #[test]
    fn test_second_video_input_is_refused() {
        let (mut session, devices, _) = session(SimulatedConfig::default());
        let mut tx = session.begin_configuration();
        tx.add_input(devices.back.as_ref().unwrap()).unwrap();

        assert!(!tx.can_add_input(devices.front.as_ref().unwrap()));
        assert!(tx.add_input(devices.front.as_ref().unwrap()).is_err());
    }

    #[test]
    fn test_swap_reapplies_best_preset() {
        let (mut session, devices, _) = session(SimulatedConfig::default());
        let back = devices.back.clone().unwrap();
        let front = devices.front.clone().unwrap();

        session.configure(|tx| tx.add_input(&back)).unwrap();
        assert_eq!(session.configuration().preset, Some(SessionPreset::High));

        session
            .configure(|tx| {
                tx.remove_input(&back);
                tx.add_input(&front)
            })
            .unwrap();
        assert_eq!(session.current_input(), Some(&front));
        assert_eq!(session.configuration().preset, Some(SessionPreset::Medium));
    }

    #[test]
    fn test_preset_respects_session_support() {
        let mut config = SimulatedConfig::default();
        config.session_presets = vec![SessionPreset::Low];
        let (session, devices, _) = session(config);

        assert_eq!(
            session.best_preset(devices.back.as_ref().unwrap()),
            Some(SessionPreset::Low)
        );
    }

    #[test]
    fn test_failed_change_keeps_committed_layout() {
        let (mut session, devices, probe) = session(SimulatedConfig::default());
        let back = devices.back.clone().unwrap();
        session.configure(|tx| tx.add_input(&back)).unwrap();

        let result = session.configure(|tx| {
            tx.add_output(OutputKind::StillImage)?;
            tx.add_output(OutputKind::StillImage)
        });
        assert!(result.is_err());
        assert!(session.configuration().outputs.is_empty());
        assert_eq!(probe.applied_configurations().len(), 1);
    }

    #[test]
    fn test_stabilization_needs_movie_output() {
        let (mut session, _, _) = session(SimulatedConfig::default());
        let mut tx = session.begin_configuration();
        assert!(tx.set_stabilization(StabilizationMode::Auto).is_err());

        tx.add_output(OutputKind::MovieFile).unwrap();
        tx.set_stabilization(StabilizationMode::Auto).unwrap();
        assert_eq!(tx.draft().stabilization, StabilizationMode::Auto);
    }
}
