//! Pairing model negotiation and per-attempt session state

use super::types::*;
use crate::bus::DeviceId;
use log::debug;

/// Association model for LE Secure Connections pairing.
///
/// The capability matrix is symmetric, so it does not matter which side
/// initiated. Without MITM protection requested the result is always Just
/// Works.
pub fn resolve_model(
    local: IoCapability,
    remote: IoCapability,
    mitm_requested: bool,
) -> PairingModel {
    use IoCapability::*;

    if !mitm_requested {
        return PairingModel::JustWorks;
    }

    match (local, remote) {
        (NoInputNoOutput, _) | (_, NoInputNoOutput) => PairingModel::JustWorks,
        (DisplayYesNo | KeyboardDisplay, DisplayYesNo | KeyboardDisplay) => {
            PairingModel::NumericComparison
        }
        (KeyboardOnly, _) | (_, KeyboardOnly) => PairingModel::PasskeyEntry,
        (KeyboardDisplay, DisplayOnly) | (DisplayOnly, KeyboardDisplay) => {
            PairingModel::PasskeyEntry
        }
        (DisplayOnly | DisplayYesNo, DisplayOnly | DisplayYesNo) => PairingModel::JustWorks,
    }
}

/// Association model for legacy pairing, which has no numeric comparison:
/// the pairs that would compare numbers fall back to Just Works between two
/// yes/no displays and to passkey entry when a keyboard is present.
pub fn resolve_legacy_model(
    local: IoCapability,
    remote: IoCapability,
    mitm_requested: bool,
) -> PairingModel {
    use IoCapability::*;

    match resolve_model(local, remote, mitm_requested) {
        PairingModel::NumericComparison => match (local, remote) {
            (DisplayYesNo, DisplayYesNo) => PairingModel::JustWorks,
            _ => PairingModel::PasskeyEntry,
        },
        model => model,
    }
}

/// State of one pairing attempt with one remote device
#[derive(Debug, Clone)]
pub struct PairingSession {
    device: DeviceId,
    local: IoCapability,
    remote: Option<IoCapability>,
    model: Option<PairingModel>,
    state: SessionState,
}

impl PairingSession {
    pub fn new(device: DeviceId, local: IoCapability) -> Self {
        Self {
            device,
            local,
            remote: None,
            model: None,
            state: SessionState::Idle,
        }
    }

    pub fn device(&self) -> &DeviceId {
        &self.device
    }

    pub fn local_capability(&self) -> IoCapability {
        self.local
    }

    pub fn remote_capability(&self) -> Option<IoCapability> {
        self.remote
    }

    pub fn model(&self) -> Option<PairingModel> {
        self.model
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Records the remote capability and resolves the association model.
    pub fn exchange_capabilities(
        &mut self,
        remote: IoCapability,
        mitm_requested: bool,
        out_of_band: bool,
    ) -> PairingResult<PairingModel> {
        if self.state != SessionState::Idle {
            return Err(PairingError::InvalidState);
        }
        if out_of_band {
            return Err(PairingError::OutOfBandUnsupported);
        }

        let model = resolve_model(self.local, remote, mitm_requested);
        debug!(
            "Pairing with {}: {} / {} resolved to {:?}",
            self.device, self.local, remote, model
        );
        self.remote = Some(remote);
        self.model = Some(model);
        self.state = SessionState::CapabilityExchanged;
        Ok(model)
    }

    /// Enters the wait for an agent callback. The daemon negotiates on its
    /// own, so a callback may arrive without a prior capability exchange.
    pub fn begin(&mut self, kind: CallbackKind) -> PairingResult<()> {
        match self.state {
            SessionState::Idle | SessionState::CapabilityExchanged => {
                if self.model.is_none() {
                    self.model = kind.implied_model();
                }
                self.state = SessionState::Awaiting(kind);
                Ok(())
            }
            _ => Err(PairingError::InvalidState),
        }
    }

    pub fn complete(&mut self) -> PairingResult<()> {
        match self.state {
            SessionState::Awaiting(_) => {
                self.state = SessionState::Complete;
                Ok(())
            }
            _ => Err(PairingError::InvalidState),
        }
    }

    /// Moves any unfinished session to Cancelled. Returns false when the
    /// session had already ended.
    pub fn cancel(&mut self) -> bool {
        if self.state.is_terminal() {
            return false;
        }
        self.state = SessionState::Cancelled;
        true
    }
}
