//! Agent callbacks and the built-in agents

use super::decision::PendingDecision;
use super::types::{IoCapability, PairingError};
use crate::bus::DeviceId;
use crate::uuid::Uuid;
use log::debug;

/// Decisions the daemon delegates to a pairing agent.
///
/// Every callback that needs an answer returns a [`PendingDecision`]; an
/// agent that has no use for a callback keeps the default, which rejects.
pub trait Agent: Send + Sync {
    /// Capability announced when the agent is registered.
    fn capability(&self) -> IoCapability;

    /// Legacy PIN code for the device.
    fn request_pin_code(&self, _device: &DeviceId) -> PendingDecision<String> {
        PendingDecision::rejected()
    }

    fn display_pin_code(&self, _device: &DeviceId, _pin_code: &str) -> PendingDecision<()> {
        PendingDecision::rejected()
    }

    /// Passkey typed by the user, 0 to 999999.
    fn request_passkey(&self, _device: &DeviceId) -> PendingDecision<u32> {
        PendingDecision::rejected()
    }

    /// Shows `passkey`; `entered` counts the digits typed on the remote so far.
    fn display_passkey(&self, _device: &DeviceId, _passkey: u32, _entered: u16) {}

    /// Resolves once the user confirmed that `passkey` matches the remote.
    fn request_confirmation(&self, _device: &DeviceId, _passkey: u32) -> PendingDecision<()> {
        PendingDecision::rejected()
    }

    /// Just Works pairing initiated by the remote.
    fn request_authorization(&self, _device: &DeviceId) -> PendingDecision<()> {
        PendingDecision::rejected()
    }

    /// Connection to a profile by an already paired device.
    fn authorize_service(&self, _device: &DeviceId, _uuid: Uuid) -> PendingDecision<()> {
        PendingDecision::rejected()
    }

    /// The outstanding request failed before it was answered.
    fn cancel(&self) {}

    /// The daemon no longer uses this agent.
    fn release(&self) {}
}

/// Agent without input or output that accepts every request.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoIoAgent;

impl NoIoAgent {
    pub fn new() -> Self {
        Self
    }
}

impl Agent for NoIoAgent {
    fn capability(&self) -> IoCapability {
        IoCapability::NoInputNoOutput
    }

    fn request_authorization(&self, device: &DeviceId) -> PendingDecision<()> {
        debug!("Authorizing pairing with {}", device);
        PendingDecision::ready(())
    }

    fn authorize_service(&self, device: &DeviceId, uuid: Uuid) -> PendingDecision<()> {
        debug!("Authorizing {} for {}", device, uuid);
        PendingDecision::ready(())
    }
}

type ConfirmCallback = Box<dyn Fn(&DeviceId, u32) -> PendingDecision<bool> + Send + Sync>;
type CancelCallback = Box<dyn Fn() + Send + Sync>;

/// Agent that asks the user whether the displayed passkey matches.
///
/// `request_confirmation` receives the passkey and answers `true` when the
/// user confirms; `cancel` is told when the remote gives up mid-prompt.
pub struct YesNoAgent {
    request_confirmation: ConfirmCallback,
    cancel: CancelCallback,
}

impl YesNoAgent {
    pub fn new<C, X>(request_confirmation: C, cancel: X) -> Self
    where
        C: Fn(&DeviceId, u32) -> PendingDecision<bool> + Send + Sync + 'static,
        X: Fn() + Send + Sync + 'static,
    {
        Self {
            request_confirmation: Box::new(request_confirmation),
            cancel: Box::new(cancel),
        }
    }
}

impl Agent for YesNoAgent {
    fn capability(&self) -> IoCapability {
        IoCapability::DisplayYesNo
    }

    fn request_confirmation(&self, device: &DeviceId, passkey: u32) -> PendingDecision<()> {
        (self.request_confirmation)(device, passkey).map(|confirmed| {
            if confirmed {
                Ok(())
            } else {
                Err(PairingError::Rejected)
            }
        })
    }

    fn cancel(&self) {
        (self.cancel)();
    }
}

impl std::fmt::Debug for YesNoAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("YesNoAgent").finish_non_exhaustive()
    }
}
