//! Type definitions for the pairing agent
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Pairing failures. A session that fails ends up Cancelled; nothing here
/// takes the agent down.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum PairingError {
    #[error("Pairing rejected")]
    Rejected,

    #[error("Pairing cancelled")]
    Cancelled,

    #[error("Invalid state for operation")]
    InvalidState,

    #[error("No pairing session for device")]
    UnknownSession,

    #[error("Out-of-band pairing is not supported")]
    OutOfBandUnsupported,
}

/// Result type for pairing operations
pub type PairingResult<T> = Result<T, PairingError>;

/// Input/output capabilities of a pairing party
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IoCapability {
    /// Display only capability
    DisplayOnly,
    /// Display with yes/no capability
    DisplayYesNo,
    /// Keyboard only
    KeyboardOnly,
    /// No input, no output
    NoInputNoOutput,
    /// Both keyboard and display
    KeyboardDisplay,
}

impl IoCapability {
    /// Name the daemon's agent manager expects at registration.
    pub fn as_daemon_str(&self) -> &'static str {
        match self {
            IoCapability::DisplayOnly => "DisplayOnly",
            IoCapability::DisplayYesNo => "DisplayYesNo",
            IoCapability::KeyboardOnly => "KeyboardOnly",
            IoCapability::NoInputNoOutput => "NoInputNoOutput",
            IoCapability::KeyboardDisplay => "KeyboardDisplay",
        }
    }
}

impl FromStr for IoCapability {
    type Err = PairingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DisplayOnly" => Ok(IoCapability::DisplayOnly),
            "DisplayYesNo" => Ok(IoCapability::DisplayYesNo),
            "KeyboardOnly" => Ok(IoCapability::KeyboardOnly),
            "NoInputNoOutput" => Ok(IoCapability::NoInputNoOutput),
            "KeyboardDisplay" => Ok(IoCapability::KeyboardDisplay),
            _ => Err(PairingError::InvalidState),
        }
    }
}

impl fmt::Display for IoCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IoCapability::DisplayOnly => write!(f, "Display Only"),
            IoCapability::DisplayYesNo => write!(f, "Display Yes/No"),
            IoCapability::KeyboardOnly => write!(f, "Keyboard Only"),
            IoCapability::NoInputNoOutput => write!(f, "No Input No Output"),
            IoCapability::KeyboardDisplay => write!(f, "Keyboard Display"),
        }
    }
}

/// Association model selected for a pairing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairingModel {
    /// No user interaction, no MITM protection
    JustWorks,
    /// Both sides display a number and the user confirms it matches
    NumericComparison,
    /// One side displays a passkey that is typed on the other
    PasskeyEntry,
}

/// Agent callback a session may be waiting on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackKind {
    RequestPinCode,
    DisplayPinCode,
    RequestPasskey,
    DisplayPasskey,
    RequestConfirmation,
    RequestAuthorization,
    AuthorizeService,
}

impl CallbackKind {
    /// Model the daemon must have chosen to issue this callback, if the
    /// callback belongs to exactly one.
    pub fn implied_model(&self) -> Option<PairingModel> {
        match self {
            CallbackKind::RequestPasskey | CallbackKind::DisplayPasskey => {
                Some(PairingModel::PasskeyEntry)
            }
            CallbackKind::RequestConfirmation => Some(PairingModel::NumericComparison),
            CallbackKind::RequestAuthorization => Some(PairingModel::JustWorks),
            CallbackKind::RequestPinCode
            | CallbackKind::DisplayPinCode
            | CallbackKind::AuthorizeService => None,
        }
    }
}

impl fmt::Display for CallbackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Pairing session state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    CapabilityExchanged,
    Awaiting(CallbackKind),
    Complete,
    Cancelled,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Complete | SessionState::Cancelled)
    }
}
