//! Error types for the rustyperiph library
//!
//! Structural misuse of the attribute tree is a [`ConfigurationError`] and is
//! reported to the caller that mutated the tree. Per-request failures are
//! [`AccessError`]s and travel back to the remote device as daemon errors.

use crate::agent::PairingError;
use crate::flags::{AttributeFlags, AttributeKind};
use crate::uuid::Uuid;
use thiserror::Error;

/// Structural misuse of the attribute tree or its registration
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("{0} is reserved and synthesized by the daemon")]
    ReservedUuid(Uuid),

    #[error("Application is already registered")]
    AlreadyRegistered,

    #[error("Application is not registered")]
    NotRegistered,

    #[error("Registered applications cannot be modified")]
    ModifiedWhileRegistered,

    #[error("Flags {flags:?} are not valid for a {kind}")]
    InvalidFlags {
        kind: AttributeKind,
        flags: AttributeFlags,
    },

    #[error("A setter requires a write capability in {0:?}")]
    SetterWithoutWrite(AttributeFlags),

    #[error("A getter requires a read capability in {0:?}")]
    GetterWithoutRead(AttributeFlags),

    #[error("Unknown service id {0}")]
    UnknownService(usize),

    #[error("Unknown characteristic id {0}")]
    UnknownCharacteristic(usize),

    #[error("Unknown descriptor id {0}")]
    UnknownDescriptor(usize),

    #[error("Unknown advertisement id {0}")]
    UnknownAdvertisement(usize),

    #[error("Characteristic {0} does not support notify or indicate")]
    NotNotifiable(Uuid),

    #[error("changed() must run on the context that registered the application")]
    WrongContext,

    #[error("Invalid object path: {0}")]
    InvalidPath(String),

    #[error("No Bluetooth adapter found")]
    NoAdapter,
}

/// Per-request failures returned to the remote device
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AccessError {
    #[error("Failed: {0}")]
    Failed(String),

    #[error("Operation already in progress")]
    InProgress,

    #[error("Operation not permitted")]
    NotPermitted,

    #[error("Invalid offset")]
    InvalidOffset,

    #[error("Invalid value length")]
    InvalidValueLength,

    #[error("Not authorized")]
    NotAuthorized,

    #[error("Not supported")]
    NotSupported,

    #[error("Rejected")]
    Rejected,

    #[error("Not connected")]
    NotConnected,
}

impl AccessError {
    /// Daemon error name carried back to the remote device.
    pub fn dbus_name(&self) -> &'static str {
        match self {
            AccessError::Failed(_) => "org.bluez.Error.Failed",
            AccessError::InProgress => "org.bluez.Error.InProgress",
            AccessError::NotPermitted => "org.bluez.Error.NotPermitted",
            AccessError::InvalidOffset => "org.bluez.Error.InvalidOffset",
            AccessError::InvalidValueLength => "org.bluez.Error.InvalidValueLength",
            AccessError::NotAuthorized => "org.bluez.Error.NotAuthorized",
            AccessError::NotSupported => "org.bluez.Error.NotSupported",
            AccessError::Rejected => "org.bluez.Error.Rejected",
            AccessError::NotConnected => "org.bluez.Error.NotConnected",
        }
    }

    /// Parses a daemon error name; unknown names map to `Failed`.
    pub fn from_dbus_name(name: &str, message: &str) -> Self {
        match name {
            "org.bluez.Error.InProgress" => AccessError::InProgress,
            "org.bluez.Error.NotPermitted" => AccessError::NotPermitted,
            "org.bluez.Error.InvalidOffset" => AccessError::InvalidOffset,
            "org.bluez.Error.InvalidValueLength" => AccessError::InvalidValueLength,
            "org.bluez.Error.NotAuthorized" => AccessError::NotAuthorized,
            "org.bluez.Error.NotSupported" => AccessError::NotSupported,
            "org.bluez.Error.Rejected" => AccessError::Rejected,
            "org.bluez.Error.NotConnected" => AccessError::NotConnected,
            _ => AccessError::Failed(message.to_string()),
        }
    }
}

/// A named error returned by a daemon collaborator
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{name}: {message}")]
pub struct BusError {
    pub name: String,
    pub message: String,
}

impl BusError {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
        }
    }
}

impl From<AccessError> for BusError {
    fn from(err: AccessError) -> Self {
        BusError::new(err.dbus_name(), err.to_string())
    }
}

/// Crate-level error
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Access error: {0}")]
    Access(#[from] AccessError),

    #[error("Pairing error: {0}")]
    Pairing(#[from] PairingError),

    #[error("Bus error: {0}")]
    Bus(#[from] BusError),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Serial executor has shut down")]
    ExecutorClosed,

    #[error("Failed to start executor thread: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
