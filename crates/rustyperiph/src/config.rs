//! Peripheral configuration

use crate::bus::ObjectPath;
use crate::error::ConfigurationError;
use crate::gatt::{ATT_HEADER_LEN, ATT_MIN_MTU};

/// Paths and defaults used when exporting objects to the daemon
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeripheralConfig {
    /// Adapter that provides the services and adverts.
    pub adapter: ObjectPath,
    /// Root of the exported GATT application.
    pub root_path: ObjectPath,
    /// Path the pairing agent is exported on.
    pub agent_path: ObjectPath,
    /// Adverts are exported as numbered children of this path.
    pub advert_path_prefix: ObjectPath,
    /// MTU assumed when the daemon does not report one.
    pub default_mtu: u16,
}

impl Default for PeripheralConfig {
    fn default() -> Self {
        Self {
            adapter: ObjectPath::from_static("/org/bluez/hci0"),
            root_path: ObjectPath::from_static("/org/rustyperiph"),
            agent_path: ObjectPath::from_static("/org/rustyperiph/agent"),
            advert_path_prefix: ObjectPath::from_static("/org/rustyperiph/advert"),
            default_mtu: ATT_MIN_MTU,
        }
    }
}

impl PeripheralConfig {
    /// Config rooted at `root`, with the agent and adverts exported beneath it.
    pub fn with_root(root: &str) -> Result<Self, ConfigurationError> {
        let root_path = ObjectPath::new(root)?;
        Ok(Self {
            agent_path: root_path.child("agent"),
            advert_path_prefix: root_path.child("advert"),
            root_path,
            ..Self::default()
        })
    }

    pub fn with_adapter(mut self, adapter: &str) -> Result<Self, ConfigurationError> {
        self.adapter = ObjectPath::new(adapter)?;
        Ok(self)
    }

    /// Default MTU, clamped up to the protocol floor.
    pub fn with_default_mtu(mut self, mtu: u16) -> Self {
        self.default_mtu = mtu.max(ATT_MIN_MTU);
        self
    }

    /// Largest value chunk a single read can return at the default MTU.
    pub fn default_chunk_len(&self) -> usize {
        (self.default_mtu as usize).saturating_sub(ATT_HEADER_LEN)
    }
}
