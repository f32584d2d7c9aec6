//! Daemon collaborator contracts
//!
//! The inter-process transport is not part of this crate. Everything the
//! engine needs from the Bluetooth daemon is expressed as the traits in this
//! module, and everything it exports is expressed as the property model
//! below. A transport binding implements the traits and forwards inbound
//! calls to the GATT dispatcher, the agent host and the advertisement
//! multiplexer.

pub mod loopback;
mod types;

pub use self::loopback::{BusCall, LoopbackBus};
pub use self::types::*;

use crate::error::BusError;
use std::sync::Arc;

/// Daemon interface of an adapter.
pub const ADAPTER_INTERFACE: &str = "org.bluez.Adapter1";
/// Daemon interface of the GATT manager.
pub const GATT_MANAGER_INTERFACE: &str = "org.bluez.GattManager1";
/// Daemon interface exported by every service.
pub const GATT_SERVICE_INTERFACE: &str = "org.bluez.GattService1";
/// Daemon interface exported by every characteristic.
pub const GATT_CHARACTERISTIC_INTERFACE: &str = "org.bluez.GattCharacteristic1";
/// Daemon interface exported by every descriptor.
pub const GATT_DESCRIPTOR_INTERFACE: &str = "org.bluez.GattDescriptor1";
/// Daemon interface of the advertising manager.
pub const ADVERTISING_MANAGER_INTERFACE: &str = "org.bluez.LEAdvertisingManager1";
/// Daemon interface exported by every advertisement.
pub const ADVERTISEMENT_INTERFACE: &str = "org.bluez.LEAdvertisement1";
/// Daemon interface of the agent manager.
pub const AGENT_MANAGER_INTERFACE: &str = "org.bluez.AgentManager1";
/// Daemon interface exported by an agent.
pub const AGENT_INTERFACE: &str = "org.bluez.Agent1";

/// Lists the daemon's adapters and reads or writes their properties.
pub trait AdapterManager: Send + Sync {
    /// Paths of every adapter, in the daemon's order.
    fn adapters(&self) -> Result<Vec<ObjectPath>, BusError>;

    fn adapter_property(&self, adapter: &ObjectPath, name: &str) -> Result<PropValue, BusError>;

    fn set_adapter_property(
        &self,
        adapter: &ObjectPath,
        name: &str,
        value: PropValue,
    ) -> Result<(), BusError>;
}

/// Accepts and releases GATT applications.
pub trait GattManager: Send + Sync {
    /// Registers the application rooted at `root`. `objects` is the full
    /// exported tree the daemon will enumerate.
    fn register_application(
        &self,
        adapter: &ObjectPath,
        root: &ObjectPath,
        objects: &ManagedObjects,
    ) -> Result<(), BusError>;

    fn unregister_application(&self, adapter: &ObjectPath, root: &ObjectPath)
        -> Result<(), BusError>;
}

/// Accepts and releases advertisements on an adapter.
pub trait AdvertisingManager: Send + Sync {
    fn register_advertisement(
        &self,
        adapter: &ObjectPath,
        path: &ObjectPath,
        properties: &PropertyMap,
    ) -> Result<(), BusError>;

    fn unregister_advertisement(
        &self,
        adapter: &ObjectPath,
        path: &ObjectPath,
    ) -> Result<(), BusError>;

    /// Daemon names of the optional packet fields the adapter can fill in,
    /// e.g. `tx-power`.
    fn supported_includes(&self, adapter: &ObjectPath) -> Result<Vec<String>, BusError>;
}

/// Accepts pairing agents.
pub trait AgentManager: Send + Sync {
    fn register_agent(&self, path: &ObjectPath, capability: &str) -> Result<(), BusError>;

    /// Needs elevated host privilege on a real daemon.
    fn request_default_agent(&self, path: &ObjectPath) -> Result<(), BusError>;

    fn unregister_agent(&self, path: &ObjectPath) -> Result<(), BusError>;
}

/// Carries characteristic value changes out to the transport, which fans
/// them out to the listed recipients.
pub trait SignalSink: Send + Sync {
    fn value_changed(&self, event: ValueChanged);
}

/// The explicit session context threaded through registration calls.
#[derive(Clone)]
pub struct BusContext {
    pub adapters: Arc<dyn AdapterManager>,
    pub gatt: Arc<dyn GattManager>,
    pub advertising: Arc<dyn AdvertisingManager>,
    pub agents: Arc<dyn AgentManager>,
    pub signals: Arc<dyn SignalSink>,
}

impl BusContext {
    /// Builds a context where one object plays every collaborator role.
    pub fn from_bus<B>(bus: Arc<B>) -> Self
    where
        B: AdapterManager + GattManager + AdvertisingManager + AgentManager + SignalSink + 'static,
    {
        Self {
            adapters: bus.clone(),
            gatt: bus.clone(),
            advertising: bus.clone(),
            agents: bus.clone(),
            signals: bus,
        }
    }
}

impl std::fmt::Debug for BusContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BusContext").finish_non_exhaustive()
    }
}
