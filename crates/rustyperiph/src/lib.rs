//! RustyPeriph - A Rust library for running a BLE GATT peripheral through the Bluetooth daemon
//!
//! The host process declares a tree of services, characteristics and descriptors and registers
//! it with the daemon, which forwards remote reads, writes and subscriptions back into the tree.
//! The library also hosts the pairing agent the daemon delegates user decisions to, and shares
//! each adapter's advertising slot between the advertisements the process submits.
//!
//! The transport to the daemon is not part of this crate; it is reached through the traits in
//! [`bus`], and [`bus::LoopbackBus`] stands in for it in tests.

pub mod adapter;
pub mod advert;
pub mod agent;
pub mod bus;
pub mod config;
pub mod error;
pub mod executor;
pub mod flags;
pub mod gatt;
pub mod uuid;

mod sync;

// Re-export common types for convenience
pub use adapter::Adapter;
pub use advert::{AdvertId, AdvertState, Advertisement, AdvertisementMultiplexer, PacketType};
pub use agent::{
    Agent, IoCapability, NoIoAgent, PairingAgent, PairingError, PairingModel, PendingDecision,
    YesNoAgent,
};
pub use bus::{BusContext, DeviceId, LoopbackBus, ObjectPath};
pub use config::PeripheralConfig;
pub use error::{AccessError, BusError, ConfigurationError, Error, Result};
pub use executor::{ExecutorHandle, SerialExecutor};
pub use flags::AttributeFlags;
pub use gatt::{
    AccessDispatcher, Characteristic, CharacteristicId, Descriptor, DescriptorId, GattApplication,
    Service, ServiceId,
};
pub use uuid::Uuid;
