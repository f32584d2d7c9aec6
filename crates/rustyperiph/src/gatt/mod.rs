//! Generic Attribute Profile (GATT) server engine
//!
//! Applications describe services, characteristics and descriptors with the
//! definitions in [`attribute`], add them to a [`GattApplication`], and
//! register it with the daemon. Remote reads and writes are routed back to
//! the application callbacks through an [`AccessDispatcher`].

pub mod application;
pub mod attribute;
mod constants;
pub mod dispatch;
pub mod notify;
pub mod options;

pub use self::application::GattApplication;
pub use self::constants::*;
pub use self::attribute::{
    AttributeId, Characteristic, CharacteristicId, Descriptor, DescriptorId, Getter, Service,
    ServiceId, Setter,
};
pub use self::dispatch::{AccessDispatcher, AccessReply, AccessRequest};
pub use self::notify::{Subscription, SubscriptionState};
pub use self::options::{LinkType, ReadOptions, WriteOptions, WriteType};
