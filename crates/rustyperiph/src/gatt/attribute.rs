//! Attribute definitions
//!
//! These are the values an application builds and hands to
//! [`GattApplication`](super::GattApplication). Validation happens when they
//! are added to the tree, not here.

use super::options::{ReadOptions, WriteOptions};
use crate::error::AccessError;
use crate::flags::AttributeFlags;
use crate::uuid::Uuid;
use std::fmt;
use std::sync::Arc;

/// Produces the value of an attribute for a read.
pub type Getter = Arc<dyn Fn(&ReadOptions) -> Result<Vec<u8>, AccessError> + Send + Sync>;

/// Consumes a value written to an attribute.
pub type Setter = Arc<dyn Fn(&[u8], &WriteOptions) -> Result<(), AccessError> + Send + Sync>;

/// Identifies a service within its application
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ServiceId(pub(crate) usize);

/// Identifies a characteristic within its application
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CharacteristicId(pub(crate) usize);

/// Identifies a descriptor within its application
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DescriptorId(pub(crate) usize);

/// Any attribute in the tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeId {
    Service(ServiceId),
    Characteristic(CharacteristicId),
    Descriptor(DescriptorId),
}

/// A GATT service definition
#[derive(Debug, Clone)]
pub struct Service {
    pub uuid: Uuid,
    pub primary: bool,
    /// Other services of the same application this one includes.
    pub includes: Vec<ServiceId>,
}

impl Service {
    /// A primary service.
    pub fn new(uuid: impl Into<Uuid>) -> Self {
        Self {
            uuid: uuid.into(),
            primary: true,
            includes: Vec::new(),
        }
    }

    pub fn secondary(uuid: impl Into<Uuid>) -> Self {
        Self {
            primary: false,
            ..Self::new(uuid)
        }
    }

    pub fn include(mut self, service: ServiceId) -> Self {
        self.includes.push(service);
        self
    }
}

/// A GATT characteristic definition
#[derive(Clone)]
pub struct Characteristic {
    pub uuid: Uuid,
    pub flags: AttributeFlags,
    pub getter: Option<Getter>,
    pub setter: Option<Setter>,
    /// Value exported before the first read or change.
    pub initial_value: Vec<u8>,
}

impl Characteristic {
    pub fn new(uuid: impl Into<Uuid>, flags: AttributeFlags) -> Self {
        Self {
            uuid: uuid.into(),
            flags,
            getter: None,
            setter: None,
            initial_value: Vec::new(),
        }
    }

    pub fn with_getter<F>(mut self, getter: F) -> Self
    where
        F: Fn(&ReadOptions) -> Result<Vec<u8>, AccessError> + Send + Sync + 'static,
    {
        self.getter = Some(Arc::new(getter));
        self
    }

    pub fn with_setter<F>(mut self, setter: F) -> Self
    where
        F: Fn(&[u8], &WriteOptions) -> Result<(), AccessError> + Send + Sync + 'static,
    {
        self.setter = Some(Arc::new(setter));
        self
    }

    pub fn with_value(mut self, value: impl Into<Vec<u8>>) -> Self {
        self.initial_value = value.into();
        self
    }
}

impl fmt::Debug for Characteristic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Characteristic")
            .field("uuid", &self.uuid)
            .field("flags", &self.flags)
            .field("getter", &self.getter.is_some())
            .field("setter", &self.setter.is_some())
            .finish()
    }
}

/// A GATT descriptor definition
#[derive(Clone)]
pub struct Descriptor {
    pub uuid: Uuid,
    pub flags: AttributeFlags,
    pub getter: Option<Getter>,
    pub setter: Option<Setter>,
    pub initial_value: Vec<u8>,
}

impl Descriptor {
    pub fn new(uuid: impl Into<Uuid>, flags: AttributeFlags) -> Self {
        Self {
            uuid: uuid.into(),
            flags,
            getter: None,
            setter: None,
            initial_value: Vec::new(),
        }
    }

    /// A read-only Characteristic User Description.
    pub fn user_description(text: &str) -> Self {
        let value = text.as_bytes().to_vec();
        Self::new(crate::uuid::CHARACTERISTIC_USER_DESCRIPTION, AttributeFlags::READ)
            .with_value(value.clone())
            .with_getter(move |opts| opts.slice(&value))
    }

    pub fn with_getter<F>(mut self, getter: F) -> Self
    where
        F: Fn(&ReadOptions) -> Result<Vec<u8>, AccessError> + Send + Sync + 'static,
    {
        self.getter = Some(Arc::new(getter));
        self
    }

    pub fn with_setter<F>(mut self, setter: F) -> Self
    where
        F: Fn(&[u8], &WriteOptions) -> Result<(), AccessError> + Send + Sync + 'static,
    {
        self.setter = Some(Arc::new(setter));
        self
    }

    pub fn with_value(mut self, value: impl Into<Vec<u8>>) -> Self {
        self.initial_value = value.into();
        self
    }
}

impl fmt::Debug for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Descriptor")
            .field("uuid", &self.uuid)
            .field("flags", &self.flags)
            .field("getter", &self.getter.is_some())
            .field("setter", &self.setter.is_some())
            .finish()
    }
}
