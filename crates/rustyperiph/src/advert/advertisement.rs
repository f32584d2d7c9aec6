//! Advertisement model

use crate::bus::{PropValue, PropertyMap};
use crate::uuid::Uuid;
use bitflags::bitflags;
use byteorder::{ByteOrder, LittleEndian};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Invoked when an active advertisement stops broadcasting on its own.
pub type ReleaseCallback = Arc<dyn Fn() + Send + Sync>;

/// Advertising packet type requested from the daemon
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PacketType {
    /// Connectionless; the advertised services need no pairing.
    Broadcast,
    /// Connectable; the services belong to a peripheral role.
    #[default]
    Peripheral,
}

impl PacketType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PacketType::Broadcast => "broadcast",
            PacketType::Peripheral => "peripheral",
        }
    }
}

bitflags! {
    /// Optional fields the daemon fills into the advertising packet.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct AdvertisingIncludes: u8 {
        const TX_POWER = 1 << 0;
        const APPEARANCE = 1 << 1;
        const LOCAL_NAME = 1 << 2;
    }
}

const INCLUDE_NAMES: &[(AdvertisingIncludes, &str)] = &[
    (AdvertisingIncludes::TX_POWER, "tx-power"),
    (AdvertisingIncludes::APPEARANCE, "appearance"),
    (AdvertisingIncludes::LOCAL_NAME, "local-name"),
];

impl AdvertisingIncludes {
    pub fn to_names(&self) -> Vec<String> {
        INCLUDE_NAMES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| (*name).to_string())
            .collect()
    }

    /// Parses the daemon's `SupportedIncludes` list, skipping unknown names.
    pub fn from_names<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        names
            .into_iter()
            .filter_map(|name| INCLUDE_NAMES.iter().find(|(_, n)| *n == name))
            .fold(AdvertisingIncludes::empty(), |acc, (flag, _)| acc | *flag)
    }
}

/// An advertisement to broadcast through the daemon.
///
/// A zero timeout means the advertisement broadcasts until cancelled.
#[derive(Clone)]
pub struct Advertisement {
    local_name: String,
    service_uuids: Vec<Uuid>,
    appearance: u16,
    timeout: Duration,
    discoverable: bool,
    packet_type: PacketType,
    manufacturer_data: BTreeMap<u16, Vec<u8>>,
    solicit_uuids: Vec<Uuid>,
    service_data: BTreeMap<Uuid, Vec<u8>>,
    includes: AdvertisingIncludes,
    duration: Duration,
    release: Option<ReleaseCallback>,
}

impl Advertisement {
    /// Rotation slice the daemon gives each advertisement when it
    /// broadcasts several at once.
    pub const DEFAULT_DURATION: Duration = Duration::from_secs(2);

    pub fn new(
        local_name: impl Into<String>,
        service_uuids: impl IntoIterator<Item = Uuid>,
        appearance: u16,
        timeout: Duration,
    ) -> Self {
        Self {
            local_name: local_name.into(),
            service_uuids: service_uuids.into_iter().collect(),
            appearance,
            timeout,
            discoverable: true,
            packet_type: PacketType::Peripheral,
            manufacturer_data: BTreeMap::new(),
            solicit_uuids: Vec::new(),
            service_data: BTreeMap::new(),
            includes: AdvertisingIncludes::empty(),
            duration: Self::DEFAULT_DURATION,
            release: None,
        }
    }

    /// Appearance given as its two little-endian wire bytes.
    pub fn with_appearance_bytes(mut self, bytes: [u8; 2]) -> Self {
        self.appearance = LittleEndian::read_u16(&bytes);
        self
    }

    pub fn with_packet_type(mut self, packet_type: PacketType) -> Self {
        self.packet_type = packet_type;
        self
    }

    pub fn with_discoverable(mut self, discoverable: bool) -> Self {
        self.discoverable = discoverable;
        self
    }

    /// Manufacturer specific data for a Bluetooth SIG company identifier.
    pub fn with_manufacturer_data(mut self, company: u16, data: impl Into<Vec<u8>>) -> Self {
        self.manufacturer_data.insert(company, data.into());
        self
    }

    pub fn with_solicit_uuid(mut self, uuid: Uuid) -> Self {
        self.solicit_uuids.push(uuid);
        self
    }

    pub fn with_service_data(mut self, uuid: Uuid, data: impl Into<Vec<u8>>) -> Self {
        self.service_data.insert(uuid, data.into());
        self
    }

    pub fn with_includes(mut self, includes: AdvertisingIncludes) -> Self {
        self.includes = includes;
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Called when the broadcast ends by expiry or because the daemon
    /// released it; not on explicit cancellation.
    pub fn with_release<F>(mut self, release: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.release = Some(Arc::new(release));
        self
    }

    pub fn local_name(&self) -> &str {
        &self.local_name
    }

    pub fn service_uuids(&self) -> &[Uuid] {
        &self.service_uuids
    }

    pub fn appearance(&self) -> u16 {
        self.appearance
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn packet_type(&self) -> PacketType {
        self.packet_type
    }

    pub fn is_discoverable(&self) -> bool {
        self.discoverable
    }

    pub fn includes(&self) -> AdvertisingIncludes {
        self.includes
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub(crate) fn release_callback(&self) -> Option<ReleaseCallback> {
        self.release.clone()
    }

    /// When an activation at `activated` runs out; `None` if it never does.
    pub(crate) fn deadline_from(&self, activated: Instant) -> Option<Instant> {
        if self.timeout.is_zero() {
            None
        } else {
            activated.checked_add(self.timeout)
        }
    }

    /// Properties exported on the advertisement interface.
    pub fn properties(&self) -> PropertyMap {
        let mut props = PropertyMap::new();
        props.insert(
            "Type".to_string(),
            PropValue::Str(self.packet_type.as_str().to_string()),
        );
        props.insert(
            "ServiceUUIDs".to_string(),
            PropValue::StrList(self.service_uuids.iter().map(Uuid::short_form).collect()),
        );
        props.insert(
            "LocalName".to_string(),
            PropValue::Str(self.local_name.clone()),
        );
        props.insert("Appearance".to_string(), PropValue::U16(self.appearance));
        if !self.timeout.is_zero() {
            props.insert("Timeout".to_string(), PropValue::U16(secs_u16(self.timeout)));
        }
        props.insert(
            "ManufacturerData".to_string(),
            PropValue::CompanyDict(self.manufacturer_data.clone()),
        );
        props.insert(
            "SolicitUUIDs".to_string(),
            PropValue::StrList(self.solicit_uuids.iter().map(Uuid::short_form).collect()),
        );
        props.insert(
            "ServiceData".to_string(),
            PropValue::ByteDict(
                self.service_data
                    .iter()
                    .map(|(uuid, data)| (uuid.short_form(), data.clone()))
                    .collect(),
            ),
        );
        props.insert("Discoverable".to_string(), PropValue::Bool(self.discoverable));
        props.insert(
            "Includes".to_string(),
            PropValue::StrList(self.includes.to_names()),
        );
        props.insert("Duration".to_string(), PropValue::U16(secs_u16(self.duration)));
        props
    }
}

fn secs_u16(duration: Duration) -> u16 {
    u16::try_from(duration.as_secs()).unwrap_or(u16::MAX)
}

impl fmt::Debug for Advertisement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Advertisement")
            .field("local_name", &self.local_name)
            .field("service_uuids", &self.service_uuids)
            .field("appearance", &self.appearance)
            .field("timeout", &self.timeout)
            .field("packet_type", &self.packet_type)
            .finish_non_exhaustive()
    }
}
