//! Bluetooth UUID value type
//!
//! A UUID is either a SIG-assigned 16/32-bit alias or a full 128-bit value.
//! Aliases are always expanded against the Bluetooth base UUID on
//! construction, so a 16-bit UUID and its 128-bit expansion compare and hash
//! identically.

use rand::RngCore;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// `00000000-0000-1000-8000-00805F9B34FB`
const BASE_UUID: u128 = 0x0000_0000_0000_1000_8000_0080_5F9B_34FB;

/// Mask of the bits that hold a 32-bit alias within the base UUID.
const ALIAS_MASK: u128 = 0xFFFF_FFFF << 96;

/// Generic Access service, synthesized by the daemon.
pub const GENERIC_ACCESS_SERVICE: Uuid = Uuid::from_u16(0x1800);

/// Generic Attribute service, synthesized by the daemon.
pub const GENERIC_ATTRIBUTE_SERVICE: Uuid = Uuid::from_u16(0x1801);

/// Client Characteristic Configuration descriptor, synthesized by the daemon.
pub const CLIENT_CHARACTERISTIC_CONFIGURATION: Uuid = Uuid::from_u16(0x2902);

/// Characteristic Extended Properties descriptor.
pub const CHARACTERISTIC_EXTENDED_PROPERTIES: Uuid = Uuid::from_u16(0x2900);

/// Characteristic User Description descriptor.
pub const CHARACTERISTIC_USER_DESCRIPTION: Uuid = Uuid::from_u16(0x2901);

/// A Bluetooth UUID, stored in its expanded 128-bit form.
#[derive(Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Uuid(u128);

impl Uuid {
    /// Expands a SIG-assigned 16-bit value.
    pub const fn from_u16(uuid16: u16) -> Self {
        Uuid(BASE_UUID | ((uuid16 as u128) << 96))
    }

    /// Expands a SIG-assigned 32-bit value.
    pub const fn from_u32(uuid32: u32) -> Self {
        Uuid(BASE_UUID | ((uuid32 as u128) << 96))
    }

    /// Wraps a full 128-bit value.
    pub const fn from_u128(value: u128) -> Self {
        Uuid(value)
    }

    /// Builds a UUID from 16 bytes in network (big-endian) order.
    pub const fn from_bytes_be(bytes: [u8; 16]) -> Self {
        Uuid(u128::from_be_bytes(bytes))
    }

    /// Builds a UUID from 16 bytes in over-the-air (little-endian) order.
    pub const fn from_bytes_le(bytes: [u8; 16]) -> Self {
        Uuid(u128::from_le_bytes(bytes))
    }

    /// Generates a random version 4 UUID.
    pub fn new_random_v4() -> Self {
        let mut bytes = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut bytes);
        bytes[6] = (bytes[6] & 0x0F) | 0x40;
        bytes[8] = (bytes[8] & 0x3F) | 0x80;
        Uuid::from_bytes_be(bytes)
    }

    /// The expanded 128-bit value.
    pub const fn as_u128(&self) -> u128 {
        self.0
    }

    pub const fn to_bytes_be(&self) -> [u8; 16] {
        self.0.to_be_bytes()
    }

    fn is_sig_assigned(&self) -> bool {
        self.0 & !ALIAS_MASK == BASE_UUID
    }

    /// The 16-bit alias, if this UUID is derived from one.
    pub fn as_u16(&self) -> Option<u16> {
        match self.as_u32() {
            Some(alias) if alias <= u16::MAX as u32 => Some(alias as u16),
            _ => None,
        }
    }

    /// The 32-bit alias, if this UUID is derived from the base UUID.
    pub fn as_u32(&self) -> Option<u32> {
        if self.is_sig_assigned() {
            Some((self.0 >> 96) as u32)
        } else {
            None
        }
    }

    /// True for identifiers the daemon synthesizes itself and which must
    /// never be declared by an application.
    pub fn is_reserved(&self) -> bool {
        *self == GENERIC_ACCESS_SERVICE || *self == CLIENT_CHARACTERISTIC_CONFIGURATION
    }

    /// Shortest textual form the daemon accepts: 4 hex digits for 16-bit
    /// aliases, the hyphenated form otherwise.
    pub fn short_form(&self) -> String {
        match self.as_u16() {
            Some(alias) => format!("{:04x}", alias),
            None => self.to_string(),
        }
    }
}

impl From<u16> for Uuid {
    fn from(uuid16: u16) -> Self {
        Uuid::from_u16(uuid16)
    }
}

impl From<u32> for Uuid {
    fn from(uuid32: u32) -> Self {
        Uuid::from_u32(uuid32)
    }
}

impl From<u128> for Uuid {
    fn from(value: u128) -> Self {
        Uuid::from_u128(value)
    }
}

impl PartialEq<u16> for Uuid {
    fn eq(&self, other: &u16) -> bool {
        self.as_u16() == Some(*other)
    }
}

impl fmt::Display for Uuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let v = self.0;
        write!(
            f,
            "{:08x}-{:04x}-{:04x}-{:04x}-{:012x}",
            (v >> 96) as u32,
            (v >> 80) as u16,
            (v >> 64) as u16,
            (v >> 48) as u16,
            v & 0xFFFF_FFFF_FFFF
        )
    }
}

impl fmt::Debug for Uuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_u32() {
            Some(alias) if alias <= u16::MAX as u32 => write!(f, "Uuid(0x{:04X})", alias),
            Some(alias) => write!(f, "Uuid(0x{:08X})", alias),
            None => write!(f, "Uuid({})", self),
        }
    }
}

/// Errors produced when parsing a UUID from text
#[derive(Debug, Error, Clone, PartialEq)]
pub enum UuidParseError {
    #[error("UUID must have 4, 8 or 32 hex digits, found {0}")]
    InvalidLength(usize),

    #[error("Invalid hex in UUID: {0}")]
    Hex(#[from] hex::FromHexError),
}

impl FromStr for Uuid {
    type Err = UuidParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits: String = s
            .trim_start_matches("0x")
            .chars()
            .filter(|c| *c != '-')
            .collect();

        match digits.len() {
            4 => {
                let mut bytes = [0u8; 2];
                hex::decode_to_slice(&digits, &mut bytes)?;
                Ok(Uuid::from_u16(u16::from_be_bytes(bytes)))
            }
            8 => {
                let mut bytes = [0u8; 4];
                hex::decode_to_slice(&digits, &mut bytes)?;
                Ok(Uuid::from_u32(u32::from_be_bytes(bytes)))
            }
            32 => {
                let mut bytes = [0u8; 16];
                hex::decode_to_slice(&digits, &mut bytes)?;
                Ok(Uuid::from_bytes_be(bytes))
            }
            n => Err(UuidParseError::InvalidLength(n)),
        }
    }
}
