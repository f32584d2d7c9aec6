//! Per-call read/write options
//!
//! The daemon passes an option dictionary with every ReadValue/WriteValue.
//! Most getters can ignore it; long values need `offset`, and
//! authorization-sensitive attributes look at `device`.

use super::{ATT_HEADER_LEN, ATT_MIN_MTU};
use crate::bus::{DeviceId, PropertyMap};
use crate::error::AccessError;
use std::str::FromStr;

/// Transport the request arrived on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkType {
    BrEdr,
    Le,
}

impl FromStr for LinkType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BR/EDR" => Ok(LinkType::BrEdr),
            "LE" => Ok(LinkType::Le),
            _ => Err(()),
        }
    }
}

/// Kind of write requested by the remote device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteType {
    /// Write without response.
    Command,
    /// Write with response.
    Request,
    /// Reliable write.
    Reliable,
}

impl FromStr for WriteType {
    type Err = AccessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "command" => Ok(WriteType::Command),
            "request" => Ok(WriteType::Request),
            "reliable" => Ok(WriteType::Reliable),
            _ => Err(AccessError::NotSupported),
        }
    }
}

/// Reported MTU, falling back to `default_mtu` when absent or zero and never
/// below the protocol floor.
fn effective_mtu(props: &PropertyMap, default_mtu: u16) -> u16 {
    let reported = props
        .get("mtu")
        .and_then(|v| v.as_u32())
        .map(|mtu| mtu.min(u16::MAX as u32) as u16)
        .unwrap_or(0);

    if reported == 0 {
        default_mtu.max(ATT_MIN_MTU)
    } else {
        reported.max(ATT_MIN_MTU)
    }
}

fn offset(props: &PropertyMap) -> usize {
    props
        .get("offset")
        .and_then(|v| v.as_u32())
        .unwrap_or(0) as usize
}

fn device(props: &PropertyMap) -> Option<DeviceId> {
    props
        .get("device")
        .and_then(|v| v.as_str())
        .map(DeviceId::new)
}

fn link(props: &PropertyMap) -> Option<LinkType> {
    props
        .get("link")
        .and_then(|v| v.as_str())
        .and_then(|s| s.parse().ok())
}

/// Options supplied to getters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadOptions {
    /// Byte offset the remote device wants the value from.
    pub offset: usize,
    /// Negotiated MTU of the connection.
    pub mtu: u16,
    pub device: Option<DeviceId>,
    pub link: Option<LinkType>,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            offset: 0,
            mtu: ATT_MIN_MTU,
            device: None,
            link: None,
        }
    }
}

impl ReadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_mtu(mut self, mtu: u16) -> Self {
        self.mtu = mtu.max(ATT_MIN_MTU);
        self
    }

    pub fn with_device(mut self, device: DeviceId) -> Self {
        self.device = Some(device);
        self
    }

    /// Parses the daemon's option dictionary.
    pub fn from_properties(props: &PropertyMap, default_mtu: u16) -> Self {
        Self {
            offset: offset(props),
            mtu: effective_mtu(props, default_mtu),
            device: device(props),
            link: link(props),
        }
    }

    /// Largest payload a single read response carries.
    pub fn chunk_len(&self) -> usize {
        (self.mtu as usize).saturating_sub(ATT_HEADER_LEN)
    }

    /// The suffix of `value` starting at `offset`, for getters that hold the
    /// whole logical value.
    pub fn slice(&self, value: &[u8]) -> Result<Vec<u8>, AccessError> {
        value
            .get(self.offset..)
            .map(<[u8]>::to_vec)
            .ok_or(AccessError::InvalidOffset)
    }
}

/// Options supplied to setters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOptions {
    /// Byte offset the written bytes start at.
    pub offset: usize,
    pub write_type: Option<WriteType>,
    /// Negotiated MTU of the connection.
    pub mtu: u16,
    pub device: Option<DeviceId>,
    pub link: Option<LinkType>,
    /// True for the authorization step of a prepared write.
    pub prepare_authorize: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            offset: 0,
            write_type: None,
            mtu: ATT_MIN_MTU,
            device: None,
            link: None,
            prepare_authorize: false,
        }
    }
}

impl WriteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_type(mut self, write_type: WriteType) -> Self {
        self.write_type = Some(write_type);
        self
    }

    pub fn with_device(mut self, device: DeviceId) -> Self {
        self.device = Some(device);
        self
    }

    /// Parses the daemon's option dictionary. An unknown write type is
    /// rejected as `NotSupported`.
    pub fn from_properties(props: &PropertyMap, default_mtu: u16) -> Result<Self, AccessError> {
        let write_type = match props.get("type").and_then(|v| v.as_str()) {
            Some(s) => Some(s.parse()?),
            None => None,
        };

        Ok(Self {
            offset: offset(props),
            write_type,
            mtu: effective_mtu(props, default_mtu),
            device: device(props),
            link: link(props),
            prepare_authorize: props
                .get("prepare-authorize")
                .and_then(|v| v.as_bool())
                .unwrap_or(false),
        })
    }

    /// Splices `data` into `value` at this write's offset.
    pub fn apply(&self, value: &mut Vec<u8>, data: &[u8]) -> Result<(), AccessError> {
        if self.offset > value.len() {
            return Err(AccessError::InvalidOffset);
        }
        let end = (self.offset + data.len()).min(value.len());
        value.splice(self.offset..end, data.iter().copied());
        Ok(())
    }
}
