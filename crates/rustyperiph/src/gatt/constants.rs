//! GATT constants

/// Smallest MTU a connection may negotiate.
pub const ATT_MIN_MTU: u16 = 48;

/// Bytes of protocol overhead in every read response: opcode and handle.
pub const ATT_HEADER_LEN: usize = 3;
