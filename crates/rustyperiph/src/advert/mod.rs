//! Advertisements
//!
//! An adapter broadcasts one advertisement at a time on behalf of this
//! process. [`Advertisement`] describes what to broadcast, and
//! [`AdvertisementMultiplexer`] shares each adapter between every
//! advertisement submitted for it.

mod advertisement;
mod multiplexer;

pub use self::advertisement::{Advertisement, AdvertisingIncludes, PacketType, ReleaseCallback};
pub use self::multiplexer::{AdvertId, AdvertState, AdvertisementMultiplexer};

#[cfg(test)]
mod tests;
