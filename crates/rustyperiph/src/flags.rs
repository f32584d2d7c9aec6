//! Access flags for characteristics and descriptors
//!
//! Both attribute kinds share one flag set; each kind accepts only the subset
//! in its legal domain. Flags are exported to the daemon as kebab-case names.

use bitflags::bitflags;

bitflags! {
    /// Read/write/subscribe behaviour of a characteristic or descriptor.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AttributeFlags: u32 {
        const BROADCAST = 1 << 0;
        const READ = 1 << 1;
        const WRITE_WITHOUT_RESPONSE = 1 << 2;
        const WRITE = 1 << 3;
        /// Subscribers are pushed value changes without acknowledgement.
        const NOTIFY = 1 << 4;
        /// Subscribers are pushed value changes and must acknowledge each one.
        const INDICATE = 1 << 5;
        const AUTHENTICATED_SIGNED_WRITES = 1 << 6;
        /// Synthesized by the daemon when needed, never exported.
        const EXTENDED_PROPERTIES = 1 << 7;
        const RELIABLE_WRITE = 1 << 8;
        const WRITABLE_AUXILIARIES = 1 << 9;
        const ENCRYPT_READ = 1 << 10;
        const ENCRYPT_WRITE = 1 << 11;
        const ENCRYPT_AUTHENTICATED_READ = 1 << 12;
        const ENCRYPT_AUTHENTICATED_WRITE = 1 << 13;
        const SECURE_READ = 1 << 14;
        const SECURE_WRITE = 1 << 15;
        const AUTHORIZE = 1 << 16;
    }
}

/// Daemon flag names, in export order.
const FLAG_NAMES: &[(AttributeFlags, &str)] = &[
    (AttributeFlags::BROADCAST, "broadcast"),
    (AttributeFlags::READ, "read"),
    (AttributeFlags::WRITE_WITHOUT_RESPONSE, "write-without-response"),
    (AttributeFlags::WRITE, "write"),
    (AttributeFlags::NOTIFY, "notify"),
    (AttributeFlags::INDICATE, "indicate"),
    (AttributeFlags::AUTHENTICATED_SIGNED_WRITES, "authenticated-signed-writes"),
    (AttributeFlags::EXTENDED_PROPERTIES, "extended-properties"),
    (AttributeFlags::RELIABLE_WRITE, "reliable-write"),
    (AttributeFlags::WRITABLE_AUXILIARIES, "writable-auxiliaries"),
    (AttributeFlags::ENCRYPT_READ, "encrypt-read"),
    (AttributeFlags::ENCRYPT_WRITE, "encrypt-write"),
    (AttributeFlags::ENCRYPT_AUTHENTICATED_READ, "encrypt-authenticated-read"),
    (AttributeFlags::ENCRYPT_AUTHENTICATED_WRITE, "encrypt-authenticated-write"),
    (AttributeFlags::SECURE_READ, "secure-read"),
    (AttributeFlags::SECURE_WRITE, "secure-write"),
    (AttributeFlags::AUTHORIZE, "authorize"),
];

/// The kind of attribute a flag set is attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeKind {
    Characteristic,
    Descriptor,
}

impl std::fmt::Display for AttributeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttributeKind::Characteristic => write!(f, "characteristic"),
            AttributeKind::Descriptor => write!(f, "descriptor"),
        }
    }
}

impl AttributeFlags {
    /// Any flag that lets a remote device read the value.
    pub const READ_CAPABILITIES: AttributeFlags = AttributeFlags::READ
        .union(AttributeFlags::ENCRYPT_READ)
        .union(AttributeFlags::ENCRYPT_AUTHENTICATED_READ)
        .union(AttributeFlags::SECURE_READ);

    /// Any flag that lets a remote device write the value.
    pub const WRITE_CAPABILITIES: AttributeFlags = AttributeFlags::WRITE
        .union(AttributeFlags::WRITE_WITHOUT_RESPONSE)
        .union(AttributeFlags::AUTHENTICATED_SIGNED_WRITES)
        .union(AttributeFlags::RELIABLE_WRITE)
        .union(AttributeFlags::ENCRYPT_WRITE)
        .union(AttributeFlags::ENCRYPT_AUTHENTICATED_WRITE)
        .union(AttributeFlags::SECURE_WRITE);

    /// Flags that allow subscription.
    pub const SUBSCRIBE_CAPABILITIES: AttributeFlags =
        AttributeFlags::NOTIFY.union(AttributeFlags::INDICATE);

    /// Legal flags for a characteristic.
    pub const CHARACTERISTIC_DOMAIN: AttributeFlags = AttributeFlags::all();

    /// Legal flags for a descriptor.
    pub const DESCRIPTOR_DOMAIN: AttributeFlags = AttributeFlags::READ
        .union(AttributeFlags::WRITE)
        .union(AttributeFlags::ENCRYPT_READ)
        .union(AttributeFlags::ENCRYPT_WRITE)
        .union(AttributeFlags::ENCRYPT_AUTHENTICATED_READ)
        .union(AttributeFlags::ENCRYPT_AUTHENTICATED_WRITE)
        .union(AttributeFlags::SECURE_READ)
        .union(AttributeFlags::SECURE_WRITE)
        .union(AttributeFlags::AUTHORIZE);

    /// The legal domain for the given attribute kind.
    pub fn domain(kind: AttributeKind) -> AttributeFlags {
        match kind {
            AttributeKind::Characteristic => Self::CHARACTERISTIC_DOMAIN,
            AttributeKind::Descriptor => Self::DESCRIPTOR_DOMAIN,
        }
    }

    /// True if the set is non-empty and entirely inside the kind's domain.
    pub fn is_valid_for(&self, kind: AttributeKind) -> bool {
        !self.is_empty() && Self::domain(kind).contains(*self)
    }

    pub fn can_read(&self) -> bool {
        self.intersects(Self::READ_CAPABILITIES)
    }

    pub fn can_write(&self) -> bool {
        self.intersects(Self::WRITE_CAPABILITIES)
    }

    pub fn can_subscribe(&self) -> bool {
        self.intersects(Self::SUBSCRIBE_CAPABILITIES)
    }

    /// Kebab-case daemon names for every exported flag in the set.
    pub fn to_names(&self) -> Vec<String> {
        let exported = self.difference(AttributeFlags::EXTENDED_PROPERTIES);
        FLAG_NAMES
            .iter()
            .filter(|(flag, _)| exported.contains(*flag))
            .map(|(_, name)| (*name).to_string())
            .collect()
    }

    /// Parses a daemon flag name.
    pub fn from_daemon_name(name: &str) -> Option<AttributeFlags> {
        FLAG_NAMES
            .iter()
            .find(|(_, n)| *n == name)
            .map(|(flag, _)| *flag)
    }
}
