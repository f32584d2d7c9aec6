//! Exported property model

use crate::error::ConfigurationError;
use std::collections::BTreeMap;
use std::fmt;

/// A hierarchical object path, e.g. `/org/rustyperiph/service0/char1`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectPath(String);

impl ObjectPath {
    /// Validates and wraps a path: absolute, no empty or trailing segments,
    /// and segments made of `[A-Za-z0-9_]`.
    pub fn new(path: impl Into<String>) -> Result<Self, ConfigurationError> {
        let path = path.into();
        if path == "/" {
            return Ok(ObjectPath(path));
        }

        let valid = path.starts_with('/')
            && path[1..].split('/').all(|segment| {
                !segment.is_empty()
                    && segment
                        .chars()
                        .all(|c| c.is_ascii_alphanumeric() || c == '_')
            });

        if valid {
            Ok(ObjectPath(path))
        } else {
            Err(ConfigurationError::InvalidPath(path))
        }
    }

    /// Wraps a path literal known to be valid.
    pub(crate) fn from_static(path: &'static str) -> Self {
        debug_assert!(ObjectPath::new(path).is_ok(), "invalid path literal {}", path);
        ObjectPath(path.to_string())
    }

    /// Appends one segment. Segments built by this crate are always valid.
    pub fn child(&self, segment: &str) -> ObjectPath {
        if self.0 == "/" {
            ObjectPath(format!("/{}", segment))
        } else {
            ObjectPath(format!("{}/{}", self.0, segment))
        }
    }

    /// `self` with `n` appended to its last segment, e.g. `/x/advert` -> `/x/advert3`.
    pub fn numbered(&self, n: usize) -> ObjectPath {
        if self.0 == "/" {
            ObjectPath(format!("/_{}", n))
        } else {
            ObjectPath(format!("{}{}", self.0, n))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_descendant_of(&self, root: &ObjectPath) -> bool {
        self.0.len() > root.0.len()
            && self.0.starts_with(&root.0)
            && self.0.as_bytes()[root.0.len()] == b'/'
    }
}

impl fmt::Display for ObjectPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of a remote device, as named by the daemon.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        DeviceId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single exported or received property value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropValue {
    Bool(bool),
    U16(u16),
    U32(u32),
    Str(String),
    Path(ObjectPath),
    Bytes(Vec<u8>),
    StrList(Vec<String>),
    PathList(Vec<ObjectPath>),
    /// Keyed by UUID string, e.g. service data.
    ByteDict(BTreeMap<String, Vec<u8>>),
    /// Keyed by company identifier, e.g. manufacturer data.
    CompanyDict(BTreeMap<u16, Vec<u8>>),
}

impl PropValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Integer value, widened from whichever width was received.
    pub fn as_u32(&self) -> Option<u32> {
        match self {
            PropValue::U16(v) => Some(*v as u32),
            PropValue::U32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropValue::Str(v) => Some(v),
            PropValue::Path(p) => Some(p.as_str()),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            PropValue::Bytes(v) => Some(v),
            _ => None,
        }
    }
}

/// Property name to value.
pub type PropertyMap = BTreeMap<String, PropValue>;

/// Interface name to its properties.
pub type InterfaceMap = BTreeMap<String, PropertyMap>;

/// Object path to its interfaces: the full exported snapshot.
pub type ManagedObjects = BTreeMap<ObjectPath, InterfaceMap>;

/// How a value change must be delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// Fire and forget.
    Notify,
    /// Each recipient acknowledges before it is sent another.
    Indicate,
}

/// One emitted characteristic value change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueChanged {
    pub path: ObjectPath,
    pub value: Vec<u8>,
    pub kind: ChangeKind,
    pub recipients: Vec<DeviceId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_path_validation() {
        assert!(ObjectPath::new("/").is_ok());
        assert!(ObjectPath::new("/org/rustyperiph").is_ok());
        assert!(ObjectPath::new("/org/bluez/hci0/dev_00_11_22").is_ok());

        assert!(ObjectPath::new("org/rustyperiph").is_err());
        assert!(ObjectPath::new("/org//rustyperiph").is_err());
        assert!(ObjectPath::new("/org/rustyperiph/").is_err());
        assert!(ObjectPath::new("/org/rusty-periph").is_err());
    }

    #[test]
    fn test_object_path_children() {
        let root = ObjectPath::new("/org/app").unwrap();
        let service = root.child("service0");
        assert_eq!(service.as_str(), "/org/app/service0");
        assert!(service.is_descendant_of(&root));
        assert!(!root.is_descendant_of(&root));

        let sibling = ObjectPath::new("/org/application").unwrap();
        assert!(!sibling.is_descendant_of(&root));

        assert_eq!(ObjectPath::new("/").unwrap().child("a").as_str(), "/a");
    }
}
