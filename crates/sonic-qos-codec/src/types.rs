//! Storage types, attribute kinds and the values on either side of the codec.
//!
//! Native side: [`AttrValue`] (integers, enum symbols, ordered lists).
//! Store side: [`StoreValue`] inside a [`StoreObject`], a key/value bag
//! keyed by storage path (`base-qos/<class>/<attr>`).

use std::collections::BTreeMap;
use std::fmt;

/// Fixed-width binary form an attribute is serialized to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageType {
    U8,
    I8,
    U16,
    U32,
    U64,
}

impl StorageType {
    /// Width of the binary form in bytes.
    pub const fn width(&self) -> usize {
        match self {
            StorageType::U8 | StorageType::I8 => 1,
            StorageType::U16 => 2,
            StorageType::U32 => 4,
            StorageType::U64 => 8,
        }
    }

    /// Returns true for signed storage types.
    pub const fn is_signed(&self) -> bool {
        matches!(self, StorageType::I8)
    }

    /// Storage type name as used by the object store schema.
    pub const fn name(&self) -> &'static str {
        match self {
            StorageType::U8 => "uint8_t",
            StorageType::I8 => "int8_t",
            StorageType::U16 => "uint16_t",
            StorageType::U32 => "uint32_t",
            StorageType::U64 => "uint64_t",
        }
    }

    /// Inclusive numeric range representable by this type.
    pub const fn range(&self) -> (i128, i128) {
        match self {
            StorageType::U8 => (0, u8::MAX as i128),
            StorageType::I8 => (i8::MIN as i128, i8::MAX as i128),
            StorageType::U16 => (0, u16::MAX as i128),
            StorageType::U32 => (0, u32::MAX as i128),
            StorageType::U64 => (0, u64::MAX as i128),
        }
    }
}

impl fmt::Display for StorageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How an attribute's value is shaped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrKind {
    /// A single integer.
    Scalar,
    /// A symbolic enum member; the prefix names its family
    /// (e.g. `base-qos:queue-type:`).
    Enum { prefix: &'static str },
    /// An ordered list of integers, each serialized independently.
    List,
    /// A collection of nested objects (map-table entries).
    Entries,
}

/// Which object path an attribute is stored under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Under the object's own class path.
    Own,
    /// Under the parent class path (map entries carry their table's keys).
    Parent,
}

/// Schema entry for one attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttrSpec {
    pub kind: AttrKind,
    pub storage: StorageType,
    pub scope: Scope,
}

impl AttrSpec {
    pub const fn scalar(storage: StorageType) -> Self {
        Self {
            kind: AttrKind::Scalar,
            storage,
            scope: Scope::Own,
        }
    }

    /// Enum attributes are always stored as `uint32_t` codes.
    pub const fn enumeration(prefix: &'static str) -> Self {
        Self {
            kind: AttrKind::Enum { prefix },
            storage: StorageType::U32,
            scope: Scope::Own,
        }
    }

    pub const fn list(storage: StorageType) -> Self {
        Self {
            kind: AttrKind::List,
            storage,
            scope: Scope::Own,
        }
    }

    pub const fn entries() -> Self {
        Self {
            kind: AttrKind::Entries,
            storage: StorageType::U64,
            scope: Scope::Own,
        }
    }

    /// Moves the attribute under the parent class path.
    pub const fn in_parent(mut self) -> Self {
        self.scope = Scope::Parent;
        self
    }
}

/// A native attribute value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrValue {
    Uint(u64),
    Int(i64),
    Symbol(String),
    List(Vec<u64>),
    Objects(Vec<StoreObject>),
}

impl AttrValue {
    /// Returns the value as an unsigned integer, if it is a non-negative number.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            AttrValue::Uint(v) => Some(*v),
            AttrValue::Int(v) => u64::try_from(*v).ok(),
            _ => None,
        }
    }

    /// Returns the value as a signed integer, if it fits.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            AttrValue::Uint(v) => i64::try_from(*v).ok(),
            AttrValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_symbol(&self) -> Option<&str> {
        match self {
            AttrValue::Symbol(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[u64]> {
        match self {
            AttrValue::List(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_objects(&self) -> Option<&[StoreObject]> {
        match self {
            AttrValue::Objects(v) => Some(v),
            _ => None,
        }
    }
}

impl From<u64> for AttrValue {
    fn from(v: u64) -> Self {
        AttrValue::Uint(v)
    }
}

impl From<u32> for AttrValue {
    fn from(v: u32) -> Self {
        AttrValue::Uint(u64::from(v))
    }
}

impl From<i64> for AttrValue {
    fn from(v: i64) -> Self {
        AttrValue::Int(v)
    }
}

impl From<&str> for AttrValue {
    fn from(v: &str) -> Self {
        AttrValue::Symbol(v.to_string())
    }
}

impl From<Vec<u64>> for AttrValue {
    fn from(v: Vec<u64>) -> Self {
        AttrValue::List(v)
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Uint(v) => write!(f, "{}", v),
            AttrValue::Int(v) => write!(f, "{}", v),
            AttrValue::Symbol(s) => f.write_str(s),
            AttrValue::List(v) => write!(f, "{:?}", v),
            AttrValue::Objects(v) => write!(f, "<{} objects>", v.len()),
        }
    }
}

/// A value in the store's generic representation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreValue {
    /// Binary form of a scalar or enum code.
    Bytes(Vec<u8>),
    /// Binary form of each list element, in order.
    List(Vec<Vec<u8>>),
    /// Nested objects (map-table entries on a table read).
    Entries(Vec<StoreObject>),
}

/// An object instance as exchanged with the store.
///
/// Two instances of the same class with equal key attributes denote the
/// same remote entity. Responses may carry their key attributes in a nested
/// `key_data` object, which takes precedence on decode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreObject {
    class_path: String,
    attrs: BTreeMap<String, StoreValue>,
    key_data: Option<Box<StoreObject>>,
}

impl StoreObject {
    pub fn new(class_path: impl Into<String>) -> Self {
        Self {
            class_path: class_path.into(),
            attrs: BTreeMap::new(),
            key_data: None,
        }
    }

    /// Class path, e.g. `base-qos/scheduler-group`.
    pub fn class_path(&self) -> &str {
        &self.class_path
    }

    pub fn get(&self, path: &str) -> Option<&StoreValue> {
        self.attrs.get(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.attrs.contains_key(path)
    }

    pub fn insert(&mut self, path: impl Into<String>, value: StoreValue) -> Option<StoreValue> {
        self.attrs.insert(path.into(), value)
    }

    pub fn remove(&mut self, path: &str) -> Option<StoreValue> {
        self.attrs.remove(path)
    }

    /// Iterates over `(path, value)` pairs in path order.
    pub fn attrs(&self) -> impl Iterator<Item = (&str, &StoreValue)> {
        self.attrs.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.attrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty() && self.key_data.is_none()
    }

    pub fn key_data(&self) -> Option<&StoreObject> {
        self.key_data.as_deref()
    }

    pub fn set_key_data(&mut self, key_data: StoreObject) {
        self.key_data = Some(Box::new(key_data));
    }

    /// Looks a path up in `key_data` first, then in the object itself.
    pub fn lookup(&self, path: &str) -> Option<&StoreValue> {
        self.key_data()
            .and_then(|kd| kd.lookup(path))
            .or_else(|| self.get(path))
    }

    /// Overwrites this object's attributes with every attribute of `other`.
    pub fn merge_from(&mut self, other: &StoreObject) {
        for (path, value) in other.attrs() {
            self.attrs.insert(path.to_string(), value.clone());
        }
        if let Some(kd) = other.key_data() {
            self.merge_from(kd);
        }
    }
}
