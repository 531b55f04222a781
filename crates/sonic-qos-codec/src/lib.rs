//! Schema-driven attribute codec for SONiC QoS objects.
//!
//! This crate converts between native typed values (integers, symbolic
//! enums, ordered lists) and the generic key/value representation used by
//! the QoS object store:
//!
//! - [`schema`]: per-class attribute tables and storage paths
//! - [`enums`]: the global `base-qos` enum table
//! - [`codec`]: encode/decode of single attributes
//! - [`record`]: authored objects vs. response views
//! - [`map`]: map-table types, entry expansion and legacy `switch-id` keys
//!
//! The crate performs no I/O.

pub mod codec;
pub mod enums;
pub mod error;
pub mod map;
pub mod record;
pub mod schema;
pub mod types;

pub use codec::AttrCodec;
pub use enums::EnumTable;
pub use error::{CodecError, CodecResult};
pub use map::{expand_entry, AuthoredEntry, DecodedEntry, EntryArity, EntryFields, MapTableRef, MapType, WILDCARD};
pub use record::{AuthoredObject, Record};
pub use schema::{ObjectClass, Schema};
pub use types::{AttrKind, AttrSpec, AttrValue, Scope, StorageType, StoreObject, StoreValue};
