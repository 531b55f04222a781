//! Attribute codec.
//!
//! Translates native [`AttrValue`]s into the store's generic binary form and
//! back, driven entirely by the class schema and the enum table. Binary
//! forms are fixed-width little-endian per storage type; enum members are
//! stored as their `uint32_t` code.

use byteorder::{ByteOrder, LittleEndian};

use crate::enums::EnumTable;
use crate::error::{CodecError, CodecResult};
use crate::schema::ObjectClass;
use crate::types::{AttrKind, AttrValue, StorageType, StoreObject, StoreValue};

/// Schema-checked translation between native values and store values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AttrCodec {
    enums: EnumTable,
}

impl AttrCodec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enums(&self) -> &EnumTable {
        &self.enums
    }

    /// Encodes `value` for `attr` of `class`.
    ///
    /// Scalars accept either integer variant as long as the value fits the
    /// storage; decoding always yields the variant matching its signedness.
    pub fn encode(
        &self,
        class: ObjectClass,
        attr: &str,
        value: &AttrValue,
    ) -> CodecResult<StoreValue> {
        let spec = class.spec(attr)?;
        match spec.kind {
            AttrKind::Scalar => {
                let n = numeric(attr, value)?;
                Ok(StoreValue::Bytes(write_number(attr, spec.storage, n)?))
            }
            AttrKind::Enum { prefix } => {
                let symbol = value
                    .as_symbol()
                    .ok_or_else(|| CodecError::type_mismatch(attr, "enum symbol"))?;
                let code = self.enums.encode(prefix, symbol)?;
                Ok(StoreValue::Bytes(write_number(
                    attr,
                    spec.storage,
                    i128::from(code),
                )?))
            }
            AttrKind::List => {
                let items = value
                    .as_list()
                    .ok_or_else(|| CodecError::type_mismatch(attr, "integer list"))?;
                let encoded = items
                    .iter()
                    .map(|v| write_number(attr, spec.storage, i128::from(*v)))
                    .collect::<CodecResult<Vec<_>>>()?;
                Ok(StoreValue::List(encoded))
            }
            AttrKind::Entries => {
                let objects = value
                    .as_objects()
                    .ok_or_else(|| CodecError::type_mismatch(attr, "object collection"))?;
                Ok(StoreValue::Entries(objects.to_vec()))
            }
        }
    }

    /// Parses configuration text into a native value for `attr`.
    ///
    /// Scalars accept decimal integers, enums take the bare symbol and lists
    /// are comma separated.
    pub fn parse_text(&self, class: ObjectClass, attr: &str, text: &str) -> CodecResult<AttrValue> {
        let spec = class.spec(attr)?;
        let text = text.trim();
        match spec.kind {
            AttrKind::Scalar => parse_number(attr, spec.storage, text),
            AttrKind::Enum { .. } => {
                if text.is_empty() {
                    return Err(CodecError::invalid_text(attr, text));
                }
                Ok(AttrValue::Symbol(text.to_string()))
            }
            AttrKind::List => {
                if text.is_empty() {
                    return Ok(AttrValue::List(Vec::new()));
                }
                text.split(',')
                    .map(|item| {
                        item.trim()
                            .parse::<u64>()
                            .map_err(|_| CodecError::invalid_text(attr, text))
                    })
                    .collect::<CodecResult<Vec<_>>>()
                    .map(AttrValue::List)
            }
            AttrKind::Entries => Err(CodecError::type_mismatch(attr, "object collection")),
        }
    }

    /// Parses and encodes configuration text in one step.
    pub fn encode_text(&self, class: ObjectClass, attr: &str, text: &str) -> CodecResult<StoreValue> {
        let value = self.parse_text(class, attr, text)?;
        self.encode(class, attr, &value)
    }

    /// Decodes `attr` from `obj`.
    ///
    /// A nested `key_data` object is consulted before the object itself.
    /// Returns `Ok(None)` when the attribute is not present.
    pub fn decode(
        &self,
        class: ObjectClass,
        attr: &str,
        obj: &StoreObject,
    ) -> CodecResult<Option<AttrValue>> {
        let path = class.attr_path(attr)?;
        match obj.lookup(&path) {
            Some(value) => self.decode_value(class, attr, value).map(Some),
            None => Ok(None),
        }
    }

    /// Decodes one raw store value for `attr`.
    pub fn decode_value(
        &self,
        class: ObjectClass,
        attr: &str,
        value: &StoreValue,
    ) -> CodecResult<AttrValue> {
        let spec = class.spec(attr)?;
        let path = || class.attr_path(attr).unwrap_or_else(|_| attr.to_string());
        match (spec.kind, value) {
            (AttrKind::Scalar, StoreValue::Bytes(bytes)) => {
                read_number(bytes, spec.storage).ok_or_else(|| width_error(path(), spec.storage, bytes))
            }
            (AttrKind::Enum { prefix }, StoreValue::Bytes(bytes)) => {
                let code = read_number(bytes, spec.storage)
                    .and_then(|v| v.as_u64())
                    .and_then(|v| u32::try_from(v).ok())
                    .ok_or_else(|| width_error(path(), spec.storage, bytes))?;
                let symbol = self.enums.symbol(prefix, code)?;
                Ok(AttrValue::Symbol(symbol.to_string()))
            }
            (AttrKind::List, StoreValue::List(items)) => items
                .iter()
                .map(|bytes| {
                    read_number(bytes, spec.storage)
                        .and_then(|v| v.as_u64())
                        .ok_or_else(|| width_error(path(), spec.storage, bytes))
                })
                .collect::<CodecResult<Vec<_>>>()
                .map(AttrValue::List),
            (AttrKind::Entries, StoreValue::Entries(objects)) => Ok(AttrValue::Objects(objects.clone())),
            (kind, _) => Err(CodecError::malformed(
                path(),
                format!("value shape does not match {:?}", kind),
            )),
        }
    }

    /// Encodes `value` and stores it in `obj` under the attribute's path.
    pub fn set(
        &self,
        obj: &mut StoreObject,
        class: ObjectClass,
        attr: &str,
        value: &AttrValue,
    ) -> CodecResult<()> {
        let encoded = self.encode(class, attr, value)?;
        obj.insert(class.attr_path(attr)?, encoded);
        Ok(())
    }

    /// Builds a fresh object of `class` carrying the given attributes.
    pub fn build(&self, class: ObjectClass, attrs: &[(&str, AttrValue)]) -> CodecResult<StoreObject> {
        let mut obj = StoreObject::new(class.path());
        for (attr, value) in attrs {
            self.set(&mut obj, class, attr, value)?;
        }
        Ok(obj)
    }

    /// Decodes an unsigned attribute, treating absence as `None`.
    pub fn decode_u64(&self, class: ObjectClass, attr: &str, obj: &StoreObject) -> CodecResult<Option<u64>> {
        match self.decode(class, attr, obj)? {
            Some(value) => value
                .as_u64()
                .map(Some)
                .ok_or_else(|| CodecError::type_mismatch(attr, "unsigned integer")),
            None => Ok(None),
        }
    }
}

fn numeric(attr: &str, value: &AttrValue) -> CodecResult<i128> {
    match value {
        AttrValue::Uint(v) => Ok(i128::from(*v)),
        AttrValue::Int(v) => Ok(i128::from(*v)),
        _ => Err(CodecError::type_mismatch(attr, "integer")),
    }
}

fn write_number(attr: &str, storage: StorageType, n: i128) -> CodecResult<Vec<u8>> {
    let (min, max) = storage.range();
    if n < min || n > max {
        return Err(CodecError::ValueOutOfRange {
            attr: attr.to_string(),
            value: n,
            storage: storage.name(),
        });
    }

    let mut buf = vec![0u8; storage.width()];
    if storage.is_signed() {
        LittleEndian::write_int(&mut buf, n as i64, storage.width());
    } else {
        LittleEndian::write_uint(&mut buf, n as u64, storage.width());
    }
    Ok(buf)
}

fn read_number(bytes: &[u8], storage: StorageType) -> Option<AttrValue> {
    if bytes.len() != storage.width() {
        return None;
    }
    let value = if storage.is_signed() {
        AttrValue::Int(LittleEndian::read_int(bytes, storage.width()))
    } else {
        AttrValue::Uint(LittleEndian::read_uint(bytes, storage.width()))
    };
    Some(value)
}

fn parse_number(attr: &str, storage: StorageType, text: &str) -> CodecResult<AttrValue> {
    let parsed: i128 = text
        .parse()
        .map_err(|_| CodecError::invalid_text(attr, text))?;
    let (min, max) = storage.range();
    if parsed < min || parsed > max {
        return Err(CodecError::ValueOutOfRange {
            attr: attr.to_string(),
            value: parsed,
            storage: storage.name(),
        });
    }
    Ok(number_value(storage, parsed))
}

/// The canonical native form for a number held in `storage`: `Int` for
/// signed storage, `Uint` otherwise. `n` must already be within range.
fn number_value(storage: StorageType, n: i128) -> AttrValue {
    if storage.is_signed() {
        AttrValue::Int(n as i64)
    } else {
        AttrValue::Uint(n as u64)
    }
}

fn width_error(path: String, storage: StorageType, bytes: &[u8]) -> CodecError {
    CodecError::malformed(
        path,
        format!("expected {} bytes for {}, got {}", storage.width(), storage, bytes.len()),
    )
}
