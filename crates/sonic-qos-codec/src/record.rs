//! Authored objects and response views.
//!
//! An object is either authored from schema-checked attributes or is a
//! passthrough view over a store response, never both. [`Record`] makes the
//! distinction explicit and provides the conversions between the two.

use crate::codec::AttrCodec;
use crate::error::{CodecError, CodecResult};
use crate::schema::ObjectClass;
use crate::types::{AttrValue, StoreObject};

/// An object built attribute by attribute through the codec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthoredObject {
    class: ObjectClass,
    codec: AttrCodec,
    data: StoreObject,
}

impl AuthoredObject {
    pub fn new(codec: AttrCodec, class: ObjectClass) -> Self {
        Self {
            class,
            codec,
            data: StoreObject::new(class.path()),
        }
    }

    pub fn class(&self) -> ObjectClass {
        self.class
    }

    /// Encodes and stores one attribute, replacing any previous value.
    pub fn set(&mut self, attr: &str, value: impl Into<AttrValue>) -> CodecResult<&mut Self> {
        self.codec.set(&mut self.data, self.class, attr, &value.into())?;
        Ok(self)
    }

    /// Parses configuration text for `attr` and stores it.
    pub fn set_text(&mut self, attr: &str, text: &str) -> CodecResult<&mut Self> {
        let encoded = self.codec.encode_text(self.class, attr, text)?;
        self.data.insert(self.class.attr_path(attr)?, encoded);
        Ok(self)
    }

    /// Appends one element to a list attribute.
    pub fn push_list(&mut self, attr: &str, item: u64) -> CodecResult<&mut Self> {
        let mut items = match self.get(attr)? {
            Some(AttrValue::List(items)) => items,
            Some(_) => return Err(CodecError::type_mismatch(attr, "integer list")),
            None => Vec::new(),
        };
        items.push(item);
        self.set(attr, AttrValue::List(items))
    }

    pub fn get(&self, attr: &str) -> CodecResult<Option<AttrValue>> {
        self.codec.decode(self.class, attr, &self.data)
    }

    pub fn data(&self) -> &StoreObject {
        &self.data
    }

    pub fn into_data(self) -> StoreObject {
        self.data
    }
}

/// An object instance handled by the provisioner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    /// Built from schema-checked attributes.
    Authored(AuthoredObject),
    /// Wraps a raw store response as-is.
    View {
        class: ObjectClass,
        codec: AttrCodec,
        data: StoreObject,
    },
}

impl Record {
    /// Starts a new authored record.
    pub fn author(codec: AttrCodec, class: ObjectClass) -> Self {
        Record::Authored(AuthoredObject::new(codec, class))
    }

    /// Wraps a store response, deriving its class from the response path.
    pub fn wrap(codec: AttrCodec, data: StoreObject) -> CodecResult<Self> {
        let class = ObjectClass::from_path(data.class_path())?;
        Ok(Record::View { class, codec, data })
    }

    pub fn class(&self) -> ObjectClass {
        match self {
            Record::Authored(obj) => obj.class(),
            Record::View { class, .. } => *class,
        }
    }

    /// The underlying object instance.
    pub fn data(&self) -> &StoreObject {
        match self {
            Record::Authored(obj) => obj.data(),
            Record::View { data, .. } => data,
        }
    }

    pub fn is_view(&self) -> bool {
        matches!(self, Record::View { .. })
    }

    pub fn attr(&self, attr: &str) -> CodecResult<Option<AttrValue>> {
        match self {
            Record::Authored(obj) => obj.get(attr),
            Record::View { class, codec, data } => codec.decode(*class, attr, data),
        }
    }

    /// Reads the store-assigned `id`, if the record carries one.
    pub fn extract_id(&self) -> CodecResult<Option<u64>> {
        match self {
            Record::Authored(obj) => obj.codec.decode_u64(obj.class, "id", obj.data()),
            Record::View { class, codec, data } => codec.decode_u64(*class, "id", data),
        }
    }

    /// Turns a view into an authored object seeded with the response's
    /// attributes. Authored records are returned unchanged.
    pub fn into_authored(self) -> AuthoredObject {
        match self {
            Record::Authored(obj) => obj,
            Record::View { class, codec, data } => {
                let mut authored = AuthoredObject::new(codec, class);
                authored.data.merge_from(&data);
                authored
            }
        }
    }

    /// Freezes an authored record into a view.
    pub fn into_view(self) -> Self {
        match self {
            Record::Authored(obj) => Record::View {
                class: obj.class,
                codec: obj.codec,
                data: obj.data,
            },
            view => view,
        }
    }

    pub fn into_data(self) -> StoreObject {
        match self {
            Record::Authored(obj) => obj.into_data(),
            Record::View { data, .. } => data,
        }
    }
}
