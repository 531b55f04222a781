//! Codec error types.
//!
//! Every error raised here is a programmer or configuration error: the
//! schema and enum tables are static, so retrying the same encode/decode
//! call cannot succeed.

use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors raised while translating between native values and store values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// The attribute is not registered in the schema of its object class.
    #[error("Unknown attribute '{attr}' for object class {class}")]
    UnknownAttribute {
        /// Object class path (e.g. `base-qos/queue`).
        class: String,
        /// Attribute name as supplied by the caller.
        attr: String,
    },

    /// The enum key (prefix + symbol) has no entry in the enum table.
    #[error("Unknown enum symbol '{key}'")]
    UnknownEnumSymbol {
        /// Full enum key, e.g. `base-qos:queue-type:UCAST`.
        key: String,
    },

    /// A stored enum code has no symbol in its family.
    #[error("No symbol for code {code} in enum family '{family}'")]
    UnknownEnumCode {
        /// Enum family prefix.
        family: String,
        /// Integer code read from the store.
        code: u32,
    },

    /// The object path does not name a registered object class.
    #[error("Unknown object class '{path}'")]
    UnknownObjectClass {
        /// The unrecognised class path.
        path: String,
    },

    /// The native value does not fit the attribute kind.
    #[error("Type mismatch for '{attr}': expected {expected}")]
    TypeMismatch {
        /// Attribute name.
        attr: String,
        /// Description of the expected value shape.
        expected: &'static str,
    },

    /// The numeric value does not fit the declared storage type.
    #[error("Value {value} out of range for '{attr}' ({storage})")]
    ValueOutOfRange {
        /// Attribute name.
        attr: String,
        /// Offending value.
        value: i128,
        /// Declared storage type name.
        storage: &'static str,
    },

    /// Text could not be parsed for the attribute kind.
    #[error("Invalid value '{text}' for '{attr}'")]
    InvalidText {
        /// Attribute name.
        attr: String,
        /// The text that failed to parse.
        text: String,
    },

    /// A stored value does not have the shape its schema entry declares.
    #[error("Malformed store value at '{path}': {reason}")]
    MalformedValue {
        /// Storage path of the attribute.
        path: String,
        /// What was wrong with it.
        reason: String,
    },

    /// A map entry was built before its table was assigned an id.
    #[error("Map entry of {map} needs the map table to be created first")]
    MapTableNotCreated {
        /// Map type name.
        map: String,
    },

    /// More than one field of an authored entry carries the wildcard.
    #[error("Map entry of {map} has more than one wildcard field: {fields:?}")]
    MultipleWildcards {
        /// Map type name.
        map: String,
        /// Fields that carried the wildcard.
        fields: Vec<String>,
    },

    /// A wildcard was used but the table declares no range.
    #[error("Map {map} uses a wildcard in field '{field}' but declares no min/max range")]
    MissingWildcardRange {
        /// Map type name.
        map: String,
        /// Field carrying the wildcard.
        field: String,
    },

    /// A positional entry carries more values than the map type has fields.
    #[error("Map entry of {map} has {given} values, at most {max} allowed")]
    TooManyFields {
        /// Map type name.
        map: String,
        /// Number of values supplied.
        given: usize,
        /// Number of fields declared by the map type.
        max: usize,
    },

    /// An entry leaves out a field its operation needs.
    #[error("Map entry of {map} is missing field '{field}'")]
    MissingMapField {
        /// Map type name.
        map: String,
        /// First field not supplied.
        field: String,
    },

    /// The map type name is not one of the known map types.
    #[error("Unknown map type '{name}'")]
    UnknownMapType {
        /// The unrecognised name.
        name: String,
    },

    /// A named entry field is not declared by the map type.
    #[error("Field '{field}' is not part of {map}")]
    UnknownMapField {
        /// Map type name.
        map: String,
        /// The unrecognised field.
        field: String,
    },
}

impl CodecError {
    /// Creates an unknown attribute error.
    pub fn unknown_attribute(class: impl Into<String>, attr: impl Into<String>) -> Self {
        Self::UnknownAttribute {
            class: class.into(),
            attr: attr.into(),
        }
    }

    /// Creates a type mismatch error.
    pub fn type_mismatch(attr: impl Into<String>, expected: &'static str) -> Self {
        Self::TypeMismatch {
            attr: attr.into(),
            expected,
        }
    }

    /// Creates a malformed value error.
    pub fn malformed(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedValue {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Creates an invalid text error.
    pub fn invalid_text(attr: impl Into<String>, text: impl Into<String>) -> Self {
        Self::InvalidText {
            attr: attr.into(),
            text: text.into(),
        }
    }
}
