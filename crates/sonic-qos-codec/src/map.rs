//! Map-table types and entry expansion.
//!
//! A map table translates one or two key fields into one or more value
//! fields. Every map type has a static definition: its field order, how many
//! leading fields form the entry key, and whether it is a legacy type that
//! carries a `switch-id` key on both the table and its entries.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::codec::AttrCodec;
use crate::error::{CodecError, CodecResult};
use crate::record::AuthoredObject;
use crate::schema::ObjectClass;
use crate::types::{AttrValue, StoreObject};

/// Authored field value that expands to every integer of the table range.
pub const WILDCARD: &str = "all";

/// Static definition of a map type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapTypeDef {
    pub name: &'static str,
    pub key_arity: usize,
    pub fields: &'static [&'static str],
    pub legacy: bool,
}

static MAP_TYPE_DEFS: [MapTypeDef; 10] = [
    MapTypeDef { name: "dot1p-to-tc-map", key_arity: 1, fields: &["dot1p", "tc"], legacy: true },
    MapTypeDef { name: "dot1p-to-tc-color-map", key_arity: 1, fields: &["dot1p", "tc", "color"], legacy: true },
    MapTypeDef { name: "dscp-to-tc-map", key_arity: 1, fields: &["dscp", "tc"], legacy: true },
    MapTypeDef { name: "dscp-to-tc-color-map", key_arity: 1, fields: &["dscp", "tc", "color"], legacy: true },
    MapTypeDef { name: "tc-to-queue-map", key_arity: 2, fields: &["tc", "type", "queue-number"], legacy: true },
    MapTypeDef { name: "tc-color-to-dot1p-map", key_arity: 2, fields: &["tc", "color", "dot1p"], legacy: true },
    MapTypeDef { name: "tc-color-to-dscp-map", key_arity: 2, fields: &["tc", "color", "dscp"], legacy: true },
    MapTypeDef { name: "tc-to-priority-group-map", key_arity: 1, fields: &["tc", "priority-group"], legacy: false },
    MapTypeDef { name: "priority-group-to-pfc-priority-map", key_arity: 1, fields: &["priority-group", "pfc-priority"], legacy: false },
    MapTypeDef { name: "pfc-priority-to-queue-map", key_arity: 2, fields: &["pfc-priority", "type", "queue-number"], legacy: false },
];

/// The known map-table types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MapType {
    #[serde(rename = "dot1p-to-tc-map")]
    Dot1pToTc,
    #[serde(rename = "dot1p-to-tc-color-map")]
    Dot1pToTcColor,
    #[serde(rename = "dscp-to-tc-map")]
    DscpToTc,
    #[serde(rename = "dscp-to-tc-color-map")]
    DscpToTcColor,
    #[serde(rename = "tc-to-queue-map")]
    TcToQueue,
    #[serde(rename = "tc-color-to-dot1p-map")]
    TcColorToDot1p,
    #[serde(rename = "tc-color-to-dscp-map")]
    TcColorToDscp,
    #[serde(rename = "tc-to-priority-group-map")]
    TcToPriorityGroup,
    #[serde(rename = "priority-group-to-pfc-priority-map")]
    PriorityGroupToPfcPriority,
    #[serde(rename = "pfc-priority-to-queue-map")]
    PfcPriorityToQueue,
}

impl MapType {
    pub const ALL: [MapType; 10] = [
        MapType::Dot1pToTc,
        MapType::Dot1pToTcColor,
        MapType::DscpToTc,
        MapType::DscpToTcColor,
        MapType::TcToQueue,
        MapType::TcColorToDot1p,
        MapType::TcColorToDscp,
        MapType::TcToPriorityGroup,
        MapType::PriorityGroupToPfcPriority,
        MapType::PfcPriorityToQueue,
    ];

    pub fn def(&self) -> &'static MapTypeDef {
        &MAP_TYPE_DEFS[*self as usize]
    }

    pub fn name(&self) -> &'static str {
        self.def().name
    }

    /// All fields in declared order.
    pub fn fields(&self) -> &'static [&'static str] {
        self.def().fields
    }

    pub fn key_fields(&self) -> &'static [&'static str] {
        let def = self.def();
        &def.fields[..def.key_arity]
    }

    pub fn value_fields(&self) -> &'static [&'static str] {
        let def = self.def();
        &def.fields[def.key_arity..]
    }

    /// Legacy types carry a constant `switch-id` key.
    pub fn is_legacy(&self) -> bool {
        self.def().legacy
    }

    /// Whether the init run may create and bind tables of this type.
    /// The platform does not support the tc+color remarking maps.
    pub fn provisionable(&self) -> bool {
        !matches!(self, MapType::TcColorToDot1p | MapType::TcColorToDscp)
    }
}

impl fmt::Display for MapType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for MapType {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MapType::ALL
            .iter()
            .copied()
            .find(|t| t.name() == s)
            .ok_or_else(|| CodecError::UnknownMapType {
                name: s.to_string(),
            })
    }
}

/// A map entry as written by the configuration author.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthoredEntry {
    /// Values assigned to the map type's fields in declared order.
    Positional(Vec<String>),
    /// Values keyed by field name.
    Named(BTreeMap<String, String>),
}

impl AuthoredEntry {
    pub fn positional<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        AuthoredEntry::Positional(values.into_iter().map(Into::into).collect())
    }
}

/// Which fields an authored entry must supply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryArity {
    /// Every declared field; used when creating or modifying entries.
    Full,
    /// At least the key fields; value fields may be left out on delete.
    Keys,
}

impl EntryArity {
    fn required(self, map_type: MapType) -> &'static [&'static str] {
        match self {
            EntryArity::Full => map_type.fields(),
            EntryArity::Keys => map_type.key_fields(),
        }
    }
}

/// One codec-ready entry: `(field, text value)` pairs in declared field order.
pub type EntryFields = Vec<(&'static str, String)>;

/// Resolves an authored entry into codec-ready entries.
///
/// A field set to [`WILDCARD`] produces one entry per integer in `range`,
/// every other field held constant. At most one field may be a wildcard.
/// Every field `arity` requires must be supplied.
pub fn expand_entry(
    map_type: MapType,
    entry: &AuthoredEntry,
    range: Option<RangeInclusive<i64>>,
    arity: EntryArity,
) -> CodecResult<Vec<EntryFields>> {
    let fields = resolve_fields(map_type, entry)?;
    if let Some(missing) = arity
        .required(map_type)
        .iter()
        .find(|f| !fields.iter().any(|(given, _)| given == *f))
    {
        return Err(CodecError::MissingMapField {
            map: map_type.name().to_string(),
            field: missing.to_string(),
        });
    }

    let wildcards: Vec<usize> = fields
        .iter()
        .enumerate()
        .filter(|(_, (_, value))| value == WILDCARD)
        .map(|(idx, _)| idx)
        .collect();

    match wildcards.as_slice() {
        [] => Ok(vec![fields]),
        [idx] => {
            let range = range.ok_or_else(|| CodecError::MissingWildcardRange {
                map: map_type.name().to_string(),
                field: fields[*idx].0.to_string(),
            })?;
            Ok(range
                .map(|i| {
                    let mut expanded = fields.clone();
                    expanded[*idx].1 = i.to_string();
                    expanded
                })
                .collect())
        }
        many => Err(CodecError::MultipleWildcards {
            map: map_type.name().to_string(),
            fields: many.iter().map(|i| fields[*i].0.to_string()).collect(),
        }),
    }
}

fn resolve_fields(map_type: MapType, entry: &AuthoredEntry) -> CodecResult<EntryFields> {
    let declared = map_type.fields();
    match entry {
        AuthoredEntry::Positional(values) => {
            if values.len() > declared.len() {
                return Err(CodecError::TooManyFields {
                    map: map_type.name().to_string(),
                    given: values.len(),
                    max: declared.len(),
                });
            }
            Ok(declared
                .iter()
                .copied()
                .zip(values.iter().cloned())
                .collect())
        }
        AuthoredEntry::Named(values) => {
            if let Some(unknown) = values.keys().find(|k| !declared.contains(&k.as_str())) {
                return Err(CodecError::UnknownMapField {
                    map: map_type.name().to_string(),
                    field: unknown.clone(),
                });
            }
            Ok(declared
                .iter()
                .filter_map(|f| values.get(*f).map(|v| (*f, v.clone())))
                .collect())
        }
    }
}

/// One entry decoded from a map-table read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedEntry {
    pub map_id: Option<u64>,
    pub fields: Vec<(&'static str, AttrValue)>,
}

/// Builds the table and entry objects for one map table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapTableRef {
    pub map_type: MapType,
    pub switch_id: u32,
    pub map_id: Option<u64>,
}

impl MapTableRef {
    pub fn new(map_type: MapType, switch_id: u32) -> Self {
        Self {
            map_type,
            switch_id,
            map_id: None,
        }
    }

    pub fn with_id(mut self, map_id: u64) -> Self {
        self.map_id = Some(map_id);
        self
    }

    pub fn table_class(&self) -> ObjectClass {
        ObjectClass::MapTable(self.map_type)
    }

    pub fn entry_class(&self) -> ObjectClass {
        ObjectClass::MapEntry(self.map_type)
    }

    /// The table object; carries `id` once the table exists.
    pub fn table_object(&self, codec: AttrCodec) -> CodecResult<StoreObject> {
        let mut table = AuthoredObject::new(codec, self.table_class());
        if self.map_type.is_legacy() {
            table.set("switch-id", self.switch_id)?;
        }
        if let Some(id) = self.map_id {
            table.set("id", id)?;
        }
        Ok(table.into_data())
    }

    /// An entry object keyed by the table id.
    pub fn entry_object(&self, codec: AttrCodec, fields: &EntryFields) -> CodecResult<StoreObject> {
        let map_id = self.map_id.ok_or_else(|| CodecError::MapTableNotCreated {
            map: self.map_type.name().to_string(),
        })?;

        let mut entry = AuthoredObject::new(codec, self.entry_class());
        if self.map_type.is_legacy() {
            entry.set("switch-id", self.switch_id)?;
        }
        entry.set("id", map_id)?;
        for (field, text) in fields {
            entry.set_text(field, text)?;
        }
        Ok(entry.into_data())
    }

    /// Expands an authored entry and builds every resulting entry object.
    pub fn entry_objects(
        &self,
        codec: AttrCodec,
        entry: &AuthoredEntry,
        range: Option<RangeInclusive<i64>>,
        arity: EntryArity,
    ) -> CodecResult<Vec<StoreObject>> {
        expand_entry(self.map_type, entry, range, arity)?
            .iter()
            .map(|fields| self.entry_object(codec, fields))
            .collect()
    }

    /// Decodes the `entry` collection of a table read.
    pub fn decode_entries(&self, codec: AttrCodec, table: &StoreObject) -> CodecResult<Vec<DecodedEntry>> {
        let entries = match codec.decode(self.table_class(), "entry", table)? {
            Some(AttrValue::Objects(objects)) => objects,
            Some(_) => return Err(CodecError::type_mismatch("entry", "object collection")),
            None => return Ok(Vec::new()),
        };

        let class = self.entry_class();
        entries
            .iter()
            .map(|obj| {
                let map_id = codec.decode_u64(class, "id", obj)?;
                let mut fields = Vec::new();
                for field in self.map_type.fields() {
                    if let Some(value) = codec.decode(class, field, obj)? {
                        fields.push((*field, value));
                    }
                }
                Ok(DecodedEntry { map_id, fields })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StoreValue;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defs_indexed_by_variant() {
        for t in MapType::ALL {
            assert_eq!(t.name().parse::<MapType>().unwrap(), t);
            assert_eq!(t.key_fields().len() + t.value_fields().len(), t.fields().len());
            assert!(!t.value_fields().is_empty(), "{}", t);
        }
        assert!("dot1p-to-dscp-map".parse::<MapType>().is_err());
    }

    #[test]
    fn test_legacy_set() {
        let legacy: Vec<_> = MapType::ALL.iter().filter(|t| t.is_legacy()).collect();
        assert_eq!(legacy.len(), 7);
        assert!(!MapType::TcToPriorityGroup.is_legacy());
        assert!(!MapType::TcColorToDscp.provisionable());
        assert!(MapType::TcToQueue.provisionable());
    }

    #[test]
    fn test_positional_assignment() {
        let entry = AuthoredEntry::positional(["3", "UCAST", "5"]);
        let expanded = expand_entry(MapType::TcToQueue, &entry, None, EntryArity::Full).unwrap();
        assert_eq!(
            expanded,
            vec![vec![
                ("tc", "3".to_string()),
                ("type", "UCAST".to_string()),
                ("queue-number", "5".to_string()),
            ]]
        );
    }

    #[test]
    fn test_named_form_in_declared_order() {
        let mut named = BTreeMap::new();
        named.insert("tc".to_string(), "2".to_string());
        named.insert("dscp".to_string(), "10".to_string());
        let expanded = expand_entry(MapType::DscpToTc, &AuthoredEntry::Named(named), None, EntryArity::Full).unwrap();
        assert_eq!(
            expanded,
            vec![vec![("dscp", "10".to_string()), ("tc", "2".to_string())]]
        );
    }

    #[test]
    fn test_named_unknown_field() {
        let mut named = BTreeMap::new();
        named.insert("colour".to_string(), "RED".to_string());
        let err = expand_entry(MapType::DscpToTcColor, &AuthoredEntry::Named(named), None, EntryArity::Full).unwrap_err();
        assert!(matches!(err, CodecError::UnknownMapField { .. }));
    }

    #[test]
    fn test_too_many_positional() {
        let entry = AuthoredEntry::positional(["1", "2", "3"]);
        let err = expand_entry(MapType::Dot1pToTc, &entry, None, EntryArity::Full).unwrap_err();
        assert!(matches!(err, CodecError::TooManyFields { given: 3, max: 2, .. }));
    }

    #[test]
    fn test_short_entry_arity() {
        let short = AuthoredEntry::positional(["0"]);
        let err = expand_entry(MapType::Dot1pToTc, &short, None, EntryArity::Full).unwrap_err();
        assert_eq!(
            err,
            CodecError::MissingMapField {
                map: "dot1p-to-tc-map".to_string(),
                field: "tc".to_string(),
            }
        );
        let keys = expand_entry(MapType::Dot1pToTc, &short, None, EntryArity::Keys).unwrap();
        assert_eq!(keys, vec![vec![("dot1p", "0".to_string())]]);

        // Two-field keys still need both key fields on delete.
        let err = expand_entry(MapType::TcToQueue, &short, None, EntryArity::Keys).unwrap_err();
        assert!(matches!(err, CodecError::MissingMapField { ref field, .. } if field == "type"));

        let mut named = BTreeMap::new();
        named.insert("dscp".to_string(), "4".to_string());
        let err = expand_entry(MapType::DscpToTc, &AuthoredEntry::Named(named), None, EntryArity::Full)
            .unwrap_err();
        assert!(matches!(err, CodecError::MissingMapField { ref field, .. } if field == "tc"));
    }

    #[test]
    fn test_wildcard_cardinality() {
        let entry = AuthoredEntry::positional(["all", "4"]);
        for (min, max) in [(0i64, 7i64), (3, 3), (10, 63)] {
            let expanded = expand_entry(MapType::DscpToTc, &entry, Some(min..=max), EntryArity::Full).unwrap();
            assert_eq!(expanded.len() as i64, max - min + 1);
            for (i, fields) in expanded.iter().enumerate() {
                assert_eq!(fields[0], ("dscp", (min + i as i64).to_string()));
                assert_eq!(fields[1], ("tc", "4".to_string()));
            }
        }
    }

    #[test]
    fn test_wildcard_rules() {
        let entry = AuthoredEntry::positional(["all", "all"]);
        let err = expand_entry(MapType::Dot1pToTc, &entry, Some(0..=7), EntryArity::Full).unwrap_err();
        assert_eq!(
            err,
            CodecError::MultipleWildcards {
                map: "dot1p-to-tc-map".to_string(),
                fields: vec!["dot1p".to_string(), "tc".to_string()],
            }
        );

        let entry = AuthoredEntry::positional(["all", "0"]);
        let err = expand_entry(MapType::Dot1pToTc, &entry, None, EntryArity::Full).unwrap_err();
        assert!(matches!(err, CodecError::MissingWildcardRange { .. }));
    }

    #[test]
    fn test_legacy_switch_id_injection() {
        let codec = AttrCodec::new();
        for t in MapType::ALL {
            let table = MapTableRef::new(t, 3).with_id(100);
            let table_path = format!("base-qos/{}/switch-id", t.name());

            let obj = table.table_object(codec).unwrap();
            assert_eq!(obj.contains(&table_path), t.is_legacy(), "{}", t);

            let fields: EntryFields = t
                .key_fields()
                .iter()
                .map(|f| {
                    let value = match *f {
                        "type" => "UCAST",
                        "color" => "GREEN",
                        _ => "1",
                    };
                    (*f, value.to_string())
                })
                .collect();
            let entry = table.entry_object(codec, &fields).unwrap();
            assert_eq!(entry.contains(&table_path), t.is_legacy(), "{}", t);
            if t.is_legacy() {
                assert_eq!(entry.get(&table_path), Some(&StoreValue::Bytes(vec![3, 0, 0, 0])));
            }
        }
    }

    #[test]
    fn test_entry_needs_table_id() {
        let codec = AttrCodec::new();
        let table = MapTableRef::new(MapType::Dot1pToTc, 0);
        let err = table
            .entry_object(codec, &vec![("dot1p", "0".to_string()), ("tc", "0".to_string())])
            .unwrap_err();
        assert!(matches!(err, CodecError::MapTableNotCreated { .. }));
    }

    #[test]
    fn test_decode_entries() {
        let codec = AttrCodec::new();
        let table = MapTableRef::new(MapType::Dot1pToTc, 0).with_id(9);
        let entries = table
            .entry_objects(codec, &AuthoredEntry::positional(["all", "2"]), Some(0..=1), EntryArity::Full)
            .unwrap();

        let mut response = table.table_object(codec).unwrap();
        codec
            .set(&mut response, table.table_class(), "entry", &AttrValue::Objects(entries))
            .unwrap();

        let decoded = table.decode_entries(codec, &response).unwrap();
        assert_eq!(
            decoded,
            vec![
                DecodedEntry {
                    map_id: Some(9),
                    fields: vec![("dot1p", AttrValue::Uint(0)), ("tc", AttrValue::Uint(2))],
                },
                DecodedEntry {
                    map_id: Some(9),
                    fields: vec![("dot1p", AttrValue::Uint(1)), ("tc", AttrValue::Uint(2))],
                },
            ]
        );
    }

    #[test]
    fn test_decode_signed_entries_match_parsed() {
        let codec = AttrCodec::new();
        let table = MapTableRef::new(MapType::TcToPriorityGroup, 0).with_id(4);
        let entries = table
            .entry_objects(codec, &AuthoredEntry::positional(["5", "3"]), None, EntryArity::Full)
            .unwrap();

        let mut response = table.table_object(codec).unwrap();
        codec
            .set(&mut response, table.table_class(), "entry", &AttrValue::Objects(entries))
            .unwrap();

        let decoded = table.decode_entries(codec, &response).unwrap();
        let parsed = codec
            .parse_text(table.entry_class(), "priority-group", "3")
            .unwrap();
        assert_eq!(decoded[0].fields[1], ("priority-group", parsed));
    }
}
