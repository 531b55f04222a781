//! Per-class schema tables.
//!
//! Each object class owns an ordered table mapping attribute names to their
//! [`AttrSpec`]. Storage paths are `base-qos/<class>/<attr>`; attributes with
//! [`Scope::Parent`] live under the parent class path instead (map entries
//! carry their table's `switch-id` and `id`).

use std::fmt;

use crate::enums;
use crate::error::{CodecError, CodecResult};
use crate::map::MapType;
use crate::types::{AttrSpec, Scope, StorageType};

/// Namespace every QoS class path starts with.
pub const ROOT: &str = "base-qos";

const U8: StorageType = StorageType::U8;
const I8: StorageType = StorageType::I8;
const U32: StorageType = StorageType::U32;
const U64: StorageType = StorageType::U64;

static SCHEDULER_GROUP: &[(&str, AttrSpec)] = &[
    ("switch-id", AttrSpec::scalar(U32)),
    ("id", AttrSpec::scalar(U64)),
    ("port-id", AttrSpec::scalar(U32)),
    ("level", AttrSpec::scalar(U32)),
    ("scheduler-profile-id", AttrSpec::scalar(U64)),
    ("child_count", AttrSpec::scalar(U32)),
    ("child-list", AttrSpec::list(U64)),
];

static SCHEDULER_PROFILE: &[(&str, AttrSpec)] = &[
    ("switch-id", AttrSpec::scalar(U32)),
    ("id", AttrSpec::scalar(U64)),
    ("algorithm", AttrSpec::enumeration(enums::SCHEDULING_TYPE)),
    ("weight", AttrSpec::scalar(U32)),
    ("meter-type", AttrSpec::enumeration(enums::METER_TYPE)),
    ("min-rate", AttrSpec::scalar(U64)),
    ("min-burst", AttrSpec::scalar(U64)),
    ("max-rate", AttrSpec::scalar(U64)),
    ("max-burst", AttrSpec::scalar(U64)),
    ("npu-id-list", AttrSpec::list(U32)),
];

static QUEUE: &[(&str, AttrSpec)] = &[
    ("switch-id", AttrSpec::scalar(U32)),
    ("port-id", AttrSpec::scalar(U32)),
    ("type", AttrSpec::enumeration(enums::QUEUE_TYPE)),
    ("queue-number", AttrSpec::scalar(U32)),
    ("id", AttrSpec::scalar(U64)),
    ("wred-id", AttrSpec::scalar(U64)),
    ("buffer-profile-id", AttrSpec::scalar(U64)),
    ("scheduler-profile-id", AttrSpec::scalar(U64)),
];

static PORT_INGRESS: &[(&str, AttrSpec)] = &[
    ("switch-id", AttrSpec::scalar(U32)),
    ("port-id", AttrSpec::scalar(U32)),
    ("default-traffic-class", AttrSpec::scalar(U8)),
    ("dot1p-to-tc-map", AttrSpec::scalar(U64)),
    ("dot1p-to-color-map", AttrSpec::scalar(U64)),
    ("dot1p-to-tc-color-map", AttrSpec::scalar(U64)),
    ("dscp-to-tc-map", AttrSpec::scalar(U64)),
    ("dscp-to-color-map", AttrSpec::scalar(U64)),
    ("dscp-to-tc-color-map", AttrSpec::scalar(U64)),
    ("tc-to-queue-map", AttrSpec::scalar(U64)),
    ("flow-control", AttrSpec::enumeration(enums::FLOW_CONTROL)),
    ("policer_id", AttrSpec::scalar(U64)),
    ("flood_storm_control", AttrSpec::scalar(U64)),
    ("broadcast_storm_control", AttrSpec::scalar(U64)),
    ("multicast_storm_control", AttrSpec::scalar(U64)),
    ("priority_group_number", AttrSpec::scalar(U32)),
    ("priority_group_id_list", AttrSpec::list(U64)),
    ("per_priority_flow_control", AttrSpec::scalar(U8)),
    ("tc-to-priority-group-map", AttrSpec::scalar(U64)),
    ("priority-group-to-pfc-priority-map", AttrSpec::scalar(U64)),
];

static PORT_EGRESS: &[(&str, AttrSpec)] = &[
    ("switch-id", AttrSpec::scalar(U32)),
    ("port-id", AttrSpec::scalar(U32)),
    ("buffer-limit", AttrSpec::scalar(U64)),
    ("drop-type", AttrSpec::enumeration(enums::PACKET_DROP_TYPE)),
    ("wred-profile-id", AttrSpec::scalar(U64)),
    ("scheduler-profile-id", AttrSpec::scalar(U64)),
    ("num-unicast-queue", AttrSpec::scalar(U8)),
    ("num-multicast-queue", AttrSpec::scalar(U8)),
    ("num-queue", AttrSpec::scalar(U8)),
    ("tc-to-queue-map", AttrSpec::scalar(U64)),
    ("tc-to-dot1p-map", AttrSpec::scalar(U64)),
    ("tc-to-dscp-map", AttrSpec::scalar(U64)),
    ("tc-color-to-dot1p-map", AttrSpec::scalar(U64)),
    ("tc-color-to-dscp-map", AttrSpec::scalar(U64)),
    ("pfc-priority-to-queue-map", AttrSpec::scalar(U64)),
];

static MAP_TABLE: &[(&str, AttrSpec)] = &[
    ("switch-id", AttrSpec::scalar(U32)),
    ("id", AttrSpec::scalar(U64)),
    ("entry", AttrSpec::entries()),
];

static MAP_ENTRY: &[(&str, AttrSpec)] = &[
    ("switch-id", AttrSpec::scalar(U32).in_parent()),
    ("id", AttrSpec::scalar(U64).in_parent()),
    ("dot1p", AttrSpec::scalar(U8)),
    ("tc", AttrSpec::scalar(U8)),
    ("dscp", AttrSpec::scalar(U8)),
    ("color", AttrSpec::enumeration(enums::PACKET_COLOR)),
    ("queue-number", AttrSpec::scalar(U32)),
    ("type", AttrSpec::enumeration(enums::QUEUE_TYPE)),
    ("priority-group", AttrSpec::scalar(I8)),
    ("pfc-priority", AttrSpec::scalar(U8)),
];

/// An ordered attribute table for one object class.
#[derive(Debug, Clone, Copy)]
pub struct Schema {
    attrs: &'static [(&'static str, AttrSpec)],
}

impl Schema {
    pub fn get(&self, name: &str) -> Option<&'static AttrSpec> {
        self.attrs.iter().find(|(n, _)| *n == name).map(|(_, s)| s)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Attributes in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &'static AttrSpec)> {
        self.attrs.iter().map(|(n, s)| (*n, s))
    }

    pub fn len(&self) -> usize {
        self.attrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty()
    }
}

/// Object classes known to the codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ObjectClass {
    SchedulerGroup,
    SchedulerProfile,
    Queue,
    PortIngress,
    PortEgress,
    MapTable(MapType),
    MapEntry(MapType),
}

impl ObjectClass {
    /// Class name relative to [`ROOT`].
    pub fn yang_name(&self) -> String {
        match self {
            ObjectClass::SchedulerGroup => "scheduler-group".to_string(),
            ObjectClass::SchedulerProfile => "scheduler-profile".to_string(),
            ObjectClass::Queue => "queue".to_string(),
            ObjectClass::PortIngress => "port-ingress".to_string(),
            ObjectClass::PortEgress => "port-egress".to_string(),
            ObjectClass::MapTable(t) => t.name().to_string(),
            ObjectClass::MapEntry(t) => format!("{}/entry", t.name()),
        }
    }

    /// Full class path, e.g. `base-qos/dot1p-to-tc-map/entry`.
    pub fn path(&self) -> String {
        format!("{}/{}", ROOT, self.yang_name())
    }

    /// Parses a full class path back into a class.
    pub fn from_path(path: &str) -> CodecResult<Self> {
        let unknown = || CodecError::UnknownObjectClass {
            path: path.to_string(),
        };
        let rel = path
            .strip_prefix(ROOT)
            .and_then(|p| p.strip_prefix('/'))
            .ok_or_else(unknown)?;

        let class = match rel {
            "scheduler-group" => ObjectClass::SchedulerGroup,
            "scheduler-profile" => ObjectClass::SchedulerProfile,
            "queue" => ObjectClass::Queue,
            "port-ingress" => ObjectClass::PortIngress,
            "port-egress" => ObjectClass::PortEgress,
            other => match other.strip_suffix("/entry") {
                Some(table) => ObjectClass::MapEntry(table.parse().map_err(|_| unknown())?),
                None => ObjectClass::MapTable(other.parse().map_err(|_| unknown())?),
            },
        };
        Ok(class)
    }

    pub fn parent(&self) -> Option<ObjectClass> {
        match self {
            ObjectClass::MapEntry(t) => Some(ObjectClass::MapTable(*t)),
            _ => None,
        }
    }

    pub fn schema(&self) -> Schema {
        let attrs = match self {
            ObjectClass::SchedulerGroup => SCHEDULER_GROUP,
            ObjectClass::SchedulerProfile => SCHEDULER_PROFILE,
            ObjectClass::Queue => QUEUE,
            ObjectClass::PortIngress => PORT_INGRESS,
            ObjectClass::PortEgress => PORT_EGRESS,
            ObjectClass::MapTable(_) => MAP_TABLE,
            ObjectClass::MapEntry(_) => MAP_ENTRY,
        };
        Schema { attrs }
    }

    /// Attributes that identify one remote instance of this class.
    pub fn key_attrs(&self) -> Vec<&'static str> {
        match self {
            ObjectClass::SchedulerGroup
            | ObjectClass::SchedulerProfile
            | ObjectClass::MapTable(_) => vec!["id"],
            ObjectClass::Queue => vec!["port-id", "type", "queue-number"],
            ObjectClass::PortIngress | ObjectClass::PortEgress => vec!["port-id"],
            ObjectClass::MapEntry(t) => {
                let mut keys = vec!["id"];
                keys.extend_from_slice(t.key_fields());
                keys
            }
        }
    }

    /// Looks up the schema entry for `attr`.
    pub fn spec(&self, attr: &str) -> CodecResult<&'static AttrSpec> {
        self.schema()
            .get(attr)
            .ok_or_else(|| CodecError::unknown_attribute(self.path(), attr))
    }

    /// Storage path of `attr`, honouring its scope.
    pub fn attr_path(&self, attr: &str) -> CodecResult<String> {
        let spec = self.spec(attr)?;
        let owner = match (spec.scope, self.parent()) {
            (Scope::Parent, Some(parent)) => parent.path(),
            _ => self.path(),
        };
        Ok(format!("{}/{}", owner, attr))
    }
}

impl fmt::Display for ObjectClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}
