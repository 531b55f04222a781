//! Declarative QoS configuration.
//!
//! The configuration is a JSON document holding an ordered list of nodes:
//!
//! ```json
//! { "nodes": [
//!     { "node": "switch-globals",
//!       "maps": [ { "type": "dot1p-to-tc-map", "tag": "dot1p", "min": 0, "max": 7,
//!                   "entries": [ ["all", 0], { "dot1p": 5, "tc": 5 } ] } ],
//!       "scheduler-profiles": [ { "tag": "strict", "attrs": { "algorithm": "SP" } } ] },
//!     { "node": "front-panel-ports",
//!       "ingress": { "dot1p-to-tc-map": "dot1p" },
//!       "scheduler-tree": { "levels": [
//!         { "level": 0, "groups": [ { "number": 0, "scheduler-profile": "strict" } ] },
//!         { "level": 1, "leaf": true,
//!           "queues": [ { "type": "UCAST", "number": 0, "scheduler-profile": "strict" } ] } ] } },
//!     { "node": "cpu-port" }
//! ] }
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::ops::RangeInclusive;
use std::path::Path;

use serde::de::{self, MapAccess, Visitor};
use serde::{Deserialize, Deserializer};
use sonic_qos_codec::{AuthoredEntry, MapType};

use crate::error::{QosInitError, QosInitResult};
use crate::store::InterfaceClass;

/// Default location of the configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/sonic/base_qos_init.json";

/// A scalar or list written in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Int(i64),
    /// Unsigned values above `i64::MAX`, such as full-scale rates.
    Uint(u64),
    Text(String),
    List(Vec<i64>),
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigValue::Int(v) => write!(f, "{}", v),
            ConfigValue::Uint(v) => write!(f, "{}", v),
            ConfigValue::Text(s) => f.write_str(s),
            ConfigValue::List(items) => {
                let joined: Vec<String> = items.iter().map(i64::to_string).collect();
                f.write_str(&joined.join(","))
            }
        }
    }
}

/// One authored map entry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum EntryNode {
    Positional(Vec<ConfigValue>),
    Named(BTreeMap<String, ConfigValue>),
}

impl EntryNode {
    pub fn to_authored(&self) -> AuthoredEntry {
        match self {
            EntryNode::Positional(values) => {
                AuthoredEntry::Positional(values.iter().map(ToString::to_string).collect())
            }
            EntryNode::Named(values) => AuthoredEntry::Named(
                values
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_string()))
                    .collect(),
            ),
        }
    }
}

/// A map table to create during the global phase.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MapNode {
    #[serde(rename = "type")]
    pub map_type: MapType,
    pub tag: String,
    #[serde(default)]
    pub min: Option<i64>,
    #[serde(default)]
    pub max: Option<i64>,
    #[serde(default)]
    pub entries: Vec<EntryNode>,
}

impl MapNode {
    /// Range a wildcard field expands over.
    pub fn range(&self) -> Option<RangeInclusive<i64>> {
        match (self.min, self.max) {
            (Some(min), Some(max)) => Some(min..=max),
            _ => None,
        }
    }
}

/// A scheduler profile to create during the global phase.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SchedulerProfileNode {
    pub tag: String,
    #[serde(default)]
    pub attrs: BTreeMap<String, ConfigValue>,
}

impl SchedulerProfileNode {
    /// Attributes as codec input text.
    pub fn attr_text(&self) -> BTreeMap<String, String> {
        self.attrs
            .iter()
            .map(|(k, v)| (k.clone(), v.to_string()))
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct GlobalsNode {
    #[serde(default)]
    pub maps: Vec<MapNode>,
    #[serde(default)]
    pub scheduler_profiles: Vec<SchedulerProfileNode>,
}

/// Interior scheduler-group declaration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct GroupNode {
    pub number: usize,
    #[serde(default)]
    pub scheduler_profile: Option<String>,
    /// Ordinals at the next level (or indices into the leaf queue list)
    /// making up this group's full child list.
    #[serde(default)]
    pub children: Option<Vec<usize>>,
}

/// Leaf queue declaration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct QueueNode {
    #[serde(rename = "type")]
    pub queue_type: String,
    pub number: u32,
    #[serde(default)]
    pub scheduler_profile: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SchedulerLevel {
    pub level: u32,
    #[serde(default)]
    pub leaf: bool,
    /// The platform may provide fewer groups than declared at this level.
    #[serde(default)]
    pub platform_may_omit: bool,
    #[serde(default)]
    pub groups: Vec<GroupNode>,
    #[serde(default)]
    pub queues: Vec<QueueNode>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SchedulerTree {
    pub levels: Vec<SchedulerLevel>,
}

impl SchedulerTree {
    /// The level declared right after `level`, in declaration order.
    pub fn next_level(&self, level: u32) -> Option<&SchedulerLevel> {
        let idx = self.levels.iter().position(|l| l.level == level)?;
        self.levels.get(idx + 1)
    }
}

/// Map type to map tag, in declaration order.
pub type MapBindings = Vec<(MapType, String)>;

/// Reads a `{ "<map type>": "<tag>" }` object keeping key order. A map type
/// may be bound once per direction.
fn ordered_bindings<'de, D>(deserializer: D) -> Result<MapBindings, D::Error>
where
    D: Deserializer<'de>,
{
    struct BindingsVisitor;

    impl<'de> Visitor<'de> for BindingsVisitor {
        type Value = MapBindings;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("an object mapping map types to map tags")
        }

        fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut bindings = MapBindings::new();
            while let Some((map_type, tag)) = access.next_entry::<MapType, String>()? {
                if bindings.iter().any(|(bound, _)| *bound == map_type) {
                    return Err(de::Error::custom(format!("{} is bound more than once", map_type)));
                }
                bindings.push((map_type, tag));
            }
            Ok(bindings)
        }
    }

    deserializer.deserialize_map(BindingsVisitor)
}

/// Map bindings and scheduler tree for one interface class.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PortNode {
    #[serde(default, deserialize_with = "ordered_bindings")]
    pub ingress: MapBindings,
    #[serde(default, deserialize_with = "ordered_bindings")]
    pub egress: MapBindings,
    #[serde(default)]
    pub scheduler_tree: Option<SchedulerTree>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "node", rename_all = "kebab-case")]
pub enum ConfigNode {
    SwitchGlobals(GlobalsNode),
    FrontPanelPorts(PortNode),
    CpuPort(PortNode),
}

impl ConfigNode {
    /// Interface class a port node applies to.
    pub fn interface_class(&self) -> Option<InterfaceClass> {
        match self {
            ConfigNode::SwitchGlobals(_) => None,
            ConfigNode::FrontPanelPorts(_) => Some(InterfaceClass::FrontPanel),
            ConfigNode::CpuPort(_) => Some(InterfaceClass::Cpu),
        }
    }
}

/// The whole declarative configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct QosInitConfig {
    pub nodes: Vec<ConfigNode>,
}

impl QosInitConfig {
    /// Reads and validates a configuration file.
    pub fn load(path: &Path) -> QosInitResult<Self> {
        let display = path.display().to_string();
        let content = std::fs::read_to_string(path)
            .map_err(|e| QosInitError::config(&display, e.to_string()))?;
        Self::parse(&content).map_err(|err| match err {
            QosInitError::Config { message, .. } => QosInitError::config(&display, message),
            other => other,
        })
    }

    /// Parses and validates configuration text.
    pub fn parse(content: &str) -> QosInitResult<Self> {
        let config: Self =
            serde_json::from_str(content).map_err(|e| QosInitError::config("<inline>", e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> QosInitResult<()> {
        for node in &self.nodes {
            match node {
                ConfigNode::SwitchGlobals(globals) => {
                    for map in &globals.maps {
                        match (map.min, map.max) {
                            (Some(min), Some(max)) if min > max => {
                                return Err(invalid(format!("map {}: min {} > max {}", map.tag, min, max)));
                            }
                            (Some(_), None) | (None, Some(_)) => {
                                return Err(invalid(format!("map {}: min and max go together", map.tag)));
                            }
                            _ => {}
                        }
                    }
                }
                ConfigNode::FrontPanelPorts(port) | ConfigNode::CpuPort(port) => {
                    let Some(tree) = &port.scheduler_tree else {
                        continue;
                    };
                    for level in &tree.levels {
                        if level.leaf && !level.groups.is_empty() {
                            return Err(invalid(format!("leaf level {} declares groups", level.level)));
                        }
                        if !level.leaf && !level.queues.is_empty() {
                            return Err(invalid(format!("level {} declares queues but is not a leaf", level.level)));
                        }
                    }
                }
            }
        }
        Ok(())
    }

    pub fn globals(&self) -> impl Iterator<Item = &GlobalsNode> {
        self.nodes.iter().filter_map(|n| match n {
            ConfigNode::SwitchGlobals(g) => Some(g),
            _ => None,
        })
    }

    /// First port node for `class`.
    pub fn port_node(&self, class: InterfaceClass) -> Option<&PortNode> {
        self.nodes.iter().find_map(|n| match (n, n.interface_class()) {
            (ConfigNode::FrontPanelPorts(p) | ConfigNode::CpuPort(p), Some(c)) if c == class => Some(p),
            _ => None,
        })
    }
}

fn invalid(message: String) -> QosInitError {
    QosInitError::config("<inline>", message)
}
