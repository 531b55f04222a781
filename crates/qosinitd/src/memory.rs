//! In-process object store.
//!
//! `MemoryStore` stands in for the remote store in tests and in the
//! daemon's `--simulate` mode. It assigns ids on create, identifies
//! instances by their class key attributes, applies each batch atomically
//! and answers interface listings from a scripted sequence.
//!
//! Responses carry key attributes in a nested `key_data` object, the way
//! the remote store does.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::path::Path;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Deserialize;
use sonic_qos_codec::{AttrCodec, AttrValue, ObjectClass, StoreObject, StoreValue};
use tracing::debug;

use crate::error::{QosInitError, QosInitResult};
use crate::objects::{self, PortDirection, QueueKey};
use crate::store::{InterfaceClass, ObjectStore, PortInfo, PortSource, StoreError, TxnOp};

/// First id handed out by a fresh store.
const FIRST_OBJECT_ID: u64 = 0x1000;

#[derive(Debug, Clone)]
struct FailRule {
    op: TxnOp,
    class_path: String,
    matcher: Option<(String, StoreValue)>,
}

impl FailRule {
    fn matches(&self, op: TxnOp, obj: &StoreObject) -> bool {
        self.op == op
            && obj.class_path() == self.class_path
            && self
                .matcher
                .as_ref()
                .map_or(true, |(path, value)| obj.lookup(path) == Some(value))
    }
}

#[derive(Debug, Default)]
struct Inner {
    objects: BTreeMap<String, Vec<StoreObject>>,
    next_id: u64,
    failures: Vec<FailRule>,
    log: Vec<(TxnOp, StoreObject)>,
    unavailable_queries: usize,
    listings: HashMap<InterfaceClass, VecDeque<Vec<PortInfo>>>,
    list_calls: HashMap<InterfaceClass, usize>,
}

impl Inner {
    fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn insert(&mut self, obj: StoreObject) {
        self.objects
            .entry(obj.class_path().to_string())
            .or_default()
            .push(obj);
    }
}

/// Simulated object store and port source.
#[derive(Debug)]
pub struct MemoryStore {
    codec: AttrCodec,
    switch_id: u32,
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new(switch_id: u32) -> Self {
        Self {
            codec: AttrCodec::new(),
            switch_id,
            inner: Mutex::new(Inner {
                next_id: FIRST_OBJECT_ID,
                ..Default::default()
            }),
        }
    }

    pub fn switch_id(&self) -> u32 {
        self.switch_id
    }

    /// Builds a store seeded from a topology description.
    pub fn from_topology(switch_id: u32, topology: &SimTopology) -> QosInitResult<Self> {
        let store = Self::new(switch_id);
        let mut front_panel = Vec::new();
        let mut cpu = Vec::new();

        for port in &topology.ports {
            store.add_port_objects(port.ifindex)?;
            for (level, count) in port.scheduler_groups.iter().enumerate() {
                let level = u32::try_from(level)
                    .map_err(|_| QosInitError::config("topology", "too many scheduler levels"))?;
                store.add_scheduler_groups(port.ifindex, level, *count)?;
            }
            store.add_queues(port.ifindex, "UCAST", port.unicast_queues)?;
            store.add_queues(port.ifindex, "MULTICAST", port.multicast_queues)?;

            if port.cpu {
                cpu.push(PortInfo::new(&port.name, port.ifindex, InterfaceClass::Cpu));
            } else {
                front_panel.push(PortInfo::new(&port.name, port.ifindex, InterfaceClass::FrontPanel));
            }
        }

        store.set_ports(InterfaceClass::FrontPanel, front_panel);
        store.set_ports(InterfaceClass::Cpu, cpu);
        Ok(store)
    }

    /// Adds `count` scheduler groups at `level` of a port.
    ///
    /// Ids are stored in descending order so readers must sort them.
    /// Returns the ids in ascending (ordinal) order.
    pub fn add_scheduler_groups(&self, port_id: u32, level: u32, count: usize) -> QosInitResult<Vec<u64>> {
        let mut inner = self.inner.lock();
        let ids: Vec<u64> = (0..count).map(|_| inner.allocate_id()).collect();
        for id in ids.iter().rev() {
            let mut sg = objects::scheduler_group(self.codec, self.switch_id, *id)?;
            sg.set("port-id", port_id)?
                .set("level", level)?
                .set("child_count", 0u32)?;
            inner.insert(sg.into_data());
        }
        Ok(ids)
    }

    /// Adds queues `0..count` of one type to a port; returns their ids.
    pub fn add_queues(&self, port_id: u32, queue_type: &str, count: u32) -> QosInitResult<Vec<u64>> {
        let mut inner = self.inner.lock();
        let mut ids = Vec::new();
        for number in 0..count {
            let id = inner.allocate_id();
            let mut queue = QueueKey::new(port_id, queue_type, number).object(self.codec, self.switch_id)?;
            queue.set("id", id)?;
            inner.insert(queue.into_data());
            ids.push(id);
        }
        Ok(ids)
    }

    /// Adds the ingress and egress QoS objects of a port.
    pub fn add_port_objects(&self, port_id: u32) -> QosInitResult<()> {
        let mut inner = self.inner.lock();
        for direction in [PortDirection::Ingress, PortDirection::Egress] {
            let obj = direction.port_object(self.codec, self.switch_id, port_id)?;
            inner.insert(obj.into_data());
        }
        Ok(())
    }

    /// Scripts successive listings for one interface class.
    ///
    /// Each call to `list_ports` consumes one listing; the last listing is
    /// repeated once the script runs out.
    pub fn script_ports(&self, class: InterfaceClass, listings: Vec<Vec<PortInfo>>) {
        self.inner
            .lock()
            .listings
            .insert(class, listings.into_iter().collect());
    }

    /// Sets a single, stable listing for one interface class.
    pub fn set_ports(&self, class: InterfaceClass, ports: Vec<PortInfo>) {
        self.script_ports(class, vec![ports]);
    }

    pub fn list_calls(&self, class: InterfaceClass) -> usize {
        self.inner.lock().list_calls.get(&class).copied().unwrap_or(0)
    }

    /// Rejects every `op` against `class`.
    pub fn fail_on(&self, op: TxnOp, class: ObjectClass) {
        self.inner.lock().failures.push(FailRule {
            op,
            class_path: class.path(),
            matcher: None,
        });
    }

    /// Rejects `op` against objects of `class` whose `attr` equals `value`.
    pub fn fail_on_match(&self, op: TxnOp, class: ObjectClass, attr: &str, value: AttrValue) -> QosInitResult<()> {
        let path = class.attr_path(attr)?;
        let encoded = self.codec.encode(class, attr, &value)?;
        self.inner.lock().failures.push(FailRule {
            op,
            class_path: class.path(),
            matcher: Some((path, encoded)),
        });
        Ok(())
    }

    /// Makes the next `count` queries fail with [`StoreError::Unavailable`].
    pub fn unavailable_for(&self, count: usize) {
        self.inner.lock().unavailable_queries = count;
    }

    /// Every stored instance of `class`.
    pub fn objects(&self, class: ObjectClass) -> Vec<StoreObject> {
        self.inner
            .lock()
            .objects
            .get(&class.path())
            .cloned()
            .unwrap_or_default()
    }

    /// First stored instance of `class` carrying all of `attrs`.
    pub fn find(&self, class: ObjectClass, attrs: &[(&str, AttrValue)]) -> Option<StoreObject> {
        let template = self.codec.build(class, attrs).ok()?;
        self.objects(class)
            .into_iter()
            .find(|obj| matches_template(obj, &template))
    }

    /// Committed operations in submission order.
    pub fn transactions(&self) -> Vec<(TxnOp, StoreObject)> {
        self.inner.lock().log.clone()
    }

    fn key_paths(class: ObjectClass) -> Vec<String> {
        class
            .key_attrs()
            .into_iter()
            .filter_map(|attr| class.attr_path(attr).ok())
            .collect()
    }

    fn same_entity(class: ObjectClass, a: &StoreObject, b: &StoreObject) -> bool {
        Self::key_paths(class).iter().all(|path| match (a.lookup(path), b.lookup(path)) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        })
    }

    fn allocates_id(class: ObjectClass) -> bool {
        matches!(
            class,
            ObjectClass::SchedulerGroup | ObjectClass::SchedulerProfile | ObjectClass::MapTable(_)
        )
    }

    fn apply_create(
        &self,
        objects: &mut BTreeMap<String, Vec<StoreObject>>,
        next_id: &mut u64,
        class: ObjectClass,
        obj: &StoreObject,
    ) -> Result<StoreObject, StoreError> {
        let mut created = obj.clone();
        let id_path = class.attr_path("id").map_err(reject)?;

        if Self::allocates_id(class) && !created.contains(&id_path) {
            let id = *next_id;
            *next_id += 1;
            self.codec
                .set(&mut created, class, "id", &AttrValue::Uint(id))
                .map_err(reject)?;
        }

        if let Some(parent) = class.parent() {
            let has_parent = objects.get(&parent.path()).map_or(false, |tables| {
                tables
                    .iter()
                    .any(|t| created.get(&id_path).is_some() && t.get(&id_path) == created.get(&id_path))
            });
            if !has_parent {
                return Err(StoreError::Rejected(format!("{} does not exist", parent)));
            }
        }

        let bucket = objects.entry(class.path()).or_default();
        if bucket.iter().any(|o| Self::same_entity(class, o, &created)) {
            return Err(StoreError::Rejected(format!("{} already exists", class)));
        }
        bucket.push(created.clone());
        Ok(created)
    }

    fn apply_set(
        objects: &mut BTreeMap<String, Vec<StoreObject>>,
        class: ObjectClass,
        obj: &StoreObject,
    ) -> Result<StoreObject, StoreError> {
        let existing = objects
            .get_mut(&class.path())
            .and_then(|bucket| bucket.iter_mut().find(|o| Self::same_entity(class, o, obj)))
            .ok_or_else(|| StoreError::Rejected(format!("no such {}", class)))?;
        existing.merge_from(obj);
        Ok(existing.clone())
    }

    fn apply_delete(
        objects: &mut BTreeMap<String, Vec<StoreObject>>,
        class: ObjectClass,
        obj: &StoreObject,
    ) -> Result<StoreObject, StoreError> {
        let bucket = objects
            .get_mut(&class.path())
            .ok_or_else(|| StoreError::Rejected(format!("no such {}", class)))?;
        let idx = bucket
            .iter()
            .position(|o| Self::same_entity(class, o, obj))
            .ok_or_else(|| StoreError::Rejected(format!("no such {}", class)))?;
        let removed = bucket.remove(idx);

        if let ObjectClass::MapTable(t) = class {
            let id_path = class.attr_path("id").map_err(reject)?;
            if let Some(entries) = objects.get_mut(&ObjectClass::MapEntry(t).path()) {
                entries.retain(|e| e.get(&id_path) != removed.get(&id_path));
            }
        }
        Ok(removed)
    }

    /// Moves key attributes into `key_data`.
    fn respond(class: ObjectClass, obj: &StoreObject) -> StoreObject {
        let keys = Self::key_paths(class);
        let mut outer = StoreObject::new(obj.class_path());
        let mut key_data = StoreObject::new(obj.class_path());
        for (path, value) in obj.attrs() {
            if keys.iter().any(|k| k == path) {
                key_data.insert(path, value.clone());
            } else {
                outer.insert(path, value.clone());
            }
        }
        if !key_data.is_empty() {
            outer.set_key_data(key_data);
        }
        outer
    }
}

fn reject(err: impl std::fmt::Display) -> StoreError {
    StoreError::Rejected(err.to_string())
}

fn matches_template(obj: &StoreObject, template: &StoreObject) -> bool {
    template
        .attrs()
        .all(|(path, value)| matches!(value, StoreValue::Entries(_)) || obj.get(path) == Some(value))
        && template
            .key_data()
            .map_or(true, |kd| matches_template(obj, kd))
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn query(&self, template: &StoreObject) -> Result<Vec<StoreObject>, StoreError> {
        let mut inner = self.inner.lock();
        if inner.unavailable_queries > 0 {
            inner.unavailable_queries -= 1;
            return Err(StoreError::Unavailable);
        }

        let class = ObjectClass::from_path(template.class_path())
            .map_err(|e| StoreError::QueryFailed(e.to_string()))?;
        let found: Vec<StoreObject> = inner
            .objects
            .get(&class.path())
            .map(|bucket| {
                bucket
                    .iter()
                    .filter(|obj| matches_template(obj, template))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        let mut results = Vec::with_capacity(found.len());
        for mut obj in found {
            if let ObjectClass::MapTable(t) = class {
                let id_path = class
                    .attr_path("id")
                    .map_err(|e| StoreError::QueryFailed(e.to_string()))?;
                let entries: Vec<StoreObject> = inner
                    .objects
                    .get(&ObjectClass::MapEntry(t).path())
                    .map(|all| {
                        all.iter()
                            .filter(|e| e.get(&id_path) == obj.get(&id_path))
                            .cloned()
                            .collect()
                    })
                    .unwrap_or_default();
                self.codec
                    .set(&mut obj, class, "entry", &AttrValue::Objects(entries))
                    .map_err(|e| StoreError::QueryFailed(e.to_string()))?;
            }
            results.push(Self::respond(class, &obj));
        }
        debug!("query {} matched {} objects", class, results.len());
        Ok(results)
    }

    async fn transact(&self, ops: Vec<(TxnOp, StoreObject)>) -> Result<Vec<StoreObject>, StoreError> {
        let mut inner = self.inner.lock();
        let mut objects = inner.objects.clone();
        let mut next_id = inner.next_id;
        let mut results = Vec::with_capacity(ops.len());

        for (op, obj) in &ops {
            if inner.failures.iter().any(|rule| rule.matches(*op, obj)) {
                debug!("{} {} refused by failure rule", op.as_str(), obj.class_path());
                return Err(StoreError::Rejected(format!(
                    "{} {} refused",
                    op.as_str(),
                    obj.class_path()
                )));
            }

            let class = ObjectClass::from_path(obj.class_path()).map_err(reject)?;
            let result = match op {
                TxnOp::Create => self.apply_create(&mut objects, &mut next_id, class, obj)?,
                TxnOp::Set => Self::apply_set(&mut objects, class, obj)?,
                TxnOp::Delete => Self::apply_delete(&mut objects, class, obj)?,
            };
            results.push(Self::respond(class, &result));
        }

        inner.objects = objects;
        inner.next_id = next_id;
        inner.log.extend(ops);
        Ok(results)
    }
}

#[async_trait]
impl PortSource for MemoryStore {
    async fn list_ports(&self, class: InterfaceClass) -> Result<Vec<PortInfo>, StoreError> {
        let mut inner = self.inner.lock();
        *inner.list_calls.entry(class).or_default() += 1;

        let script = inner.listings.entry(class).or_default();
        let listing = if script.len() > 1 {
            script.pop_front().unwrap_or_default()
        } else {
            script.front().cloned().unwrap_or_default()
        };
        Ok(listing)
    }
}

/// Topology used to seed a simulated store.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SimTopology {
    pub ports: Vec<SimPort>,
}

/// One simulated port.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SimPort {
    pub name: String,
    pub ifindex: u32,
    #[serde(default)]
    pub cpu: bool,
    /// Scheduler-group count per level, root level first.
    #[serde(default)]
    pub scheduler_groups: Vec<usize>,
    #[serde(default)]
    pub unicast_queues: u32,
    #[serde(default)]
    pub multicast_queues: u32,
}

impl SimTopology {
    pub fn load(path: &Path) -> QosInitResult<Self> {
        let display = path.display().to_string();
        let content =
            std::fs::read_to_string(path).map_err(|e| QosInitError::config(&display, e.to_string()))?;
        serde_json::from_str(&content).map_err(|e| QosInitError::config(&display, e.to_string()))
    }
}
