//! Scheduler-group discovery and scheduler-tree binding.
//!
//! The store pre-populates one scheduler group per tree position for every
//! port but assigns ids in no particular order. Discovered ids are sorted
//! ascending per level and a declared `(level, ordinal)` is resolved by
//! position in that list. When a level has fewer groups than the tree
//! addresses, the missing node is a failure unless the level is marked
//! `platform-may-omit`.

use std::collections::BTreeMap;

use sonic_qos_codec::{AttrCodec, AttrValue, Record, StoreObject};
use tracing::{debug, info, instrument};

use crate::config::{SchedulerLevel, SchedulerTree};
use crate::context::RunContext;
use crate::error::{QosInitError, QosInitResult};
use crate::objects::{self, PortDirection, QueueKey};
use crate::report::PhaseReport;
use crate::store::{ObjectStore, PortInfo, TxnOp};

/// Scheduler-group ids of one port, ascending within each level.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerGroupIndex {
    levels: BTreeMap<u32, Vec<u64>>,
}

impl SchedulerGroupIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `id` keeping the level sorted.
    pub fn insert(&mut self, level: u32, id: u64) {
        let ids = self.levels.entry(level).or_default();
        if let Err(pos) = ids.binary_search(&id) {
            ids.insert(pos, id);
        }
    }

    pub fn get(&self, level: u32, ordinal: usize) -> Option<u64> {
        self.levels.get(&level).and_then(|ids| ids.get(ordinal)).copied()
    }

    pub fn level(&self, level: u32) -> &[u64] {
        self.levels.get(&level).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn count(&self, level: u32) -> usize {
        self.level(level).len()
    }

    pub fn levels(&self) -> impl Iterator<Item = u32> + '_ {
        self.levels.keys().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }
}

/// Scheduler operations against the store for one switch.
pub struct SchedulerApi<'a, S: ObjectStore + ?Sized> {
    store: &'a S,
    codec: AttrCodec,
    switch_id: u32,
}

impl<'a, S: ObjectStore + ?Sized> SchedulerApi<'a, S> {
    pub fn new(store: &'a S, codec: AttrCodec, switch_id: u32) -> Self {
        Self {
            store,
            codec,
            switch_id,
        }
    }

    async fn set(&self, object: String, data: StoreObject) -> QosInitResult<()> {
        self.store
            .transact(vec![(TxnOp::Set, data)])
            .await
            .map_err(|e| QosInitError::transaction(object, e))?;
        Ok(())
    }

    async fn create(&self, object: String, data: StoreObject) -> QosInitResult<u64> {
        let response = self
            .store
            .transact(vec![(TxnOp::Create, data)])
            .await
            .map_err(|e| QosInitError::transaction(object.clone(), e))?;
        let created = response
            .into_iter()
            .next()
            .ok_or_else(|| QosInitError::malformed(object.clone(), "empty create response"))?;
        Record::wrap(self.codec, created)?
            .extract_id()?
            .ok_or_else(|| QosInitError::malformed(object, "create response carries no id"))
    }

    async fn delete(&self, object: String, data: StoreObject) -> QosInitResult<()> {
        self.store
            .transact(vec![(TxnOp::Delete, data)])
            .await
            .map_err(|e| QosInitError::transaction(object, e))?;
        Ok(())
    }

    async fn port_groups(&self, port_id: u32) -> QosInitResult<Vec<StoreObject>> {
        let template = objects::port_scheduler_groups(self.codec, self.switch_id, port_id)?.into_data();
        self.store
            .query(&template)
            .await
            .map_err(|e| QosInitError::query(format!("scheduler groups of port {}", port_id), e))
    }

    /// Reads every scheduler group of a port, indexed by level.
    pub async fn read_groups(&self, port: &PortInfo) -> QosInitResult<SchedulerGroupIndex> {
        let mut index = SchedulerGroupIndex::new();
        for sg in self.port_groups(port.ifindex).await? {
            let sg = Record::wrap(self.codec, sg)?;
            let level = sg
                .attr("level")?
                .and_then(|l| l.as_u64())
                .and_then(|l| u32::try_from(l).ok())
                .ok_or_else(|| QosInitError::malformed(format!("{} scheduler group", port.name), "no level"))?;
            let id = sg
                .extract_id()?
                .ok_or_else(|| QosInitError::malformed(format!("{} scheduler group", port.name), "no id"))?;
            index.insert(level, id);
        }
        debug!(
            "Port {}: discovered scheduler groups {:?}",
            port.name,
            index.levels().map(|l| (l, index.count(l))).collect::<Vec<_>>()
        );
        Ok(index)
    }

    pub async fn bind_group_profile(&self, sg_id: u64, profile_id: u64) -> QosInitResult<()> {
        let mut sg = objects::scheduler_group(self.codec, self.switch_id, sg_id)?;
        sg.set("scheduler-profile-id", profile_id)?;
        self.set(format!("scheduler group {:#x}", sg_id), sg.into_data()).await
    }

    pub async fn bind_queue_profile(&self, key: &QueueKey, profile_id: u64) -> QosInitResult<()> {
        let mut queue = key.object(self.codec, self.switch_id)?;
        queue.set("scheduler-profile-id", profile_id)?;
        self.set(key.to_string(), queue.into_data()).await
    }

    /// Replaces the full child list of a scheduler group.
    pub async fn set_children(&self, sg_id: u64, children: &[u64]) -> QosInitResult<()> {
        let count = u32::try_from(children.len())
            .map_err(|_| QosInitError::malformed(format!("scheduler group {:#x}", sg_id), "child list too long"))?;
        let mut sg = objects::scheduler_group(self.codec, self.switch_id, sg_id)?;
        sg.set("child-list", AttrValue::List(children.to_vec()))?
            .set("child_count", count)?;
        self.set(format!("scheduler group {:#x} children", sg_id), sg.into_data())
            .await
    }

    pub async fn create_group(&self, port_id: u32, level: u32) -> QosInitResult<u64> {
        let mut sg = objects::port_scheduler_groups(self.codec, self.switch_id, port_id)?;
        sg.set("level", level)?;
        let id = self
            .create(format!("scheduler group of port {} level {}", port_id, level), sg.into_data())
            .await?;
        info!("Created scheduler group {:#x} on port {} level {}", id, port_id, level);
        Ok(id)
    }

    pub async fn delete_group(&self, sg_id: u64) -> QosInitResult<()> {
        let sg = objects::scheduler_group(self.codec, self.switch_id, sg_id)?;
        self.delete(format!("scheduler group {:#x}", sg_id), sg.into_data())
            .await
    }

    /// Creates a scheduler profile from configuration text.
    pub async fn create_profile(&self, tag: &str, attrs: &BTreeMap<String, String>) -> QosInitResult<u64> {
        let profile = objects::scheduler_profile(self.codec, self.switch_id, attrs)?;
        self.create(format!("scheduler profile {}", tag), profile.into_data())
            .await
    }

    pub async fn delete_profile(&self, profile_id: u64) -> QosInitResult<()> {
        let mut profile = objects::scheduler_profile(self.codec, self.switch_id, &BTreeMap::new())?;
        profile.set("id", profile_id)?;
        self.delete(format!("scheduler profile {:#x}", profile_id), profile.into_data())
            .await
    }

    /// Store id of a queue, if the queue exists.
    pub async fn queue_id(&self, key: &QueueKey) -> QosInitResult<Option<u64>> {
        let template = key.object(self.codec, self.switch_id)?.into_data();
        let found = self
            .store
            .query(&template)
            .await
            .map_err(|e| QosInitError::query(key.to_string(), e))?;
        match found.into_iter().next() {
            Some(queue) => Ok(Record::wrap(self.codec, queue)?.extract_id()?),
            None => Ok(None),
        }
    }

    /// Scheduler group whose child list holds `child_id`.
    pub async fn parent_group(&self, port_id: u32, child_id: u64) -> QosInitResult<Option<u64>> {
        for sg in self.port_groups(port_id).await? {
            let sg = Record::wrap(self.codec, sg)?;
            let holds_child = matches!(
                sg.attr("child-list")?,
                Some(AttrValue::List(children)) if children.contains(&child_id)
            );
            if holds_child {
                return Ok(sg.extract_id()?);
            }
        }
        Ok(None)
    }

    /// Binds a scheduler profile to the egress side of a port.
    pub async fn bind_port_scheduler(&self, port_id: u32, profile_id: u64) -> QosInitResult<()> {
        let mut port = PortDirection::Egress.port_object(self.codec, self.switch_id, port_id)?;
        port.set("scheduler-profile-id", profile_id)?;
        self.set(format!("egress scheduler of port {}", port_id), port.into_data())
            .await
    }

    /// Applies a declared scheduler tree to one port.
    ///
    /// Every binding is attempted and recorded in `report`; a failed binding
    /// does not stop the rest of the tree. If group discovery fails only the
    /// interior levels are skipped, since queues are addressed by key.
    #[instrument(skip(self, ctx, port, tree, report), fields(port = %port.name))]
    pub async fn apply_tree(&self, ctx: &RunContext, port: &PortInfo, tree: &SchedulerTree, report: &mut PhaseReport) {
        let index = match self.read_groups(port).await {
            Ok(index) => Some(index),
            Err(err) => {
                report.failed(format!("{} scheduler groups", port.name), err);
                None
            }
        };

        for level in &tree.levels {
            match &index {
                _ if level.leaf => self.apply_leaf_level(ctx, port, level, report).await,
                Some(index) => self.apply_group_level(ctx, port, tree, level, index, report).await,
                None => {
                    for group in &level.groups {
                        report.skipped(
                            format!("{} sg {}/{}", port.name, level.level, group.number),
                            "scheduler groups not discovered",
                        );
                    }
                }
            }
        }
    }

    async fn apply_group_level(
        &self,
        ctx: &RunContext,
        port: &PortInfo,
        tree: &SchedulerTree,
        level: &SchedulerLevel,
        index: &SchedulerGroupIndex,
        report: &mut PhaseReport,
    ) {
        for group in &level.groups {
            let target = format!("{} sg {}/{}", port.name, level.level, group.number);
            let sg_id = match index.get(level.level, group.number) {
                Some(id) => id,
                None if level.platform_may_omit => {
                    report.skipped(target, "not provided by the platform");
                    continue;
                }
                None => {
                    let err = QosInitError::SchedulerGroupShortfall {
                        port: port.name.clone(),
                        level: level.level,
                        ordinal: group.number,
                        discovered: index.count(level.level),
                    };
                    report.failed(target, err);
                    continue;
                }
            };

            if let Some(profile) = &group.scheduler_profile {
                let result = match ctx.profile_id(profile) {
                    Ok(profile_id) => self.bind_group_profile(sg_id, profile_id).await,
                    Err(err) => Err(err),
                };
                report.record(format!("{} profile {}", target, profile), result);
            }

            if let Some(children) = &group.children {
                let result = match self.resolve_children(port, tree, level, index, children).await {
                    Ok(ids) => self.set_children(sg_id, &ids).await,
                    Err(err) => Err(err),
                };
                report.record(format!("{} children", target), result);
            }
        }
    }

    async fn apply_leaf_level(&self, ctx: &RunContext, port: &PortInfo, level: &SchedulerLevel, report: &mut PhaseReport) {
        for queue in &level.queues {
            let Some(profile) = &queue.scheduler_profile else {
                continue;
            };
            let key = QueueKey::new(port.ifindex, queue.queue_type.as_str(), queue.number);
            let result = match ctx.profile_id(profile) {
                Ok(profile_id) => self.bind_queue_profile(&key, profile_id).await,
                Err(err) => Err(err),
            };
            report.record(format!("{} {} profile {}", port.name, key, profile), result);
        }
    }

    /// Resolves declared children to store ids: ordinals at the next interior
    /// level, or positions in the leaf level's queue list.
    async fn resolve_children(
        &self,
        port: &PortInfo,
        tree: &SchedulerTree,
        level: &SchedulerLevel,
        index: &SchedulerGroupIndex,
        children: &[usize],
    ) -> QosInitResult<Vec<u64>> {
        let next = tree.next_level(level.level).ok_or_else(|| {
            QosInitError::config("scheduler-tree", format!("level {} has children but no next level", level.level))
        })?;

        let mut ids = Vec::with_capacity(children.len());
        for &child in children {
            if next.leaf {
                let queue = next.queues.get(child).ok_or_else(|| {
                    QosInitError::config("scheduler-tree", format!("level {} has no queue #{}", next.level, child))
                })?;
                let key = QueueKey::new(port.ifindex, queue.queue_type.as_str(), queue.number);
                let id = self
                    .queue_id(&key)
                    .await?
                    .ok_or_else(|| QosInitError::query(key.to_string(), "queue not found"))?;
                ids.push(id);
            } else {
                let id = index.get(next.level, child).ok_or_else(|| QosInitError::SchedulerGroupShortfall {
                    port: port.name.clone(),
                    level: next.level,
                    ordinal: child,
                    discovered: index.count(next.level),
                })?;
                ids.push(id);
            }
        }
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::store::InterfaceClass;
    use pretty_assertions::assert_eq;
    use sonic_qos_codec::ObjectClass;

    #[test]
    fn test_index_sorted_insert() {
        let mut index = SchedulerGroupIndex::new();
        for id in [30, 10, 20, 10] {
            index.insert(1, id);
        }
        index.insert(0, 5);

        assert_eq!(index.level(1), &[10, 20, 30]);
        assert_eq!(index.get(1, 2), Some(30));
        assert_eq!(index.get(1, 3), None);
        assert_eq!(index.get(7, 0), None);
        assert_eq!(index.levels().collect::<Vec<_>>(), vec![0, 1]);
    }

    #[tokio::test]
    async fn test_read_groups_sorts_per_level() {
        let store = MemoryStore::new(0);
        let root = store.add_scheduler_groups(4, 0, 1).unwrap();
        let level1 = store.add_scheduler_groups(4, 1, 4).unwrap();
        store.add_scheduler_groups(8, 1, 2).unwrap();

        let api = SchedulerApi::new(&store, AttrCodec::new(), 0);
        let port = PortInfo::new("Ethernet4", 4, InterfaceClass::FrontPanel);
        let index = api.read_groups(&port).await.unwrap();

        assert_eq!(index.level(0), root.as_slice());
        assert_eq!(index.level(1), level1.as_slice());
    }

    #[tokio::test]
    async fn test_children_and_parent_lookup() {
        let store = MemoryStore::new(0);
        let root = store.add_scheduler_groups(4, 0, 1).unwrap();
        let queues = store.add_queues(4, "UCAST", 2).unwrap();

        let api = SchedulerApi::new(&store, AttrCodec::new(), 0);
        api.set_children(root[0], &queues).await.unwrap();

        assert_eq!(api.parent_group(4, queues[1]).await.unwrap(), Some(root[0]));
        assert_eq!(api.parent_group(4, 0xdead).await.unwrap(), None);
        assert_eq!(
            api.queue_id(&QueueKey::new(4, "UCAST", 1)).await.unwrap(),
            Some(queues[1])
        );
        assert_eq!(api.queue_id(&QueueKey::new(4, "MULTICAST", 0)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_group_and_profile_lifecycle() {
        let store = MemoryStore::new(0);
        store.add_port_objects(4).unwrap();
        let api = SchedulerApi::new(&store, AttrCodec::new(), 0);

        let sg = api.create_group(4, 2).await.unwrap();
        let port = PortInfo::new("Ethernet4", 4, InterfaceClass::FrontPanel);
        assert_eq!(api.read_groups(&port).await.unwrap().level(2), &[sg]);

        let mut attrs = BTreeMap::new();
        attrs.insert("algorithm".to_string(), "SP".to_string());
        let profile = api.create_profile("strict", &attrs).await.unwrap();
        api.bind_port_scheduler(4, profile).await.unwrap();

        api.delete_group(sg).await.unwrap();
        api.delete_profile(profile).await.unwrap();
        assert!(api.read_groups(&port).await.unwrap().is_empty());
        assert!(store.objects(ObjectClass::SchedulerProfile).is_empty());
        assert!(api.delete_group(sg).await.is_err());
    }
}
