//! Map-table client.
//!
//! Creating a table is its own transaction because entries need the id the
//! store assigns to the table. Entries are then staged (new, modified,
//! deleted) and committed together in one batch.

use std::ops::RangeInclusive;

use sonic_qos_codec::{
    AttrCodec, AttrValue, AuthoredEntry, DecodedEntry, EntryArity, MapTableRef, MapType, Record, StoreObject,
};
use tracing::{debug, info};

use crate::error::{QosInitError, QosInitResult};
use crate::store::{ObjectStore, TxnOp};

/// Handle on one map table that exists in the store.
pub struct MapTable<'a, S: ObjectStore + ?Sized> {
    store: &'a S,
    codec: AttrCodec,
    table: MapTableRef,
    map_id: u64,
    new_entries: Vec<StoreObject>,
    mod_entries: Vec<StoreObject>,
    del_entries: Vec<StoreObject>,
}

impl<'a, S: ObjectStore + ?Sized> MapTable<'a, S> {
    /// Creates an empty table and returns a handle carrying its id.
    pub async fn create(store: &'a S, codec: AttrCodec, map_type: MapType, switch_id: u32) -> QosInitResult<Self> {
        let table = MapTableRef::new(map_type, switch_id);
        let request = table.table_object(codec)?;

        let response = store
            .transact(vec![(TxnOp::Create, request)])
            .await
            .map_err(|e| QosInitError::transaction(format!("{} table", map_type), e))?;
        let created = response
            .into_iter()
            .next()
            .ok_or_else(|| QosInitError::malformed(map_type.name(), "empty create response"))?;
        let map_id = Record::wrap(codec, created)?
            .extract_id()?
            .ok_or_else(|| QosInitError::malformed(map_type.name(), "create response carries no id"))?;

        info!("Created {} with id {:#x}", map_type, map_id);
        Ok(Self::open(store, codec, map_type, switch_id, map_id))
    }

    /// Handle on an already created table.
    pub fn open(store: &'a S, codec: AttrCodec, map_type: MapType, switch_id: u32, map_id: u64) -> Self {
        Self {
            store,
            codec,
            table: MapTableRef::new(map_type, switch_id).with_id(map_id),
            map_id,
            new_entries: Vec::new(),
            mod_entries: Vec::new(),
            del_entries: Vec::new(),
        }
    }

    pub fn map_id(&self) -> u64 {
        self.map_id
    }

    pub fn map_type(&self) -> MapType {
        self.table.map_type
    }

    fn name(&self) -> String {
        format!("{} {:#x}", self.table.map_type, self.map_id)
    }

    /// Stages new entries; returns how many the authored entry expanded to.
    /// Every field of the map type must be given.
    pub fn add_entries(&mut self, entry: &AuthoredEntry, range: Option<RangeInclusive<i64>>) -> QosInitResult<usize> {
        let objects = self.table.entry_objects(self.codec, entry, range, EntryArity::Full)?;
        let count = objects.len();
        self.new_entries.extend(objects);
        Ok(count)
    }

    /// Stages changes to existing entries.
    pub fn modify_entries(&mut self, entry: &AuthoredEntry, range: Option<RangeInclusive<i64>>) -> QosInitResult<usize> {
        let objects = self.table.entry_objects(self.codec, entry, range, EntryArity::Full)?;
        let count = objects.len();
        self.mod_entries.extend(objects);
        Ok(count)
    }

    /// Stages removal of entries; only key fields need to be given.
    pub fn delete_entries(&mut self, entry: &AuthoredEntry, range: Option<RangeInclusive<i64>>) -> QosInitResult<usize> {
        let objects = self.table.entry_objects(self.codec, entry, range, EntryArity::Keys)?;
        let count = objects.len();
        self.del_entries.extend(objects);
        Ok(count)
    }

    pub fn staged(&self) -> usize {
        self.new_entries.len() + self.mod_entries.len() + self.del_entries.len()
    }

    /// Submits every staged entry change as one batch.
    pub async fn commit(&mut self) -> QosInitResult<()> {
        if self.staged() == 0 {
            return Ok(());
        }

        let ops: Vec<(TxnOp, StoreObject)> = self
            .new_entries
            .iter()
            .map(|e| (TxnOp::Create, e.clone()))
            .chain(self.mod_entries.iter().map(|e| (TxnOp::Set, e.clone())))
            .chain(self.del_entries.iter().map(|e| (TxnOp::Delete, e.clone())))
            .collect();
        debug!("Committing {} entry changes to {}", ops.len(), self.name());

        self.store
            .transact(ops)
            .await
            .map_err(|e| QosInitError::transaction(self.name(), e))?;

        self.new_entries.clear();
        self.mod_entries.clear();
        self.del_entries.clear();
        Ok(())
    }

    /// Query template for this table.
    pub fn template(&self) -> QosInitResult<StoreObject> {
        Ok(self.table.table_object(self.codec)?)
    }

    async fn fetch(&self) -> QosInitResult<StoreObject> {
        let template = self.template()?;
        let mut found = self
            .store
            .query(&template)
            .await
            .map_err(|e| QosInitError::query(self.name(), e))?;
        if found.is_empty() {
            return Err(QosInitError::query(self.name(), "table not found"));
        }
        Ok(found.swap_remove(0))
    }

    /// Reads the table back and decodes its entries.
    pub async fn read(&self) -> QosInitResult<Vec<DecodedEntry>> {
        let table = self.fetch().await?;
        Ok(self.table.decode_entries(self.codec, &table)?)
    }

    /// Deletes every entry and then the table, in one batch.
    pub async fn delete(self) -> QosInitResult<()> {
        let table = self.fetch().await?;
        let mut ops: Vec<(TxnOp, StoreObject)> =
            match self.codec.decode(self.table.table_class(), "entry", &table)? {
                Some(AttrValue::Objects(entries)) => entries.into_iter().map(|e| (TxnOp::Delete, e)).collect(),
                _ => Vec::new(),
            };
        ops.push((TxnOp::Delete, self.template()?));

        self.store
            .transact(ops)
            .await
            .map_err(|e| QosInitError::transaction(self.name(), e))?;
        info!("Deleted {}", self.name());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use sonic_qos_codec::{CodecError, ObjectClass};

    #[tokio::test]
    async fn test_entries_need_commit() {
        let store = MemoryStore::new(0);
        let codec = AttrCodec::new();
        let mut table = MapTable::create(&store, codec, MapType::DscpToTc, 0).await.unwrap();

        let staged = table
            .add_entries(&AuthoredEntry::positional(["all", "1"]), Some(0..=63))
            .unwrap();
        assert_eq!(staged, 64);
        assert!(store.objects(ObjectClass::MapEntry(MapType::DscpToTc)).is_empty());

        table.commit().await.unwrap();
        assert_eq!(table.staged(), 0);
        assert_eq!(store.objects(ObjectClass::MapEntry(MapType::DscpToTc)).len(), 64);
    }

    #[tokio::test]
    async fn test_modify_and_delete_entries() {
        let store = MemoryStore::new(0);
        let codec = AttrCodec::new();
        let mut table = MapTable::create(&store, codec, MapType::Dot1pToTc, 0).await.unwrap();
        table.add_entries(&AuthoredEntry::positional(["0", "0"]), None).unwrap();
        table.add_entries(&AuthoredEntry::positional(["1", "1"]), None).unwrap();
        table.commit().await.unwrap();

        table.modify_entries(&AuthoredEntry::positional(["1", "5"]), None).unwrap();
        table.delete_entries(&AuthoredEntry::positional(["0"]), None).unwrap();
        table.commit().await.unwrap();

        let entries = table.read().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(
            entries[0].fields,
            vec![("dot1p", AttrValue::Uint(1)), ("tc", AttrValue::Uint(5))]
        );
    }

    #[tokio::test]
    async fn test_short_entry_only_for_delete() {
        let store = MemoryStore::new(0);
        let codec = AttrCodec::new();
        let mut table = MapTable::create(&store, codec, MapType::Dot1pToTc, 0).await.unwrap();

        let err = table.add_entries(&AuthoredEntry::positional(["0"]), None).unwrap_err();
        assert!(matches!(
            err,
            QosInitError::Codec(CodecError::MissingMapField { ref field, .. }) if field == "tc"
        ));
        assert!(table.modify_entries(&AuthoredEntry::positional(["0"]), None).is_err());
        assert_eq!(table.staged(), 0);

        assert_eq!(table.delete_entries(&AuthoredEntry::positional(["0"]), None).unwrap(), 1);
    }

    #[tokio::test]
    async fn test_delete_removes_table_and_entries() {
        let store = MemoryStore::new(0);
        let codec = AttrCodec::new();
        let mut table = MapTable::create(&store, codec, MapType::TcToPriorityGroup, 0).await.unwrap();
        table.add_entries(&AuthoredEntry::positional(["3", "1"]), None).unwrap();
        table.commit().await.unwrap();

        table.delete().await.unwrap();
        assert!(store.objects(ObjectClass::MapTable(MapType::TcToPriorityGroup)).is_empty());
        assert!(store.objects(ObjectClass::MapEntry(MapType::TcToPriorityGroup)).is_empty());
    }

    #[tokio::test]
    async fn test_create_failure_is_transaction_error() {
        let store = MemoryStore::new(0);
        store.fail_on(TxnOp::Create, ObjectClass::MapTable(MapType::TcToQueue));
        let err = MapTable::create(&store, AttrCodec::new(), MapType::TcToQueue, 0)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, QosInitError::TransactionFailed { .. }));
    }
}
