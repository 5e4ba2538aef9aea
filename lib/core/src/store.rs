use crate::filter::Filter;
use crate::record::{IdentityKey, Record};
use std::collections::BTreeMap;

/// In-memory table of records keyed by identity.
///
/// Records are never deleted, only superseded by a newer version under the
/// same key. Iteration is always in ascending key order. `generation` is
/// bumped on every effective mutation so derived data (feature vectors,
/// indexes, scores) can tell when it is stale.
#[derive(Debug, Clone, Default)]
pub struct RecordStore {
    records: BTreeMap<IdentityKey, Record>,
    generation: u64,
}

impl RecordStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn get(&self, key: &IdentityKey) -> Option<&Record> {
        self.records.get(key)
    }

    pub fn contains(&self, key: &IdentityKey) -> bool {
        self.records.contains_key(key)
    }

    /// Insert a record or supersede the one stored under the same key.
    /// Returns `false` (and leaves the generation alone) when the stored
    /// record is already identical.
    pub fn upsert(&mut self, record: Record) -> bool {
        if self.records.get(&record.key) == Some(&record) {
            return false;
        }
        self.records.insert(record.key.clone(), record);
        self.generation += 1;
        true
    }

    pub fn iter(&self) -> impl Iterator<Item = &Record> {
        self.records.values()
    }

    pub fn keys(&self) -> impl Iterator<Item = &IdentityKey> {
        self.records.keys()
    }

    /// Records matching `filter`, in key order.
    pub fn filtered(&self, filter: &dyn Filter) -> Vec<&Record> {
        self.records
            .values()
            .filter(|record| filter.matches(record))
            .collect()
    }
}

impl FromIterator<Record> for RecordStore {
    /// Later records with the same key supersede earlier ones.
    fn from_iter<I: IntoIterator<Item = Record>>(iter: I) -> Self {
        let mut store = RecordStore::new();
        for record in iter {
            store.upsert(record);
        }
        store
    }
}
