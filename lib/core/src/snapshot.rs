use crate::encoder::{Encoding, FeatureEncoder};
use crate::index::{Metric, Neighbor, SimilarityIndex};
use crate::record::IdentityKey;
use crate::store::RecordStore;
use crate::Result;
use parking_lot::RwLock;
use std::sync::Arc;

/// A store together with the encoding and index derived from it.
///
/// The three pieces are built together and never mutated afterwards, so a
/// query can never see vectors fit on a different population than the
/// records it resolves against.
#[derive(Debug)]
pub struct Snapshot {
    store: RecordStore,
    encoding: Encoding,
    index: SimilarityIndex,
}

impl Snapshot {
    pub fn build(store: RecordStore, encoder: &FeatureEncoder, metric: Metric) -> Self {
        let encoding = encoder.encode(&store);
        let index = SimilarityIndex::build(&encoding, metric);
        tracing::debug!(
            records = store.len(),
            dim = encoding.dim(),
            generation = store.generation(),
            "built snapshot"
        );
        Self {
            store,
            encoding,
            index,
        }
    }

    #[inline]
    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    #[inline]
    pub fn encoding(&self) -> &Encoding {
        &self.encoding
    }

    #[inline]
    pub fn index(&self) -> &SimilarityIndex {
        &self.index
    }

    #[inline]
    pub fn generation(&self) -> u64 {
        self.store.generation()
    }

    /// Up to `k` records most similar to `key`, excluding `key` itself.
    pub fn similar(&self, key: &IdentityKey, k: usize) -> Result<Vec<Neighbor>> {
        self.index.query_key(key, k)
    }

    /// Up to `k` records closest to the mean of all vectors. Empty when the
    /// store is.
    pub fn taste(&self, k: usize) -> Result<Vec<Neighbor>> {
        match self.encoding.taste_profile()? {
            Some(profile) => self.index.query(&profile, k, None),
            None => Ok(Vec::new()),
        }
    }
}

/// Shared handle to the current [`Snapshot`].
///
/// Readers clone the inner `Arc` and keep querying it while a rebuild runs;
/// the new snapshot is published with a single swap once it is complete.
#[derive(Debug, Clone)]
pub struct SnapshotCell {
    current: Arc<RwLock<Arc<Snapshot>>>,
}

impl SnapshotCell {
    pub fn new(snapshot: Snapshot) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(snapshot))),
        }
    }

    pub fn load(&self) -> Arc<Snapshot> {
        self.current.read().clone()
    }

    /// Publish `snapshot`, returning the one it replaced.
    pub fn swap(&self, snapshot: Snapshot) -> Arc<Snapshot> {
        self.publish(Arc::new(snapshot))
    }

    fn publish(&self, next: Arc<Snapshot>) -> Arc<Snapshot> {
        std::mem::replace(&mut *self.current.write(), next)
    }

    /// Build a snapshot for `store` outside the lock, then publish it.
    /// Returns the new snapshot.
    pub fn rebuild(&self, store: RecordStore, encoder: &FeatureEncoder, metric: Metric) -> Arc<Snapshot> {
        let next = Arc::new(Snapshot::build(store, encoder, metric));
        self.publish(next.clone());
        next
    }
}
