//! Field-level merge of upstream responses into canonical records.
//!
//! Each field of a [`Record`] remembers the [`SourceTier`] that last wrote
//! it. A response value replaces the stored one only when its tier is at
//! least as high as the recorded tier; a missing value never replaces
//! anything. Applying responses in ascending tier order therefore leaves
//! every field holding the best value any source offered, and re-applying
//! the same responses is a no-op.

use crate::record::{CategoricalAttr, Field, IdentityKey, NumericAttr, Record, SourceTier};
use crate::store::RecordStore;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// One possibly-partial upstream answer about a single item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceResponse {
    pub tier: SourceTier,
    #[serde(default)]
    pub artist: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub release_id: Option<u64>,
    #[serde(default)]
    pub master_id: Option<u64>,
    #[serde(default)]
    pub thumb: Option<String>,
    #[serde(default)]
    pub tags: BTreeMap<CategoricalAttr, BTreeSet<String>>,
    #[serde(default)]
    pub numeric: BTreeMap<NumericAttr, f64>,
}

impl SourceResponse {
    pub fn new(tier: SourceTier) -> Self {
        Self {
            tier,
            artist: None,
            title: None,
            release_id: None,
            master_id: None,
            thumb: None,
            tags: BTreeMap::new(),
            numeric: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_identity(mut self, artist: &str, title: &str) -> Self {
        self.artist = Some(artist.to_string());
        self.title = Some(title.to_string());
        self
    }

    #[must_use]
    pub fn with_release_id(mut self, id: u64) -> Self {
        self.release_id = Some(id);
        self
    }

    #[must_use]
    pub fn with_master_id(mut self, id: u64) -> Self {
        self.master_id = Some(id);
        self
    }

    #[must_use]
    pub fn with_thumb(mut self, thumb: &str) -> Self {
        self.thumb = Some(thumb.to_string());
        self
    }

    #[must_use]
    pub fn with_numeric(mut self, attr: NumericAttr, value: f64) -> Self {
        self.numeric.insert(attr, value);
        self
    }

    /// Set a numeric value only when one is present.
    #[must_use]
    pub fn with_optional(self, attr: NumericAttr, value: Option<f64>) -> Self {
        match value {
            Some(value) => self.with_numeric(attr, value),
            None => self,
        }
    }

    #[must_use]
    pub fn with_tags<I, S>(mut self, attr: CategoricalAttr, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags
            .entry(attr)
            .or_default()
            .extend(tags.into_iter().map(Into::into));
        self
    }

    /// Drop everything that counts as absent: blank strings, blank tags,
    /// empty tag sets and non-finite numbers.
    #[must_use]
    pub fn sanitized(mut self) -> Self {
        fn blank_to_none(value: Option<String>) -> Option<String> {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        }
        self.artist = blank_to_none(self.artist);
        self.title = blank_to_none(self.title);
        self.thumb = blank_to_none(self.thumb);
        self.numeric.retain(|_, v| v.is_finite());
        for tags in self.tags.values_mut() {
            *tags = std::mem::take(tags)
                .into_iter()
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect();
        }
        self.tags.retain(|_, tags| !tags.is_empty());
        self
    }

    /// `true` when the response carries no field a record could take.
    pub fn is_empty(&self) -> bool {
        self.release_id.is_none()
            && self.master_id.is_none()
            && self.thumb.as_deref().map_or(true, |t| t.trim().is_empty())
            && self.numeric.values().all(|v| !v.is_finite())
            && self.tags.values().all(|tags| tags.iter().all(|t| t.trim().is_empty()))
    }

    /// Identity carried by the response, if it names both artist and title.
    pub fn identity(&self) -> Option<IdentityKey> {
        match (self.artist.as_deref(), self.title.as_deref()) {
            (Some(artist), Some(title)) if !artist.trim().is_empty() && !title.trim().is_empty() => {
                Some(IdentityKey::new(artist, title))
            }
            _ => None,
        }
    }
}

/// What applying a fused record did to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FusionOutcome {
    Updated,
    Unchanged,
    /// Every response was absent; the store was not touched
    NoData,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FusionResolver;

impl FusionResolver {
    pub fn new() -> Self {
        Self
    }

    /// Merge `responses` over `existing` (or a fresh record for
    /// `artist`/`title`). Returns `None` when no response carries data.
    ///
    /// Pure: safe to run for many items in parallel.
    pub fn fuse(
        &self,
        artist: &str,
        title: &str,
        existing: Option<&Record>,
        responses: &[SourceResponse],
    ) -> Option<Record> {
        let mut present: Vec<SourceResponse> = responses
            .iter()
            .cloned()
            .map(SourceResponse::sanitized)
            .filter(|r| !r.is_empty())
            .collect();
        if present.is_empty() {
            return None;
        }
        // stable: within a tier, later responses are fresher
        present.sort_by_key(|r| r.tier);

        let mut record = existing
            .cloned()
            .unwrap_or_else(|| Record::new(artist, title));
        for response in &present {
            merge(&mut record, response);
        }

        tracing::debug!(
            key = %record.key,
            responses = present.len(),
            "fused record"
        );
        Some(record)
    }

    /// Write a fused record into the store. Callers serialize these writes.
    pub fn apply(&self, store: &mut RecordStore, fused: Option<Record>) -> FusionOutcome {
        match fused {
            None => FusionOutcome::NoData,
            Some(record) => {
                if store.upsert(record) {
                    FusionOutcome::Updated
                } else {
                    FusionOutcome::Unchanged
                }
            }
        }
    }

    /// Fuse responses for the item they identify and apply the result.
    /// Responses without an artist and title cannot be placed and yield
    /// [`FusionOutcome::NoData`].
    pub fn ingest(&self, store: &mut RecordStore, responses: &[SourceResponse]) -> FusionOutcome {
        let Some(named) = responses
            .iter()
            .find(|r| r.identity().is_some())
            .cloned()
            .map(SourceResponse::sanitized)
        else {
            return FusionOutcome::NoData;
        };
        let (Some(artist), Some(title)) = (named.artist.as_deref(), named.title.as_deref()) else {
            return FusionOutcome::NoData;
        };
        let key = IdentityKey::new(artist, title);
        let fused = self.fuse(artist, title, store.get(&key), responses);
        self.apply(store, fused)
    }
}

#[inline]
fn accepts(record: &Record, field: Field, present: bool, tier: SourceTier) -> bool {
    !present || record.tier_of(field).map_or(true, |recorded| tier >= recorded)
}

fn merge(record: &mut Record, response: &SourceResponse) {
    let tier = response.tier;

    if let Some(id) = response.release_id {
        if accepts(record, Field::ReleaseId, record.release_id.is_some(), tier) {
            record.release_id = Some(id);
            record.provenance.insert(Field::ReleaseId, tier);
        }
    }
    if let Some(id) = response.master_id {
        if accepts(record, Field::MasterId, record.master_id.is_some(), tier) {
            record.master_id = Some(id);
            record.provenance.insert(Field::MasterId, tier);
        }
    }
    if let Some(thumb) = &response.thumb {
        if accepts(record, Field::Thumb, record.thumb.is_some(), tier) {
            record.thumb = Some(thumb.clone());
            record.provenance.insert(Field::Thumb, tier);
        }
    }

    for (&attr, tags) in &response.tags {
        let present = !record.tags(attr).is_empty();
        if accepts(record, attr.into(), present, tier) {
            record.set_tags(attr, tags.clone(), tier);
        }
    }

    for (&attr, &value) in &response.numeric {
        let present = record.numeric(attr).is_some();
        if accepts(record, attr.into(), present, tier) {
            record.set_numeric(attr, value, tier);
        }
    }
}
