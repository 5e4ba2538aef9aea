use nextspin_core::{IdentityKey, NumericAttr, Record};
use ordered_float::OrderedFloat;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeSet;

pub const DEFAULT_K: usize = 5;

/// Attributes counted when qualifying a record for ranking.
pub const DEMAND_FIELDS: [NumericAttr; 3] = [
    NumericAttr::LowestPrice,
    NumericAttr::WantCount,
    NumericAttr::HaveCount,
];

/// A record and the score it is ranked by.
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    pub record: &'a Record,
    pub score: f64,
}

impl<'a> Candidate<'a> {
    pub fn new(record: &'a Record, score: f64) -> Self {
        Self { record, score }
    }

    #[inline]
    pub fn key(&self) -> &'a IdentityKey {
        &self.record.key
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CrateStatus {
    Ranked,
    /// Nothing was left to rank; callers fall back to raw demand
    InsufficientData,
}

#[derive(Debug, Clone)]
pub struct Selection<'a> {
    pub status: CrateStatus,
    pub picks: Vec<Candidate<'a>>,
}

impl Selection<'_> {
    pub fn is_insufficient(&self) -> bool {
        self.status == CrateStatus::InsufficientData
    }
}

/// Top-K selection with deterministic ordering.
#[derive(Debug, Clone)]
pub struct CrateSelector {
    k: usize,
    min_known: Option<usize>,
}

impl Default for CrateSelector {
    fn default() -> Self {
        Self {
            k: DEFAULT_K,
            min_known: None,
        }
    }
}

impl CrateSelector {
    pub fn new(k: usize) -> Self {
        Self { k, min_known: None }
    }

    /// Only rank records with at least `min_known` of [`DEMAND_FIELDS`] present.
    #[must_use]
    pub fn with_min_known(mut self, min_known: usize) -> Self {
        self.min_known = Some(min_known);
        self
    }

    #[inline]
    pub fn k(&self) -> usize {
        self.k
    }

    #[inline]
    pub fn min_known(&self) -> Option<usize> {
        self.min_known
    }

    pub fn qualifies(&self, record: &Record) -> bool {
        self.min_known
            .map_or(true, |min| record.known_count(&DEMAND_FIELDS) >= min)
    }

    /// Rank `candidates` by score, descending, ties by ascending key. Each
    /// key occupies at most one slot, keeping its best score.
    pub fn select<'a>(&self, candidates: Vec<Candidate<'a>>) -> Selection<'a> {
        let qualified: Vec<Candidate<'a>> = candidates
            .into_iter()
            .filter(|c| self.qualifies(c.record))
            .collect();

        if qualified.is_empty() {
            return Selection {
                status: CrateStatus::InsufficientData,
                picks: Vec::new(),
            };
        }

        Selection {
            status: CrateStatus::Ranked,
            picks: top_k(qualified, self.k),
        }
    }

    /// Rank by raw want count (missing counts as 0), ignoring qualification.
    pub fn fallback_by_demand<'a>(&self, records: &[&'a Record]) -> Vec<Candidate<'a>> {
        let candidates = records
            .iter()
            .map(|&record| Candidate::new(record, record.numeric(NumericAttr::WantCount).unwrap_or(0.0)))
            .collect();
        top_k(candidates, self.k)
    }
}

fn top_k(mut candidates: Vec<Candidate<'_>>, k: usize) -> Vec<Candidate<'_>> {
    candidates.sort_by(compare_candidates);

    let mut seen: BTreeSet<&IdentityKey> = BTreeSet::new();
    candidates.retain(|c| seen.insert(c.key()));
    candidates.truncate(k);
    candidates
}

// Descending score (NaN last), then ascending key
fn compare_candidates(a: &Candidate<'_>, b: &Candidate<'_>) -> Ordering {
    rank_score(b.score)
        .cmp(&rank_score(a.score))
        .then_with(|| a.key().cmp(b.key()))
}

#[inline]
fn rank_score(score: f64) -> OrderedFloat<f64> {
    OrderedFloat(if score.is_nan() { f64::NEG_INFINITY } else { score })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn records() -> Vec<Record> {
        vec![
            Record::new("Can", "Tago Mago").with_numeric(NumericAttr::WantCount, 40.0),
            Record::new("Faust", "IV")
                .with_numeric(NumericAttr::WantCount, 90.0)
                .with_numeric(NumericAttr::HaveCount, 10.0),
            Record::new("Neu!", "Neu!"),
            Record::new("Cluster", "Zuckerzeit").with_numeric(NumericAttr::WantCount, 40.0),
        ]
    }

    #[test]
    fn test_sorted_with_key_tie_break() {
        let records = records();
        let candidates = records.iter().map(|r| Candidate::new(r, 1.0)).collect();
        let selection = CrateSelector::new(10).select(candidates);
        assert_eq!(selection.status, CrateStatus::Ranked);
        let artists: Vec<&str> = selection.picks.iter().map(|c| c.key().artist()).collect();
        assert_eq!(artists, vec!["can", "cluster", "faust", "neu!"]);
    }

    #[test]
    fn test_dedup_before_truncate() {
        let records = records();
        let duplicate = Record::new("CAN", "tago mago");
        let candidates = vec![
            Candidate::new(&records[0], 5.0),
            Candidate::new(&duplicate, 4.0),
            Candidate::new(&records[1], 3.0),
        ];
        let selection = CrateSelector::new(2).select(candidates);
        assert_eq!(selection.picks.len(), 2);
        assert_eq!(selection.picks[0].score, 5.0);
        assert_eq!(selection.picks[1].key().artist(), "faust");
    }

    #[test]
    fn test_empty_population_is_insufficient() {
        let selection = CrateSelector::default().select(Vec::new());
        assert!(selection.is_insufficient());
        assert!(selection.picks.is_empty());
    }

    #[test]
    fn test_k_zero_and_small_population() {
        let records = records();
        let all: Vec<Candidate> = records.iter().map(|r| Candidate::new(r, 1.0)).collect();
        let none = CrateSelector::new(0).select(all.clone());
        assert_eq!(none.status, CrateStatus::Ranked);
        assert!(none.picks.is_empty());
        assert_eq!(CrateSelector::default().select(all).picks.len(), 4);
    }

    #[test]
    fn test_min_known_qualification_and_fallback() {
        let records = records();
        let refs: Vec<&Record> = records.iter().collect();
        let selector = CrateSelector::default().with_min_known(2);
        let candidates = refs.iter().map(|&r| Candidate::new(r, 1.0)).collect();
        let selection = selector.select(candidates);
        assert_eq!(selection.picks.len(), 1);
        assert_eq!(selection.picks[0].key().artist(), "faust");

        let strict = CrateSelector::default().with_min_known(3);
        let selection = strict.select(refs.iter().map(|&r| Candidate::new(r, 1.0)).collect());
        assert!(selection.is_insufficient());

        let fallback = strict.fallback_by_demand(&refs);
        let artists: Vec<&str> = fallback.iter().map(|c| c.key().artist()).collect();
        assert_eq!(artists, vec!["faust", "can", "cluster", "neu!"]);
        assert_eq!(fallback[3].score, 0.0);
    }

    #[test]
    fn test_nan_scores_rank_last() {
        let records = records();
        let candidates = vec![Candidate::new(&records[0], f64::NAN), Candidate::new(&records[1], -1.0)];
        let selection = CrateSelector::default().select(candidates);
        assert_eq!(selection.picks[0].key().artist(), "faust");
    }

    proptest! {
        #[test]
        fn prop_selection_sorted_and_unique(
            entries in prop::collection::vec((0usize..12, 0.0f64..10.0), 0..40),
            k in 0usize..15,
        ) {
            let records: Vec<Record> = (0..12).map(|i| Record::new("Artist", &format!("Title {i}"))).collect();
            let candidates: Vec<Candidate> = entries
                .iter()
                .map(|&(i, score)| Candidate::new(&records[i], (score * 4.0).round() / 4.0))
                .collect();
            let distinct: BTreeSet<&IdentityKey> = candidates.iter().map(|c| c.key()).collect();

            let selection = CrateSelector::new(k).select(candidates);
            prop_assert_eq!(selection.is_insufficient(), distinct.is_empty());
            prop_assert_eq!(selection.picks.len(), k.min(distinct.len()));

            let keys: BTreeSet<&IdentityKey> = selection.picks.iter().map(|c| c.key()).collect();
            prop_assert_eq!(keys.len(), selection.picks.len());
            for pair in selection.picks.windows(2) {
                prop_assert!(compare_candidates(&pair[0], &pair[1]) == Ordering::Less);
            }
        }
    }
}
