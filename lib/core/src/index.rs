use crate::encoder::Encoding;
use crate::record::IdentityKey;
use crate::vector::Vector;
use crate::{Error, Result};
use ordered_float::OrderedFloat;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    /// Cosine similarity over L2-normalized vectors
    #[default]
    Cosine,
    Euclidean,
}

/// One query hit. `score` grows with closeness: cosine similarity, or the
/// negated L2 distance for [`Metric::Euclidean`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Neighbor {
    pub key: IdentityKey,
    pub score: f32,
}

/// Exact (flat) k-nearest-neighbor index.
///
/// Built wholesale from one [`Encoding`]; there is no incremental insert.
/// Entries are kept in key order and ties in score resolve by ascending key,
/// so results are reproducible for identical input.
#[derive(Debug, Clone)]
pub struct SimilarityIndex {
    metric: Metric,
    dim: usize,
    keys: Vec<IdentityKey>,
    vectors: Vec<Vector>,
}

impl SimilarityIndex {
    pub fn build(encoding: &Encoding, metric: Metric) -> Self {
        let (keys, vectors): (Vec<IdentityKey>, Vec<Vector>) = encoding
            .iter()
            .map(|(key, vector)| (key.clone(), Self::prepare(vector, metric)))
            .unzip();
        Self {
            metric,
            dim: encoding.dim(),
            keys,
            vectors,
        }
    }

    /// Build from arbitrary vectors. All vectors must share one dimension;
    /// a repeated key keeps its last vector.
    pub fn from_vectors(mut entries: Vec<(IdentityKey, Vector)>, metric: Metric) -> Result<Self> {
        let dim = entries.first().map(|(_, v)| v.dim()).unwrap_or(0);
        if let Some((_, bad)) = entries.iter().find(|(_, v)| v.dim() != dim) {
            return Err(Error::DimensionMismatch {
                expected: dim,
                actual: bad.dim(),
            });
        }

        // stable sort keeps insertion order within a key; keep the last one
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        let mut deduped: Vec<(IdentityKey, Vector)> = Vec::with_capacity(entries.len());
        for entry in entries {
            match deduped.last_mut() {
                Some(last) if last.0 == entry.0 => *last = entry,
                _ => deduped.push(entry),
            }
        }

        let (keys, vectors) = deduped
            .into_iter()
            .map(|(key, vector)| (key, Self::prepare(&vector, metric)))
            .unzip();
        Ok(Self {
            metric,
            dim,
            keys,
            vectors,
        })
    }

    fn prepare(vector: &Vector, metric: Metric) -> Vector {
        match metric {
            Metric::Cosine => vector.normalized(),
            Metric::Euclidean => vector.clone(),
        }
    }

    #[inline]
    pub fn metric(&self) -> Metric {
        self.metric
    }

    #[inline]
    pub fn dim(&self) -> usize {
        self.dim
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn contains(&self, key: &IdentityKey) -> bool {
        self.keys.binary_search(key).is_ok()
    }

    /// The `k` nearest entries to `query`, skipping `exclude` when given.
    pub fn query(&self, query: &Vector, k: usize, exclude: Option<&IdentityKey>) -> Result<Vec<Neighbor>> {
        if query.dim() != self.dim {
            return Err(Error::DimensionMismatch {
                expected: self.dim,
                actual: query.dim(),
            });
        }
        if k == 0 {
            return Ok(Vec::new());
        }

        let query = Self::prepare(query, self.metric);
        let mut hits: Vec<Neighbor> = self
            .keys
            .par_iter()
            .zip(self.vectors.par_iter())
            .filter(|(key, _)| exclude != Some(*key))
            .map(|(key, vector)| Neighbor {
                key: key.clone(),
                score: self.score(&query, vector),
            })
            .collect();

        hits.sort_by(compare_neighbors);
        hits.truncate(k);
        Ok(hits)
    }

    /// Neighbors of an indexed entry, never including the entry itself.
    pub fn query_key(&self, key: &IdentityKey, k: usize) -> Result<Vec<Neighbor>> {
        let position = self
            .keys
            .binary_search(key)
            .map_err(|_| Error::UnknownRecord(key.to_string()))?;
        let vector = self.vectors[position].clone();
        self.query(&vector, k, Some(key))
    }

    #[inline]
    fn score(&self, query: &Vector, candidate: &Vector) -> f32 {
        let score = match self.metric {
            Metric::Cosine => query.dot(candidate),
            Metric::Euclidean => -query.l2_distance(candidate),
        };
        if score.is_nan() {
            f32::NEG_INFINITY
        } else {
            score
        }
    }
}

// Descending score, then ascending key
fn compare_neighbors(a: &Neighbor, b: &Neighbor) -> Ordering {
    OrderedFloat(b.score)
        .cmp(&OrderedFloat(a.score))
        .then_with(|| a.key.cmp(&b.key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn key(title: &str) -> IdentityKey {
        IdentityKey::new("artist", title)
    }

    fn index(metric: Metric) -> SimilarityIndex {
        SimilarityIndex::from_vectors(
            vec![
                (key("a"), Vector::new(vec![1.0, 0.0])),
                (key("b"), Vector::new(vec![0.9, 0.1])),
                (key("c"), Vector::new(vec![0.0, 1.0])),
                (key("d"), Vector::new(vec![2.0, 0.0])),
            ],
            metric,
        )
        .unwrap()
    }

    #[test]
    fn test_query_key_excludes_self() {
        let index = index(Metric::Cosine);
        let hits = index.query_key(&key("a"), 10).unwrap();
        assert_eq!(hits.len(), 3);
        assert!(hits.iter().all(|n| n.key != key("a")));
        // d is parallel to a: cosine 1.0
        assert_eq!(hits[0].key, key("d"));
        assert_eq!(hits[2].key, key("c"));
    }

    #[test]
    fn test_cosine_ignores_magnitude_euclidean_does_not() {
        let cosine = index(Metric::Cosine).query(&Vector::new(vec![1.0, 0.0]), 2, None).unwrap();
        // a and d tie at 1.0, broken by key
        assert_eq!(cosine[0].key, key("a"));
        assert_eq!(cosine[1].key, key("d"));

        let euclid = index(Metric::Euclidean).query(&Vector::new(vec![1.0, 0.0]), 2, None).unwrap();
        assert_eq!(euclid[0].key, key("a"));
        assert_eq!(euclid[1].key, key("b"));
        assert!(euclid[0].score >= euclid[1].score);
    }

    #[test]
    fn test_ties_broken_by_key() {
        let index = SimilarityIndex::from_vectors(
            vec![
                (key("z"), Vector::new(vec![1.0])),
                (key("m"), Vector::new(vec![1.0])),
                (key("b"), Vector::new(vec![1.0])),
            ],
            Metric::Cosine,
        )
        .unwrap();
        let hits = index.query(&Vector::new(vec![1.0]), 3, None).unwrap();
        let titles: Vec<&str> = hits.iter().map(|n| n.key.title()).collect();
        assert_eq!(titles, vec!["b", "m", "z"]);
    }

    #[test]
    fn test_k_zero_and_unknown_key() {
        let index = index(Metric::Cosine);
        assert!(index.query(&Vector::new(vec![1.0, 0.0]), 0, None).unwrap().is_empty());
        assert!(matches!(index.query_key(&key("nope"), 3), Err(Error::UnknownRecord(_))));
    }

    #[test]
    fn test_dimension_mismatch() {
        let index = index(Metric::Cosine);
        assert!(matches!(
            index.query(&Vector::new(vec![1.0]), 3, None),
            Err(Error::DimensionMismatch { expected: 2, actual: 1 })
        ));
        let err = SimilarityIndex::from_vectors(
            vec![(key("a"), Vector::new(vec![1.0])), (key("b"), Vector::new(vec![1.0, 2.0]))],
            Metric::Cosine,
        );
        assert!(err.is_err());
    }

    #[test]
    fn test_single_entry_has_no_neighbors() {
        let index = SimilarityIndex::from_vectors(vec![(key("solo"), Vector::new(vec![1.0]))], Metric::Cosine).unwrap();
        assert!(index.query_key(&key("solo"), 5).unwrap().is_empty());
    }

    #[test]
    fn test_duplicate_key_keeps_last() {
        let index = SimilarityIndex::from_vectors(
            vec![(key("a"), Vector::new(vec![1.0, 0.0])), (key("a"), Vector::new(vec![0.0, 1.0]))],
            Metric::Euclidean,
        )
        .unwrap();
        assert_eq!(index.len(), 1);
        let hits = index.query(&Vector::new(vec![0.0, 1.0]), 1, None).unwrap();
        assert_eq!(hits[0].score, 0.0);
    }

    proptest! {
        #[test]
        fn prop_query_key_bounded_and_self_free(
            rows in prop::collection::vec(prop::collection::vec(-10.0f32..10.0, 3), 1..30),
            k in 0usize..40,
            pick in 0usize..30,
        ) {
            let entries: Vec<(IdentityKey, Vector)> = rows
                .into_iter()
                .enumerate()
                .map(|(i, v)| (key(&format!("t{i:03}")), Vector::new(v)))
                .collect();
            let n = entries.len();
            let target = entries[pick % n].0.clone();
            let index = SimilarityIndex::from_vectors(entries, Metric::Cosine).unwrap();
            let hits = index.query_key(&target, k).unwrap();
            prop_assert!(hits.len() <= k.min(n - 1));
            prop_assert!(hits.iter().all(|h| h.key != target));
            for pair in hits.windows(2) {
                prop_assert!(compare_neighbors(&pair[0], &pair[1]) != Ordering::Greater);
            }
        }
    }
}
