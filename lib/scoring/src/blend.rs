use crate::score::{ScoreKind, Scored};
use nextspin_core::{Error, Result};
use ordered_float::OrderedFloat;
use serde::Serialize;
use std::collections::BTreeMap;

/// Normalized weights over score kinds.
///
/// Each component is min-max scaled over the scored population before
/// weighting, so scores with very different magnitudes contribute in
/// proportion to their weight rather than their range.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlendWeights {
    weights: BTreeMap<ScoreKind, f64>,
}

impl BlendWeights {
    /// Validate and normalize to sum to 1. Repeated kinds add up.
    pub fn new<I>(weights: I) -> Result<Self>
    where
        I: IntoIterator<Item = (ScoreKind, f64)>,
    {
        let mut merged: BTreeMap<ScoreKind, f64> = BTreeMap::new();
        for (kind, weight) in weights {
            if !weight.is_finite() || weight < 0.0 {
                return Err(Error::invalid(
                    "weights",
                    format!("weight for {kind} must be a finite number >= 0, got {weight}"),
                ));
            }
            *merged.entry(kind).or_insert(0.0) += weight;
        }

        if merged.is_empty() {
            return Err(Error::invalid("weights", "at least one score weight is required"));
        }

        let total: f64 = merged.values().sum();
        if total <= 0.0 {
            return Err(Error::invalid("weights", "weights must not all be zero"));
        }

        merged.retain(|_, w| *w > 0.0);
        for weight in merged.values_mut() {
            *weight /= total;
        }
        Ok(Self { weights: merged })
    }

    /// Build from score names as they appear in requests.
    pub fn from_names<'a, I>(weights: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, f64)>,
    {
        let parsed = weights
            .into_iter()
            .map(|(name, weight)| Ok((name.parse::<ScoreKind>()?, weight)))
            .collect::<Result<Vec<_>>>()?;
        Self::new(parsed)
    }

    /// Parse `value=0.7,deep_cut=0.3`.
    pub fn parse(text: &str) -> Result<Self> {
        let mut pairs = Vec::new();
        for part in text.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (name, weight) = part
                .split_once('=')
                .ok_or_else(|| Error::invalid("weights", format!("expected name=weight, got '{part}'")))?;
            let weight: f64 = weight
                .trim()
                .parse()
                .map_err(|_| Error::invalid("weights", format!("'{}' is not a number", weight.trim())))?;
            pairs.push((name.trim(), weight));
        }
        Self::from_names(pairs)
    }

    pub fn weight(&self, kind: ScoreKind) -> f64 {
        self.weights.get(&kind).copied().unwrap_or(0.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ScoreKind, f64)> + '_ {
        self.weights.iter().map(|(&kind, &weight)| (kind, weight))
    }

    /// Blended score per entry of `scored`, in the same order. Each value
    /// lies in [0, 1].
    pub fn blend(&self, scored: &[Scored<'_>]) -> Vec<f64> {
        let mut blended = vec![0.0; scored.len()];
        for (kind, weight) in self.iter() {
            let column: Vec<f64> = scored.iter().map(|s| s.scores.get(kind)).collect();
            for (total, scaled) in blended.iter_mut().zip(min_max(&column)) {
                *total += weight * scaled;
            }
        }
        blended
    }
}

// Constant columns scale to 0
fn min_max(column: &[f64]) -> Vec<f64> {
    let min = column.iter().copied().map(OrderedFloat).min().map(|v| v.0);
    let max = column.iter().copied().map(OrderedFloat).max().map(|v| v.0);
    match (min, max) {
        (Some(min), Some(max)) if max - min > f64::EPSILON => {
            column.iter().map(|v| (v - min) / (max - min)).collect()
        }
        _ => vec![0.0; column.len()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::score::ScoreSet;
    use nextspin_core::Record;

    #[test]
    fn test_weights_normalized() {
        let weights = BlendWeights::new([(ScoreKind::Value, 3.0), (ScoreKind::DeepCut, 1.0)]).unwrap();
        assert!((weights.weight(ScoreKind::Value) - 0.75).abs() < 1e-12);
        assert!((weights.weight(ScoreKind::DeepCut) - 0.25).abs() < 1e-12);
        assert_eq!(weights.weight(ScoreKind::Essential), 0.0);
    }

    #[test]
    fn test_invalid_weights() {
        assert!(BlendWeights::new(Vec::<(ScoreKind, f64)>::new()).is_err());
        assert!(BlendWeights::new([(ScoreKind::Value, 0.0)]).is_err());
        assert!(BlendWeights::new([(ScoreKind::Value, -1.0), (ScoreKind::Essential, 2.0)]).is_err());
        assert!(BlendWeights::new([(ScoreKind::Value, f64::NAN)]).is_err());
    }

    #[test]
    fn test_parse() {
        let weights = BlendWeights::parse("value=0.7, deep-cut=0.3").unwrap();
        assert!((weights.weight(ScoreKind::Value) - 0.7).abs() < 1e-12);
        assert!((weights.weight(ScoreKind::DeepCut) - 0.3).abs() < 1e-12);
        assert!(BlendWeights::parse("value").is_err());
        assert!(BlendWeights::parse("value=abc").is_err());
        assert!(BlendWeights::parse("rarity=1").is_err());
    }

    #[test]
    fn test_blend_min_max_scaled() {
        let records = [Record::new("A", "1"), Record::new("A", "2"), Record::new("A", "3")];
        let sets = [
            ScoreSet { value_score: 0.01, essential_score: 50.0, ..Default::default() },
            ScoreSet { value_score: 0.03, essential_score: 10.0, ..Default::default() },
            ScoreSet { value_score: 0.02, essential_score: 30.0, ..Default::default() },
        ];
        let scored: Vec<Scored> = records
            .iter()
            .zip(sets)
            .map(|(record, scores)| Scored { record, scores })
            .collect();

        let weights = BlendWeights::new([(ScoreKind::Value, 1.0), (ScoreKind::Essential, 1.0)]).unwrap();
        let blended = weights.blend(&scored);
        assert!((blended[0] - 0.5).abs() < 1e-12);
        assert!((blended[1] - 0.5).abs() < 1e-12);
        assert!((blended[2] - 0.5).abs() < 1e-12);

        // constant column contributes nothing
        let smart_only = BlendWeights::new([(ScoreKind::SmartBuy, 1.0)]).unwrap();
        assert!(smart_only.blend(&scored).iter().all(|&v| v == 0.0));
    }
}
