//! Crate output with per-pick score breakdown

use crate::score::ScoreSet;
use crate::selector::{Candidate, CrateStatus};
use nextspin_core::{NumericAttr, Record};
use serde::Serialize;

/// One selected record with the score it was ranked by and its full
/// [`ScoreSet`].
#[derive(Debug, Clone, Serialize)]
pub struct ExplainedPick {
    /// 1-based position in the crate
    pub rank: usize,
    pub score: f64,
    pub scores: ScoreSet,
    pub record: Record,
}

impl ExplainedPick {
    pub fn from_candidate(rank: usize, candidate: &Candidate<'_>, scores: ScoreSet) -> Self {
        Self {
            rank,
            score: candidate.score,
            scores,
            record: candidate.record.clone(),
        }
    }
}

/// Totals for a selected crate
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrateSummary {
    pub count: usize,
    /// Picks with a known price
    pub priced: usize,
    /// Sum of known prices
    pub total_cost: f64,
    /// `None` when no pick has a known price
    pub avg_price: Option<f64>,
}

impl CrateSummary {
    pub fn compute<'a, I>(records: I) -> Self
    where
        I: IntoIterator<Item = &'a Record>,
    {
        let mut count = 0;
        let mut priced = 0;
        let mut total_cost = 0.0;
        for record in records {
            count += 1;
            if let Some(price) = record.numeric(NumericAttr::LowestPrice) {
                priced += 1;
                total_cost += price;
            }
        }
        Self {
            count,
            priced,
            total_cost,
            avg_price: (priced > 0).then(|| total_cost / priced as f64),
        }
    }
}

/// Everything a presentation layer needs to show one crate.
#[derive(Debug, Clone, Serialize)]
pub struct CrateReport {
    pub status: CrateStatus,
    /// Name of the score or blend the picks are ranked by
    pub ranking: String,
    pub picks: Vec<ExplainedPick>,
    /// Demand-ranked records, filled only when `status` is insufficient data
    pub fallback: Vec<ExplainedPick>,
    /// Summary of `picks`, or of `fallback` when there are no picks
    pub summary: CrateSummary,
}

impl CrateReport {
    pub fn shown(&self) -> &[ExplainedPick] {
        if self.picks.is_empty() {
            &self.fallback
        } else {
            &self.picks
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_totals() {
        let records = vec![
            Record::new("A", "1").with_numeric(NumericAttr::LowestPrice, 20.0),
            Record::new("A", "2"),
            Record::new("A", "3").with_numeric(NumericAttr::LowestPrice, 10.0),
        ];
        let summary = CrateSummary::compute(&records);
        assert_eq!(summary.count, 3);
        assert_eq!(summary.priced, 2);
        assert_eq!(summary.total_cost, 30.0);
        assert_eq!(summary.avg_price, Some(15.0));
    }

    #[test]
    fn test_summary_without_prices() {
        let records = vec![Record::new("A", "1")];
        let summary = CrateSummary::compute(&records);
        assert_eq!(summary.total_cost, 0.0);
        assert_eq!(summary.avg_price, None);

        let empty = CrateSummary::compute(std::iter::empty::<&Record>());
        assert_eq!(empty.count, 0);
    }

    #[test]
    fn test_pick_json_shape() {
        let record = Record::new("Can", "Tago Mago");
        let pick = ExplainedPick::from_candidate(1, &Candidate::new(&record, 0.5), ScoreSet::default());
        let json = serde_json::to_value(&pick).unwrap();
        assert_eq!(json["rank"], 1);
        assert_eq!(json["score"], 0.5);
        assert_eq!(json["scores"]["value_score"], 0.0);
        assert_eq!(json["record"]["artist"], "Can");
    }
}
