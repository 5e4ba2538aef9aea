use crate::blend::BlendWeights;
use crate::explain::{CrateReport, CrateSummary, ExplainedPick};
use crate::score::{ScoreKind, ScoreParams, ScoreSet, Scored, ScoringEngine};
use crate::selector::{Candidate, CrateSelector, Selection, DEMAND_FIELDS};
use ahash::AHashMap;
use nextspin_core::{Error, IdentityKey, Record, Result};

/// What a crate is ranked by.
#[derive(Debug, Clone, PartialEq)]
pub enum Ranking {
    Score(ScoreKind),
    Blend(BlendWeights),
}

impl Ranking {
    pub fn name(&self) -> String {
        match self {
            Ranking::Score(kind) => kind.name().to_string(),
            Ranking::Blend(weights) => {
                let parts: Vec<String> = weights
                    .iter()
                    .map(|(kind, weight)| format!("{}={weight:.3}", kind.name()))
                    .collect();
                format!("blend({})", parts.join(","))
            }
        }
    }

    fn rank(&self, scored: &[Scored<'_>]) -> Vec<f64> {
        match self {
            Ranking::Score(kind) => scored.iter().map(|s| s.scores.get(*kind)).collect(),
            Ranking::Blend(weights) => weights.blend(scored),
        }
    }
}

impl Default for Ranking {
    fn default() -> Self {
        Ranking::Score(ScoreKind::Value)
    }
}

/// Score a population, select the crate, and explain it.
#[derive(Debug, Clone, Default)]
pub struct CrateBuilder {
    engine: ScoringEngine,
    selector: CrateSelector,
}

impl CrateBuilder {
    pub fn new(engine: ScoringEngine, selector: CrateSelector) -> Self {
        Self { engine, selector }
    }

    /// Builder from plain request parameters. `min_known` may be at most
    /// the number of demand fields; `k = 0` asks for an empty crate.
    pub fn from_params(k: usize, price_weight: f64, min_known: Option<usize>) -> Result<Self> {
        let mut selector = CrateSelector::new(k);
        if let Some(min) = min_known {
            if min > DEMAND_FIELDS.len() {
                return Err(Error::invalid(
                    "min_known",
                    format!("must be at most {}, got {min}", DEMAND_FIELDS.len()),
                ));
            }
            selector = selector.with_min_known(min);
        }
        let engine = ScoringEngine::new(ScoreParams::new(price_weight)?)?;
        Ok(Self::new(engine, selector))
    }

    pub fn engine(&self) -> &ScoringEngine {
        &self.engine
    }

    pub fn selector(&self) -> &CrateSelector {
        &self.selector
    }

    pub fn build(&self, records: &[&Record], ranking: &Ranking) -> CrateReport {
        let scored = self.engine.score_all(records);
        let candidates: Vec<Candidate> = scored
            .iter()
            .zip(ranking.rank(&scored))
            .map(|(s, score)| Candidate::new(s.record, score))
            .collect();
        let selection = self.selector.select(candidates);
        self.report(&scored, records, selection, ranking.name())
    }

    /// Select from externally computed scores. Records missing from
    /// `scores` are not ranked.
    pub fn build_external(&self, records: &[&Record], scores: &AHashMap<IdentityKey, f64>, name: &str) -> CrateReport {
        let scored = self.engine.score_all(records);
        let candidates: Vec<Candidate> = records
            .iter()
            .filter_map(|&record| scores.get(&record.key).map(|&score| Candidate::new(record, score)))
            .collect();
        let selection = self.selector.select(candidates);
        self.report(&scored, records, selection, name.to_string())
    }

    fn report(&self, scored: &[Scored<'_>], records: &[&Record], selection: Selection<'_>, ranking: String) -> CrateReport {
        let by_key: AHashMap<&IdentityKey, ScoreSet> =
            scored.iter().map(|s| (&s.record.key, s.scores)).collect();
        let explain = |candidates: &[Candidate<'_>]| -> Vec<ExplainedPick> {
            candidates
                .iter()
                .enumerate()
                .map(|(i, c)| {
                    let scores = by_key.get(c.key()).copied().unwrap_or_default();
                    ExplainedPick::from_candidate(i + 1, c, scores)
                })
                .collect()
        };

        let picks = explain(&selection.picks);
        let fallback = if selection.is_insufficient() {
            tracing::debug!(population = records.len(), "no record qualified, ranking by demand");
            explain(&self.selector.fallback_by_demand(records))
        } else {
            Vec::new()
        };

        let shown = if picks.is_empty() { &fallback } else { &picks };
        let summary = CrateSummary::compute(shown.iter().map(|p| &p.record));

        CrateReport {
            status: selection.status,
            ranking,
            picks,
            fallback,
            summary,
        }
    }
}
