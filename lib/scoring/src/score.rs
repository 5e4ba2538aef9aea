//! Null-safe scarcity and demand scores
//!
//! Every formula substitutes a neutral default for a missing input before
//! any arithmetic, and every divisor is at least 1:
//!
//! | input          | default |
//! |----------------|---------|
//! | `want_count`   | 1       |
//! | `have_count`   | 1       |
//! | `lowest_price` | 30      |
//! | `num_for_sale` | 10      |
//!
//! Negative inputs are clamped to 0. Scores are therefore always finite and
//! non-negative.

use ahash::AHashMap;
use nextspin_core::{Error, NumericAttr, Record, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_WANT: f64 = 1.0;
pub const DEFAULT_HAVE: f64 = 1.0;
pub const DEFAULT_PRICE: f64 = 30.0;
pub const DEFAULT_FOR_SALE: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreKind {
    /// Demand per unit of scarcity, discounted by price
    Value,
    /// Value penalized by current supply
    SmartBuy,
    /// Want over have, independent of price or supply
    Essential,
    /// Under-wanted relative to the artist's average
    DeepCut,
}

impl ScoreKind {
    pub const ALL: [ScoreKind; 4] = [
        ScoreKind::Value,
        ScoreKind::SmartBuy,
        ScoreKind::Essential,
        ScoreKind::DeepCut,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ScoreKind::Value => "value_score",
            ScoreKind::SmartBuy => "smart_buy_score",
            ScoreKind::Essential => "essential_score",
            ScoreKind::DeepCut => "deep_cut_score",
        }
    }
}

impl fmt::Display for ScoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ScoreKind {
    type Err = Error;

    /// Accepts `value_score`, `value`, `smart-buy`, `SmartBuy` and the like.
    fn from_str(s: &str) -> Result<Self> {
        let folded: String = s
            .trim()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        let folded = folded.strip_suffix("score").unwrap_or(&folded);
        match folded {
            "value" => Ok(ScoreKind::Value),
            "smartbuy" => Ok(ScoreKind::SmartBuy),
            "essential" => Ok(ScoreKind::Essential),
            "deepcut" => Ok(ScoreKind::DeepCut),
            _ => Err(Error::UnknownScore(s.to_string())),
        }
    }
}

/// Caller-controlled scoring parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreParams {
    /// Price sensitivity of the value score; 0 ignores price entirely
    pub price_weight: f64,
}

impl Default for ScoreParams {
    fn default() -> Self {
        Self { price_weight: 1.0 }
    }
}

impl ScoreParams {
    pub fn new(price_weight: f64) -> Result<Self> {
        let params = Self { price_weight };
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.price_weight.is_finite() || self.price_weight < 0.0 {
            return Err(Error::invalid(
                "price_weight",
                format!("must be a finite number >= 0, got {}", self.price_weight),
            ));
        }
        Ok(())
    }
}

/// Named scores for one record.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScoreSet {
    pub value_score: f64,
    pub smart_buy_score: f64,
    pub essential_score: f64,
    pub deep_cut_score: f64,
}

impl ScoreSet {
    pub fn get(&self, kind: ScoreKind) -> f64 {
        match kind {
            ScoreKind::Value => self.value_score,
            ScoreKind::SmartBuy => self.smart_buy_score,
            ScoreKind::Essential => self.essential_score,
            ScoreKind::DeepCut => self.deep_cut_score,
        }
    }
}

/// A record paired with its scores. Borrowed from the population it was
/// scored against; scores are never stored on the record.
#[derive(Debug, Clone, Copy)]
pub struct Scored<'a> {
    pub record: &'a Record,
    pub scores: ScoreSet,
}

#[derive(Debug, Clone, Default)]
pub struct ScoringEngine {
    params: ScoreParams,
}

impl ScoringEngine {
    pub fn new(params: ScoreParams) -> Result<Self> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn params(&self) -> &ScoreParams {
        &self.params
    }

    /// Score every record against the peer groups of `records`. Output
    /// order follows input order.
    pub fn score_all<'a>(&self, records: &[&'a Record]) -> Vec<Scored<'a>> {
        let artist_means = artist_mean_wants(records);
        records
            .iter()
            .map(|&record| {
                let artist = record.key.artist();
                let artist_mean = if artist.is_empty() {
                    None
                } else {
                    artist_means.get(artist).copied()
                };
                Scored {
                    record,
                    scores: self.score(record, artist_mean),
                }
            })
            .collect()
    }

    /// Scores for one record. `artist_mean` is the mean want count of the
    /// record's artist group, `None` when the record has no artist.
    pub fn score(&self, record: &Record, artist_mean: Option<f64>) -> ScoreSet {
        let want = input(record, NumericAttr::WantCount, DEFAULT_WANT);
        let have = input(record, NumericAttr::HaveCount, DEFAULT_HAVE);
        let price = input(record, NumericAttr::LowestPrice, DEFAULT_PRICE);
        let for_sale = input(record, NumericAttr::NumForSale, DEFAULT_FOR_SALE);

        let value = (want / (have + 1.0)) * (1.0 / (price * self.params.price_weight + 1.0));
        let smart_buy = value * (1.0 / (for_sale + 1.0));
        let essential = want / have.max(1.0);
        let deep_cut = match artist_mean {
            Some(mean) => (mean / want.max(1.0)) / have.max(1.0),
            None => 0.0,
        };

        ScoreSet {
            value_score: finite(value),
            smart_buy_score: finite(smart_buy),
            essential_score: finite(essential),
            deep_cut_score: finite(deep_cut),
        }
    }
}

#[inline]
fn input(record: &Record, attr: NumericAttr, default: f64) -> f64 {
    record.numeric(attr).map(|v| v.max(0.0)).unwrap_or(default)
}

#[inline]
fn finite(score: f64) -> f64 {
    if score.is_finite() {
        score.max(0.0)
    } else {
        0.0
    }
}

/// Mean known want count per artist. Groups without any known want use
/// the neutral default.
fn artist_mean_wants(records: &[&Record]) -> AHashMap<String, f64> {
    // artist -> (running mean, known count)
    let mut groups: AHashMap<String, (f64, usize)> = AHashMap::new();
    for record in records {
        let artist = record.key.artist();
        if artist.is_empty() {
            continue;
        }
        let entry = groups.entry(artist.to_string()).or_insert((0.0, 0));
        if let Some(want) = record.numeric(NumericAttr::WantCount) {
            entry.1 += 1;
            entry.0 += (want.max(0.0) - entry.0) / entry.1 as f64;
        }
    }
    groups
        .into_iter()
        .map(|(artist, (mean, known))| (artist, if known == 0 { DEFAULT_WANT } else { mean }))
        .collect()
}
