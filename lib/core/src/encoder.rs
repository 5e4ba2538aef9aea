//! Feature encoding
//!
//! Turns every record of a [`RecordStore`] into a fixed-length [`Vector`]:
//!
//! ```text
//! [ tf-idf(genre + style + label tokens) ... | scaled(year) | scaled(...) ]
//!   one column per vocabulary term, sorted     one column per numeric attr,
//!                                              in configured order
//! ```
//!
//! Vocabulary and scaling statistics are fit once per pass over the whole
//! population, so all vectors of one [`Encoding`] are comparable. Any change
//! to the store means a new pass.

use crate::error::Result;
use crate::record::{CategoricalAttr, IdentityKey, NumericAttr, Record};
use crate::store::RecordStore;
use crate::tfidf::TfIdfVectorizer;
use crate::vector::Vector;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// How numeric attributes are brought onto a common scale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scaling {
    /// Zero mean, unit variance
    #[default]
    Standard,
    /// Min-max into [0, 1]
    MinMax,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncoderConfig {
    /// Tag attributes pooled into the token bag
    pub categorical: Vec<CategoricalAttr>,
    /// Numeric attributes appended after the text block, in this order
    pub numeric: Vec<NumericAttr>,
    pub scaling: Scaling,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            categorical: CategoricalAttr::ALL.to_vec(),
            numeric: vec![NumericAttr::Year],
            scaling: Scaling::Standard,
        }
    }
}

/// Per-attribute scaling statistics fit over one population.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericScaler {
    pub attr: NumericAttr,
    /// Mean of the known values, used to impute missing ones
    pub mean: f64,
    offset: f64,
    // zero when the population has no spread
    scale: f64,
}

impl NumericScaler {
    fn fit(attr: NumericAttr, values: &[Option<f64>], scaling: Scaling) -> Self {
        let known: Vec<f64> = values.iter().flatten().copied().collect();
        let mean = if known.is_empty() {
            0.0
        } else {
            running_mean(&known)
        };

        let imputed: Vec<f64> = values.iter().map(|v| v.unwrap_or(mean)).collect();

        let (offset, spread) = match scaling {
            Scaling::Standard => {
                let variance = if imputed.is_empty() {
                    0.0
                } else {
                    imputed.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / imputed.len() as f64
                };
                (mean, variance.sqrt())
            }
            Scaling::MinMax => {
                let min = imputed.iter().copied().fold(f64::INFINITY, f64::min);
                let max = imputed.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                if min.is_finite() && max.is_finite() {
                    (min, max - min)
                } else {
                    (0.0, 0.0)
                }
            }
        };

        let scale = if spread.is_finite() && spread > f64::EPSILON {
            1.0 / spread
        } else {
            0.0
        };

        Self {
            attr,
            mean,
            offset,
            scale,
        }
    }

    /// Scaled value; missing inputs are imputed with the population mean
    pub fn transform(&self, value: Option<f64>) -> f32 {
        let value = value.unwrap_or(self.mean);
        ((value - self.offset) * self.scale) as f32
    }

    /// `false` when the population had no spread and every value scales to 0
    pub fn is_informative(&self) -> bool {
        self.scale > 0.0
    }
}

// Incremental mean; no intermediate sum that could overflow
fn running_mean(values: &[f64]) -> f64 {
    let mut mean = 0.0;
    for (i, v) in values.iter().enumerate() {
        mean += (v - mean) / (i + 1) as f64;
    }
    mean
}

#[derive(Debug, Clone, Default)]
pub struct FeatureEncoder {
    config: EncoderConfig,
}

impl FeatureEncoder {
    pub fn new(config: EncoderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }

    /// Run one encoding pass over the whole store.
    pub fn encode(&self, store: &RecordStore) -> Encoding {
        let records: Vec<&Record> = store.iter().collect();

        let bags: Vec<Vec<String>> = records
            .par_iter()
            .map(|record| token_bag(record, &self.config.categorical))
            .collect();
        let tfidf = TfIdfVectorizer::fit(&bags);

        let scalers: Vec<NumericScaler> = self
            .config
            .numeric
            .iter()
            .map(|&attr| {
                let values: Vec<Option<f64>> = records.iter().map(|r| r.numeric(attr)).collect();
                NumericScaler::fit(attr, &values, self.config.scaling)
            })
            .collect();

        let vectors: Vec<Vector> = records
            .par_iter()
            .zip(bags.par_iter())
            .map(|(record, bag)| assemble(&tfidf, &scalers, record, bag))
            .collect();

        Encoding {
            generation: store.generation(),
            categorical: self.config.categorical.clone(),
            tfidf,
            scalers,
            keys: records.iter().map(|r| r.key.clone()).collect(),
            vectors,
        }
    }
}

fn token_bag(record: &Record, attrs: &[CategoricalAttr]) -> Vec<String> {
    attrs
        .iter()
        .flat_map(|&attr| record.tags(attr).iter())
        .flat_map(|tag| TfIdfVectorizer::tokenize(tag))
        .collect()
}

fn assemble(tfidf: &TfIdfVectorizer, scalers: &[NumericScaler], record: &Record, bag: &[String]) -> Vector {
    let mut components = tfidf.transform(bag);
    components.extend(scalers.iter().map(|s| s.transform(record.numeric(s.attr))));
    Vector::new(components)
}

/// Output of one encoding pass: one vector per record, in key order.
#[derive(Debug, Clone)]
pub struct Encoding {
    generation: u64,
    categorical: Vec<CategoricalAttr>,
    tfidf: TfIdfVectorizer,
    scalers: Vec<NumericScaler>,
    keys: Vec<IdentityKey>,
    vectors: Vec<Vector>,
}

impl Encoding {
    /// Store generation this encoding was fit on
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Vector dimension: vocabulary size plus one column per numeric attribute
    #[inline]
    pub fn dim(&self) -> usize {
        self.tfidf.vocabulary_len() + self.scalers.len()
    }

    pub fn vocabulary(&self) -> &TfIdfVectorizer {
        &self.tfidf
    }

    pub fn scalers(&self) -> &[NumericScaler] {
        &self.scalers
    }

    pub fn vector(&self, key: &IdentityKey) -> Option<&Vector> {
        self.keys
            .binary_search(key)
            .ok()
            .map(|position| &self.vectors[position])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&IdentityKey, &Vector)> {
        self.keys.iter().zip(self.vectors.iter())
    }

    /// Column labels in vector order, `text:<term>` then `numeric:<attr>`.
    pub fn feature_names(&self) -> Vec<String> {
        self.tfidf
            .terms()
            .map(|term| format!("text:{term}"))
            .chain(self.scalers.iter().map(|s| format!("numeric:{}", s.attr.name())))
            .collect()
    }

    /// Encode a record that may not be part of the fitted population, using
    /// this pass's vocabulary and statistics.
    pub fn encode_record(&self, record: &Record) -> Vector {
        let bag = token_bag(record, &self.categorical);
        assemble(&self.tfidf, &self.scalers, record, &bag)
    }

    /// Mean of all vectors: the collection's taste profile.
    pub fn taste_profile(&self) -> Result<Option<Vector>> {
        Vector::mean(self.vectors.iter())
    }
}
