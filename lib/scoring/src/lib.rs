//! # NextSpin Scoring
//!
//! Scarcity and demand scores over partial records, and top-K crate
//! selection on top of them.
//!
//! - [`ScoringEngine`] - value, smart-buy, essential and deep-cut scores
//! - [`BlendWeights`] - weighted mix of min-max scaled scores
//! - [`CrateSelector`] - deterministic top-K with deduplication
//! - [`CrateBuilder`] - score, select and explain in one pass

pub mod blend;
pub mod builder;
pub mod explain;
pub mod score;
pub mod selector;

pub use blend::BlendWeights;
pub use builder::{CrateBuilder, Ranking};
pub use explain::{CrateReport, CrateSummary, ExplainedPick};
pub use score::{ScoreKind, ScoreParams, ScoreSet, Scored, ScoringEngine};
pub use selector::{Candidate, CrateSelector, CrateStatus, Selection, DEFAULT_K, DEMAND_FIELDS};
