//! # NextSpin
//!
//! Crate-digging recommendations for record collectors.
//!
//! NextSpin keeps a table of records (artist, title, genre/style/label tags
//! and marketplace numbers), encodes them into feature vectors, and answers
//! two kinds of questions:
//!
//! - **What is like this?** Exact nearest neighbors over TF-IDF tag vectors
//!   plus scaled numeric features, and the records closest to the
//!   collection's overall taste.
//! - **What should I dig for next?** Scarcity/demand scores (`value`,
//!   `smart_buy`, `essential`, `deep_cut`) and a top-K crate selection.
//!
//! Metadata comes from the Discogs catalog: a rate-limited client, a lookup
//! plan per record, and a field-level fusion that never lets a weaker source
//! overwrite a stronger one.
//!
//! ## Crates
//!
//! - [`nextspin_core`] - records, store, encoding, similarity index, fusion
//! - [`nextspin_scoring`] - scores, blends, crate selection
//! - [`nextspin_catalog`] - catalog client, enrichment, collection import
//! - [`nextspin_storage`] - the CSV working dataset
//! - [`nextspin_api`] - JSON HTTP API
//!
//! ## Example
//!
//! ```rust
//! use nextspin::prelude::*;
//!
//! let store: RecordStore = vec![
//!     Record::new("Miles Davis", "Kind of Blue")
//!         .with_numeric(NumericAttr::LowestPrice, 20.0)
//!         .with_numeric(NumericAttr::WantCount, 10.0),
//!     Record::new("John Coltrane", "Blue Train")
//!         .with_numeric(NumericAttr::LowestPrice, 35.0)
//!         .with_numeric(NumericAttr::WantCount, 30.0)
//!         .with_numeric(NumericAttr::HaveCount, 60.0),
//! ]
//! .into_iter()
//! .collect();
//!
//! let records: Vec<&Record> = store.iter().collect();
//! let report = CrateBuilder::default().build(&records, &Ranking::Score(ScoreKind::Value));
//! assert_eq!(report.picks[0].record.title, "Kind of Blue");
//! ```

pub use nextspin_api;
pub use nextspin_catalog;
pub use nextspin_core;
pub use nextspin_scoring;
pub use nextspin_storage;

pub mod prelude {
    pub use nextspin_api::{AppState, RestApi};
    pub use nextspin_catalog::{
        ingest_collection, CatalogConfig, CatalogError, CatalogSource, DiscogsClient, Enricher, EnrichmentReport,
        ImportReport, LookupRequest,
    };
    pub use nextspin_core::{
        CategoricalAttr, EncoderConfig, Error, FeatureEncoder, FilterCondition, FilterParams, FusionOutcome,
        FusionResolver, IdentityKey, Metric, Neighbor, NumericAttr, Record, RecordFilter, RecordStore, Result,
        SimilarityIndex, Snapshot, SnapshotCell, SourceResponse, SourceTier,
    };
    pub use nextspin_scoring::{
        BlendWeights, CrateBuilder, CrateReport, CrateSelector, CrateStatus, Ranking, ScoreKind, ScoreParams,
        ScoreSet, ScoringEngine, DEFAULT_K,
    };
    pub use nextspin_storage::Dataset;
}
