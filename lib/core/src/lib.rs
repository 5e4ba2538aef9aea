//! # NextSpin Core
//!
//! Record model and similarity pipeline for the NextSpin recommender.
//!
//! - [`Record`] / [`RecordStore`] - catalog items keyed by normalized (artist, title)
//! - [`FeatureEncoder`] - TF-IDF over tags plus scaled numeric attributes
//! - [`SimilarityIndex`] - exact k-nearest-neighbor search with deterministic ties
//! - [`Snapshot`] / [`SnapshotCell`] - store, encoding and index rebuilt and swapped together
//! - [`FusionResolver`] - field-level merge of upstream responses by confidence tier
//! - [`RecordFilter`] - range, tag and text predicates
//!
//! ## Example
//!
//! ```rust
//! use nextspin_core::{CategoricalAttr, FeatureEncoder, IdentityKey, Metric, Record, RecordStore, Snapshot};
//!
//! let store: RecordStore = vec![
//!     Record::new("Miles Davis", "Kind of Blue").with_tags(CategoricalAttr::Genre, ["Jazz"]),
//!     Record::new("John Coltrane", "Blue Train").with_tags(CategoricalAttr::Genre, ["Jazz"]),
//!     Record::new("Kraftwerk", "Autobahn").with_tags(CategoricalAttr::Genre, ["Electronic"]),
//! ]
//! .into_iter()
//! .collect();
//!
//! let snapshot = Snapshot::build(store, &FeatureEncoder::default(), Metric::Cosine);
//! let hits = snapshot.similar(&IdentityKey::new("Miles Davis", "Kind of Blue"), 1).unwrap();
//! assert_eq!(hits[0].key, IdentityKey::new("John Coltrane", "Blue Train"));
//! ```

pub mod encoder;
pub mod error;
pub mod filter;
pub mod fusion;
pub mod index;
pub mod record;
pub mod snapshot;
pub mod store;
pub mod tfidf;
pub mod vector;

pub use encoder::{EncoderConfig, Encoding, FeatureEncoder, NumericScaler, Scaling};
pub use error::{Error, Result};
pub use filter::{Filter, FilterCondition, FilterParams, RecordFilter};
pub use fusion::{FusionOutcome, FusionResolver, SourceResponse};
pub use index::{Metric, Neighbor, SimilarityIndex};
pub use record::{CategoricalAttr, Field, IdentityKey, NumericAttr, Record, SourceTier};
pub use snapshot::{Snapshot, SnapshotCell};
pub use store::RecordStore;
pub use tfidf::TfIdfVectorizer;
pub use vector::Vector;
