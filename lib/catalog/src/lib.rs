//! # NextSpin Catalog
//!
//! Client side of the catalog metadata service and the batch enrichment
//! built on it.
//!
//! - [`CatalogConfig`] - credential, politeness delay, timeout, pool width
//! - [`CatalogSource`] - request/response contract, implemented by [`DiscogsClient`]
//! - [`Enricher`] - lookup plan, fusion and serialized store writes
//! - [`ingest_collection`] - collection listing import

pub mod client;
pub mod config;
pub mod discogs;
pub mod enrich;
pub mod error;
pub mod import;
pub mod source;

pub use client::DiscogsClient;
pub use config::CatalogConfig;
pub use enrich::{EnrichmentReport, Enricher, ItemEnrichment};
pub use error::{CatalogError, Result};
pub use import::{ingest_collection, ImportReport};
pub use source::{CatalogSource, LookupRequest};
