use crate::error::Result;
use nextspin_core::{SourceResponse, SourceTier};
use std::fmt;
use std::future::Future;

/// One request against the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LookupRequest {
    Search { artist: String, title: String },
    Release(u64),
    Master(u64),
    /// Marketplace stats for a release
    MarketplaceStats(u64),
}

impl LookupRequest {
    /// Tier the response to this request is fused at.
    pub fn tier(&self) -> SourceTier {
        match self {
            LookupRequest::Search { .. } => SourceTier::Listing,
            LookupRequest::Release(_) | LookupRequest::MarketplaceStats(_) => SourceTier::Release,
            LookupRequest::Master(_) => SourceTier::Master,
        }
    }
}

impl fmt::Display for LookupRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LookupRequest::Search { artist, title } => write!(f, "search '{artist} - {title}'"),
            LookupRequest::Release(id) => write!(f, "release {id}"),
            LookupRequest::Master(id) => write!(f, "master {id}"),
            LookupRequest::MarketplaceStats(id) => write!(f, "marketplace stats {id}"),
        }
    }
}

/// Narrow request/response contract to the metadata provider.
///
/// `Ok(None)` means the provider answered but knows nothing (no search hit,
/// unknown id). `Err` is a failed request; callers treat it as no data for
/// this pass.
pub trait CatalogSource: Send + Sync {
    fn lookup(&self, request: &LookupRequest) -> impl Future<Output = Result<Option<SourceResponse>>> + Send;
}
