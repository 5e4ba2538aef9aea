use thiserror::Error;

pub type Result<T> = std::result::Result<T, CatalogError>;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Catalog token missing: pass --token or set DISCOGS_TOKEN")]
    MissingCredential,

    #[error("Invalid catalog configuration: {0}")]
    InvalidConfig(String),

    #[error("Transport error for {url}: {reason}")]
    Transport { url: String, reason: String },

    #[error("Request to {url} timed out")]
    Timeout { url: String },

    #[error("Catalog returned HTTP {status} for {url}")]
    Status { status: u16, url: String },

    #[error("Failed to decode response from {url}: {reason}")]
    Decode { url: String, reason: String },
}

impl CatalogError {
    pub(crate) fn from_reqwest(url: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            CatalogError::Timeout { url: url.to_string() }
        } else if err.is_decode() {
            CatalogError::Decode {
                url: url.to_string(),
                reason: err.to_string(),
            }
        } else {
            CatalogError::Transport {
                url: url.to_string(),
                reason: err.to_string(),
            }
        }
    }

    /// Configuration problems stop the run; everything else only costs one
    /// lookup.
    pub fn is_fatal(&self) -> bool {
        matches!(self, CatalogError::MissingCredential | CatalogError::InvalidConfig(_))
    }
}
