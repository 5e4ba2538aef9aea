use crate::config::CatalogConfig;
use crate::discogs::{CollectionPage, Master, MarketplaceStats, Release, SearchPage};
use crate::error::{CatalogError, Result};
use crate::source::{CatalogSource, LookupRequest};
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use nextspin_core::{IdentityKey, SourceResponse};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::num::NonZeroU32;

type Throttle = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

pub const COLLECTION_PAGE_SIZE: u32 = 100;
const SEARCH_PAGE_SIZE: &str = "5";

/// HTTP client for the Discogs API.
///
/// All requests, including those issued concurrently, pass one shared
/// throttle that spaces them at least `delay` apart.
pub struct DiscogsClient {
    http: reqwest::Client,
    config: CatalogConfig,
    throttle: Option<Throttle>,
}

impl DiscogsClient {
    pub fn new(config: CatalogConfig) -> Result<Self> {
        config.validate()?;
        let token = config.token()?;

        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&format!("Discogs token={token}"))
            .map_err(|_| CatalogError::InvalidConfig("token is not a valid header value".into()))?;
        headers.insert(AUTHORIZATION, auth);

        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|e| CatalogError::InvalidConfig(format!("failed to build HTTP client: {e}")))?;

        // a zero delay disables throttling
        let throttle = Quota::with_period(config.delay)
            .map(|quota| RateLimiter::direct(quota.allow_burst(NonZeroU32::MIN)));

        Ok(Self {
            http,
            config,
            throttle,
        })
    }

    pub fn config(&self) -> &CatalogConfig {
        &self.config
    }

    async fn pace(&self) {
        if let Some(throttle) = &self.throttle {
            throttle.until_ready().await;
        }
    }

    /// GET and decode. A 404 is `Ok(None)`; other non-success statuses and
    /// transport failures are errors.
    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<Option<T>> {
        let url = self.config.url(path);
        self.pace().await;
        tracing::debug!(%url, "catalog request");

        let response = self
            .http
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|e| CatalogError::from_reqwest(&url, e))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(CatalogError::Status {
                status: status.as_u16(),
                url,
            });
        }

        let body = response
            .json::<T>()
            .await
            .map_err(|e| CatalogError::from_reqwest(&url, e))?;
        Ok(Some(body))
    }

    /// Best search hit for an artist and title: an exact identity match if
    /// there is one, else the first hit.
    pub async fn search(&self, artist: &str, title: &str) -> Result<Option<SourceResponse>> {
        let page: Option<SearchPage> = self
            .get_json(
                "/database/search",
                &[
                    ("artist", artist),
                    ("release_title", title),
                    ("type", "release"),
                    ("per_page", SEARCH_PAGE_SIZE),
                ],
            )
            .await?;
        let hits: Vec<SourceResponse> = page
            .map(|p| p.results.into_iter().map(|hit| hit.into_response()).collect())
            .unwrap_or_default();

        let wanted = IdentityKey::new(artist, title);
        let position = hits
            .iter()
            .position(|hit| hit.identity().as_ref() == Some(&wanted))
            .unwrap_or(0);
        Ok(hits.into_iter().nth(position))
    }

    pub async fn release(&self, id: u64) -> Result<Option<SourceResponse>> {
        let release: Option<Release> = self.get_json(&format!("/releases/{id}"), &[]).await?;
        Ok(release.map(Release::into_response))
    }

    pub async fn master(&self, id: u64) -> Result<Option<SourceResponse>> {
        let master: Option<Master> = self.get_json(&format!("/masters/{id}"), &[]).await?;
        Ok(master.map(Master::into_response))
    }

    pub async fn marketplace_stats(&self, release_id: u64) -> Result<Option<SourceResponse>> {
        let stats: Option<MarketplaceStats> = self
            .get_json(&format!("/marketplace/stats/{release_id}"), &[])
            .await?;
        Ok(stats
            .filter(|s| !s.is_blank())
            .map(|s| s.into_response(release_id)))
    }

    /// Every release in a user's public collection, one Listing-tier
    /// response per entry.
    pub async fn collection(&self, username: &str) -> Result<Vec<SourceResponse>> {
        let username = username.trim();
        if username.is_empty() || !username.chars().all(|c| c.is_ascii_alphanumeric() || "-_.".contains(c)) {
            return Err(CatalogError::InvalidConfig(format!("invalid username '{username}'")));
        }

        let path = format!("/users/{username}/collection/folders/0/releases");
        let per_page = COLLECTION_PAGE_SIZE.to_string();
        let mut entries = Vec::new();
        let mut page_number: u32 = 1;
        loop {
            let page_param = page_number.to_string();
            let page: CollectionPage = self
                .get_json(&path, &[("page", page_param.as_str()), ("per_page", per_page.as_str())])
                .await?
                .ok_or_else(|| CatalogError::Status {
                    status: StatusCode::NOT_FOUND.as_u16(),
                    url: self.config.url(&path),
                })?;

            let has_next = page.has_next(page_number);
            tracing::info!(
                page = page_number,
                pages = page.pagination.pages.unwrap_or(1),
                releases = page.releases.len(),
                "fetched collection page"
            );
            entries.extend(page.releases.into_iter().map(|item| item.into_response()));

            if !has_next {
                break;
            }
            page_number += 1;
        }
        Ok(entries)
    }
}

impl CatalogSource for DiscogsClient {
    async fn lookup(&self, request: &LookupRequest) -> Result<Option<SourceResponse>> {
        match request {
            LookupRequest::Search { artist, title } => self.search(artist, title).await,
            LookupRequest::Release(id) => self.release(*id).await,
            LookupRequest::Master(id) => self.master(*id).await,
            LookupRequest::MarketplaceStats(id) => self.marketplace_stats(*id).await,
        }
    }
}
