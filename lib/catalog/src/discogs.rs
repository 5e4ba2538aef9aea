//! Typed catalog payloads
//!
//! Every field is optional: the service omits, nulls or zeroes whatever it
//! does not know. Conversion into [`SourceResponse`] is the only place raw
//! payloads are inspected; zero years and zero ids mean "unknown".

use nextspin_core::{CategoricalAttr, NumericAttr, SourceResponse, SourceTier};
use serde::Deserialize;

/// A number the service sometimes sends as a string (`"1959"`).
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Lenient {
    Number(f64),
    Text(String),
}

impl Lenient {
    pub fn as_f64(&self) -> Option<f64> {
        let value: Option<f64> = match self {
            Lenient::Number(n) => Some(*n),
            Lenient::Text(s) => s.trim().parse().ok(),
        };
        value.filter(|v| v.is_finite())
    }
}

fn year(value: &Option<Lenient>) -> Option<f64> {
    value.as_ref().and_then(Lenient::as_f64).filter(|y| *y > 0.0)
}

fn id(value: Option<u64>) -> Option<u64> {
    value.filter(|id| *id > 0)
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Rating {
    pub average: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Community {
    pub want: Option<f64>,
    pub have: Option<f64>,
    pub rating: Option<Rating>,
}

impl Community {
    fn apply(&self, response: SourceResponse) -> SourceResponse {
        response
            .with_optional(NumericAttr::WantCount, self.want)
            .with_optional(NumericAttr::HaveCount, self.have)
            .with_optional(
                NumericAttr::CommunityRating,
                self.rating.as_ref().and_then(|r| r.average).filter(|r| *r > 0.0),
            )
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Named {
    pub name: Option<String>,
}

fn names(entities: &[Named]) -> Vec<String> {
    entities
        .iter()
        .filter_map(|e| e.name.as_deref())
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .collect()
}

// "Nirvana (2)" -> "Nirvana"
fn strip_disambiguation(name: &str) -> &str {
    match name.rsplit_once(" (") {
        Some((base, suffix))
            if suffix.ends_with(')') && suffix[..suffix.len() - 1].chars().all(|c| c.is_ascii_digit()) =>
        {
            base
        }
        _ => name,
    }
}

fn joined_artists(artists: &[Named]) -> Option<String> {
    let full = names(artists);
    let names: Vec<&str> = full.iter().map(|n| strip_disambiguation(n)).collect();
    (!names.is_empty()).then(|| names.join(", "))
}

fn with_tag_lists(response: SourceResponse, genres: &[String], styles: &[String], labels: &[String]) -> SourceResponse {
    response
        .with_tags(CategoricalAttr::Genre, genres.iter().cloned())
        .with_tags(CategoricalAttr::Style, styles.iter().cloned())
        .with_tags(CategoricalAttr::Label, labels.iter().cloned())
}

/// `GET /database/search`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SearchPage {
    pub results: Vec<SearchHit>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SearchHit {
    pub id: Option<u64>,
    pub master_id: Option<u64>,
    /// `"Artist - Title"`
    pub title: Option<String>,
    pub year: Option<Lenient>,
    pub genre: Vec<String>,
    pub style: Vec<String>,
    pub label: Vec<String>,
    pub thumb: Option<String>,
    pub community: Option<Community>,
}

impl SearchHit {
    pub fn into_response(self) -> SourceResponse {
        let mut response = SourceResponse::new(SourceTier::Listing);
        if let Some((artist, title)) = self.title.as_deref().and_then(|t| t.split_once(" - ")) {
            response = response.with_identity(artist, title);
        }
        response.release_id = id(self.id);
        response.master_id = id(self.master_id);
        response.thumb = self.thumb;
        response = response.with_optional(NumericAttr::Year, year(&self.year));
        response = with_tag_lists(response, &self.genre, &self.style, &self.label);
        if let Some(community) = &self.community {
            response = community.apply(response);
        }
        response.sanitized()
    }
}

/// `GET /releases/{id}`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Release {
    pub id: Option<u64>,
    pub master_id: Option<u64>,
    pub title: Option<String>,
    pub artists: Vec<Named>,
    pub year: Option<Lenient>,
    pub genres: Vec<String>,
    pub styles: Vec<String>,
    pub labels: Vec<Named>,
    pub thumb: Option<String>,
    pub lowest_price: Option<f64>,
    pub num_for_sale: Option<f64>,
    pub community: Option<Community>,
    /// Older payloads carry the rating at top level
    pub rating: Option<Rating>,
}

impl Release {
    pub fn into_response(self) -> SourceResponse {
        release_like(
            SourceTier::Release,
            ReleaseLike {
                release_id: id(self.id),
                master_id: id(self.master_id),
                title: self.title,
                artists: self.artists,
                year: self.year,
                genres: self.genres,
                styles: self.styles,
                labels: names(&self.labels),
                thumb: self.thumb,
                lowest_price: self.lowest_price,
                num_for_sale: self.num_for_sale,
                community: self.community,
                rating: self.rating,
            },
        )
    }
}

/// `GET /masters/{id}`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Master {
    pub id: Option<u64>,
    pub title: Option<String>,
    pub artists: Vec<Named>,
    pub year: Option<Lenient>,
    pub genres: Vec<String>,
    pub styles: Vec<String>,
    pub thumb: Option<String>,
    pub lowest_price: Option<f64>,
    pub num_for_sale: Option<f64>,
    pub community: Option<Community>,
}

impl Master {
    pub fn into_response(self) -> SourceResponse {
        release_like(
            SourceTier::Master,
            ReleaseLike {
                release_id: None,
                master_id: id(self.id),
                title: self.title,
                artists: self.artists,
                year: self.year,
                genres: self.genres,
                styles: self.styles,
                labels: Vec::new(),
                thumb: self.thumb,
                lowest_price: self.lowest_price,
                num_for_sale: self.num_for_sale,
                community: self.community,
                rating: None,
            },
        )
    }
}

struct ReleaseLike {
    release_id: Option<u64>,
    master_id: Option<u64>,
    title: Option<String>,
    artists: Vec<Named>,
    year: Option<Lenient>,
    genres: Vec<String>,
    styles: Vec<String>,
    labels: Vec<String>,
    thumb: Option<String>,
    lowest_price: Option<f64>,
    num_for_sale: Option<f64>,
    community: Option<Community>,
    rating: Option<Rating>,
}

fn release_like(tier: SourceTier, item: ReleaseLike) -> SourceResponse {
    let mut response = SourceResponse::new(tier);
    response.artist = joined_artists(&item.artists);
    response.title = item.title;
    response.release_id = item.release_id;
    response.master_id = item.master_id;
    response.thumb = item.thumb;
    response = response
        .with_optional(NumericAttr::Year, year(&item.year))
        .with_optional(NumericAttr::LowestPrice, item.lowest_price)
        .with_optional(NumericAttr::NumForSale, item.num_for_sale);
    response = with_tag_lists(response, &item.genres, &item.styles, &item.labels);
    if let Some(community) = &item.community {
        response = community.apply(response);
    }
    if !response.numeric.contains_key(&NumericAttr::CommunityRating) {
        let rating = item.rating.and_then(|r| r.average).filter(|r| *r > 0.0);
        response = response.with_optional(NumericAttr::CommunityRating, rating);
    }
    response.sanitized()
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Price {
    pub value: Option<f64>,
    pub currency: Option<String>,
}

/// `GET /marketplace/stats/{release_id}`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MarketplaceStats {
    pub lowest_price: Option<Price>,
    pub num_for_sale: Option<f64>,
}

impl MarketplaceStats {
    pub fn into_response(self, release_id: u64) -> SourceResponse {
        SourceResponse::new(SourceTier::Release)
            .with_release_id(release_id)
            .with_optional(NumericAttr::LowestPrice, self.lowest_price.and_then(|p| p.value))
            .with_optional(NumericAttr::NumForSale, self.num_for_sale)
            .sanitized()
    }

    /// `true` when neither a price nor a supply count came back
    pub fn is_blank(&self) -> bool {
        self.lowest_price.as_ref().and_then(|p| p.value).is_none() && self.num_for_sale.is_none()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PaginationUrls {
    pub next: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Pagination {
    pub page: Option<u32>,
    pub pages: Option<u32>,
    pub urls: PaginationUrls,
}

/// `GET /users/{username}/collection/folders/0/releases`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CollectionPage {
    pub pagination: Pagination,
    pub releases: Vec<CollectionItem>,
}

impl CollectionPage {
    /// Whether another page follows `page`.
    pub fn has_next(&self, page: u32) -> bool {
        self.pagination.urls.next.is_some() && page < self.pagination.pages.unwrap_or(1)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CollectionItem {
    pub id: Option<u64>,
    pub basic_information: Option<BasicInformation>,
    pub community: Option<Community>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BasicInformation {
    pub id: Option<u64>,
    pub master_id: Option<u64>,
    pub title: Option<String>,
    pub year: Option<Lenient>,
    pub artists: Vec<Named>,
    pub genres: Vec<String>,
    pub styles: Vec<String>,
    pub labels: Vec<Named>,
    pub thumb: Option<String>,
}

impl CollectionItem {
    pub fn into_response(self) -> SourceResponse {
        let info = self.basic_information.unwrap_or_default();
        let mut response = SourceResponse::new(SourceTier::Listing);
        response.artist = joined_artists(&info.artists);
        response.title = info.title;
        response.release_id = id(info.id.or(self.id));
        response.master_id = id(info.master_id);
        response.thumb = info.thumb;
        response = response.with_optional(NumericAttr::Year, year(&info.year));
        response = with_tag_lists(response, &info.genres, &info.styles, &names(&info.labels));
        if let Some(community) = &self.community {
            response = community.apply(response);
        }
        response.sanitized()
    }
}
