use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

static NO_TAGS: BTreeSet<String> = BTreeSet::new();

/// Normalized (artist, title) pair identifying one logical catalog item.
///
/// Case and whitespace are folded, so `"Miles  Davis"` and `"miles davis"`
/// produce the same key. Ordering is lexicographic on (artist, title) and is
/// the tie-breaker for every ranking in the workspace.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct IdentityKey {
    artist: String,
    title: String,
}

impl IdentityKey {
    pub fn new(artist: &str, title: &str) -> Self {
        Self {
            artist: normalize(artist),
            title: normalize(title),
        }
    }

    #[inline]
    pub fn artist(&self) -> &str {
        &self.artist
    }

    #[inline]
    pub fn title(&self) -> &str {
        &self.title
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.artist, self.title)
    }
}

fn normalize(value: &str) -> String {
    value
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Numeric attributes carried by a record. Absence is a first-class state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumericAttr {
    LowestPrice,
    WantCount,
    HaveCount,
    NumForSale,
    Year,
    CommunityRating,
}

impl NumericAttr {
    pub const ALL: [NumericAttr; 6] = [
        NumericAttr::LowestPrice,
        NumericAttr::WantCount,
        NumericAttr::HaveCount,
        NumericAttr::NumForSale,
        NumericAttr::Year,
        NumericAttr::CommunityRating,
    ];

    pub fn name(self) -> &'static str {
        match self {
            NumericAttr::LowestPrice => "lowest_price",
            NumericAttr::WantCount => "want_count",
            NumericAttr::HaveCount => "have_count",
            NumericAttr::NumForSale => "num_for_sale",
            NumericAttr::Year => "year",
            NumericAttr::CommunityRating => "community_rating",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|attr| attr.name().eq_ignore_ascii_case(name))
    }
}

/// Tag-set attributes carried by a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoricalAttr {
    Genre,
    Style,
    Label,
}

impl CategoricalAttr {
    pub const ALL: [CategoricalAttr; 3] = [
        CategoricalAttr::Genre,
        CategoricalAttr::Style,
        CategoricalAttr::Label,
    ];

    pub fn name(self) -> &'static str {
        match self {
            CategoricalAttr::Genre => "genre",
            CategoricalAttr::Style => "style",
            CategoricalAttr::Label => "label",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|attr| attr.name().eq_ignore_ascii_case(name))
    }
}

/// Every fusable field of a record, used as the provenance key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    ReleaseId,
    MasterId,
    Thumb,
    Genre,
    Style,
    Label,
    LowestPrice,
    WantCount,
    HaveCount,
    NumForSale,
    Year,
    CommunityRating,
}

impl From<NumericAttr> for Field {
    fn from(attr: NumericAttr) -> Self {
        match attr {
            NumericAttr::LowestPrice => Field::LowestPrice,
            NumericAttr::WantCount => Field::WantCount,
            NumericAttr::HaveCount => Field::HaveCount,
            NumericAttr::NumForSale => Field::NumForSale,
            NumericAttr::Year => Field::Year,
            NumericAttr::CommunityRating => Field::CommunityRating,
        }
    }
}

impl From<CategoricalAttr> for Field {
    fn from(attr: CategoricalAttr) -> Self {
        match attr {
            CategoricalAttr::Genre => Field::Genre,
            CategoricalAttr::Style => Field::Style,
            CategoricalAttr::Label => Field::Label,
        }
    }
}

/// Confidence tier of an upstream source, lowest first.
///
/// Derived ordering is the fusion priority: a value may only be replaced by
/// one from the same or a higher tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceTier {
    /// Loaded from the working dataset file
    Cached,
    /// Catalog search hit or collection listing entry
    Listing,
    /// Master (work-level) lookup
    Master,
    /// Direct release lookup, including release marketplace stats
    Release,
}

/// One catalog item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub key: IdentityKey,
    pub artist: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub master_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumb: Option<String>,
    #[serde(default)]
    pub tags: BTreeMap<CategoricalAttr, BTreeSet<String>>,
    #[serde(default)]
    pub numeric: BTreeMap<NumericAttr, f64>,
    #[serde(default)]
    pub provenance: BTreeMap<Field, SourceTier>,
}

impl Record {
    #[must_use]
    pub fn new(artist: &str, title: &str) -> Self {
        Self {
            key: IdentityKey::new(artist, title),
            artist: artist.trim().to_string(),
            title: title.trim().to_string(),
            release_id: None,
            master_id: None,
            thumb: None,
            tags: BTreeMap::new(),
            numeric: BTreeMap::new(),
            provenance: BTreeMap::new(),
        }
    }

    #[inline]
    pub fn numeric(&self, attr: NumericAttr) -> Option<f64> {
        self.numeric.get(&attr).copied()
    }

    #[inline]
    pub fn tags(&self, attr: CategoricalAttr) -> &BTreeSet<String> {
        self.tags.get(&attr).unwrap_or(&NO_TAGS)
    }

    #[inline]
    pub fn tier_of(&self, field: Field) -> Option<SourceTier> {
        self.provenance.get(&field).copied()
    }

    /// Store a numeric value. Non-finite values are treated as absent and
    /// leave the record untouched.
    pub fn set_numeric(&mut self, attr: NumericAttr, value: f64, tier: SourceTier) -> bool {
        if !value.is_finite() {
            return false;
        }
        self.numeric.insert(attr, value);
        self.provenance.insert(attr.into(), tier);
        true
    }

    /// Replace a tag set. Empty sets are treated as absent.
    pub fn set_tags(&mut self, attr: CategoricalAttr, tags: BTreeSet<String>, tier: SourceTier) -> bool {
        if tags.is_empty() {
            return false;
        }
        self.tags.insert(attr, tags);
        self.provenance.insert(attr.into(), tier);
        true
    }

    /// Number of the given attributes that carry a value.
    pub fn known_count(&self, attrs: &[NumericAttr]) -> usize {
        attrs.iter().filter(|attr| self.numeric.contains_key(attr)).count()
    }

    /// Builder used by ingestion and tests; values land in the cached tier.
    #[must_use]
    pub fn with_numeric(mut self, attr: NumericAttr, value: f64) -> Self {
        self.set_numeric(attr, value, SourceTier::Cached);
        self
    }

    #[must_use]
    pub fn with_tags<I, S>(mut self, attr: CategoricalAttr, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tags = tags.into_iter().map(Into::into).collect();
        self.set_tags(attr, tags, SourceTier::Cached);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_key_normalization() {
        let a = IdentityKey::new("  Miles   Davis ", "Kind Of Blue");
        let b = IdentityKey::new("miles davis", "kind of  blue");
        assert_eq!(a, b);
        assert_eq!(a.artist(), "miles davis");
        assert_eq!(a.to_string(), "miles davis - kind of blue");
    }

    #[test]
    fn test_identity_key_ordering() {
        let a = IdentityKey::new("Air", "Moon Safari");
        let b = IdentityKey::new("Air", "Talkie Walkie");
        let c = IdentityKey::new("Beck", "Odelay");
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn test_missing_is_not_zero() {
        let record = Record::new("Can", "Tago Mago").with_numeric(NumericAttr::WantCount, 0.0);
        assert_eq!(record.numeric(NumericAttr::WantCount), Some(0.0));
        assert_eq!(record.numeric(NumericAttr::HaveCount), None);
    }

    #[test]
    fn test_non_finite_values_ignored() {
        let mut record = Record::new("Can", "Tago Mago");
        assert!(!record.set_numeric(NumericAttr::LowestPrice, f64::NAN, SourceTier::Release));
        assert!(!record.set_numeric(NumericAttr::LowestPrice, f64::INFINITY, SourceTier::Release));
        assert_eq!(record.numeric(NumericAttr::LowestPrice), None);
        assert_eq!(record.tier_of(Field::LowestPrice), None);
    }

    #[test]
    fn test_empty_tags_ignored() {
        let record = Record::new("Can", "Tago Mago").with_tags(CategoricalAttr::Genre, Vec::<String>::new());
        assert!(record.tags(CategoricalAttr::Genre).is_empty());
        assert!(!record.tags.contains_key(&CategoricalAttr::Genre));
    }

    #[test]
    fn test_tier_ordering() {
        assert!(SourceTier::Release > SourceTier::Master);
        assert!(SourceTier::Master > SourceTier::Listing);
        assert!(SourceTier::Listing > SourceTier::Cached);
    }

    #[test]
    fn test_attr_names_roundtrip() {
        for attr in NumericAttr::ALL {
            assert_eq!(NumericAttr::from_name(attr.name()), Some(attr));
        }
        for attr in CategoricalAttr::ALL {
            assert_eq!(CategoricalAttr::from_name(attr.name()), Some(attr));
        }
        assert_eq!(NumericAttr::from_name("WANT_COUNT"), Some(NumericAttr::WantCount));
    }

    #[test]
    fn test_record_json_shape() {
        let record = Record::new("Can", "Tago Mago")
            .with_numeric(NumericAttr::WantCount, 10.0)
            .with_tags(CategoricalAttr::Genre, ["Rock"]);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["numeric"]["want_count"], 10.0);
        assert_eq!(json["tags"]["genre"][0], "Rock");
        assert_eq!(json["provenance"]["want_count"], "cached");
        assert!(json.get("release_id").is_none());
    }
}
