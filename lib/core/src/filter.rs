// Record predicates applied before scoring or ranking
use crate::record::{CategoricalAttr, NumericAttr, Record};
use serde::{Deserialize, Serialize};

pub trait Filter {
    fn matches(&self, record: &Record) -> bool;
}

pub struct RecordFilter {
    condition: FilterCondition,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterCondition {
    /// Inclusive bounds; a record missing the attribute passes
    Range {
        attr: NumericAttr,
        min: Option<f64>,
        max: Option<f64>,
    },
    /// At least one of `tags` is present (case-insensitive); empty list passes everything
    AnyTag {
        attr: CategoricalAttr,
        tags: Vec<String>,
    },
    /// Case-insensitive substring of artist or title
    Search(String),
    And(Vec<FilterCondition>),
    Or(Vec<FilterCondition>),
    Not(Box<FilterCondition>),
}

impl RecordFilter {
    pub fn new(condition: FilterCondition) -> Self {
        Self { condition }
    }

    pub fn accept_all() -> Self {
        Self::new(FilterCondition::And(Vec::new()))
    }

    pub fn condition(&self) -> &FilterCondition {
        &self.condition
    }

    fn matches_condition(condition: &FilterCondition, record: &Record) -> bool {
        match condition {
            FilterCondition::Range { attr, min, max } => match record.numeric(*attr) {
                Some(value) => {
                    min.map(|m| value >= m).unwrap_or(true) && max.map(|m| value <= m).unwrap_or(true)
                }
                None => true,
            },
            FilterCondition::AnyTag { attr, tags } => {
                if tags.is_empty() {
                    return true;
                }
                record
                    .tags(*attr)
                    .iter()
                    .any(|have| tags.iter().any(|want| have.eq_ignore_ascii_case(want.trim())))
            }
            FilterCondition::Search(term) => {
                let term = term.trim().to_lowercase();
                term.is_empty()
                    || record.artist.to_lowercase().contains(&term)
                    || record.title.to_lowercase().contains(&term)
            }
            FilterCondition::And(conditions) => {
                conditions.iter().all(|c| Self::matches_condition(c, record))
            }
            FilterCondition::Or(conditions) => {
                conditions.iter().any(|c| Self::matches_condition(c, record))
            }
            FilterCondition::Not(condition) => !Self::matches_condition(condition, record),
        }
    }
}

impl Filter for RecordFilter {
    fn matches(&self, record: &Record) -> bool {
        Self::matches_condition(&self.condition, record)
    }
}

/// Flat filter settings as exposed on the command line and in query strings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterParams {
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub min_price: Option<f64>,
    #[serde(default)]
    pub max_price: Option<f64>,
    #[serde(default)]
    pub min_year: Option<f64>,
    #[serde(default)]
    pub max_year: Option<f64>,
    /// Comma-separated genre list
    #[serde(default)]
    pub genres: Option<String>,
}

impl FilterParams {
    pub fn into_filter(self) -> RecordFilter {
        let mut conditions = Vec::new();
        if self.min_price.is_some() || self.max_price.is_some() {
            conditions.push(FilterCondition::Range {
                attr: NumericAttr::LowestPrice,
                min: self.min_price,
                max: self.max_price,
            });
        }
        if self.min_year.is_some() || self.max_year.is_some() {
            conditions.push(FilterCondition::Range {
                attr: NumericAttr::Year,
                min: self.min_year,
                max: self.max_year,
            });
        }
        if let Some(genres) = self.genres {
            let tags: Vec<String> = genres
                .split(',')
                .map(|g| g.trim().to_string())
                .filter(|g| !g.is_empty())
                .collect();
            conditions.push(FilterCondition::AnyTag {
                attr: CategoricalAttr::Genre,
                tags,
            });
        }
        if let Some(term) = self.search {
            conditions.push(FilterCondition::Search(term));
        }
        RecordFilter::new(FilterCondition::And(conditions))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blue_note() -> Record {
        Record::new("Art Blakey", "Moanin'")
            .with_numeric(NumericAttr::LowestPrice, 25.0)
            .with_numeric(NumericAttr::Year, 1959.0)
            .with_tags(CategoricalAttr::Genre, ["Jazz"])
    }

    #[test]
    fn test_range_inclusive() {
        let filter = RecordFilter::new(FilterCondition::Range {
            attr: NumericAttr::LowestPrice,
            min: Some(25.0),
            max: Some(25.0),
        });
        assert!(filter.matches(&blue_note()));
    }

    #[test]
    fn test_range_missing_attribute_passes() {
        let filter = RecordFilter::new(FilterCondition::Range {
            attr: NumericAttr::NumForSale,
            min: Some(1.0),
            max: None,
        });
        assert!(filter.matches(&blue_note()));
    }

    #[test]
    fn test_any_tag_case_insensitive() {
        let filter = RecordFilter::new(FilterCondition::AnyTag {
            attr: CategoricalAttr::Genre,
            tags: vec!["jazz".to_string(), "Rock".to_string()],
        });
        assert!(filter.matches(&blue_note()));

        let miss = RecordFilter::new(FilterCondition::AnyTag {
            attr: CategoricalAttr::Genre,
            tags: vec!["Electronic".to_string()],
        });
        assert!(!miss.matches(&blue_note()));
    }

    #[test]
    fn test_search_artist_or_title() {
        let record = blue_note();
        assert!(RecordFilter::new(FilterCondition::Search("blakey".into())).matches(&record));
        assert!(RecordFilter::new(FilterCondition::Search("MOANIN".into())).matches(&record));
        assert!(!RecordFilter::new(FilterCondition::Search("coltrane".into())).matches(&record));
    }

    #[test]
    fn test_composition() {
        let filter = RecordFilter::new(FilterCondition::And(vec![
            FilterCondition::Search("blakey".into()),
            FilterCondition::Not(Box::new(FilterCondition::Range {
                attr: NumericAttr::Year,
                min: Some(1960.0),
                max: None,
            })),
        ]));
        assert!(filter.matches(&blue_note()));
        assert!(RecordFilter::accept_all().matches(&blue_note()));
    }

    #[test]
    fn test_params_into_filter() {
        let params = FilterParams {
            max_price: Some(20.0),
            genres: Some("Jazz, Soul".into()),
            ..Default::default()
        };
        assert!(!params.into_filter().matches(&blue_note()));

        let params = FilterParams {
            min_year: Some(1950.0),
            max_year: Some(1965.0),
            genres: Some("Jazz".into()),
            ..Default::default()
        };
        assert!(params.into_filter().matches(&blue_note()));
    }
}
