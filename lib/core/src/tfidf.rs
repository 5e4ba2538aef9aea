// TF-IDF weighting over a vocabulary fit once per encoding pass
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TfIdfVectorizer {
    // term -> column, columns assigned in sorted term order
    vocabulary: BTreeMap<String, usize>,
    // column -> smoothed inverse document frequency
    idf: Vec<f32>,
    total_docs: usize,
}

impl TfIdfVectorizer {
    /// Lowercased alphanumeric runs of a tag. Every run counts, so short
    /// tags like "X" or "UK Garage" keep all their terms.
    pub fn tokenize(text: &str) -> Vec<String> {
        text.split(|c: char| !c.is_alphanumeric())
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase)
            .collect()
    }

    /// Fit the vocabulary and document frequencies over `documents`, each a
    /// bag of already tokenized terms.
    pub fn fit(documents: &[Vec<String>]) -> Self {
        let mut doc_freqs: AHashMap<&str, usize> = AHashMap::new();
        for tokens in documents {
            let mut seen: Vec<&str> = tokens.iter().map(String::as_str).collect();
            seen.sort_unstable();
            seen.dedup();
            for term in seen {
                *doc_freqs.entry(term).or_insert(0) += 1;
            }
        }

        let mut terms: Vec<(&str, usize)> = doc_freqs.into_iter().collect();
        terms.sort_unstable_by(|a, b| a.0.cmp(b.0));

        let total_docs = documents.len();
        let mut vocabulary = BTreeMap::new();
        let mut idf = Vec::with_capacity(terms.len());
        for (column, (term, df)) in terms.into_iter().enumerate() {
            vocabulary.insert(term.to_string(), column);
            idf.push(Self::smooth_idf(total_docs, df));
        }

        Self {
            vocabulary,
            idf,
            total_docs,
        }
    }

    // idf = ln((1 + n) / (1 + df)) + 1, never zero so shared terms still count
    fn smooth_idf(total_docs: usize, df: usize) -> f32 {
        (((1 + total_docs) as f32) / ((1 + df) as f32)).ln() + 1.0
    }

    /// Weighted, L2-normalized vector for one token bag. Terms outside the
    /// fitted vocabulary are ignored; an empty bag yields a zero vector.
    pub fn transform(&self, tokens: &[String]) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.vocabulary.len()];

        let mut term_freqs: AHashMap<usize, u32> = AHashMap::new();
        for token in tokens {
            if let Some(&column) = self.vocabulary.get(token) {
                *term_freqs.entry(column).or_insert(0) += 1;
            }
        }

        for (column, tf) in term_freqs {
            vector[column] = tf as f32 * self.idf[column];
        }

        let magnitude: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for v in &mut vector {
                *v /= magnitude;
            }
        }

        vector
    }

    #[inline]
    pub fn vocabulary_len(&self) -> usize {
        self.vocabulary.len()
    }

    /// Terms in column order
    pub fn terms(&self) -> impl Iterator<Item = &str> {
        self.vocabulary.keys().map(String::as_str)
    }

    pub fn column(&self, term: &str) -> Option<usize> {
        self.vocabulary.get(term).copied()
    }

    #[inline]
    pub fn total_docs(&self) -> usize {
        self.total_docs
    }
}
