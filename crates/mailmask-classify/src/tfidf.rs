//! TF-IDF vectorizer over analyzer terms.

use std::collections::{BTreeMap, HashMap};

use mailmask_core::{Error, Result};
use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::analyzer::Analyzer;

/// Sparse row with strictly increasing indices.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SparseVector {
    pub indices: Vec<usize>,
    pub values: Vec<f64>,
}

impl SparseVector {
    pub fn dot(&self, dense: &Array1<f64>) -> f64 {
        self.indices
            .iter()
            .zip(&self.values)
            .map(|(&i, &v)| dense[i] * v)
            .sum()
    }

    pub fn norm_sq(&self) -> f64 {
        self.values.iter().map(|v| v * v).sum()
    }

    /// `dense += scale * self`
    pub fn add_scaled_to(&self, scale: f64, dense: &mut Array1<f64>) {
        for (&i, &v) in self.indices.iter().zip(&self.values) {
            dense[i] += scale * v;
        }
    }

    /// Copy with one extra trailing feature.
    pub fn with_bias(&self, index: usize, value: f64) -> SparseVector {
        let mut out = self.clone();
        out.indices.push(index);
        out.values.push(value);
        out
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// Term-frequency × smoothed inverse-document-frequency, L2-normalized rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TfidfVectorizer {
    pub analyzer: Analyzer,
    /// Keep only the most frequent terms across the corpus.
    pub max_features: Option<usize>,
    vocabulary: BTreeMap<String, usize>,
    idf: Vec<f64>,
}

impl TfidfVectorizer {
    pub fn new(analyzer: Analyzer, max_features: Option<usize>) -> Self {
        Self {
            analyzer,
            max_features,
            vocabulary: BTreeMap::new(),
            idf: Vec::new(),
        }
    }

    pub fn vocabulary_len(&self) -> usize {
        self.vocabulary.len()
    }

    /// Learn vocabulary and idf from documents, returning their vectors.
    pub fn fit_transform(&mut self, docs: &[&str]) -> Result<Vec<SparseVector>> {
        let analyzed: Vec<Vec<String>> = docs.iter().map(|d| self.analyzer.analyze(d)).collect();

        let mut term_totals: HashMap<&str, usize> = HashMap::new();
        let mut doc_freq: HashMap<&str, usize> = HashMap::new();
        for terms in &analyzed {
            let mut seen: Vec<&str> = Vec::with_capacity(terms.len());
            for term in terms {
                *term_totals.entry(term.as_str()).or_insert(0) += 1;
                seen.push(term.as_str());
            }
            seen.sort_unstable();
            seen.dedup();
            for term in seen {
                *doc_freq.entry(term).or_insert(0) += 1;
            }
        }

        if term_totals.is_empty() {
            return Err(Error::Training(
                "empty vocabulary; documents contain only stop words".into(),
            ));
        }

        let mut ranked: Vec<(&str, usize)> = term_totals.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
        if let Some(limit) = self.max_features {
            ranked.truncate(limit);
        }
        let mut kept: Vec<&str> = ranked.into_iter().map(|(t, _)| t).collect();
        kept.sort_unstable();

        let n_docs = docs.len() as f64;
        self.idf = kept
            .iter()
            .map(|t| ((1.0 + n_docs) / (1.0 + doc_freq[t] as f64)).ln() + 1.0)
            .collect();
        self.vocabulary = kept
            .into_iter()
            .enumerate()
            .map(|(i, t)| (t.to_string(), i))
            .collect();

        Ok(analyzed.iter().map(|terms| self.vectorize(terms)).collect())
    }

    /// Vector for a single document. Unknown terms are ignored.
    pub fn transform(&self, doc: &str) -> SparseVector {
        self.vectorize(&self.analyzer.analyze(doc))
    }

    fn vectorize(&self, terms: &[String]) -> SparseVector {
        let mut counts: BTreeMap<usize, f64> = BTreeMap::new();
        for term in terms {
            if let Some(&idx) = self.vocabulary.get(term) {
                *counts.entry(idx).or_insert(0.0) += 1.0;
            }
        }

        let mut vector = SparseVector {
            indices: Vec::with_capacity(counts.len()),
            values: Vec::with_capacity(counts.len()),
        };
        for (idx, tf) in counts {
            vector.indices.push(idx);
            vector.values.push(tf * self.idf[idx]);
        }

        let norm = vector.norm_sq().sqrt();
        if norm > 0.0 {
            vector.values.iter_mut().for_each(|v| *v /= norm);
        }
        vector
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vocabulary_sorted_and_idf_smoothed() {
        let mut vectorizer = TfidfVectorizer::new(Analyzer::default(), None);
        let rows = vectorizer
            .fit_transform(&["refund order", "refund invoice"])
            .unwrap();

        let vocab: Vec<&str> = vectorizer.vocabulary.keys().map(|s| s.as_str()).collect();
        assert_eq!(vocab, vec!["invoice", "order", "refund"]);

        // "refund" appears in every document: idf = ln(3/3) + 1 = 1
        assert!((vectorizer.idf[2] - 1.0).abs() < 1e-12);
        let rare = (3.0f64 / 2.0).ln() + 1.0;
        assert!((vectorizer.idf[0] - rare).abs() < 1e-12);

        for row in &rows {
            assert!((row.norm_sq() - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_max_features_keeps_most_frequent() {
        let mut vectorizer = TfidfVectorizer::new(Analyzer::default(), Some(2));
        vectorizer
            .fit_transform(&["router router modem", "router modem cable", "zebra"])
            .unwrap();
        let vocab: Vec<&str> = vectorizer.vocabulary.keys().map(|s| s.as_str()).collect();
        assert_eq!(vocab, vec!["modem", "router"]);
    }

    #[test]
    fn test_unknown_terms_ignored() {
        let mut vectorizer = TfidfVectorizer::new(Analyzer::default(), None);
        vectorizer.fit_transform(&["printer jammed"]).unwrap();
        assert!(vectorizer.transform("keyboard broken").is_empty());
        assert_eq!(vectorizer.transform("printer keyboard").indices.len(), 1);
    }

    #[test]
    fn test_only_stop_words_is_error() {
        let mut vectorizer = TfidfVectorizer::new(Analyzer::default(), None);
        assert!(vectorizer.fit_transform(&["the and of", "is it"]).is_err());
    }
}
