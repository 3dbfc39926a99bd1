//! TF-IDF keyword similarity between a pair of documents.
//!
//! Terms are runs of two or more word characters after lowercasing. IDF is
//! smoothed as `ln((1 + n) / (1 + df)) + 1`, term frequency is the raw count,
//! and every document vector is scaled to unit length, so the cosine of two
//! vectors is their dot product.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet, HashMap};

static TERM_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\w\w+\b").expect("Invalid term regex"));

/// Vocabulary and IDF weights fit on a small corpus
#[derive(Debug, Clone)]
pub struct TfidfVectorizer {
    /// term -> dimension index, in sorted term order
    vocabulary: BTreeMap<String, usize>,
    idf: Vec<f64>,
}

impl TfidfVectorizer {
    pub fn fit(documents: &[&str]) -> Self {
        let n = documents.len() as f64;

        let mut doc_freq: BTreeMap<String, usize> = BTreeMap::new();
        for document in documents {
            let unique: BTreeSet<String> = terms(document).collect();
            for term in unique {
                *doc_freq.entry(term).or_insert(0) += 1;
            }
        }

        let mut vocabulary = BTreeMap::new();
        let mut idf = Vec::with_capacity(doc_freq.len());
        for (idx, (term, df)) in doc_freq.into_iter().enumerate() {
            idf.push(((1.0 + n) / (1.0 + df as f64)).ln() + 1.0);
            vocabulary.insert(term, idx);
        }

        Self { vocabulary, idf }
    }

    /// Unit-length TF-IDF vector; all zeros when no term is in the vocabulary
    pub fn transform(&self, document: &str) -> Vec<f64> {
        let mut counts: HashMap<usize, f64> = HashMap::new();
        for term in terms(document) {
            if let Some(&idx) = self.vocabulary.get(&term) {
                *counts.entry(idx).or_insert(0.0) += 1.0;
            }
        }

        let mut vector = vec![0.0; self.idf.len()];
        for (idx, count) in counts {
            vector[idx] = count * self.idf[idx];
        }

        let norm = vector.iter().map(|x| x * x).sum::<f64>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|x| *x /= norm);
        }
        vector
    }

    pub fn vocabulary_size(&self) -> usize {
        self.vocabulary.len()
    }

    pub fn idf(&self, term: &str) -> Option<f64> {
        self.vocabulary.get(term).map(|&idx| self.idf[idx])
    }
}

/// Cosine similarity in [0, 1] of two documents under a vectorizer fit on
/// exactly those two documents
pub fn keyword_similarity(first: &str, second: &str) -> f64 {
    let vectorizer = TfidfVectorizer::fit(&[first, second]);
    let a = vectorizer.transform(first);
    let b = vectorizer.transform(second);

    let dot: f64 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    dot.clamp(0.0, 1.0)
}

fn terms(document: &str) -> impl Iterator<Item = String> + '_ {
    TERM_REGEX
        .find_iter(document)
        .map(|m| m.as_str().to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_smoothed_idf() {
        let vectorizer = TfidfVectorizer::fit(&["apple banana", "apple cherry"]);
        assert_eq!(vectorizer.vocabulary_size(), 3);
        assert_relative_eq!(vectorizer.idf("apple").unwrap(), 1.0);
        assert_relative_eq!(vectorizer.idf("banana").unwrap(), 1.5f64.ln() + 1.0);
        assert_eq!(vectorizer.idf("durian"), None);
    }

    #[test]
    fn test_reference_similarity() {
        // apple is shared (idf 1), banana/cherry are unique (idf 1 + ln 1.5)
        let similarity = keyword_similarity("apple banana", "apple cherry");
        assert_relative_eq!(similarity, 0.336_096_8, epsilon = 1e-6);
    }

    #[test]
    fn test_identical_documents() {
        let text = "Senior Rust engineer with Kubernetes and PostgreSQL experience";
        assert_relative_eq!(keyword_similarity(text, text), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_disjoint_documents() {
        assert_eq!(keyword_similarity("python pandas", "welding carpentry"), 0.0);
    }

    #[test]
    fn test_single_character_terms_ignored() {
        let vectorizer = TfidfVectorizer::fit(&["c r go", "go"]);
        assert_eq!(vectorizer.vocabulary_size(), 1);
        assert!(vectorizer.idf("c").is_none());
    }

    #[test]
    fn test_empty_documents() {
        assert_eq!(keyword_similarity("", ""), 0.0);
        assert_eq!(keyword_similarity("rust", ""), 0.0);
    }

    #[test]
    fn test_case_insensitive() {
        assert_relative_eq!(keyword_similarity("Python SQL", "python sql"), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_transform_is_unit_length() {
        let vectorizer = TfidfVectorizer::fit(&["rust rust tokio", "tokio axum"]);
        let vector = vectorizer.transform("rust rust tokio");
        let norm: f64 = vector.iter().map(|x| x * x).sum::<f64>().sqrt();
        assert_relative_eq!(norm, 1.0, epsilon = 1e-12);
    }
}
