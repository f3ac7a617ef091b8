//! Sparse TF-IDF vectors and cosine similarity.
//!
//! Vectors use ordered maps so floating-point sums run in a fixed order and
//! results are bit-for-bit reproducible.

use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;

use crate::domain::models::SimilarityAggregate;

static WORD_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b\w+\b").unwrap());

/// Sparse term-weight vector.
pub type SparseVector = BTreeMap<String, f64>;

/// Lowercased word tokens.
pub fn tokenize(text: &str) -> Vec<String> {
    WORD_REGEX
        .find_iter(text)
        .map(|m| m.as_str().to_lowercase())
        .collect()
}

fn term_frequencies(tokens: &[String]) -> SparseVector {
    let mut counts = SparseVector::new();
    for token in tokens {
        *counts.entry(token.clone()).or_insert(0.0) += 1.0;
    }
    let total = tokens.len() as f64;
    if total > 0.0 {
        for value in counts.values_mut() {
            *value /= total;
        }
    }
    counts
}

/// TF-IDF vectors for `documents`, with smoothed IDF
/// `ln((1 + N) / (1 + df)) + 1` fitted on the same documents.
pub fn tfidf_vectors(documents: &[&str]) -> Vec<SparseVector> {
    let tokenized: Vec<Vec<String>> = documents.iter().map(|doc| tokenize(doc)).collect();
    let n = documents.len() as f64;

    let mut document_frequency: BTreeMap<&str, f64> = BTreeMap::new();
    for tokens in &tokenized {
        let mut seen: Vec<&str> = tokens.iter().map(String::as_str).collect();
        seen.sort_unstable();
        seen.dedup();
        for term in seen {
            *document_frequency.entry(term).or_insert(0.0) += 1.0;
        }
    }

    tokenized
        .iter()
        .map(|tokens| {
            let mut vector = term_frequencies(tokens);
            for (term, weight) in &mut vector {
                let df = document_frequency.get(term.as_str()).copied().unwrap_or(0.0);
                *weight *= ((1.0 + n) / (1.0 + df)).ln() + 1.0;
            }
            vector
        })
        .collect()
}

/// Cosine similarity; zero when either vector is empty.
pub fn cosine(a: &SparseVector, b: &SparseVector) -> f64 {
    let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    let dot: f64 = small
        .iter()
        .filter_map(|(term, weight)| large.get(term).map(|other| weight * other))
        .sum();
    let norm_a = a.values().map(|w| w * w).sum::<f64>().sqrt();
    let norm_b = b.values().map(|w| w * w).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a * norm_b)).clamp(0.0, 1.0)
}

/// Reduce similarities to one score.
///
/// `values` must be non-empty; `most_recent` is the similarity of the newest
/// pair. Returns `None` for an empty slice.
pub fn aggregate(kind: SimilarityAggregate, values: &[f64], most_recent: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    Some(match kind {
        SimilarityAggregate::MaxPair => values.iter().copied().fold(f64::MIN, f64::max),
        SimilarityAggregate::WindowMean => mean,
        SimilarityAggregate::RecentBlend => (most_recent + mean) / 2.0,
    })
}

/// Self-similarity of a window of messages, oldest first.
///
/// Needs at least two messages.
pub fn window_self_similarity(messages: &[&str], kind: SimilarityAggregate) -> Option<f64> {
    if messages.len() < 2 {
        return None;
    }
    let vectors = tfidf_vectors(messages);
    let mut pairs = Vec::with_capacity(vectors.len() * (vectors.len() - 1) / 2);
    for i in 0..vectors.len() {
        for j in (i + 1)..vectors.len() {
            pairs.push(cosine(&vectors[i], &vectors[j]));
        }
    }
    let last = vectors.len() - 1;
    let most_recent = cosine(&vectors[last - 1], &vectors[last]);
    aggregate(kind, &pairs, most_recent)
}

/// Similarity between two speakers across aligned turns, oldest first.
///
/// Pairs are aligned from the newest message backwards.
pub fn aligned_similarity(left: &[&str], right: &[&str], kind: SimilarityAggregate) -> Option<f64> {
    let count = left.len().min(right.len());
    if count == 0 {
        return None;
    }
    let left = &left[left.len() - count..];
    let right = &right[right.len() - count..];

    let mut documents = Vec::with_capacity(count * 2);
    documents.extend_from_slice(left);
    documents.extend_from_slice(right);
    let vectors = tfidf_vectors(&documents);

    let pairs: Vec<f64> = (0..count)
        .map(|i| cosine(&vectors[i], &vectors[count + i]))
        .collect();
    let most_recent = pairs[count - 1];
    aggregate(kind, &pairs, most_recent)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_lowercases_words() {
        assert_eq!(tokenize("Hello, WORLD! it's"), vec!["hello", "world", "it", "s"]);
        assert!(tokenize("  ...  ").is_empty());
    }

    #[test]
    fn test_identical_documents_are_fully_similar() {
        let vectors = tfidf_vectors(&["I feel stuck", "I feel stuck"]);
        assert!((cosine(&vectors[0], &vectors[1]) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_disjoint_documents_are_dissimilar() {
        let vectors = tfidf_vectors(&["apples oranges", "trains bicycles"]);
        assert_eq!(cosine(&vectors[0], &vectors[1]), 0.0);
    }

    #[test]
    fn test_empty_vectors_are_zero() {
        let vectors = tfidf_vectors(&["", "something"]);
        assert_eq!(cosine(&vectors[0], &vectors[1]), 0.0);
    }

    #[test]
    fn test_window_needs_two_messages() {
        assert!(window_self_similarity(&["only one"], SimilarityAggregate::WindowMean).is_none());
    }

    #[test]
    fn test_aggregates() {
        let values = [0.2, 0.4, 0.9];
        assert_eq!(aggregate(SimilarityAggregate::MaxPair, &values, 0.9), Some(0.9));
        let mean = aggregate(SimilarityAggregate::WindowMean, &values, 0.9).unwrap();
        assert!((mean - 0.5).abs() < 1e-9);
        let blend = aggregate(SimilarityAggregate::RecentBlend, &values, 0.9).unwrap();
        assert!((blend - 0.7).abs() < 1e-9);
        assert!(aggregate(SimilarityAggregate::MaxPair, &[], 0.0).is_none());
    }

    #[test]
    fn test_aligned_similarity_pairs_from_newest() {
        let persona = ["totally unrelated opener", "yes I agree completely"];
        let counterpart = ["yes I agree completely"];
        let score = aligned_similarity(&persona, &counterpart, SimilarityAggregate::WindowMean).unwrap();
        assert!((score - 1.0).abs() < 1e-9);
    }
}
