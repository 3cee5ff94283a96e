//! Lexical TF-IDF fallback vectorizer
//!
//! Fit on exactly the input batch, capped at a fixed feature dimension.
//! Vectors from different calls come from different vocabularies and are
//! NOT comparable across calls; the `EmbeddingTag` marks them lexical so
//! the ranker refuses to mix them with semantic vectors.

use super::{Embedder, Embedding, EmbeddingKind, EmbeddingTag};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};

/// English stop words excluded from the vocabulary
const STOP_WORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "am", "an", "and", "any", "are",
    "as", "at", "be", "because", "been", "before", "being", "below", "between", "both", "but",
    "by", "can", "could", "did", "do", "does", "doing", "down", "during", "each", "few", "for",
    "from", "further", "had", "has", "have", "having", "he", "her", "here", "hers", "him", "his",
    "how", "i", "if", "in", "into", "is", "it", "its", "itself", "just", "me", "more", "most",
    "my", "myself", "no", "nor", "not", "now", "of", "off", "on", "once", "only", "or", "other",
    "our", "ours", "out", "over", "own", "same", "she", "should", "so", "some", "such", "than",
    "that", "the", "their", "theirs", "them", "then", "there", "these", "they", "this", "those",
    "through", "to", "too", "under", "until", "up", "very", "was", "we", "were", "what", "when",
    "where", "which", "while", "who", "whom", "why", "will", "with", "you", "your", "yours",
];

fn is_stop_word(token: &str) -> bool {
    STOP_WORDS.contains(&token)
}

/// Lowercased word tokens of two or more characters
fn tokenize(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    lower
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|t| t.chars().count() >= 2)
        .filter(|t| !is_stop_word(t))
        .map(|t| t.to_string())
        .collect()
}

/// Batch-local TF-IDF vectorizer with a fixed maximum feature dimension
pub struct TfidfEmbedder {
    max_features: usize,
}

impl TfidfEmbedder {
    pub fn new(max_features: usize) -> Self {
        Self { max_features }
    }

    /// Fit a vocabulary on the batch and produce L2-normalized TF-IDF rows.
    pub fn vectorize(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let tokenized: Vec<Vec<String>> = texts.iter().map(|t| tokenize(t)).collect();

        // Total term counts and document frequencies across the batch
        let mut total_counts: HashMap<&str, usize> = HashMap::new();
        let mut doc_freq: HashMap<&str, usize> = HashMap::new();
        for doc in &tokenized {
            let mut seen: HashSet<&str> = HashSet::new();
            for token in doc {
                *total_counts.entry(token.as_str()).or_insert(0) += 1;
                seen.insert(token.as_str());
            }
            for term in seen {
                *doc_freq.entry(term).or_insert(0) += 1;
            }
        }

        if total_counts.is_empty() {
            return Err(Error::Embedding(
                "Empty vocabulary: no usable terms in input batch".to_string(),
            ));
        }

        // Keep the most frequent terms up to the feature cap, then index
        // the surviving vocabulary alphabetically for determinism.
        let mut by_count: Vec<(&str, usize)> =
            total_counts.iter().map(|(t, c)| (*t, *c)).collect();
        by_count.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        by_count.truncate(self.max_features);

        let mut vocabulary: Vec<&str> = by_count.iter().map(|(t, _)| *t).collect();
        vocabulary.sort_unstable();
        let index: HashMap<&str, usize> = vocabulary
            .iter()
            .enumerate()
            .map(|(i, t)| (*t, i))
            .collect();

        let n_docs = tokenized.len() as f32;
        let idf: Vec<f32> = vocabulary
            .iter()
            .map(|term| {
                let df = *doc_freq.get(*term).unwrap_or(&0) as f32;
                // Smoothed idf, same formula scikit-learn uses
                ((1.0 + n_docs) / (1.0 + df)).ln() + 1.0
            })
            .collect();

        let mut rows = Vec::with_capacity(tokenized.len());
        for doc in &tokenized {
            let mut row = vec![0.0f32; vocabulary.len()];
            for token in doc {
                if let Some(&i) = index.get(token.as_str()) {
                    row[i] += 1.0;
                }
            }
            for (i, value) in row.iter_mut().enumerate() {
                *value *= idf[i];
            }
            let norm = row.iter().map(|v| v * v).sum::<f32>().sqrt();
            if norm > 0.0 {
                for value in row.iter_mut() {
                    *value /= norm;
                }
            }
            rows.push(row);
        }

        Ok(rows)
    }
}

#[async_trait]
impl Embedder for TfidfEmbedder {
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Embedding>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let rows = self.vectorize(&texts)?;
        let dimension = rows.first().map(|r| r.len()).unwrap_or(0);
        let tag = EmbeddingTag::new(EmbeddingKind::Lexical, dimension);
        Ok(rows
            .into_iter()
            .map(|vector| Embedding::new(vector, tag))
            .collect())
    }

    fn name(&self) -> &str {
        "tfidf"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_drops_short_and_stop_words() {
        let tokens = tokenize("The tree is a binary tree!");
        assert_eq!(tokens, vec!["tree", "binary", "tree"]);
    }

    #[test]
    fn test_dimension_capped_at_max_features() {
        let embedder = TfidfEmbedder::new(3);
        let texts = vec![
            "alpha beta gamma delta epsilon".to_string(),
            "alpha beta gamma".to_string(),
        ];
        let rows = embedder.vectorize(&texts).unwrap();
        assert_eq!(rows[0].len(), 3);
    }

    #[test]
    fn test_vectors_are_l2_normalized() {
        let embedder = TfidfEmbedder::new(384);
        let rows = embedder
            .vectorize(&["trees sorting graphs".to_string()])
            .unwrap();
        let norm: f32 = rows[0].iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_deterministic_within_batch() {
        let embedder = TfidfEmbedder::new(384);
        let texts = vec![
            "binary search trees".to_string(),
            "quick sort algorithm".to_string(),
        ];
        assert_eq!(
            embedder.vectorize(&texts).unwrap(),
            embedder.vectorize(&texts).unwrap()
        );
    }

    #[test]
    fn test_identical_texts_identical_rows() {
        let embedder = TfidfEmbedder::new(384);
        let rows = embedder
            .vectorize(&["grafos dirigidos".to_string(), "grafos dirigidos".to_string()])
            .unwrap();
        assert_eq!(rows[0], rows[1]);
    }

    #[test]
    fn test_empty_vocabulary_is_fatal() {
        let embedder = TfidfEmbedder::new(384);
        let err = embedder.vectorize(&["a I ? !".to_string()]).unwrap_err();
        assert!(matches!(err, Error::Embedding(_)));
    }

    #[tokio::test]
    async fn test_embed_tags_vectors_lexical() {
        let embedder = TfidfEmbedder::new(384);
        let embeddings = embedder
            .embed(vec!["binary trees".to_string()])
            .await
            .unwrap();
        assert_eq!(embeddings[0].tag.backend, EmbeddingKind::Lexical);
        assert_eq!(embeddings[0].tag.dimension, embeddings[0].vector.len());
    }
}
