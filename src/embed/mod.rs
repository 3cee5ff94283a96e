//! Embedding generation
//!
//! This module provides an abstraction over embedding providers with:
//! - A trait for different embedding backends
//! - An HTTP backend for OpenAI-compatible embedding APIs
//! - A lexical TF-IDF fallback when the semantic backend is unavailable
//! - Batch processing for efficiency
//!
//! Every produced vector carries an `EmbeddingTag` naming the backend kind
//! and dimension it came from. Vectors from different tags live in
//! different spaces and must never be compared; the ranker enforces this.

mod http_backend;
mod tfidf;

pub use http_backend::*;
pub use tfidf::*;

use crate::config::EmbeddingConfig;
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

/// Which backend produced a vector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingKind {
    /// Semantic vectors from the remote embedding model
    Semantic,
    /// Lexical TF-IDF vectors fit on a single batch
    Lexical,
}

impl fmt::Display for EmbeddingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmbeddingKind::Semantic => write!(f, "semantic"),
            EmbeddingKind::Lexical => write!(f, "lexical"),
        }
    }
}

impl std::str::FromStr for EmbeddingKind {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "semantic" => Ok(EmbeddingKind::Semantic),
            "lexical" => Ok(EmbeddingKind::Lexical),
            _ => Err(crate::error::Error::Config(format!(
                "Unknown embedding kind: {}",
                s
            ))),
        }
    }
}

/// Backend and dimensionality a vector belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddingTag {
    pub backend: EmbeddingKind,
    pub dimension: usize,
}

impl EmbeddingTag {
    pub fn new(backend: EmbeddingKind, dimension: usize) -> Self {
        Self { backend, dimension }
    }

    /// Vectors are only comparable within the same backend and dimension
    pub fn compatible(&self, other: &EmbeddingTag) -> bool {
        self == other
    }
}

/// A fixed-length vector plus the tag of the space it lives in
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Embedding {
    pub vector: Vec<f32>,
    pub tag: EmbeddingTag,
}

impl Embedding {
    pub fn new(vector: Vec<f32>, tag: EmbeddingTag) -> Self {
        Self { vector, tag }
    }
}

/// Trait for embedding providers
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch of texts, preserving input order
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Embedding>>;

    /// Human-readable backend name for logging
    fn name(&self) -> &str;
}

/// Embedder that tries the semantic backend and silently degrades to the
/// lexical vectorizer when it fails. The fallback is strictly per call:
/// a single batch always comes out of exactly one backend.
pub struct FallbackEmbedder {
    primary: Box<dyn Embedder>,
    fallback: TfidfEmbedder,
}

impl FallbackEmbedder {
    pub fn new(primary: Box<dyn Embedder>, fallback: TfidfEmbedder) -> Self {
        Self { primary, fallback }
    }

    /// Build the standard stack from configuration: HTTP backend with a
    /// TF-IDF fallback.
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self> {
        let primary = HttpEmbedder::new(config)?;
        let fallback = TfidfEmbedder::new(config.lexical_max_features);
        Ok(Self::new(Box::new(primary), fallback))
    }
}

#[async_trait]
impl Embedder for FallbackEmbedder {
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Embedding>> {
        match self.primary.embed(texts.clone()).await {
            Ok(embeddings) => Ok(embeddings),
            Err(e) => {
                warn!(
                    "Embedding backend '{}' failed ({}); falling back to lexical vectors",
                    self.primary.name(),
                    e
                );
                self.fallback.embed(texts).await
            }
        }
    }

    fn name(&self) -> &str {
        "fallback"
    }
}

/// Helper to embed in batches, preserving order
pub async fn embed_in_batches(
    embedder: &dyn Embedder,
    texts: Vec<String>,
    batch_size: usize,
) -> Result<Vec<Embedding>> {
    let mut all_embeddings = Vec::with_capacity(texts.len());

    for batch in texts.chunks(batch_size) {
        let embeddings = embedder.embed(batch.to_vec()).await?;
        all_embeddings.extend(embeddings);
    }

    Ok(all_embeddings)
}
