//! OpenAI-compatible HTTP embedding backend

use super::{Embedder, Embedding, EmbeddingKind, EmbeddingTag};
use crate::config::EmbeddingConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use url::Url;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const RETRIES: usize = 2;

#[derive(Debug, Clone, Serialize)]
struct EmbeddingRequest {
    model: String,
    input: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Clone, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

/// Embedder backed by an OpenAI-compatible `/v1/embeddings` endpoint
pub struct HttpEmbedder {
    client: Client,
    base_url: Url,
    model: String,
    api_key: Option<String>,
}

impl HttpEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url)?;
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        let api_key = std::env::var(&config.api_key_env).ok().filter(|k| !k.is_empty());
        Ok(Self {
            client,
            base_url,
            model: config.model.clone(),
            api_key,
        })
    }

    fn endpoint(&self) -> Result<Url> {
        self.base_url
            .join("/v1/embeddings")
            .map_err(|e| Error::Config(format!("Invalid embedding backend URL: {}", e)))
    }

    async fn request_embeddings(&self, input: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let url = self.endpoint()?;
        let body = EmbeddingRequest {
            model: self.model.clone(),
            input,
        };

        let mut last_err: Option<Error> = None;
        for attempt in 0..=RETRIES {
            let mut request = self.client.post(url.clone()).json(&body);
            if let Some(key) = &self.api_key {
                request = request.bearer_auth(key);
            }

            match request.send().await {
                Ok(response) => match response.error_for_status() {
                    Ok(ok) => {
                        let parsed: EmbeddingResponse = ok.json().await?;
                        let mut data = parsed.data;
                        // The API is allowed to reorder; the index field is
                        // authoritative for input order.
                        data.sort_by_key(|d| d.index);
                        return Ok(data.into_iter().map(|d| d.embedding).collect());
                    }
                    Err(e) => last_err = Some(Error::Embedding(e.to_string())),
                },
                Err(e) => last_err = Some(Error::Embedding(e.to_string())),
            }

            if attempt < RETRIES {
                tokio::time::sleep(Duration::from_millis(200 * (attempt + 1) as u64)).await;
            }
        }

        Err(last_err
            .unwrap_or_else(|| Error::Embedding("Embedding backend request failed".to_string())))
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Embedding>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Embedding {} texts with model {}", texts.len(), self.model);
        let vectors = self.request_embeddings(texts).await?;

        let dimension = vectors.first().map(|v| v.len()).unwrap_or(0);
        if dimension == 0 {
            return Err(Error::Embedding(
                "Embedding backend returned no vectors".to_string(),
            ));
        }
        if let Some(mismatch) = vectors.iter().find(|v| v.len() != dimension) {
            return Err(Error::Embedding(format!(
                "Embedding dimension mismatch for model '{}': expected {}, got {}",
                self.model,
                dimension,
                mismatch.len()
            )));
        }

        let tag = EmbeddingTag::new(EmbeddingKind::Semantic, dimension);
        Ok(vectors
            .into_iter()
            .map(|vector| Embedding::new(vector, tag))
            .collect())
    }

    fn name(&self) -> &str {
        &self.model
    }
}
