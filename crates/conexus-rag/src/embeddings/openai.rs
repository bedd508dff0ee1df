//! OpenAI-compatible `/v1/embeddings` client.
//!
//! Works against OpenAI itself and any server that mirrors its request and
//! response shape (Ollama, vLLM, LiteLLM). Query embeddings are cached.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};
use std::num::NonZeroUsize;

use super::EmbeddingModel;
use crate::config::EmbeddingConfig;

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
    #[serde(default)]
    index: usize,
}

pub struct OpenAIEmbeddings {
    client: Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    dimension: usize,
    cache: Mutex<lru::LruCache<u64, Vec<f32>>>,
}

impl OpenAIEmbeddings {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(std::time::Duration::from_secs(15))
            .timeout(std::time::Duration::from_secs(60))
            .pool_idle_timeout(std::time::Duration::from_secs(90))
            .tcp_nodelay(true)
            .build()
            .context("Failed to build embedding HTTP client")?;

        let capacity = NonZeroUsize::new(config.cache_size)
            .ok_or_else(|| anyhow!("embedding.cache_size must be > 0"))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            dimension: config.dimension,
            cache: Mutex::new(lru::LruCache::new(capacity)),
        })
    }

    fn cache_key(text: &str) -> u64 {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        text.hash(&mut hasher);
        hasher.finish()
    }

    async fn request(&self, inputs: &[&str]) -> Result<Vec<Vec<f32>>> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        let mut request = self.client.post(&self.endpoint).json(&EmbeddingRequest {
            model: &self.model,
            input: inputs,
        });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("Embedding request to {} failed", self.endpoint))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .with_context(|| format!("Failed to read response body from {}", self.endpoint))?;

        if !status.is_success() {
            let preview: String = body.chars().take(300).collect();
            return Err(anyhow!(
                "Embedding endpoint {} returned HTTP {}: {}",
                self.endpoint,
                status,
                preview
            ));
        }

        let parsed = parse_embedding_response(&body, inputs.len(), self.dimension)
            .with_context(|| format!("Invalid embedding response from {} (HTTP {})", self.endpoint, status))?;
        Ok(parsed)
    }
}

/// Decode a response body into one vector per input, in input order.
fn parse_embedding_response(body: &str, expected: usize, dimension: usize) -> Result<Vec<Vec<f32>>> {
    let trimmed = body.trim_start();
    if trimmed.starts_with('<') {
        let preview: String = trimmed.chars().take(200).collect();
        return Err(anyhow!("endpoint returned HTML instead of JSON: {}", preview));
    }

    let mut response: EmbeddingResponse =
        serde_json::from_str(body).context("Failed to parse embedding JSON")?;
    if response.data.len() != expected {
        return Err(anyhow!(
            "expected {} embeddings, got {}",
            expected,
            response.data.len()
        ));
    }
    response.data.sort_by_key(|d| d.index);

    response
        .data
        .into_iter()
        .map(|d| {
            if d.embedding.len() == dimension {
                Ok(d.embedding)
            } else {
                Err(anyhow!(
                    "embedding has dimension {}, configured dimension is {}",
                    d.embedding.len(),
                    dimension
                ))
            }
        })
        .collect()
}

#[async_trait]
impl EmbeddingModel for OpenAIEmbeddings {
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let key = Self::cache_key(text);
        let cached = self.cache.lock().get(&key).cloned();
        if let Some(cached) = cached {
            return Ok(cached);
        }

        let embedding = self
            .request(&[text])
            .await?
            .pop()
            .ok_or_else(|| anyhow!("Embedding endpoint returned no vectors"))?;
        self.cache.lock().put(key, embedding.clone());
        Ok(embedding)
    }

    async fn embed_document(&self, text: &str) -> Result<Vec<f32>> {
        self.request(&[text])
            .await?
            .pop()
            .ok_or_else(|| anyhow!("Embedding endpoint returned no vectors"))
    }

    async fn embed_documents(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(64) {
            out.extend(self.request(batch).await?);
        }
        Ok(out)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
