//! Embedding providers (spec §4.6): a polymorphic `embed`/`embed_query`/
//! `dimension` interface over a local in-process model and a remote HTTP
//! model, mirroring the original's `BaseEmbedder` ABC (`embeddings/base.py`).

use std::sync::Arc;

use async_trait::async_trait;
use docvector_common::error::{DocVectorError, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::Semaphore;

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>>;
    fn dimension(&self) -> usize;
    fn model_name(&self) -> &str;
}

/// Deterministic hashing-trick embedder standing in for a real local model:
/// each token is hashed into a fixed-width bag, summed, then L2-normalised
/// so cosine similarity equals dot product (spec §4.6).
pub struct LocalEmbedder {
    model_name: String,
    dimension: usize,
}

impl LocalEmbedder {
    pub fn new(model_name: impl Into<String>, dimension: usize) -> Self {
        Self {
            model_name: model_name.into(),
            dimension,
        }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        let mut token_count = 0usize;

        for token in text.split_whitespace() {
            token_count += 1;
            let digest = Sha256::digest(token.as_bytes());
            for i in 0..self.dimension {
                let byte = digest[i % digest.len()];
                vector[i] += (byte as f32 - 128.0) / 128.0;
            }
        }

        if token_count > 0 {
            for v in vector.iter_mut() {
                *v /= token_count as f32;
            }
        }

        l2_normalize(&mut vector);
        vector
    }
}

fn l2_normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in vector.iter_mut() {
            *v /= norm;
        }
    }
}

#[async_trait]
impl EmbeddingProvider for LocalEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        // CPU-bound and serialised per model instance (spec §4.6).
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_one(text))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

#[derive(Debug, Serialize)]
struct RemoteEmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct RemoteEmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

/// HTTP-backed embedding provider. Batch requests run with bounded
/// concurrency (spec §4.6: "a small fixed number, e.g. 4").
pub struct RemoteEmbedder {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    model_name: String,
    dimension: usize,
    concurrency: Arc<Semaphore>,
}

impl RemoteEmbedder {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: Option<String>,
        model_name: impl Into<String>,
        dimension: usize,
        concurrency: usize,
    ) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
            api_key,
            model_name: model_name.into(),
            dimension,
            concurrency: Arc::new(Semaphore::new(concurrency.max(1))),
        }
    }

    async fn call_batch(&self, batch: &[String]) -> Result<Vec<Vec<f32>>> {
        let _permit = self
            .concurrency
            .acquire()
            .await
            .map_err(|e| DocVectorError::Embedding(e.to_string()))?;

        let mut request = self.client.post(&self.endpoint).json(&RemoteEmbedRequest {
            model: &self.model_name,
            input: batch,
        });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| DocVectorError::Embedding(e.to_string()))?;

        if !response.status().is_success() {
            return Err(DocVectorError::Embedding(format!(
                "remote embedding provider returned status {}",
                response.status()
            )));
        }

        let parsed: RemoteEmbedResponse = response
            .json()
            .await
            .map_err(|e| DocVectorError::Embedding(e.to_string()))?;

        Ok(parsed.embeddings)
    }
}

#[async_trait]
impl EmbeddingProvider for RemoteEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        const BATCH_SIZE: usize = 100;
        let mut out = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(BATCH_SIZE) {
            let vectors = self.call_batch(chunk).await?;
            out.extend(vectors);
        }
        Ok(out)
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let vectors = self.call_batch(std::slice::from_ref(&text.to_string())).await?;
        vectors
            .into_iter()
            .next()
            .ok_or_else(|| DocVectorError::Embedding("empty response for query embedding".to_string()))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn local_embedder_is_deterministic() {
        let embedder = LocalEmbedder::new("local-test", 16);
        let a = embedder.embed_query("hello world").await.unwrap();
        let b = embedder.embed_query("hello world").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn local_embedder_is_l2_normalized() {
        let embedder = LocalEmbedder::new("local-test", 32);
        let vector = embedder.embed_query("some reasonably long piece of text").await.unwrap();
        let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4 || norm == 0.0);
    }

    #[tokio::test]
    async fn local_embedder_distinguishes_different_text() {
        let embedder = LocalEmbedder::new("local-test", 16);
        let a = embedder.embed_query("alpha").await.unwrap();
        let b = embedder.embed_query("beta").await.unwrap();
        assert_ne!(a, b);
    }
}
