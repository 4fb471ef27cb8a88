//! Wraps an `EmbeddingProvider` with the two-tier cache, implementing the
//! hit/miss partition + batched-miss-fill loop from spec §4.6.

use async_trait::async_trait;
use docvector_common::error::{DocVectorError, Result};

use crate::cache::EmbeddingCache;
use crate::provider::EmbeddingProvider;

pub struct CachedEmbedder<P: EmbeddingProvider> {
    inner: P,
    cache: EmbeddingCache,
}

impl<P: EmbeddingProvider> CachedEmbedder<P> {
    pub fn new(inner: P, cache: EmbeddingCache) -> Self {
        Self { inner, cache }
    }
}

#[async_trait]
impl<P: EmbeddingProvider> EmbeddingProvider for CachedEmbedder<P> {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let model = self.inner.model_name().to_string();
        let cached = self.cache.get_many(texts, &model).await;

        let misses: Vec<String> = texts
            .iter()
            .filter(|t| !cached.contains_key(*t))
            .cloned()
            .collect();

        let mut fresh = Vec::new();
        if !misses.is_empty() {
            let vectors = self.inner.embed(&misses).await?;
            fresh = misses.into_iter().zip(vectors).collect::<Vec<_>>();
            self.cache.set_many(&fresh, &model).await;
        }

        let fresh_lookup: std::collections::HashMap<_, _> = fresh.into_iter().collect();

        texts
            .iter()
            .map(|t| {
                cached
                    .get(t)
                    .cloned()
                    .or_else(|| fresh_lookup.get(t).cloned())
                    .ok_or_else(|| {
                        DocVectorError::Embedding(format!(
                            "provider returned no vector for {t:?}; response was short or partial"
                        ))
                    })
            })
            .collect()
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let owned = text.to_string();
        let vectors = self.embed(std::slice::from_ref(&owned)).await?;
        Ok(vectors.into_iter().next().unwrap_or_default())
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::LocalEmbedder;

    #[tokio::test]
    async fn repeated_text_is_served_from_cache() {
        let cache = EmbeddingCache::new(None, 16, 3600);
        let embedder = CachedEmbedder::new(LocalEmbedder::new("local-test", 16), cache);

        let texts = vec!["hello".to_string(), "hello".to_string(), "world".to_string()];
        let vectors = embedder.embed(&texts).await.unwrap();

        assert_eq!(vectors.len(), 3);
        assert_eq!(vectors[0], vectors[1]);
    }

    struct TruncatingEmbedder;

    #[async_trait]
    impl EmbeddingProvider for TruncatingEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().take(texts.len().saturating_sub(1)).map(|_| vec![0.0; 4]).collect())
        }

        async fn embed_query(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![0.0; 4])
        }

        fn dimension(&self) -> usize {
            4
        }

        fn model_name(&self) -> &str {
            "truncating-test"
        }
    }

    #[tokio::test]
    async fn short_provider_response_errors_instead_of_panicking() {
        let cache = EmbeddingCache::new(None, 16, 3600);
        let embedder = CachedEmbedder::new(TruncatingEmbedder, cache);

        let texts = vec!["one".to_string(), "two".to_string()];
        let result = embedder.embed(&texts).await;

        assert!(result.is_err());
    }
}
