//! Two-tier embedding cache (spec §4.6): an in-process LRU tier backed by a
//! persistent Redis tier, keyed by `sha256(model:text)` with a 7-day TTL.
//! Ported from the original `embeddings/cache.py`'s `EmbeddingCache`, with
//! the `lru` tier added ahead of it the way the teacher layers its own
//! caches (`WebCrawlerRetriever`'s LSH + Redis combination).

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Mutex;

use docvector_common::hash::compute_embedding_cache_key;
use lru::LruCache;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::warn;

const KEY_PREFIX: &str = "embed:";

pub struct EmbeddingCache {
    memory: Mutex<LruCache<String, Vec<f32>>>,
    redis: Option<ConnectionManager>,
    ttl_secs: u64,
}

impl EmbeddingCache {
    pub fn new(redis: Option<ConnectionManager>, memory_capacity: usize, ttl_secs: u64) -> Self {
        let capacity = NonZeroUsize::new(memory_capacity.max(1)).unwrap();
        Self {
            memory: Mutex::new(LruCache::new(capacity)),
            redis,
            ttl_secs,
        }
    }

    fn key(model: &str, text: &str) -> String {
        format!("{KEY_PREFIX}{}", compute_embedding_cache_key(model, text))
    }

    /// Partition `texts` into cache hits and the texts still needing a
    /// model call, checking the memory tier then the Redis tier.
    pub async fn get_many(&self, texts: &[String], model: &str) -> HashMap<String, Vec<f32>> {
        if texts.is_empty() {
            return HashMap::new();
        }

        let mut hits = HashMap::new();
        let mut remaining: Vec<&String> = Vec::with_capacity(texts.len());

        {
            let mut memory = self.memory.lock().unwrap();
            for text in texts {
                let key = Self::key(model, text);
                if let Some(vector) = memory.get(&key) {
                    hits.insert(text.clone(), vector.clone());
                } else {
                    remaining.push(text);
                }
            }
        }

        if remaining.is_empty() {
            return hits;
        }

        let Some(redis) = &self.redis else {
            return hits;
        };

        let keys: Vec<String> = remaining.iter().map(|t| Self::key(model, t)).collect();
        let mut conn = redis.clone();
        let values: Result<Vec<Option<String>>, _> = conn.mget(&keys).await;

        match values {
            Ok(values) => {
                let mut memory = self.memory.lock().unwrap();
                for (text, raw) in remaining.iter().zip(values) {
                    if let Some(raw) = raw {
                        if let Ok(vector) = serde_json::from_str::<Vec<f32>>(&raw) {
                            let key = Self::key(model, text);
                            memory.put(key, vector.clone());
                            hits.insert((*text).clone(), vector);
                        }
                    }
                }
            }
            Err(err) => {
                warn!(error = %err, "redis get_many failed, degrading to direct model calls");
            }
        }

        hits
    }

    /// Write computed embeddings back to both tiers. Redis failures are
    /// logged and otherwise ignored (spec §4.6: "cache failures are
    /// non-fatal").
    pub async fn set_many(&self, pairs: &[(String, Vec<f32>)], model: &str) {
        if pairs.is_empty() {
            return;
        }

        {
            let mut memory = self.memory.lock().unwrap();
            for (text, vector) in pairs {
                memory.put(Self::key(model, text), vector.clone());
            }
        }

        let Some(redis) = &self.redis else {
            return;
        };

        let mut pipe = redis::pipe();
        for (text, vector) in pairs {
            let key = Self::key(model, text);
            let serialized = match serde_json::to_string(vector) {
                Ok(s) => s,
                Err(err) => {
                    warn!(error = %err, "failed to serialize embedding for cache");
                    continue;
                }
            };
            pipe.set_ex(key, serialized, self.ttl_secs);
        }

        let mut conn = redis.clone();
        let result: redis::RedisResult<()> = pipe.query_async(&mut conn).await;
        if let Err(err) = result {
            warn!(error = %err, "redis set_many failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_tier_serves_without_redis() {
        let cache = EmbeddingCache::new(None, 16, 3600);
        let pairs = vec![("hello".to_string(), vec![1.0, 2.0, 3.0])];
        cache.set_many(&pairs, "local-test").await;

        let hits = cache.get_many(&["hello".to_string()], "local-test").await;
        assert_eq!(hits.get("hello"), Some(&vec![1.0, 2.0, 3.0]));
    }

    #[tokio::test]
    async fn miss_without_redis_returns_empty() {
        let cache = EmbeddingCache::new(None, 16, 3600);
        let hits = cache.get_many(&["unseen".to_string()], "local-test").await;
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn distinct_models_do_not_collide() {
        let cache = EmbeddingCache::new(None, 16, 3600);
        cache
            .set_many(&[("text".to_string(), vec![1.0])], "model-a")
            .await;
        let hits = cache.get_many(&["text".to_string()], "model-b").await;
        assert!(hits.is_empty());
    }
}
