//! Explicit application context (spec §9: "replace global engine/session
//! state with an explicit `App` context struct carrying handles ... passed
//! into each request/job"). Built once per CLI invocation and handed to
//! every command.

use std::sync::Arc;

use docvector_common::config::{DocVectorConfig, EmbeddingProviderKind};
use docvector_common::error::{DocVectorError, Result};
use docvector_embeddings::{CachedEmbedder, EmbeddingCache, EmbeddingProvider, LocalEmbedder, RemoteEmbedder};
use docvector_storage::vector::VectorIndex;
use docvector_storage::pool::PoolConfig;
use sqlx::PgPool;
use tracing::warn;

pub struct AppContext {
    pub config: DocVectorConfig,
    pub pool: PgPool,
    pub vector_index: Arc<VectorIndex>,
    pub embedder: Arc<dyn EmbeddingProvider>,
}

impl AppContext {
    pub async fn connect(config: DocVectorConfig) -> Result<Self> {
        let pool = docvector_storage::pool::connect(&config.storage.database_url, &PoolConfig::default()).await?;
        docvector_storage::pool::run_migrations(&pool).await?;

        let vector_index = Arc::new(VectorIndex::connect(&config.storage.qdrant_url)?);

        let cache = build_cache(&config).await;
        let embedder: Arc<dyn EmbeddingProvider> = match config.embedding.provider {
            EmbeddingProviderKind::Local => {
                let inner = LocalEmbedder::new(config.embedding.model.clone(), config.embedding.dimension);
                Arc::new(CachedEmbedder::new(inner, cache))
            }
            EmbeddingProviderKind::OpenAi => {
                let endpoint = config.embedding.remote_endpoint.clone().ok_or_else(|| {
                    DocVectorError::Configuration("remote_endpoint required for openai provider".into())
                })?;
                let inner = RemoteEmbedder::new(
                    endpoint,
                    config.embedding.remote_api_key.clone(),
                    config.embedding.model.clone(),
                    config.embedding.dimension,
                    config.embedding.remote_concurrency,
                );
                Arc::new(CachedEmbedder::new(inner, cache))
            }
        };

        Ok(Self { config, pool, vector_index, embedder })
    }
}

/// Connects the Redis-backed persistent cache tier; a connection failure
/// degrades to memory-only caching rather than failing startup (spec §4.6:
/// "cache failures are non-fatal").
async fn build_cache(config: &DocVectorConfig) -> EmbeddingCache {
    let redis = match redis::Client::open(config.storage.redis_url.clone()) {
        Ok(client) => match redis::aio::ConnectionManager::new(client).await {
            Ok(manager) => Some(manager),
            Err(err) => {
                warn!(error = %err, "redis connection failed, embedding cache is memory-only");
                None
            }
        },
        Err(err) => {
            warn!(error = %err, "invalid redis url, embedding cache is memory-only");
            None
        }
    };
    EmbeddingCache::new(redis, 10_000, config.embedding.cache_ttl_secs)
}
