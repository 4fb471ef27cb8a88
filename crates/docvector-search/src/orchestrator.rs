//! Search orchestrator (spec §4.11): query -> embed -> filter -> vector
//! search -> hydrate -> rerank -> pack. Grounded in the original
//! implementation's `services/search_service.py` (`SearchService.search`),
//! generalised onto the crate's own embedder/vector-index traits.

use std::collections::BTreeMap;

use docvector_common::error::Result;
use docvector_embeddings::EmbeddingProvider;
use docvector_storage::vector::{FilterSpec, VectorIndex};
use serde_json::Value as JsonValue;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::packer::{PackedResult, TokenLimiter};
use crate::reranker::{rerank, RankedResult, RerankWeights};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchType {
    Vector,
    Hybrid,
}

#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub query: String,
    pub limit: usize,
    pub search_type: SearchType,
    pub access_level: Option<String>,
    pub topic: Option<String>,
    pub library_id: Option<Uuid>,
    pub version: Option<String>,
    pub extra_filters: BTreeMap<String, JsonValue>,
    pub score_threshold: Option<f32>,
    pub use_reranking: bool,
    pub max_tokens: Option<usize>,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>, limit: usize) -> Self {
        Self {
            query: query.into(),
            limit,
            search_type: SearchType::Hybrid,
            access_level: None,
            topic: None,
            library_id: None,
            version: None,
            extra_filters: BTreeMap::new(),
            score_threshold: None,
            use_reranking: true,
            max_tokens: None,
        }
    }

    /// Builds the vector-index filter from the named fields plus any
    /// caller-supplied extra filters (spec §4.11).
    fn build_filter(&self) -> FilterSpec {
        let mut filter = FilterSpec::new();
        if let Some(access_level) = &self.access_level {
            filter = filter.eq("access_level", access_level.clone());
        }
        if let Some(topic) = &self.topic {
            filter = filter.eq("topics", topic.clone());
        }
        if let Some(library_id) = &self.library_id {
            filter = filter.eq("library_id", library_id.to_string());
        }
        if let Some(version) = &self.version {
            filter = filter.eq("version", version.clone());
        }
        for (field, value) in &self.extra_filters {
            filter = filter.eq(field.clone(), value.clone());
        }
        filter
    }
}

#[derive(Debug, Clone)]
pub struct SearchResult {
    pub chunk_id: Uuid,
    pub document_id: Option<Uuid>,
    pub score: f32,
    pub content: String,
    pub title: Option<String>,
    pub url: Option<String>,
    pub metadata: BTreeMap<String, JsonValue>,
    pub truncated: bool,
}

#[derive(Debug, Clone)]
pub struct SearchResponse {
    pub query: String,
    pub search_type: SearchType,
    pub results: Vec<SearchResult>,
    pub total: usize,
}

pub struct SearchOrchestrator {
    vector_index: std::sync::Arc<VectorIndex>,
    embedder: std::sync::Arc<dyn EmbeddingProvider>,
    collection_name: String,
    weights: RerankWeights,
}

impl SearchOrchestrator {
    pub fn new(
        vector_index: std::sync::Arc<VectorIndex>,
        embedder: std::sync::Arc<dyn EmbeddingProvider>,
        collection_name: impl Into<String>,
    ) -> Self {
        Self {
            vector_index,
            embedder,
            collection_name: collection_name.into(),
            weights: RerankWeights::default(),
        }
    }

    pub fn with_weights(mut self, weights: RerankWeights) -> Self {
        self.weights = weights;
        self
    }

    /// Runs one search request end to end (spec §4.11). Requests
    /// `2 * limit` candidates from the vector index when reranking is on,
    /// to give the reranker headroom.
    #[instrument(skip(self, request), fields(query = %request.query, limit = request.limit))]
    pub async fn search(&self, request: SearchRequest) -> Result<SearchResponse> {
        let query_vector = self.embedder.embed_query(&request.query).await?;
        let filter = request.build_filter();

        let fetch_limit = if request.use_reranking {
            (request.limit * 2) as u64
        } else {
            request.limit as u64
        };

        let hits = self
            .vector_index
            .search(&self.collection_name, query_vector, fetch_limit, filter, request.score_threshold)
            .await?;

        let total_candidates = hits.len();

        let ranked: Vec<RankedResult> = if request.use_reranking {
            rerank(&request.query, hits, self.weights)
        } else {
            hits.into_iter()
                .map(|hit| RankedResult {
                    id: hit.id,
                    content: hit.payload.get("content").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
                    vector_score: hit.score,
                    relevance_score: 0.0,
                    code_quality_score: 0.0,
                    formatting_score: 0.0,
                    metadata_score: 0.0,
                    initialization_score: 0.0,
                    final_score: hit.score,
                    payload: hit.payload,
                })
                .collect()
        };

        let top: Vec<RankedResult> = ranked.into_iter().take(request.limit).collect();

        let packed: Vec<PackedResult> = match request.max_tokens {
            Some(max_tokens) => TokenLimiter::default().limit_results_to_tokens(&top, max_tokens),
            None => top
                .iter()
                .map(|r| PackedResult { id: r.id, content: r.content.clone(), score: r.final_score, truncated: false })
                .collect(),
        };

        let by_id: BTreeMap<Uuid, &RankedResult> = top.iter().map(|r| (r.id, r)).collect();

        let results = packed
            .into_iter()
            .filter_map(|packed| {
                let source = by_id.get(&packed.id)?;
                Some(SearchResult {
                    chunk_id: payload_uuid(&source.payload, "chunk_id").unwrap_or(packed.id),
                    document_id: payload_uuid(&source.payload, "document_id"),
                    score: packed.score,
                    content: packed.content,
                    title: source.payload.get("title").and_then(|v| v.as_str()).map(str::to_string),
                    url: source.payload.get("url").and_then(|v| v.as_str()).map(str::to_string),
                    metadata: source.payload.clone().into_iter().collect(),
                    truncated: packed.truncated,
                })
            })
            .collect();

        info!(candidates = total_candidates, returned = request.limit, "search completed");

        Ok(SearchResponse { query: request.query, search_type: request.search_type, results, total: total_candidates })
    }
}

fn payload_uuid(payload: &docvector_storage::vector::Payload, key: &str) -> Option<Uuid> {
    payload.get(key).and_then(JsonValue::as_str).and_then(|s| Uuid::parse_str(s).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_builds_only_present_fields() {
        let request = SearchRequest::new("q", 10);
        let filter = request.build_filter();
        assert!(filter.is_empty());

        let mut request = SearchRequest::new("q", 10);
        request.access_level = Some("public".to_string());
        let filter = request.build_filter();
        assert!(!filter.is_empty());
    }
}
