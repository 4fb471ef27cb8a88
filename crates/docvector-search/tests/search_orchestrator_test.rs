//! Integration test against a real Qdrant instance, gated behind
//! `TEST_QDRANT_URL` + `#[ignore]` (mirrors `docvector-storage`'s
//! `qdrant_test.rs`).

use std::sync::Arc;

use docvector_embeddings::{EmbeddingProvider, LocalEmbedder};
use docvector_search::{SearchOrchestrator, SearchRequest};
use docvector_storage::VectorIndex;
use serde_json::json;
use uuid::Uuid;

fn get_test_qdrant_url() -> String {
    std::env::var("TEST_QDRANT_URL").expect("TEST_QDRANT_URL must be set")
}

#[tokio::test]
#[ignore]
async fn search_returns_the_embedded_chunk_back() {
    let embedder: Arc<dyn EmbeddingProvider> = Arc::new(LocalEmbedder::new("local-test".to_string(), 32));
    let index = Arc::new(VectorIndex::connect(&get_test_qdrant_url()).unwrap());
    let collection = format!("test_search_{}", Uuid::new_v4().to_string().replace('-', "_"));
    index.create_collection(&collection, 32).await.unwrap();

    let chunk_id = Uuid::new_v4();
    let document_id = Uuid::new_v4();
    let text = "the quick brown fox jumps over the lazy dog";
    let vector = embedder.embed_query(text).await.unwrap();

    let mut payload = std::collections::BTreeMap::new();
    payload.insert("chunk_id".to_string(), json!(chunk_id.to_string()));
    payload.insert("document_id".to_string(), json!(document_id.to_string()));
    payload.insert("content".to_string(), json!(text));
    payload.insert("title".to_string(), json!("Fox facts"));

    index.upsert(&collection, &[chunk_id], &[vector], &[payload]).await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(300)).await;

    let orchestrator = SearchOrchestrator::new(index.clone(), embedder.clone(), collection.clone());
    let response = orchestrator.search(SearchRequest::new("quick brown fox", 5)).await.unwrap();

    assert_eq!(response.results.len(), 1);
    assert_eq!(response.results[0].chunk_id, chunk_id);
    assert_eq!(response.results[0].document_id, Some(document_id));
}
