//! Integration tests against a real Qdrant instance, gated behind
//! `TEST_QDRANT_URL` + `#[ignore]`.

use docvector_storage::{FilterSpec, VectorIndex};
use serde_json::json;
use uuid::Uuid;

fn get_test_qdrant_url() -> String {
    std::env::var("TEST_QDRANT_URL").expect("TEST_QDRANT_URL must be set")
}

fn test_collection_name(suffix: &str) -> String {
    format!("test_{suffix}_{}", Uuid::new_v4().to_string().replace('-', "_"))
}

#[tokio::test]
#[ignore]
async fn create_collection_is_idempotent() {
    let index = VectorIndex::connect(&get_test_qdrant_url()).unwrap();
    let collection = test_collection_name("create");

    index.create_collection(&collection, 4).await.unwrap();
    index.create_collection(&collection, 4).await.unwrap();
}

#[tokio::test]
#[ignore]
async fn upsert_then_search_returns_the_nearest_point() {
    let index = VectorIndex::connect(&get_test_qdrant_url()).unwrap();
    let collection = test_collection_name("search");
    index.create_collection(&collection, 4).await.unwrap();

    let id = Uuid::new_v4();
    let mut payload = std::collections::BTreeMap::new();
    payload.insert("chunk_id".to_string(), json!(id.to_string()));
    payload.insert("content".to_string(), json!("hello world"));
    payload.insert("language".to_string(), json!("rust"));

    index
        .upsert(&collection, &[id], &[vec![0.1, 0.2, 0.3, 0.4]], &[payload])
        .await
        .unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(300)).await;

    let results = index
        .search(&collection, vec![0.1, 0.2, 0.3, 0.4], 5, FilterSpec::new(), None)
        .await
        .unwrap();

    assert!(!results.is_empty());
    assert_eq!(results[0].id, id);
}

#[tokio::test]
#[ignore]
async fn search_with_equality_filter_excludes_non_matching_payloads() {
    let index = VectorIndex::connect(&get_test_qdrant_url()).unwrap();
    let collection = test_collection_name("filter");
    index.create_collection(&collection, 4).await.unwrap();

    let rust_id = Uuid::new_v4();
    let python_id = Uuid::new_v4();

    let mut rust_payload = std::collections::BTreeMap::new();
    rust_payload.insert("language".to_string(), json!("rust"));
    let mut python_payload = std::collections::BTreeMap::new();
    python_payload.insert("language".to_string(), json!("python"));

    index
        .upsert(
            &collection,
            &[rust_id, python_id],
            &[vec![0.1, 0.2, 0.3, 0.4], vec![0.5, 0.6, 0.7, 0.8]],
            &[rust_payload, python_payload],
        )
        .await
        .unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(300)).await;

    let filter = FilterSpec::new().eq("language", json!("rust"));
    let results = index
        .search(&collection, vec![0.1, 0.2, 0.3, 0.4], 5, filter, None)
        .await
        .unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].id, rust_id);
}

#[tokio::test]
#[ignore]
async fn delete_by_ids_removes_the_point() {
    let index = VectorIndex::connect(&get_test_qdrant_url()).unwrap();
    let collection = test_collection_name("delete");
    index.create_collection(&collection, 4).await.unwrap();

    let id = Uuid::new_v4();
    let mut payload = std::collections::BTreeMap::new();
    payload.insert("chunk_id".to_string(), json!(id.to_string()));

    index
        .upsert(&collection, &[id], &[vec![0.1, 0.2, 0.3, 0.4]], &[payload])
        .await
        .unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(300)).await;

    index.delete_by_ids(&collection, &[id]).await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(300)).await;

    let fetched = index.get(&collection, &[id]).await.unwrap();
    assert!(fetched.is_empty());
}
