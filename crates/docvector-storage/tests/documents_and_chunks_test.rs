//! Exercises the document/chunk repositories together, including the
//! dedupe lookups the ingestion orchestrator relies on and the chunk
//! replace-for-document write path.

use chrono::Utc;
use docvector_common::types::{
    Chunk, Document, DocumentStatus, Source, SourceKind, SourceStatus,
};
use docvector_storage::{connect, run_migrations, ChunkRepository, DocumentRepository, PoolConfig, SourceRepository};
use std::collections::HashSet;
use uuid::Uuid;

fn get_test_db_url() -> String {
    std::env::var("TEST_DATABASE_URL").expect("TEST_DATABASE_URL must be set")
}

async fn setup_pool() -> sqlx::PgPool {
    let pool = connect(&get_test_db_url(), &PoolConfig::default())
        .await
        .expect("failed to connect to test database");
    run_migrations(&pool).await.expect("failed to run migrations");
    pool
}

fn test_source() -> Source {
    let now = Utc::now();
    Source {
        id: Uuid::new_v4(),
        name: format!("doc-test-source-{}", Uuid::new_v4()),
        kind: SourceKind::Web,
        library_id: None,
        version: None,
        config: Default::default(),
        status: SourceStatus::Active,
        sync_frequency: None,
        last_synced_at: None,
        last_error: None,
        created_at: now,
        updated_at: now,
    }
}

fn test_document(source_id: Uuid, url: &str, hash: &str) -> Document {
    let now = Utc::now();
    Document {
        id: Uuid::new_v4(),
        source_id,
        url: Some(url.to_string()),
        path: None,
        content_hash: hash.to_string(),
        title: Some("Example".to_string()),
        normalized_text: "hello world".to_string(),
        content_length: 11,
        language: Some("en".to_string()),
        format: Some("html".to_string()),
        status: DocumentStatus::Pending,
        chunk_count: 0,
        chunking_strategy: None,
        fetched_at: Some(now),
        processed_at: None,
        published_at: None,
        modified_at: None,
        author: None,
        error_message: None,
        metadata: Default::default(),
        created_at: now,
        updated_at: now,
    }
}

fn test_chunk(document_id: Uuid, index: i32, content: &str) -> Chunk {
    let now = Utc::now();
    Chunk {
        id: Uuid::new_v4(),
        document_id,
        index,
        content: content.to_string(),
        content_length: content.len() as i32,
        start_char: 0,
        end_char: content.len() as i32,
        is_code_snippet: false,
        code_language: None,
        topics: HashSet::new(),
        enrichment: None,
        relevance_score: 0.0,
        code_quality_score: 0.0,
        formatting_score: 0.0,
        metadata_score: 0.0,
        initialization_score: 0.0,
        prev_chunk_id: None,
        next_chunk_id: None,
        embedding_id: None,
        embedding_model: None,
        embedded_at: None,
        metadata: Default::default(),
        created_at: now,
        updated_at: now,
    }
}

#[tokio::test]
#[ignore]
async fn document_dedupe_lookups_find_existing_rows() {
    let pool = setup_pool().await;
    let sources = SourceRepository::new(&pool);
    let documents = DocumentRepository::new(&pool);

    let source = sources.create(&test_source()).await.unwrap();
    let doc = test_document(source.id, "https://example.com/a", "hash-a");
    let created = documents.create(&doc).await.unwrap();

    let by_url = documents
        .get_by_source_and_url(source.id, "https://example.com/a")
        .await
        .unwrap();
    assert_eq!(by_url.unwrap().id, created.id);

    let by_hash = documents.get_by_source_and_hash(source.id, "hash-a").await.unwrap();
    assert_eq!(by_hash.unwrap().id, created.id);

    let missing = documents.get_by_source_and_hash(source.id, "no-such-hash").await.unwrap();
    assert!(missing.is_none());

    sources.delete(source.id).await.ok();
}

#[tokio::test]
#[ignore]
async fn replacing_chunks_for_a_document_drops_the_previous_set() {
    let pool = setup_pool().await;
    let sources = SourceRepository::new(&pool);
    let documents = DocumentRepository::new(&pool);
    let chunks = ChunkRepository::new(&pool);

    let source = sources.create(&test_source()).await.unwrap();
    let doc = documents
        .create(&test_document(source.id, "https://example.com/b", "hash-b"))
        .await
        .unwrap();

    let first_pass = vec![test_chunk(doc.id, 0, "first"), test_chunk(doc.id, 1, "second")];
    chunks.replace_for_document(doc.id, &first_pass).await.unwrap();
    assert_eq!(chunks.count_for_document(doc.id).await.unwrap(), 2);

    let second_pass = vec![test_chunk(doc.id, 0, "only")];
    chunks.replace_for_document(doc.id, &second_pass).await.unwrap();
    assert_eq!(chunks.count_for_document(doc.id).await.unwrap(), 1);

    let ordered = chunks.list_for_document(doc.id).await.unwrap();
    assert_eq!(ordered.len(), 1);
    assert_eq!(ordered[0].content, "only");

    sources.delete(source.id).await.ok();
}

#[tokio::test]
#[ignore]
async fn chunk_adjacency_resolves_neighbours_by_index() {
    let pool = setup_pool().await;
    let sources = SourceRepository::new(&pool);
    let documents = DocumentRepository::new(&pool);
    let chunks = ChunkRepository::new(&pool);

    let source = sources.create(&test_source()).await.unwrap();
    let doc = documents
        .create(&test_document(source.id, "https://example.com/c", "hash-c"))
        .await
        .unwrap();

    let three = vec![
        test_chunk(doc.id, 0, "a"),
        test_chunk(doc.id, 1, "b"),
        test_chunk(doc.id, 2, "c"),
    ];
    let inserted = chunks.replace_for_document(doc.id, &three).await.unwrap();
    let middle = inserted.into_iter().find(|c| c.index == 1).unwrap();

    let with_adjacency = chunks.with_adjacency(middle).await.unwrap();
    assert!(with_adjacency.prev_chunk_id.is_some());
    assert!(with_adjacency.next_chunk_id.is_some());

    sources.delete(source.id).await.ok();
}
