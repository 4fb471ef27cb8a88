//! Ingestion orchestrator (spec §4.9): crawl → dedupe → parse → chunk →
//! extract code → embed → persist, one `IngestionJob` per source run.
//!
//! Fan-out bounded by an explicit `Arc<Semaphore>` (spec §5's "async
//! everything → explicit admission gates" note), cancellation checked
//! between document boundaries only via `tokio_util::sync::CancellationToken`
//! so a partially-embedded batch is never interrupted.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use docvector_common::error::Result;
use docvector_common::hash::compute_text_hash;
use docvector_common::types::{
    ChunkingStrategy, Document, DocumentStatus, IngestionJob, JobStatus, JobType,
};
use docvector_crawler::FetchedDocument;
use docvector_embeddings::EmbeddingProvider;
use docvector_processing::{chunk_document, extract_from_html, extract_from_markdown, parse_by_kind, CodeSnippet};
use docvector_storage::vector::Payload;
use docvector_storage::{ChunkRepository, DocumentRepository, JobRepository, SourceRepository, VectorIndex};
use futures::stream::{FuturesUnordered, StreamExt};
use sqlx::PgPool;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct IngestionConfig {
    pub collection_name: String,
    pub embedding_dimension: u64,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub chunking_strategy: ChunkingStrategy,
    /// Chunks per embedding batch (spec §4.9 step 4: "up to M, e.g. 64").
    pub embedding_batch_size: usize,
    /// Documents processed concurrently within one job (spec §5).
    pub document_concurrency: usize,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            collection_name: "docvector_chunks".to_string(),
            embedding_dimension: 384,
            chunk_size: 512,
            chunk_overlap: 50,
            chunking_strategy: ChunkingStrategy::Semantic,
            embedding_batch_size: 64,
            document_concurrency: 4,
        }
    }
}

/// The outcome of processing one fetched document, folded into the job's
/// counters by the caller.
struct DocumentOutcome {
    chunks_written: i32,
    failed: bool,
}

pub struct IngestionOrchestrator {
    pool: PgPool,
    vector_index: Arc<VectorIndex>,
    embedder: Arc<dyn EmbeddingProvider>,
    config: IngestionConfig,
}

impl IngestionOrchestrator {
    pub fn new(
        pool: PgPool,
        vector_index: Arc<VectorIndex>,
        embedder: Arc<dyn EmbeddingProvider>,
        config: IngestionConfig,
    ) -> Self {
        Self { pool, vector_index, embedder, config }
    }

    /// Runs one ingestion job for `source_id` over `fetched` documents,
    /// honoring `cancel` between document boundaries (spec §5).
    #[instrument(skip(self, fetched, cancel), fields(source_id = %source_id, documents = fetched.len()))]
    pub async fn ingest_source(
        &self,
        source_id: Uuid,
        fetched: Vec<FetchedDocument>,
        cancel: CancellationToken,
    ) -> Result<IngestionJob> {
        self.vector_index
            .create_collection(&self.config.collection_name, self.config.embedding_dimension)
            .await?;

        let jobs = JobRepository::new(&self.pool);
        let now = Utc::now();
        let mut job = IngestionJob {
            id: Uuid::new_v4(),
            source_id: Some(source_id),
            job_type: JobType::FullSync,
            status: JobStatus::Pending,
            total_documents: fetched.len() as i32,
            processed_documents: 0,
            failed_documents: 0,
            total_chunks: 0,
            started_at: None,
            completed_at: None,
            error_message: None,
            error_details: BTreeMap::new(),
            config: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        };
        job = jobs.create(&job).await?;
        job.transition_to(JobStatus::Running)?;
        job.started_at = Some(Utc::now());
        job = jobs.update(&job).await?;

        let semaphore = Arc::new(Semaphore::new(self.config.document_concurrency.max(1)));
        let mut in_flight = FuturesUnordered::new();
        let mut was_cancelled = false;

        for document in fetched {
            if cancel.is_cancelled() {
                was_cancelled = true;
                break;
            }
            let semaphore = semaphore.clone();
            in_flight.push(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                (document.url.clone(), self.process_one(source_id, document).await)
            });
        }

        while let Some((url, outcome)) = in_flight.next().await {
            match outcome {
                Ok(outcome) => {
                    let processed_delta = 1;
                    let failed_delta = if outcome.failed { 1 } else { 0 };
                    job = jobs
                        .increment_counters(job.id, processed_delta, failed_delta, outcome.chunks_written)
                        .await?;
                }
                Err(err) => {
                    error!(%url, error = %err, "document processing failed unexpectedly");
                    job = jobs.increment_counters(job.id, 1, 1, 0).await?;
                }
            }
        }

        let final_status = if was_cancelled {
            JobStatus::Cancelled
        } else if job.total_documents > 0 && job.failed_documents == job.total_documents {
            JobStatus::Failed
        } else {
            JobStatus::Completed
        };
        job.transition_to(final_status)?;
        if final_status == JobStatus::Failed {
            job.error_message = Some("all documents in this run failed to ingest".to_string());
        }
        job = jobs.update(&job).await?;

        let sources = SourceRepository::new(&self.pool);
        if let Ok(mut source) = sources.get(source_id).await {
            source.last_synced_at = Some(Utc::now());
            if final_status == JobStatus::Failed {
                source.mark_error("ingestion job failed: every document errored");
            }
            sources.update(&source).await.ok();
        }

        info!(
            processed = job.processed_documents,
            failed = job.failed_documents,
            chunks = job.total_chunks,
            status = %job.status,
            "ingestion job finished"
        );

        Ok(job)
    }

    async fn process_one(&self, source_id: Uuid, fetched: FetchedDocument) -> Result<DocumentOutcome> {
        let documents = DocumentRepository::new(&self.pool);

        let raw_text = String::from_utf8_lossy(&fetched.content).into_owned();
        let parsed = parse_by_kind(&raw_text, &fetched.content_type, Some(&fetched.url));
        let content_hash = compute_text_hash(&parsed.content);

        let existing = documents.get_by_source_and_url(source_id, &fetched.url).await?;
        if let Some(existing) = &existing {
            if existing.content_hash == content_hash {
                return Ok(DocumentOutcome { chunks_written: 0, failed: false });
            }
        } else if documents.get_by_source_and_hash(source_id, &content_hash).await?.is_some() {
            return Ok(DocumentOutcome { chunks_written: 0, failed: false });
        }

        let now = Utc::now();
        let title = parsed.title.clone().or_else(|| fetched.title.clone());

        let mut document = match existing {
            // Re-crawl of a known (source, url) whose content changed: upsert
            // the existing row rather than inserting a second one, which
            // would violate uq_documents_source_url (spec §4.9 step 2).
            Some(mut document) => {
                document.content_hash = content_hash;
                document.title = title;
                document.normalized_text = parsed.content.clone();
                document.content_length = parsed.content.len() as i64;
                document.language = Some(parsed.language.clone());
                document.format = Some(fetched.content_type.clone());
                document.chunking_strategy = Some(self.config.chunking_strategy);
                document.fetched_at = Some(now);
                document.error_message = None;
                document.metadata = parsed.metadata.clone();
                if document.status != DocumentStatus::Processing {
                    document.transition_to(DocumentStatus::Processing)?;
                }
                documents.update(&document).await?
            }
            None => {
                let document = Document {
                    id: Uuid::new_v4(),
                    source_id,
                    url: Some(fetched.url.clone()),
                    path: None,
                    content_hash,
                    title,
                    normalized_text: parsed.content.clone(),
                    content_length: parsed.content.len() as i64,
                    language: Some(parsed.language.clone()),
                    format: Some(fetched.content_type.clone()),
                    status: DocumentStatus::Pending,
                    chunk_count: 0,
                    chunking_strategy: Some(self.config.chunking_strategy),
                    fetched_at: Some(now),
                    processed_at: None,
                    published_at: None,
                    modified_at: None,
                    author: None,
                    error_message: None,
                    metadata: parsed.metadata.clone(),
                    created_at: now,
                    updated_at: now,
                };
                let mut document = documents.create(&document).await?;
                document.transition_to(DocumentStatus::Processing)?;
                documents.update(&document).await?
            }
        };

        match self.process_document_body(&document, &fetched).await {
            Ok(chunk_count) => {
                document.transition_to(DocumentStatus::Completed)?;
                document.chunk_count = chunk_count;
                document.processed_at = Some(Utc::now());
                documents.update(&document).await?;
                Ok(DocumentOutcome { chunks_written: chunk_count, failed: false })
            }
            Err(err) => {
                warn!(document_id = %document.id, error = %err, "document processing failed");
                document.transition_to(DocumentStatus::Failed)?;
                document.error_message = Some(err.to_string());
                documents.update(&document).await?;
                Ok(DocumentOutcome { chunks_written: 0, failed: true })
            }
        }
    }

    async fn process_document_body(&self, document: &Document, fetched: &FetchedDocument) -> Result<i32> {
        let text_chunks = chunk_document(
            &document.normalized_text,
            self.config.chunking_strategy,
            self.config.chunk_size,
            self.config.chunk_overlap,
        );
        if text_chunks.is_empty() {
            return Ok(0);
        }

        let code_snippets = if fetched.content_type.contains("markdown") {
            extract_from_markdown(&document.normalized_text)
        } else {
            extract_from_html(&document.normalized_text)
        };

        let mut chunks = Vec::with_capacity(text_chunks.len());
        for text_chunk in &text_chunks {
            let overlap = code_snippets.iter().find(|s| snippet_overlaps(s, text_chunk.start_char, text_chunk.end_char));
            chunks.push(docvector_common::types::Chunk {
                id: Uuid::new_v4(),
                document_id: document.id,
                index: text_chunk.index,
                content: text_chunk.content.clone(),
                content_length: text_chunk.content.len() as i32,
                start_char: text_chunk.start_char,
                end_char: text_chunk.end_char,
                is_code_snippet: overlap.is_some(),
                code_language: overlap.and_then(|s| s.language.clone()),
                topics: Default::default(),
                enrichment: None,
                relevance_score: 0.0,
                code_quality_score: overlap.map(|s| s.code_quality_score).unwrap_or(0.0),
                formatting_score: overlap.map(|s| s.formatting_score).unwrap_or(0.0),
                metadata_score: overlap.map(|s| s.metadata_score).unwrap_or(0.0),
                initialization_score: overlap.map(|s| s.initialization_score).unwrap_or(0.0),
                prev_chunk_id: None,
                next_chunk_id: None,
                embedding_id: None,
                embedding_model: None,
                embedded_at: None,
                metadata: document.metadata.clone(),
                created_at: Utc::now(),
                updated_at: Utc::now(),
            });
        }

        let chunk_repo = ChunkRepository::new(&self.pool);
        let stored = chunk_repo.replace_for_document(document.id, &chunks).await?;

        for batch in stored.chunks(self.config.embedding_batch_size.max(1)) {
            self.embed_and_upsert_batch(document, batch).await?;
        }

        Ok(stored.len() as i32)
    }

    async fn embed_and_upsert_batch(
        &self,
        document: &Document,
        batch: &[docvector_common::types::Chunk],
    ) -> Result<()> {
        let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
        let vectors = self.embedder.embed(&texts).await?;

        let ids: Vec<Uuid> = batch.iter().map(|c| c.id).collect();
        let payloads: Vec<Payload> = batch
            .iter()
            .map(|chunk| {
                let mut payload = Payload::new();
                payload.insert("chunk_id".into(), serde_json::json!(chunk.id.to_string()));
                payload.insert("document_id".into(), serde_json::json!(document.id.to_string()));
                payload.insert("content".into(), serde_json::json!(chunk.content));
                if let Some(title) = &document.title {
                    payload.insert("title".into(), serde_json::json!(title));
                }
                if let Some(url) = &document.url {
                    payload.insert("url".into(), serde_json::json!(url));
                }
                if let Some(language) = &document.language {
                    payload.insert("language".into(), serde_json::json!(language));
                }
                payload
            })
            .collect();

        // Vector upsert precedes the relational write that records the
        // embedding id (spec §5): a crash between the two leaves an orphan
        // vector, never a chunk pointing at a missing one.
        self.vector_index
            .upsert(&self.config.collection_name, &ids, &vectors, &payloads)
            .await?;

        let chunk_repo = ChunkRepository::new(&self.pool);
        for chunk in batch {
            chunk_repo
                .record_embedding(chunk.id, &chunk.id.to_string(), self.embedder.model_name())
                .await?;
        }
        Ok(())
    }
}

fn snippet_overlaps(snippet: &CodeSnippet, start: i32, end: i32) -> bool {
    match (snippet.start_char, snippet.end_char) {
        (Some(s), Some(e)) => (s as i32) < end && (e as i32) > start,
        _ => false,
    }
}
