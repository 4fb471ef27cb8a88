//! `documents` repository (spec §4.8). Exposes the (source, url) and
//! (source, content_hash) lookups the ingestion orchestrator's dedupe step
//! (spec §4.9) needs, plus the CRUD surface spec §3 names.

use docvector_common::error::{DocVectorError, Result};
use docvector_common::types::{Document, DocumentStatus};
use sqlx::PgPool;
use uuid::Uuid;

use crate::rows::{metadata_to_json, DocumentRow};

pub struct DocumentRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> DocumentRepository<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, document: &Document) -> Result<Document> {
        let row = sqlx::query_as::<_, DocumentRow>(
            r#"
            INSERT INTO documents
                (id, source_id, url, path, content_hash, title, content, content_length,
                 metadata, language, format, status, error_message, chunk_count,
                 chunking_strategy, fetched_at, processed_at, author, published_at,
                 modified_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20, $21, $22)
            RETURNING id, source_id, url, path, content_hash, title, content, content_length,
                      metadata, language, format, status, error_message, chunk_count,
                      chunking_strategy, fetched_at, processed_at, author, published_at,
                      modified_at, created_at, updated_at
            "#,
        )
        .bind(document.id)
        .bind(document.source_id)
        .bind(&document.url)
        .bind(&document.path)
        .bind(&document.content_hash)
        .bind(&document.title)
        .bind(&document.normalized_text)
        .bind(document.content_length as i32)
        .bind(metadata_to_json(&document.metadata))
        .bind(document.language.clone().unwrap_or_else(|| "en".to_string()))
        .bind(&document.format)
        .bind(document.status.to_string())
        .bind(&document.error_message)
        .bind(document.chunk_count)
        .bind(document.chunking_strategy.map(|s| s.to_string()))
        .bind(document.fetched_at)
        .bind(document.processed_at)
        .bind(&document.author)
        .bind(document.published_at)
        .bind(document.modified_at)
        .bind(document.created_at)
        .bind(document.updated_at)
        .fetch_one(self.pool)
        .await
        .map_err(|e| DocVectorError::Database(e.to_string()))?;

        row.try_into()
    }

    pub async fn get(&self, id: Uuid) -> Result<Document> {
        let row = sqlx::query_as::<_, DocumentRow>("SELECT * FROM documents WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool)
            .await
            .map_err(|e| DocVectorError::Database(e.to_string()))?
            .ok_or_else(|| DocVectorError::NotFound(format!("document {id}")))?;
        row.try_into()
    }

    /// Used by the crawler-facing side of ingestion to detect an
    /// already-known URL for this source.
    pub async fn get_by_source_and_url(&self, source_id: Uuid, url: &str) -> Result<Option<Document>> {
        let row = sqlx::query_as::<_, DocumentRow>(
            "SELECT * FROM documents WHERE source_id = $1 AND url = $2",
        )
        .bind(source_id)
        .bind(url)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| DocVectorError::Database(e.to_string()))?;
        row.map(TryInto::try_into).transpose()
    }

    /// Used by the ingestion orchestrator's dedupe step (spec §4.9): a
    /// matching `(source_id, content_hash)` means this exact content has
    /// already been ingested for this source.
    pub async fn get_by_source_and_hash(
        &self,
        source_id: Uuid,
        content_hash: &str,
    ) -> Result<Option<Document>> {
        let row = sqlx::query_as::<_, DocumentRow>(
            "SELECT * FROM documents WHERE source_id = $1 AND content_hash = $2",
        )
        .bind(source_id)
        .bind(content_hash)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| DocVectorError::Database(e.to_string()))?;
        row.map(TryInto::try_into).transpose()
    }

    pub async fn list_by_source(&self, source_id: Uuid, status: Option<DocumentStatus>) -> Result<Vec<Document>> {
        let rows = match status {
            Some(status) => {
                sqlx::query_as::<_, DocumentRow>(
                    "SELECT * FROM documents WHERE source_id = $1 AND status = $2 ORDER BY created_at DESC",
                )
                .bind(source_id)
                .bind(status.to_string())
                .fetch_all(self.pool)
                .await
            }
            None => {
                sqlx::query_as::<_, DocumentRow>(
                    "SELECT * FROM documents WHERE source_id = $1 ORDER BY created_at DESC",
                )
                .bind(source_id)
                .fetch_all(self.pool)
                .await
            }
        }
        .map_err(|e| DocVectorError::Database(e.to_string()))?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Documents stuck `processing` past `threshold` — input to the
    /// reconciliation sweep (spec §7).
    pub async fn list_stale_processing(&self, threshold: chrono::DateTime<chrono::Utc>) -> Result<Vec<Document>> {
        let rows = sqlx::query_as::<_, DocumentRow>(
            "SELECT * FROM documents WHERE status = 'processing' AND updated_at < $1",
        )
        .bind(threshold)
        .fetch_all(self.pool)
        .await
        .map_err(|e| DocVectorError::Database(e.to_string()))?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    pub async fn update(&self, document: &Document) -> Result<Document> {
        let row = sqlx::query_as::<_, DocumentRow>(
            r#"
            UPDATE documents SET
                title = $2, content = $3, content_length = $4, metadata = $5,
                language = $6, format = $7, status = $8, error_message = $9,
                chunk_count = $10, chunking_strategy = $11, fetched_at = $12,
                processed_at = $13, author = $14, published_at = $15, modified_at = $16,
                content_hash = $17, updated_at = now()
            WHERE id = $1
            RETURNING id, source_id, url, path, content_hash, title, content, content_length,
                      metadata, language, format, status, error_message, chunk_count,
                      chunking_strategy, fetched_at, processed_at, author, published_at,
                      modified_at, created_at, updated_at
            "#,
        )
        .bind(document.id)
        .bind(&document.title)
        .bind(&document.normalized_text)
        .bind(document.content_length as i32)
        .bind(metadata_to_json(&document.metadata))
        .bind(document.language.clone().unwrap_or_else(|| "en".to_string()))
        .bind(&document.format)
        .bind(document.status.to_string())
        .bind(&document.error_message)
        .bind(document.chunk_count)
        .bind(document.chunking_strategy.map(|s| s.to_string()))
        .bind(document.fetched_at)
        .bind(document.processed_at)
        .bind(&document.author)
        .bind(document.published_at)
        .bind(document.modified_at)
        .bind(&document.content_hash)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| DocVectorError::Database(e.to_string()))?
        .ok_or_else(|| DocVectorError::NotFound(format!("document {}", document.id)))?;

        row.try_into()
    }

    pub async fn delete(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM documents WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await
            .map_err(|e| DocVectorError::Database(e.to_string()))?;
        if result.rows_affected() == 0 {
            return Err(DocVectorError::NotFound(format!("document {id}")));
        }
        Ok(())
    }

    /// Every document id known to the relational store — the reconciliation
    /// sweep's reference set for detecting orphan vectors (spec §7).
    pub async fn list_all_ids(&self) -> Result<std::collections::HashSet<Uuid>> {
        let ids: Vec<Uuid> = sqlx::query_scalar("SELECT id FROM documents")
            .fetch_all(self.pool)
            .await
            .map_err(|e| DocVectorError::Database(e.to_string()))?;
        Ok(ids.into_iter().collect())
    }

    /// Live chunk count for the `chunk_count(D) = |{C : C.document = D}|`
    /// invariant (spec §8).
    pub async fn count_live_chunks(&self, document_id: Uuid) -> Result<i64> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM chunks WHERE document_id = $1")
            .bind(document_id)
            .fetch_one(self.pool)
            .await
            .map_err(|e| DocVectorError::Database(e.to_string()))
    }
}
