//! `chunks` repository (spec §4.8). Chunks are always written as a full
//! replacement set for a document (the chunker re-segments the whole
//! document on every (re)processing run), so the write path is
//! `replace_for_document` rather than a per-row `create`.

use docvector_common::error::{DocVectorError, Result};
use docvector_common::types::Chunk;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::rows::{metadata_to_json, ChunkRow};

pub struct ChunkRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ChunkRepository<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Deletes any chunks already on file for `document_id` and inserts
    /// `chunks` in one transaction, preserving the `(document_id, index)`
    /// density invariant from spec §8.
    pub async fn replace_for_document(&self, document_id: Uuid, chunks: &[Chunk]) -> Result<Vec<Chunk>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DocVectorError::Database(e.to_string()))?;

        sqlx::query("DELETE FROM chunks WHERE document_id = $1")
            .bind(document_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| DocVectorError::Database(e.to_string()))?;

        let mut inserted = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            inserted.push(Self::insert_one(&mut tx, chunk).await?);
        }

        tx.commit()
            .await
            .map_err(|e| DocVectorError::Database(e.to_string()))?;

        Ok(inserted)
    }

    async fn insert_one(tx: &mut Transaction<'_, Postgres>, chunk: &Chunk) -> Result<Chunk> {
        let topics: Vec<String> = chunk.topics.iter().cloned().collect();
        let row = sqlx::query_as::<_, ChunkRow>(
            r#"
            INSERT INTO chunks
                (id, document_id, index, content, content_length, start_char, end_char,
                 is_code_snippet, code_language, topics, enrichment,
                 relevance_score, code_quality_score, formatting_score,
                 metadata_score, initialization_score,
                 embedding_id, embedding_model, embedded_at, metadata, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20, $21, $22)
            RETURNING id, document_id, index, content, content_length, start_char, end_char,
                      is_code_snippet, code_language, topics, enrichment,
                      relevance_score, code_quality_score, formatting_score,
                      metadata_score, initialization_score,
                      embedding_id, embedding_model, embedded_at, metadata, created_at, updated_at
            "#,
        )
        .bind(chunk.id)
        .bind(chunk.document_id)
        .bind(chunk.index)
        .bind(&chunk.content)
        .bind(chunk.content_length)
        .bind(chunk.start_char)
        .bind(chunk.end_char)
        .bind(chunk.is_code_snippet)
        .bind(&chunk.code_language)
        .bind(&topics)
        .bind(&chunk.enrichment)
        .bind(chunk.relevance_score)
        .bind(chunk.code_quality_score)
        .bind(chunk.formatting_score)
        .bind(chunk.metadata_score)
        .bind(chunk.initialization_score)
        .bind(&chunk.embedding_id)
        .bind(&chunk.embedding_model)
        .bind(chunk.embedded_at)
        .bind(metadata_to_json(&chunk.metadata))
        .bind(chunk.created_at)
        .bind(chunk.updated_at)
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| DocVectorError::Database(e.to_string()))?;

        Ok(row.into())
    }

    pub async fn get(&self, id: Uuid) -> Result<Chunk> {
        let row = sqlx::query_as::<_, ChunkRow>("SELECT * FROM chunks WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool)
            .await
            .map_err(|e| DocVectorError::Database(e.to_string()))?
            .ok_or_else(|| DocVectorError::NotFound(format!("chunk {id}")))?;
        Ok(row.into())
    }

    /// All chunks of `document_id`, ordered by `index` — the order the
    /// chunker produced them in, and the order adjacency is defined over.
    pub async fn list_for_document(&self, document_id: Uuid) -> Result<Vec<Chunk>> {
        let rows = sqlx::query_as::<_, ChunkRow>(
            "SELECT * FROM chunks WHERE document_id = $1 ORDER BY index ASC",
        )
        .bind(document_id)
        .fetch_all(self.pool)
        .await
        .map_err(|e| DocVectorError::Database(e.to_string()))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn get_many(&self, ids: &[Uuid]) -> Result<Vec<Chunk>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query_as::<_, ChunkRow>("SELECT * FROM chunks WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(self.pool)
            .await
            .map_err(|e| DocVectorError::Database(e.to_string()))?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Resolves `prev_chunk_id`/`next_chunk_id` for `chunk` by looking up
    /// its neighbours in `(document_id, index)` order, rather than storing
    /// them as columns (spec §9 redesign note — avoids an update cascade
    /// every time a document's chunk set is rewritten).
    pub async fn with_adjacency(&self, chunk: Chunk) -> Result<Chunk> {
        let siblings = self.list_for_document(chunk.document_id).await?;
        let position = siblings.iter().position(|c| c.id == chunk.id);

        let mut chunk = chunk;
        if let Some(position) = position {
            chunk.prev_chunk_id = position.checked_sub(1).and_then(|i| siblings.get(i)).map(|c| c.id);
            chunk.next_chunk_id = siblings.get(position + 1).map(|c| c.id);
        }
        Ok(chunk)
    }

    pub async fn delete_for_document(&self, document_id: Uuid) -> Result<u64> {
        let result = sqlx::query("DELETE FROM chunks WHERE document_id = $1")
            .bind(document_id)
            .execute(self.pool)
            .await
            .map_err(|e| DocVectorError::Database(e.to_string()))?;
        Ok(result.rows_affected())
    }

    pub async fn count_for_document(&self, document_id: Uuid) -> Result<i64> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM chunks WHERE document_id = $1")
            .bind(document_id)
            .fetch_one(self.pool)
            .await
            .map_err(|e| DocVectorError::Database(e.to_string()))
    }

    /// Marks a chunk embedded, for use after the vector index upsert
    /// succeeds (spec §4.9 step 7, §8's embedding-presence invariant).
    pub async fn record_embedding(
        &self,
        id: Uuid,
        embedding_id: &str,
        embedding_model: &str,
    ) -> Result<Chunk> {
        let row = sqlx::query_as::<_, ChunkRow>(
            r#"
            UPDATE chunks SET
                embedding_id = $2, embedding_model = $3, embedded_at = now(), updated_at = now()
            WHERE id = $1
            RETURNING id, document_id, index, content, content_length, start_char, end_char,
                      is_code_snippet, code_language, topics, enrichment,
                      relevance_score, code_quality_score, formatting_score,
                      metadata_score, initialization_score,
                      embedding_id, embedding_model, embedded_at, metadata, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(embedding_id)
        .bind(embedding_model)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| DocVectorError::Database(e.to_string()))?
        .ok_or_else(|| DocVectorError::NotFound(format!("chunk {id}")))?;

        Ok(row.into())
    }
}
