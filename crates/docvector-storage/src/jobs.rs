//! `ingestion_jobs` repository (spec §4.8, §6). Tracks one row per
//! ingestion run; the orchestrator advances its counters as documents
//! finish processing and transitions its status at the run's boundaries.

use docvector_common::error::{DocVectorError, Result};
use docvector_common::types::IngestionJob;
use sqlx::PgPool;
use uuid::Uuid;

use crate::rows::{metadata_to_json, JobRow};

pub struct JobRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> JobRepository<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, job: &IngestionJob) -> Result<IngestionJob> {
        let row = sqlx::query_as::<_, JobRow>(
            r#"
            INSERT INTO ingestion_jobs
                (id, source_id, job_type, status, total_documents, processed_documents,
                 failed_documents, total_chunks, error_message, error_details, config,
                 started_at, completed_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            RETURNING id, source_id, job_type, status, total_documents, processed_documents,
                      failed_documents, total_chunks, error_message, error_details, config,
                      started_at, completed_at, created_at, updated_at
            "#,
        )
        .bind(job.id)
        .bind(job.source_id)
        .bind(job.job_type.to_string())
        .bind(job.status.to_string())
        .bind(job.total_documents)
        .bind(job.processed_documents)
        .bind(job.failed_documents)
        .bind(job.total_chunks)
        .bind(&job.error_message)
        .bind(metadata_to_json(&job.error_details))
        .bind(metadata_to_json(&job.config))
        .bind(job.started_at)
        .bind(job.completed_at)
        .bind(job.created_at)
        .bind(job.updated_at)
        .fetch_one(self.pool)
        .await
        .map_err(|e| DocVectorError::Database(e.to_string()))?;

        row.try_into()
    }

    pub async fn get(&self, id: Uuid) -> Result<IngestionJob> {
        let row = sqlx::query_as::<_, JobRow>("SELECT * FROM ingestion_jobs WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool)
            .await
            .map_err(|e| DocVectorError::Database(e.to_string()))?
            .ok_or_else(|| DocVectorError::NotFound(format!("ingestion job {id}")))?;
        row.try_into()
    }

    pub async fn list_by_source(&self, source_id: Uuid) -> Result<Vec<IngestionJob>> {
        let rows = sqlx::query_as::<_, JobRow>(
            "SELECT * FROM ingestion_jobs WHERE source_id = $1 ORDER BY created_at DESC",
        )
        .bind(source_id)
        .fetch_all(self.pool)
        .await
        .map_err(|e| DocVectorError::Database(e.to_string()))?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Jobs still `pending` or `running` — the admission-control view the
    /// orchestrator consults before starting a new run for a source (spec
    /// §4.9: at most one active job per source).
    pub async fn list_active(&self) -> Result<Vec<IngestionJob>> {
        let rows = sqlx::query_as::<_, JobRow>(
            "SELECT * FROM ingestion_jobs WHERE status IN ('pending', 'running') ORDER BY created_at ASC",
        )
        .fetch_all(self.pool)
        .await
        .map_err(|e| DocVectorError::Database(e.to_string()))?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    pub async fn list_stale_running(&self, threshold: chrono::DateTime<chrono::Utc>) -> Result<Vec<IngestionJob>> {
        let rows = sqlx::query_as::<_, JobRow>(
            "SELECT * FROM ingestion_jobs WHERE status = 'running' AND updated_at < $1",
        )
        .bind(threshold)
        .fetch_all(self.pool)
        .await
        .map_err(|e| DocVectorError::Database(e.to_string()))?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    pub async fn update(&self, job: &IngestionJob) -> Result<IngestionJob> {
        let row = sqlx::query_as::<_, JobRow>(
            r#"
            UPDATE ingestion_jobs SET
                status = $2, total_documents = $3, processed_documents = $4,
                failed_documents = $5, total_chunks = $6, error_message = $7,
                error_details = $8, started_at = $9, completed_at = $10, updated_at = now()
            WHERE id = $1
            RETURNING id, source_id, job_type, status, total_documents, processed_documents,
                      failed_documents, total_chunks, error_message, error_details, config,
                      started_at, completed_at, created_at, updated_at
            "#,
        )
        .bind(job.id)
        .bind(job.status.to_string())
        .bind(job.total_documents)
        .bind(job.processed_documents)
        .bind(job.failed_documents)
        .bind(job.total_chunks)
        .bind(&job.error_message)
        .bind(metadata_to_json(&job.error_details))
        .bind(job.started_at)
        .bind(job.completed_at)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| DocVectorError::Database(e.to_string()))?
        .ok_or_else(|| DocVectorError::NotFound(format!("ingestion job {}", job.id)))?;

        row.try_into()
    }

    /// Atomically bumps the per-document counters; avoids a read-modify-write
    /// race between concurrently finishing documents within the same job.
    pub async fn increment_counters(
        &self,
        id: Uuid,
        processed_delta: i32,
        failed_delta: i32,
        chunks_delta: i32,
    ) -> Result<IngestionJob> {
        let row = sqlx::query_as::<_, JobRow>(
            r#"
            UPDATE ingestion_jobs SET
                processed_documents = processed_documents + $2,
                failed_documents = failed_documents + $3,
                total_chunks = total_chunks + $4,
                updated_at = now()
            WHERE id = $1
            RETURNING id, source_id, job_type, status, total_documents, processed_documents,
                      failed_documents, total_chunks, error_message, error_details, config,
                      started_at, completed_at, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(processed_delta)
        .bind(failed_delta)
        .bind(chunks_delta)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| DocVectorError::Database(e.to_string()))?
        .ok_or_else(|| DocVectorError::NotFound(format!("ingestion job {id}")))?;

        row.try_into()
    }

    pub async fn delete(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM ingestion_jobs WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await
            .map_err(|e| DocVectorError::Database(e.to_string()))?;
        if result.rows_affected() == 0 {
            return Err(DocVectorError::NotFound(format!("ingestion job {id}")));
        }
        Ok(())
    }
}
