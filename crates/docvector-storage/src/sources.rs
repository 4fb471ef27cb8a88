//! `sources` repository (spec §4.8, §6), grounded in the fixture repos'
//! `query_as::<_, T>(...).bind(...).fetch_*()` pattern (e.g.
//! `fourthplaces-mntogether`'s `Post::find_by_id`).

use docvector_common::error::{DocVectorError, Result};
use docvector_common::types::{Source, SourceStatus};
use sqlx::PgPool;
use uuid::Uuid;

use crate::rows::{metadata_to_json, SourceRow};

pub struct SourceRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> SourceRepository<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, source: &Source) -> Result<Source> {
        if self.get_by_name(&source.name).await?.is_some() {
            return Err(DocVectorError::SourceExists(source.name.clone()));
        }

        let row = sqlx::query_as::<_, SourceRow>(
            r#"
            INSERT INTO sources
                (id, name, type, library_id, version, config, status,
                 sync_frequency, last_synced_at, error_message, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING id, name, type, library_id, version, config, status,
                      sync_frequency, last_synced_at, error_message, created_at, updated_at
            "#,
        )
        .bind(source.id)
        .bind(&source.name)
        .bind(source.kind.to_string())
        .bind(source.library_id)
        .bind(&source.version)
        .bind(metadata_to_json(&source.config))
        .bind(source.status.to_string())
        .bind(&source.sync_frequency)
        .bind(source.last_synced_at)
        .bind(&source.last_error)
        .bind(source.created_at)
        .bind(source.updated_at)
        .fetch_one(self.pool)
        .await
        .map_err(|e| DocVectorError::Database(e.to_string()))?;

        row.try_into()
    }

    pub async fn get(&self, id: Uuid) -> Result<Source> {
        let row = sqlx::query_as::<_, SourceRow>("SELECT * FROM sources WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool)
            .await
            .map_err(|e| DocVectorError::Database(e.to_string()))?
            .ok_or_else(|| DocVectorError::SourceNotFound(id.to_string()))?;
        row.try_into()
    }

    pub async fn get_by_name(&self, name: &str) -> Result<Option<Source>> {
        let row = sqlx::query_as::<_, SourceRow>("SELECT * FROM sources WHERE name = $1")
            .bind(name)
            .fetch_optional(self.pool)
            .await
            .map_err(|e| DocVectorError::Database(e.to_string()))?;
        row.map(TryInto::try_into).transpose()
    }

    pub async fn list(&self, status: Option<SourceStatus>) -> Result<Vec<Source>> {
        let rows = match status {
            Some(status) => {
                sqlx::query_as::<_, SourceRow>(
                    "SELECT * FROM sources WHERE status = $1 ORDER BY created_at DESC",
                )
                .bind(status.to_string())
                .fetch_all(self.pool)
                .await
            }
            None => {
                sqlx::query_as::<_, SourceRow>("SELECT * FROM sources ORDER BY created_at DESC")
                    .fetch_all(self.pool)
                    .await
            }
        }
        .map_err(|e| DocVectorError::Database(e.to_string()))?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Persist `source`'s mutable fields (status, config, last-synced/error).
    /// `kind` and `name` are treated as immutable once created.
    pub async fn update(&self, source: &Source) -> Result<Source> {
        let row = sqlx::query_as::<_, SourceRow>(
            r#"
            UPDATE sources SET
                config = $2, status = $3, sync_frequency = $4,
                last_synced_at = $5, error_message = $6, version = $7,
                library_id = $8, updated_at = now()
            WHERE id = $1
            RETURNING id, name, type, library_id, version, config, status,
                      sync_frequency, last_synced_at, error_message, created_at, updated_at
            "#,
        )
        .bind(source.id)
        .bind(metadata_to_json(&source.config))
        .bind(source.status.to_string())
        .bind(&source.sync_frequency)
        .bind(source.last_synced_at)
        .bind(&source.last_error)
        .bind(&source.version)
        .bind(source.library_id)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| DocVectorError::Database(e.to_string()))?
        .ok_or_else(|| DocVectorError::SourceNotFound(source.id.to_string()))?;

        row.try_into()
    }

    /// Cascades to documents and chunks via `ON DELETE CASCADE`; ingestion
    /// jobs referencing this source have `source_id` set to NULL instead of
    /// being deleted (spec §3).
    pub async fn delete(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM sources WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await
            .map_err(|e| DocVectorError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(DocVectorError::SourceNotFound(id.to_string()));
        }
        Ok(())
    }
}
