//! `libraries` repository — the optional grouping spec §3 describes
//! (migration 002's augmented schema, resolved authoritative per spec §9).

use docvector_common::error::{DocVectorError, Result};
use docvector_common::types::Library;
use sqlx::PgPool;
use uuid::Uuid;

use crate::rows::{metadata_to_json, LibraryRow};

pub struct LibraryRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> LibraryRepository<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, library: &Library) -> Result<Library> {
        let aliases: Vec<String> = library.aliases.iter().cloned().collect();
        let row = sqlx::query_as::<_, LibraryRow>(
            r#"
            INSERT INTO libraries
                (id, library_id, name, homepage_url, repository_url, aliases, metadata, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id, library_id, name, homepage_url, repository_url, aliases, metadata, created_at, updated_at
            "#,
        )
        .bind(library.id)
        .bind(&library.external_id)
        .bind(&library.name)
        .bind(&library.homepage)
        .bind(&library.repo_url)
        .bind(&aliases)
        .bind(metadata_to_json(&library.metadata))
        .bind(library.created_at)
        .bind(library.updated_at)
        .fetch_one(self.pool)
        .await
        .map_err(|e| DocVectorError::Database(e.to_string()))?;

        Ok(row.into())
    }

    pub async fn get(&self, id: Uuid) -> Result<Library> {
        let row = sqlx::query_as::<_, LibraryRow>("SELECT * FROM libraries WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool)
            .await
            .map_err(|e| DocVectorError::Database(e.to_string()))?
            .ok_or_else(|| DocVectorError::NotFound(format!("library {id}")))?;
        Ok(row.into())
    }

    pub async fn get_by_external_id(&self, external_id: &str) -> Result<Option<Library>> {
        let row = sqlx::query_as::<_, LibraryRow>("SELECT * FROM libraries WHERE library_id = $1")
            .bind(external_id)
            .fetch_optional(self.pool)
            .await
            .map_err(|e| DocVectorError::Database(e.to_string()))?;
        Ok(row.map(Into::into))
    }

    pub async fn list(&self) -> Result<Vec<Library>> {
        let rows = sqlx::query_as::<_, LibraryRow>("SELECT * FROM libraries ORDER BY name")
            .fetch_all(self.pool)
            .await
            .map_err(|e| DocVectorError::Database(e.to_string()))?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn delete(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM libraries WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await
            .map_err(|e| DocVectorError::Database(e.to_string()))?;
        if result.rows_affected() == 0 {
            return Err(DocVectorError::NotFound(format!("library {id}")));
        }
        Ok(())
    }
}
