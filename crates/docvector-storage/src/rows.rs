//! `sqlx::FromRow` row structs and their conversions to/from
//! `docvector_common::types`. Kept separate from the domain types so a
//! column rename or type quirk (e.g. Postgres `TEXT[]` decoding as
//! `Vec<String>` where the domain model prefers a `HashSet`) stays local to
//! this crate.

use std::collections::HashSet;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use docvector_common::error::{DocVectorError, Result};
use docvector_common::types::{
    Chunk, ChunkingStrategy, Document, DocumentStatus, IngestionJob, JobStatus, JobType, Library,
    Metadata, Source, SourceKind, SourceStatus,
};
use serde_json::Value as JsonValue;
use sqlx::FromRow;
use uuid::Uuid;

fn metadata_from_json(value: JsonValue) -> Metadata {
    match value {
        JsonValue::Object(map) => map.into_iter().collect(),
        _ => Metadata::new(),
    }
}

pub(crate) fn metadata_to_json(metadata: &Metadata) -> JsonValue {
    JsonValue::Object(metadata.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
}

fn parse_enum<T: FromStr>(raw: &str, what: &str) -> Result<T> {
    raw.parse::<T>()
        .map_err(|_| DocVectorError::Database(format!("invalid {what}: {raw}")))
}

#[derive(Debug, FromRow)]
pub struct LibraryRow {
    pub id: Uuid,
    pub library_id: String,
    pub name: String,
    pub homepage_url: Option<String>,
    pub repository_url: Option<String>,
    pub aliases: Vec<String>,
    pub metadata: JsonValue,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<LibraryRow> for Library {
    fn from(row: LibraryRow) -> Self {
        Library {
            id: row.id,
            external_id: row.library_id,
            name: row.name,
            aliases: row.aliases.into_iter().collect(),
            homepage: row.homepage_url,
            repo_url: row.repository_url,
            metadata: metadata_from_json(row.metadata),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
pub struct SourceRow {
    pub id: Uuid,
    pub name: String,
    #[sqlx(rename = "type")]
    pub kind: String,
    pub library_id: Option<Uuid>,
    pub version: Option<String>,
    pub config: JsonValue,
    pub status: String,
    pub sync_frequency: Option<String>,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<SourceRow> for Source {
    type Error = DocVectorError;

    fn try_from(row: SourceRow) -> Result<Self> {
        Ok(Source {
            id: row.id,
            name: row.name,
            kind: parse_enum::<SourceKind>(&row.kind, "source kind")?,
            library_id: row.library_id,
            version: row.version,
            config: metadata_from_json(row.config),
            status: parse_enum::<SourceStatus>(&row.status, "source status")?,
            sync_frequency: row.sync_frequency,
            last_synced_at: row.last_synced_at,
            last_error: row.error_message,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
pub struct DocumentRow {
    pub id: Uuid,
    pub source_id: Uuid,
    pub url: Option<String>,
    pub path: Option<String>,
    pub content_hash: String,
    pub title: Option<String>,
    pub content: Option<String>,
    pub content_length: Option<i32>,
    pub metadata: JsonValue,
    pub language: String,
    pub format: Option<String>,
    pub status: String,
    pub error_message: Option<String>,
    pub chunk_count: i32,
    pub chunking_strategy: Option<String>,
    pub fetched_at: Option<DateTime<Utc>>,
    pub processed_at: Option<DateTime<Utc>>,
    pub author: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub modified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<DocumentRow> for Document {
    type Error = DocVectorError;

    fn try_from(row: DocumentRow) -> Result<Self> {
        let chunking_strategy = row
            .chunking_strategy
            .map(|s| parse_enum::<ChunkingStrategy>(&s, "chunking strategy"))
            .transpose()?;

        Ok(Document {
            id: row.id,
            source_id: row.source_id,
            url: row.url,
            path: row.path,
            content_hash: row.content_hash,
            title: row.title,
            normalized_text: row.content.unwrap_or_default(),
            content_length: row.content_length.unwrap_or(0) as i64,
            language: Some(row.language),
            format: row.format,
            status: parse_enum::<DocumentStatus>(&row.status, "document status")?,
            chunk_count: row.chunk_count,
            chunking_strategy,
            fetched_at: row.fetched_at,
            processed_at: row.processed_at,
            published_at: row.published_at,
            modified_at: row.modified_at,
            author: row.author,
            error_message: row.error_message,
            metadata: metadata_from_json(row.metadata),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
pub struct ChunkRow {
    pub id: Uuid,
    pub document_id: Uuid,
    pub index: i32,
    pub content: String,
    pub content_length: i32,
    pub start_char: Option<i32>,
    pub end_char: Option<i32>,
    pub is_code_snippet: bool,
    pub code_language: Option<String>,
    pub topics: Vec<String>,
    pub enrichment: Option<String>,
    pub relevance_score: Option<f32>,
    pub code_quality_score: Option<f32>,
    pub formatting_score: Option<f32>,
    pub metadata_score: Option<f32>,
    pub initialization_score: Option<f32>,
    pub embedding_id: Option<String>,
    pub embedding_model: Option<String>,
    pub embedded_at: Option<DateTime<Utc>>,
    pub metadata: JsonValue,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ChunkRow> for Chunk {
    fn from(row: ChunkRow) -> Self {
        Chunk {
            id: row.id,
            document_id: row.document_id,
            index: row.index,
            content: row.content,
            content_length: row.content_length,
            start_char: row.start_char.unwrap_or(0),
            end_char: row.end_char.unwrap_or(0),
            is_code_snippet: row.is_code_snippet,
            code_language: row.code_language,
            topics: row.topics.into_iter().collect::<HashSet<_>>(),
            enrichment: row.enrichment,
            relevance_score: row.relevance_score.unwrap_or(0.0),
            code_quality_score: row.code_quality_score.unwrap_or(0.0),
            formatting_score: row.formatting_score.unwrap_or(0.0),
            metadata_score: row.metadata_score.unwrap_or(0.0),
            initialization_score: row.initialization_score.unwrap_or(0.0),
            // Graph kept implicit via (document_id, index) ordering (spec §9
            // redesign flag); populated by the repository when adjacency is
            // requested, not stored as columns.
            prev_chunk_id: None,
            next_chunk_id: None,
            embedding_id: row.embedding_id,
            embedding_model: row.embedding_model,
            embedded_at: row.embedded_at,
            metadata: metadata_from_json(row.metadata),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
pub struct JobRow {
    pub id: Uuid,
    pub source_id: Option<Uuid>,
    pub job_type: String,
    pub status: String,
    pub total_documents: i32,
    pub processed_documents: i32,
    pub failed_documents: i32,
    pub total_chunks: i32,
    pub error_message: Option<String>,
    pub error_details: JsonValue,
    pub config: JsonValue,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<JobRow> for IngestionJob {
    type Error = DocVectorError;

    fn try_from(row: JobRow) -> Result<Self> {
        Ok(IngestionJob {
            id: row.id,
            source_id: row.source_id,
            job_type: parse_enum::<JobType>(&row.job_type, "job type")?,
            status: parse_enum::<JobStatus>(&row.status, "job status")?,
            total_documents: row.total_documents,
            processed_documents: row.processed_documents,
            failed_documents: row.failed_documents,
            total_chunks: row.total_chunks,
            started_at: row.started_at,
            completed_at: row.completed_at,
            error_message: row.error_message,
            error_details: metadata_from_json(row.error_details),
            config: metadata_from_json(row.config),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
