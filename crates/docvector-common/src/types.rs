//! Domain types shared by every crate in the workspace.
//!
//! These mirror the relational schema in spec §3/§6 one-to-one; the
//! storage crate maps rows onto them, the ingestion/search crates pass them
//! around, and nothing here depends on a specific database driver.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use strum::{Display, EnumString};
use uuid::Uuid;

use crate::error::{DocVectorError, Result};

pub type Metadata = BTreeMap<String, JsonValue>;

/// Optional grouping of sources (e.g. "vercel/next.js").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Library {
    pub id: Uuid,
    pub external_id: String,
    pub name: String,
    pub aliases: HashSet<String>,
    pub homepage: Option<String>,
    pub repo_url: Option<String>,
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Web,
    Git,
    File,
    Api,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SourceStatus {
    Active,
    Paused,
    Error,
}

/// A fetchable origin.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Source {
    pub id: Uuid,
    pub name: String,
    pub kind: SourceKind,
    pub library_id: Option<Uuid>,
    pub version: Option<String>,
    pub config: Metadata,
    pub status: SourceStatus,
    pub sync_frequency: Option<String>,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Source {
    /// Only the user is allowed to move a source back to `Active` from
    /// `Error` (spec §4.12); ingestion may only latch it *into* `Error`.
    pub fn reactivate(&mut self) {
        self.status = SourceStatus::Active;
        self.last_error = None;
    }

    pub fn mark_error(&mut self, message: impl Into<String>) {
        self.status = SourceStatus::Error;
        self.last_error = Some(message.into());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ChunkingStrategy {
    Fixed,
    Semantic,
}

/// One fetched artifact from a source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    pub id: Uuid,
    pub source_id: Uuid,
    pub url: Option<String>,
    pub path: Option<String>,
    pub content_hash: String,
    pub title: Option<String>,
    pub normalized_text: String,
    pub content_length: i64,
    pub language: Option<String>,
    pub format: Option<String>,
    pub status: DocumentStatus,
    pub chunk_count: i32,
    pub chunking_strategy: Option<ChunkingStrategy>,
    pub fetched_at: Option<DateTime<Utc>>,
    pub processed_at: Option<DateTime<Utc>>,
    pub published_at: Option<DateTime<Utc>>,
    pub modified_at: Option<DateTime<Utc>>,
    pub author: Option<String>,
    pub error_message: Option<String>,
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    /// Enforces the `pending -> processing -> {completed, failed}` machine
    /// from spec §4.12. `failed` may be retried by transitioning back to
    /// `processing`.
    pub fn transition_to(&mut self, next: DocumentStatus) -> Result<()> {
        use DocumentStatus::*;
        // `Completed -> Processing` covers re-sync of a previously ingested
        // document whose content changed (spec §4.9 step 2's upsert path).
        let allowed = matches!(
            (self.status, next),
            (Pending, Processing)
                | (Processing, Completed)
                | (Processing, Failed)
                | (Failed, Processing)
                | (Completed, Processing)
        );
        if !allowed {
            return Err(DocVectorError::Validation(format!(
                "illegal document transition {:?} -> {:?}",
                self.status, next
            )));
        }
        self.status = next;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    FullSync,
    Incremental,
    Manual,
    CrawlUrl,
    Reindex,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn is_finished(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}

/// A segment of one document — the atomic unit of embedding and retrieval.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    pub id: Uuid,
    pub document_id: Uuid,
    pub index: i32,
    pub content: String,
    pub content_length: i32,
    pub start_char: i32,
    pub end_char: i32,
    pub is_code_snippet: bool,
    pub code_language: Option<String>,
    pub topics: HashSet<String>,
    pub enrichment: Option<String>,
    pub relevance_score: f32,
    pub code_quality_score: f32,
    pub formatting_score: f32,
    pub metadata_score: f32,
    pub initialization_score: f32,
    pub prev_chunk_id: Option<Uuid>,
    pub next_chunk_id: Option<Uuid>,
    pub embedding_id: Option<String>,
    pub embedding_model: Option<String>,
    pub embedded_at: Option<DateTime<Utc>>,
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Chunk {
    /// `end_char >= start_char >= 0` (spec §8).
    pub fn has_valid_span(&self) -> bool {
        self.start_char >= 0 && self.end_char >= self.start_char
    }

    /// Presence of an embedding id implies `embedded_at` is set (spec §8).
    pub fn embedding_invariant_holds(&self) -> bool {
        self.embedding_id.is_none() || self.embedded_at.is_some()
    }

    pub fn record_embedding(&mut self, embedding_id: impl Into<String>, model: impl Into<String>) {
        self.embedding_id = Some(embedding_id.into());
        self.embedding_model = Some(model.into());
        self.embedded_at = Some(Utc::now());
    }
}

/// Asynchronous task tracking for one source's ingestion run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IngestionJob {
    pub id: Uuid,
    pub source_id: Option<Uuid>,
    pub job_type: JobType,
    pub status: JobStatus,
    pub total_documents: i32,
    pub processed_documents: i32,
    pub failed_documents: i32,
    pub total_chunks: i32,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub error_details: Metadata,
    pub config: Metadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl IngestionJob {
    pub fn transition_to(&mut self, next: JobStatus) -> Result<()> {
        use JobStatus::*;
        let allowed = matches!(
            (self.status, next),
            (Pending, Running) | (Running, Completed) | (Running, Failed) | (Running, Cancelled)
        );
        if !allowed {
            return Err(DocVectorError::Validation(format!(
                "illegal job transition {:?} -> {:?}",
                self.status, next
            )));
        }
        self.status = next;
        if next.is_finished() {
            self.completed_at = Some(Utc::now());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blank_document() -> Document {
        Document {
            id: Uuid::new_v4(),
            source_id: Uuid::new_v4(),
            url: Some("https://example.com".into()),
            path: None,
            content_hash: "deadbeef".into(),
            title: None,
            normalized_text: String::new(),
            content_length: 0,
            language: None,
            format: None,
            status: DocumentStatus::Pending,
            chunk_count: 0,
            chunking_strategy: None,
            fetched_at: None,
            processed_at: None,
            published_at: None,
            modified_at: None,
            author: None,
            error_message: None,
            metadata: Metadata::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn document_follows_allowed_transitions() {
        let mut doc = blank_document();
        doc.transition_to(DocumentStatus::Processing).unwrap();
        doc.transition_to(DocumentStatus::Completed).unwrap();
        assert_eq!(doc.status, DocumentStatus::Completed);
    }

    #[test]
    fn document_rejects_skipping_processing() {
        let mut doc = blank_document();
        assert!(doc.transition_to(DocumentStatus::Completed).is_err());
    }

    #[test]
    fn failed_document_can_be_retried() {
        let mut doc = blank_document();
        doc.transition_to(DocumentStatus::Processing).unwrap();
        doc.transition_to(DocumentStatus::Failed).unwrap();
        doc.transition_to(DocumentStatus::Processing).unwrap();
        assert_eq!(doc.status, DocumentStatus::Processing);
    }

    #[test]
    fn job_is_finished_only_in_terminal_states() {
        assert!(!JobStatus::Running.is_finished());
        assert!(JobStatus::Completed.is_finished());
        assert!(JobStatus::Failed.is_finished());
        assert!(JobStatus::Cancelled.is_finished());
    }

    #[test]
    fn chunk_embedding_invariant() {
        let mut chunk = Chunk {
            id: Uuid::new_v4(),
            document_id: Uuid::new_v4(),
            index: 0,
            content: "hi".into(),
            content_length: 2,
            start_char: 0,
            end_char: 2,
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
            metadata: Metadata::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(chunk.embedding_invariant_holds());
        chunk.record_embedding("point-1", "local-minilm");
        assert!(chunk.embedding_invariant_holds());
        assert!(chunk.embedded_at.is_some());
    }

    #[test]
    fn chunk_span_must_be_non_negative_and_ordered() {
        let mut chunk_span = (0i32, 10i32);
        assert!(chunk_span.1 >= chunk_span.0);
        chunk_span.1 = -1;
        assert!(chunk_span.1 < chunk_span.0);
    }
}
