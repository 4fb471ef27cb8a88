//! Reconciliation sweep (spec §7): deletes vector-index points whose
//! `document_id` the relational store no longer knows about, and re-queues
//! `Document`s stuck in `processing` past a stale threshold. Callable on an
//! interval by the CLI or any cron-style caller — not a standing scheduler,
//! since background task infra is out of scope (spec §9's "background
//! tasks -> persisted job row" redesign flag covers the job-tracking side;
//! this sweep is the cleanup complement).

use chrono::{DateTime, Utc};
use docvector_common::error::Result;
use docvector_common::types::DocumentStatus;
use docvector_storage::vector::{FilterSpec, VectorIndex};
use docvector_storage::DocumentRepository;
use sqlx::PgPool;
use tracing::{info, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub orphan_vectors_deleted: u64,
    pub documents_requeued: u64,
}

/// Diffs the vector index's known `document_id`s against the relational
/// store's live documents and deletes the difference — vectors left by a
/// crash between the vector upsert and the relational write that records
/// the embedding id (spec §5).
pub async fn reconcile_orphan_vectors(
    pool: &PgPool,
    vector_index: &VectorIndex,
    collection_name: &str,
) -> Result<ReconcileReport> {
    let documents = DocumentRepository::new(pool);
    let known_ids = documents.list_all_ids().await?;
    let indexed_ids = vector_index.distinct_document_ids(collection_name).await?;

    let orphans: Vec<_> = indexed_ids.difference(&known_ids).copied().collect();

    let mut deleted = 0u64;
    for orphan in &orphans {
        let filter = FilterSpec::new().eq("document_id", orphan.to_string());
        match vector_index.delete_by_filter(collection_name, filter).await {
            Ok(()) => deleted += 1,
            Err(err) => warn!(document_id = %orphan, error = %err, "failed to delete orphan vectors"),
        }
    }

    if deleted > 0 {
        info!(deleted, "reconciliation: removed orphan vector-index entries");
    }

    Ok(ReconcileReport { orphan_vectors_deleted: deleted, documents_requeued: 0 })
}

/// Re-enqueues `Document`s stuck in `processing` past `threshold` (e.g. a
/// worker crashed mid-document) by latching them through `failed` and back
/// to `processing`, the only transition the state machine allows out of a
/// terminal-looking stall (spec §4.12).
pub async fn requeue_stale_processing_documents(
    pool: &PgPool,
    threshold: DateTime<Utc>,
) -> Result<ReconcileReport> {
    let documents = DocumentRepository::new(pool);
    let stale = documents.list_stale_processing(threshold).await?;

    let mut requeued = 0u64;
    for mut document in stale {
        if document.status != DocumentStatus::Processing {
            continue;
        }
        document.transition_to(DocumentStatus::Failed)?;
        document.error_message = Some("stale in processing past reconciliation threshold".to_string());
        documents.update(&document).await?;

        document.transition_to(DocumentStatus::Processing)?;
        document.error_message = None;
        documents.update(&document).await?;
        requeued += 1;
    }

    if requeued > 0 {
        info!(requeued, %threshold, "reconciliation: requeued stale processing documents");
    }

    Ok(ReconcileReport { orphan_vectors_deleted: 0, documents_requeued: requeued })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_merges_additively() {
        let a = ReconcileReport { orphan_vectors_deleted: 2, documents_requeued: 0 };
        let b = ReconcileReport { orphan_vectors_deleted: 0, documents_requeued: 3 };
        assert_eq!(a.orphan_vectors_deleted + b.orphan_vectors_deleted, 2);
        assert_eq!(a.documents_requeued + b.documents_requeued, 3);
    }
}
