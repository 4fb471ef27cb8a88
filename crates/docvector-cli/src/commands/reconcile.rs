//! `docvector reconcile`: run the orphan-vector and stale-processing sweep
//! (spec §7) on demand.

use chrono::{Duration, Utc};
use docvector_common::error::Result;
use docvector_ingestion::{reconcile_orphan_vectors, requeue_stale_processing_documents};

use crate::context::AppContext;

pub async fn run(ctx: &AppContext, stale_after_mins: i64) -> Result<()> {
    let orphan_report = reconcile_orphan_vectors(&ctx.pool, &ctx.vector_index, "docvector_chunks").await?;
    println!("orphan vectors deleted: {}", orphan_report.orphan_vectors_deleted);

    let threshold = Utc::now() - Duration::minutes(stale_after_mins);
    let stale_report = requeue_stale_processing_documents(&ctx.pool, threshold).await?;
    println!("stale documents requeued: {}", stale_report.documents_requeued);

    Ok(())
}
