//! `docvector source` subcommands: create/list the `Source` rows that
//! `ingest` operates against (spec §3, §4.8).

use std::collections::BTreeMap;

use chrono::Utc;
use docvector_common::error::Result;
use docvector_common::types::{Source, SourceKind, SourceStatus};
use docvector_storage::SourceRepository;
use uuid::Uuid;

use crate::context::AppContext;

pub async fn create(ctx: &AppContext, name: String, start_url: String) -> Result<()> {
    let repo = SourceRepository::new(&ctx.pool);
    let mut config = BTreeMap::new();
    config.insert("start_url".to_string(), serde_json::json!(start_url));

    let now = Utc::now();
    let source = Source {
        id: Uuid::new_v4(),
        name,
        kind: SourceKind::Web,
        library_id: None,
        version: None,
        config,
        status: SourceStatus::Active,
        sync_frequency: None,
        last_synced_at: None,
        last_error: None,
        created_at: now,
        updated_at: now,
    };
    let created = repo.create(&source).await?;
    println!("created source {} ({})", created.name, created.id);
    Ok(())
}

pub async fn list(ctx: &AppContext) -> Result<()> {
    let repo = SourceRepository::new(&ctx.pool);
    for source in repo.list(None).await? {
        println!(
            "{}  {:<30}  {:?}  last_synced={:?}",
            source.id, source.name, source.status, source.last_synced_at
        );
    }
    Ok(())
}
