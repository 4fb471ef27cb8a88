//! Integration tests against a real Postgres instance. Gated behind
//! `TEST_DATABASE_URL` + `#[ignore]`, following the fixture's
//! `docker-compose.test.yml` convention.

use chrono::Utc;
use docvector_common::types::{Source, SourceKind, SourceStatus};
use docvector_storage::{connect, run_migrations, PoolConfig, SourceRepository};
use uuid::Uuid;

fn get_test_db_url() -> String {
    std::env::var("TEST_DATABASE_URL").expect("TEST_DATABASE_URL must be set")
}

async fn setup_pool() -> sqlx::PgPool {
    let pool = connect(&get_test_db_url(), &PoolConfig::default())
        .await
        .expect("failed to connect to test database");
    run_migrations(&pool).await.expect("failed to run migrations");
    pool
}

fn test_source(name: &str) -> Source {
    let now = Utc::now();
    Source {
        id: Uuid::new_v4(),
        name: name.to_string(),
        kind: SourceKind::Web,
        library_id: None,
        version: None,
        config: Default::default(),
        status: SourceStatus::Active,
        sync_frequency: None,
        last_synced_at: None,
        last_error: None,
        created_at: now,
        updated_at: now,
    }
}

#[tokio::test]
#[ignore]
async fn connecting_and_migrating_succeeds() {
    let pool = setup_pool().await;
    assert!(pool.acquire().await.is_ok());
}

#[tokio::test]
#[ignore]
async fn source_round_trips_through_create_get_update_delete() {
    let pool = setup_pool().await;
    let repo = SourceRepository::new(&pool);

    let source = test_source(&format!("test-source-{}", Uuid::new_v4()));
    let created = repo.create(&source).await.expect("create failed");
    assert_eq!(created.name, source.name);

    let fetched = repo.get(created.id).await.expect("get failed");
    assert_eq!(fetched.id, created.id);
    assert_eq!(fetched.status, SourceStatus::Active);

    let mut updated = fetched.clone();
    updated.mark_error("boom");
    let saved = repo.update(&updated).await.expect("update failed");
    assert_eq!(saved.status, SourceStatus::Error);
    assert_eq!(saved.last_error.as_deref(), Some("boom"));

    repo.delete(created.id).await.expect("delete failed");
    assert!(repo.get(created.id).await.is_err());
}

#[tokio::test]
#[ignore]
async fn creating_a_duplicate_source_name_is_rejected() {
    let pool = setup_pool().await;
    let repo = SourceRepository::new(&pool);

    let name = format!("dup-source-{}", Uuid::new_v4());
    let first = test_source(&name);
    repo.create(&first).await.expect("first create failed");

    let second = test_source(&name);
    let result = repo.create(&second).await;
    assert!(result.is_err());

    repo.delete(first.id).await.ok();
}
