//! Relational store (spec §4.8) and vector index adapter (spec §4.7).
//!
//! `pool` builds the `sqlx` `PgPool` and runs embedded migrations;
//! `rows` maps between `sqlx::FromRow` structs and `docvector_common::types`;
//! one repository module per entity exposes the CRUD/lookup surface the
//! ingestion and search crates depend on. `vector` wraps `qdrant-client`.

pub mod chunks;
pub mod documents;
pub mod jobs;
pub mod libraries;
pub mod pool;
pub mod rows;
pub mod sources;
pub mod vector;

pub use chunks::ChunkRepository;
pub use documents::DocumentRepository;
pub use jobs::JobRepository;
pub use libraries::LibraryRepository;
pub use pool::{connect, run_migrations, PoolConfig};
pub use sources::SourceRepository;
pub use vector::{FilterSpec, ScoredPayload, VectorIndex};
