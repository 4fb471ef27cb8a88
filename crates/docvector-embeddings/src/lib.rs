//! Embedding generation with a two-tier cache in front of local or remote
//! providers.

pub mod cache;
pub mod cached_provider;
pub mod provider;

pub use cache::EmbeddingCache;
pub use cached_provider::CachedEmbedder;
pub use provider::{EmbeddingProvider, LocalEmbedder, RemoteEmbedder};
