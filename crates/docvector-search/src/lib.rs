//! Reranking, token-budget packing, and the query-time search orchestrator
//! (spec §4.10–§4.11).

pub mod orchestrator;
pub mod packer;
pub mod reranker;

pub use orchestrator::{SearchOrchestrator, SearchRequest, SearchResponse, SearchResult, SearchType};
pub use packer::{PackedResult, TokenLimiter};
pub use reranker::{rerank, RankedResult, RerankWeights, RERANKED_BLEND, VECTOR_BLEND};
