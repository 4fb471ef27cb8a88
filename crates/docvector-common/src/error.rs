use thiserror::Error;

/// Errors produced anywhere in the ingestion/retrieval pipeline.
///
/// Each variant maps to one of the error codes in the taxonomy; `code()`
/// exposes that mapping for callers that need to serialize an error
/// envelope (the HTTP boundary, out of scope here, is the main consumer).
#[derive(Error, Debug)]
pub enum DocVectorError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("embedding error: {0}")]
    Embedding(String),

    #[error("search error: {0}")]
    Search(String),

    #[error("ingestion error: {0}")]
    Ingestion(String),

    #[error("processing error: {0}")]
    Processing(String),

    #[error("rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    #[error("authentication required")]
    AuthenticationRequired,

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("fetch failed: {0}")]
    FetchFailed(String),

    #[error("source already exists: {0}")]
    SourceExists(String),

    #[error("source not found: {0}")]
    SourceNotFound(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DocVectorError {
    /// The taxonomy code from spec §7, stable across releases.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Embedding(_) => "EMBEDDING_ERROR",
            Self::Search(_) => "SEARCH_ERROR",
            Self::Ingestion(_) => "INGESTION_ERROR",
            Self::Processing(_) => "PROCESSING_ERROR",
            Self::RateLimitExceeded(_) => "RATE_LIMIT_EXCEEDED",
            Self::AuthenticationRequired => "AUTHENTICATION_REQUIRED",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::FetchFailed(_) => "FETCH_FAILED",
            Self::SourceExists(_) => "SOURCE_EXISTS",
            Self::SourceNotFound(_) => "SOURCE_NOT_FOUND",
            Self::Io(_) => "INTERNAL_ERROR",
            Self::Serialization(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<anyhow::Error> for DocVectorError {
    fn from(err: anyhow::Error) -> Self {
        DocVectorError::Processing(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DocVectorError>;
