use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("fusion weights must be non-negative and sum to 1.0 (got {sum:.4})")]
    InvalidWeights { sum: f64 },

    #[error("limit must be greater than zero")]
    InvalidLimit,

    #[error("missing {0} scope")]
    MissingScope(&'static str),

    #[error("unknown source type: {0}")]
    UnknownSourceType(String),

    #[error("embedding provider error: {0}")]
    EmbeddingProvider(String),

    #[error("full-text search unavailable: {0}")]
    FullTextUnavailable(String),

    #[error("rerank provider error: {0}")]
    RerankProvider(String),

    #[error("store error: {0}")]
    Store(String),

    #[error("{operation} timed out after {timeout_ms} ms")]
    Timeout { operation: &'static str, timeout_ms: u64 },

    #[error("search cancelled")]
    Cancelled,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Caller mistakes: surfaced immediately, never retried or degraded.
    pub fn is_input_error(&self) -> bool {
        matches!(self, Self::InvalidWeights { .. } | Self::InvalidLimit | Self::MissingScope(_))
    }

    pub fn store(err: impl std::fmt::Display) -> Self {
        Self::Store(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
