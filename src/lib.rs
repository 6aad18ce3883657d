use thiserror::Error;

pub type Result<T> = std::result::Result<T, AssistError>;

#[derive(Error, Debug)]
pub enum AssistError {
    #[error("Embedding model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("Cannot build an index from zero vectors")]
    EmptyIndex,

    #[error("Vector dimension mismatch at position {position}: expected {expected}, found {found}")]
    DimensionMismatch {
        expected: usize,
        found: usize,
        position: usize,
    },

    #[error("Vector index has not been built")]
    IndexNotBuilt,

    #[error("Retrieval engine is not ready: build_index must be called before search")]
    EngineNotReady,

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Knowledge base error: {0}")]
    KnowledgeBase(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl From<config::ConfigError> for AssistError {
    #[inline]
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

pub mod assistant;
pub mod commands;
pub mod config;
pub mod embeddings;
pub mod fallback;
pub mod index;
pub mod knowledge_base;
pub mod retrieval;
