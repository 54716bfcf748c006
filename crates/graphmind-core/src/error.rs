use thiserror::Error;

/// Closed error taxonomy for the reasoning engine.
#[derive(Error, Debug, Clone)]
pub enum GraphMindError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("graph adapter unavailable: {0}")]
    GraphUnavailable(String),

    #[error("embedding client unavailable: {0}")]
    EmbeddingUnavailable(String),

    #[error("LLM client unavailable: {0}")]
    LlmUnavailable(String),

    #[error("deadline exceeded: {0}")]
    Timeout(String),

    #[error("dependency failed: {0}")]
    DependencyFailed(String),

    #[error("no agent could handle task type(s): {0:?}")]
    NoAgent(Vec<String>),

    #[error("internal invariant violation: {0}")]
    Internal(String),
}

impl GraphMindError {
    /// The closed error-kind tag, used by callers that need to branch on
    /// kind without matching the full variant (mirrors the "kind" column in
    /// the error-handling design table).
    pub fn kind(&self) -> &'static str {
        match self {
            GraphMindError::InvalidInput(_) => "INVALID_INPUT",
            GraphMindError::GraphUnavailable(_) => "GRAPH_UNAVAILABLE",
            GraphMindError::EmbeddingUnavailable(_) => "EMBEDDING_UNAVAILABLE",
            GraphMindError::LlmUnavailable(_) => "LLM_UNAVAILABLE",
            GraphMindError::Timeout(_) => "TIMEOUT",
            GraphMindError::DependencyFailed(_) => "DEPENDENCY_FAILED",
            GraphMindError::NoAgent(_) => "NO_AGENT",
            GraphMindError::Internal(_) => "INTERNAL",
        }
    }
}

pub type Result<T> = std::result::Result<T, GraphMindError>;
