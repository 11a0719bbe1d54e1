//! Error types for the agentic RAG engine
//!
//! Errors are split into two groups: caller-facing failures that abort a
//! whole `answer()` call (invalid input, cancellation) and per-task
//! failures that the orchestrator absorbs into a degraded answer.

use thiserror::Error;

/// Main error type for the agentic RAG engine
#[derive(Error, Debug)]
pub enum RagError {
    /// Malformed caller input, rejected before any external call
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Decomposer produced a dependency cycle
    #[error("Task decomposition contains a dependency cycle: {cycle}")]
    DecompositionCycle { cycle: String },

    /// Search capability unreachable after all retries
    #[error("Retrieval unavailable after {attempts} attempts: {last_error}")]
    RetrievalUnavailable { attempts: u32, last_error: String },

    /// Evaluator response could not be parsed into a rubric
    #[error("Evaluation parse error: {0}")]
    EvaluationParse(String),

    /// Caller-supplied cancellation
    #[error("Operation cancelled")]
    Cancelled,

    /// Completion capability errors
    #[error("Completion error: {0}")]
    Completion(String),

    /// Search capability errors
    #[error("Search error: {0}")]
    Search(String),

    /// Invalid state machine transition
    #[error("Invalid state transition from {from} via {event}")]
    InvalidTransition { from: String, event: String },

    /// HTTP client errors
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Timeout errors
    #[error("Operation timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// Generic errors with context
    #[error("{0}")]
    Generic(String),
}

impl RagError {
    /// Whether a failed external call is worth retrying
    pub fn is_retryable(&self) -> bool {
        match self {
            RagError::Timeout { .. } => true,
            RagError::Http(_) => true,
            RagError::Search(_) => true,
            RagError::Completion(_) => true,
            RagError::Generic(_) => true,

            RagError::InvalidInput(_) => false,
            RagError::Config(_) => false,
            RagError::Cancelled => false,
            RagError::Serialization(_) => false,
            _ => false,
        }
    }
}

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, RagError>;

impl From<anyhow::Error> for RagError {
    fn from(err: anyhow::Error) -> Self {
        RagError::Generic(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RagError::RetrievalUnavailable {
            attempts: 3,
            last_error: "connection refused".to_string(),
        };
        assert!(err.to_string().contains("3 attempts"));
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn test_cycle_error_display() {
        let err = RagError::DecompositionCycle {
            cycle: "T1 -> T2 -> T1".to_string(),
        };
        assert!(err.to_string().contains("T1 -> T2 -> T1"));
    }

    #[test]
    fn test_retryable_classification() {
        assert!(RagError::Timeout { duration_ms: 100 }.is_retryable());
        assert!(RagError::Search("503".to_string()).is_retryable());
        assert!(!RagError::InvalidInput("empty".to_string()).is_retryable());
        assert!(!RagError::Cancelled.is_retryable());
        assert!(!RagError::Config("bad".to_string()).is_retryable());
    }
}
