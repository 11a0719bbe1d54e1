//! agentic-rag - Agentic retrieval-augmented answering
//!
//! Answers a natural-language query by routing it to a retrieval
//! strategy, optionally decomposing it into dependent sub-tasks, running
//! multi-round retrieval with self-evaluation per task, and assembling
//! the task answers into one final answer with a reasoning trace.
//!
//! # Architecture
//!
//! - **planning**: classification, decomposition, task graph, retrieval plans
//! - **rag**: retrieval with retry, evidence assembly, answer synthesis
//! - **validation**: draft quality evaluation
//! - **agent**: state machines, scheduling and the orchestrator
//! - **llm** / **search**: provider traits and their adapters

pub mod errors;
pub mod types;
pub mod config;

pub mod llm;
pub mod search;

pub mod planning;
pub mod rag;
pub mod validation;
pub mod agent;

pub mod telemetry;
pub mod cli;

// Re-export commonly used types
pub use agent::AgenticOrchestrator;
pub use config::{AgenticConfig, EngineConfig, Settings};
pub use errors::{RagError, Result};
pub use llm::CompletionProvider;
pub use search::SearchProvider;
pub use types::{
    AgenticAnswer, Answer, AnswerStatus, DegradedReason, QualityAssessment, QueryClassification,
    QueryType, RetrievalConfig, TraceEvent,
};
