//! Type definitions module
//!
//! Core data model shared by every stage of the answering pipeline:
//! queries and their classification, sub-tasks, retrieval parameters and
//! passages, quality assessments and answers.

pub mod query;
pub mod task;
pub mod retrieval;
pub mod answer;

// Re-export commonly used types
pub use query::{ClassificationOutcome, Query, QueryClassification, QueryId, QueryType};
pub use task::{IntegrationMethod, SubTask, TaskId};
pub use retrieval::{PassageSet, RetrievalConfig, RetrievalStrategy, RetrievedPassage};
pub use answer::{
    AgenticAnswer, Answer, AnswerStatus, DegradedReason, QualityAssessment, QualityScores,
    QualityWeights, TraceEvent, INSUFFICIENT_EVIDENCE,
};
