//! Queries and their classification

use crate::errors::{RagError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique query identifier
pub type QueryId = Uuid;

/// An incoming user query. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Query {
    id: QueryId,
    text: String,
    received_at: DateTime<Utc>,
}

impl Query {
    /// Create a new query, rejecting empty or whitespace-only text
    pub fn new(text: &str) -> Result<Self> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(RagError::InvalidInput(
                "query text must not be empty".to_string(),
            ));
        }

        Ok(Self {
            id: Uuid::new_v4(),
            text: trimmed.to_string(),
            received_at: Utc::now(),
        })
    }

    pub fn id(&self) -> QueryId {
        self.id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }
}

/// Cognitive shape of a question
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryType {
    /// Specific facts, figures, dates
    Factual,

    /// Definitions, principles, explanations
    Conceptual,

    /// Steps, workflows, how-to
    Procedural,

    /// Contrast between two or more things
    Comparative,

    /// Deep analysis and reasoning
    Analytical,

    /// Needs several chained retrievals
    MultiHop,

    /// Underspecified, needs clarification
    Ambiguous,
}

impl QueryType {
    /// Every classification type, in declaration order
    pub const ALL: [QueryType; 7] = [
        QueryType::Factual,
        QueryType::Conceptual,
        QueryType::Procedural,
        QueryType::Comparative,
        QueryType::Analytical,
        QueryType::MultiHop,
        QueryType::Ambiguous,
    ];

    /// Parse a model-produced label (case-insensitive, tolerant of separators)
    pub fn parse(label: &str) -> Option<QueryType> {
        let normalized: String = label
            .trim()
            .to_lowercase()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect();

        match normalized.as_str() {
            "factual" => Some(QueryType::Factual),
            "conceptual" => Some(QueryType::Conceptual),
            "procedural" => Some(QueryType::Procedural),
            "comparative" => Some(QueryType::Comparative),
            "analytical" => Some(QueryType::Analytical),
            "multihop" => Some(QueryType::MultiHop),
            "ambiguous" => Some(QueryType::Ambiguous),
            _ => None,
        }
    }

    /// Canonical snake_case label
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryType::Factual => "factual",
            QueryType::Conceptual => "conceptual",
            QueryType::Procedural => "procedural",
            QueryType::Comparative => "comparative",
            QueryType::Analytical => "analytical",
            QueryType::MultiHop => "multi_hop",
            QueryType::Ambiguous => "ambiguous",
        }
    }

    /// Types that may be split into sub-tasks
    pub fn is_decomposable(&self) -> bool {
        matches!(self, QueryType::MultiHop | QueryType::Analytical)
    }

    /// Types whose answers benefit from the higher reasoning temperature
    pub fn needs_reasoning(&self) -> bool {
        matches!(
            self,
            QueryType::Analytical | QueryType::Comparative | QueryType::MultiHop
        )
    }
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a classification was obtained
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum ClassificationOutcome {
    /// Model output parsed into a known type
    Parsed,

    /// Model output could not be parsed; forced to Ambiguous at 0.0
    Unparseable { reason: String },
}

/// Classification of one query (or sub-task)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryClassification {
    pub query_id: QueryId,
    pub query_type: QueryType,

    /// Confidence score [0.0, 1.0]
    pub confidence: f64,

    pub outcome: ClassificationOutcome,

    /// Follow-up question suggested by the model for ambiguous queries
    pub clarification_question: Option<String>,
}

impl QueryClassification {
    /// Successfully parsed classification; confidence is clamped to [0, 1]
    pub fn parsed(query_id: QueryId, query_type: QueryType, confidence: f64) -> Self {
        let confidence = if confidence.is_finite() {
            confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };

        Self {
            query_id,
            query_type,
            confidence,
            outcome: ClassificationOutcome::Parsed,
            clarification_question: None,
        }
    }

    /// Fallback for malformed model output
    pub fn unparseable(query_id: QueryId, reason: impl Into<String>) -> Self {
        Self {
            query_id,
            query_type: QueryType::Ambiguous,
            confidence: 0.0,
            outcome: ClassificationOutcome::Unparseable {
                reason: reason.into(),
            },
            clarification_question: None,
        }
    }

    pub fn with_clarification(mut self, question: Option<String>) -> Self {
        self.clarification_question = question.filter(|q| !q.trim().is_empty());
        self
    }

    pub fn is_parsed(&self) -> bool {
        self.outcome == ClassificationOutcome::Parsed
    }

    /// Low confidence routes the query to clarification instead of retrieval
    pub fn needs_clarification(&self, threshold: f64) -> bool {
        self.confidence < threshold
    }
}
