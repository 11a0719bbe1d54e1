//! Quality assessments, per-task answers and the final answer

use crate::types::query::{QueryId, QueryType};
use crate::types::retrieval::RetrievalStrategy;
use crate::types::task::{IntegrationMethod, TaskId};
use serde::{Deserialize, Serialize};

/// Marker text for answers produced without usable evidence
pub const INSUFFICIENT_EVIDENCE: &str = "[insufficient evidence]";

/// Per-dimension rubric scores, each in [0.0, 1.0]
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct QualityScores {
    pub relevance: f64,
    pub completeness: f64,
    pub accuracy: f64,
    pub clarity: f64,
}

impl QualityScores {
    pub fn zero() -> Self {
        Self::default()
    }

    /// Clamp every dimension into [0, 1]; non-finite values become 0
    pub fn clamped(self) -> Self {
        fn clamp(v: f64) -> f64 {
            if v.is_finite() {
                v.clamp(0.0, 1.0)
            } else {
                0.0
            }
        }

        Self {
            relevance: clamp(self.relevance),
            completeness: clamp(self.completeness),
            accuracy: clamp(self.accuracy),
            clarity: clamp(self.clarity),
        }
    }

    /// Weighted mean; all-zero weights fall back to equal weights
    pub fn weighted_mean(&self, weights: &QualityWeights) -> f64 {
        let total = weights.total();
        if total <= 0.0 {
            return self.weighted_mean(&QualityWeights::default());
        }

        (self.relevance * weights.relevance
            + self.completeness * weights.completeness
            + self.accuracy * weights.accuracy
            + self.clarity * weights.clarity)
            / total
    }

    /// Dimension-wise mean of several score sets
    pub fn mean<'a, I: IntoIterator<Item = &'a QualityScores>>(scores: I) -> Option<QualityScores> {
        let mut sum = QualityScores::zero();
        let mut count = 0usize;
        for s in scores {
            sum.relevance += s.relevance;
            sum.completeness += s.completeness;
            sum.accuracy += s.accuracy;
            sum.clarity += s.clarity;
            count += 1;
        }

        if count == 0 {
            return None;
        }

        let n = count as f64;
        Some(QualityScores {
            relevance: sum.relevance / n,
            completeness: sum.completeness / n,
            accuracy: sum.accuracy / n,
            clarity: sum.clarity / n,
        })
    }
}

/// Weights for the aggregate score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityWeights {
    pub relevance: f64,
    pub completeness: f64,
    pub accuracy: f64,
    pub clarity: f64,
}

impl QualityWeights {
    pub fn total(&self) -> f64 {
        self.relevance + self.completeness + self.accuracy + self.clarity
    }
}

impl Default for QualityWeights {
    fn default() -> Self {
        Self {
            relevance: 0.25,
            completeness: 0.25,
            accuracy: 0.25,
            clarity: 0.25,
        }
    }
}

/// Outcome of evaluating one draft
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityAssessment {
    pub task_id: TaskId,
    pub round: u32,
    pub scores: QualityScores,

    /// Weighted mean of `scores`
    pub aggregate: f64,

    /// aggregate >= quality threshold
    pub passed: bool,

    /// Free-text improvement hints (non-authoritative)
    pub suggestions: Vec<String>,

    /// Information the evaluator found missing
    pub missing_info: Vec<String>,

    /// Query text suggested for the next round
    pub refined_query: Option<String>,

    /// The evaluator output could not be parsed; scores were forced to 0
    pub parse_failed: bool,
}

impl QualityAssessment {
    pub fn new(
        task_id: TaskId,
        round: u32,
        scores: QualityScores,
        weights: &QualityWeights,
        threshold: f64,
    ) -> Self {
        let scores = scores.clamped();
        let aggregate = scores.weighted_mean(weights);

        Self {
            task_id,
            round,
            scores,
            aggregate,
            passed: aggregate >= threshold,
            suggestions: Vec::new(),
            missing_info: Vec::new(),
            refined_query: None,
            parse_failed: false,
        }
    }

    /// Minimum-score assessment that forces another round
    pub fn minimum(task_id: TaskId, round: u32, reason: impl Into<String>) -> Self {
        Self {
            task_id,
            round,
            scores: QualityScores::zero(),
            aggregate: 0.0,
            passed: false,
            suggestions: vec![reason.into()],
            missing_info: Vec::new(),
            refined_query: None,
            parse_failed: true,
        }
    }
}

/// Why a task answer is degraded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "detail")]
pub enum DegradedReason {
    /// Search capability unreachable after retries
    RetrievalUnavailable(String),

    /// No passages found in any round
    InsufficientEvidence,

    /// Draft synthesis failed
    SynthesisFailed(String),

    /// Task execution aborted unexpectedly
    TaskFailed(String),
}

/// Confidence indicator carried by every answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum AnswerStatus {
    /// Evaluation passed the quality threshold
    Passed,

    /// Round budget exhausted; best-effort, low confidence
    RoundLimitExceeded,

    /// Self-reflection disabled; never evaluated
    Unevaluated,

    /// Produced without adequate evidence
    Degraded { reason: DegradedReason },

    /// Per-task timeout elapsed
    TimedOut,

    /// Caller cancelled the query
    Cancelled,

    /// Query routed to clarification; nothing retrieved
    NeedsClarification,
}

impl AnswerStatus {
    /// Only a passed evaluation is authoritative
    pub fn is_authoritative(&self) -> bool {
        matches!(self, AnswerStatus::Passed)
    }

    /// Higher is worse; the final status is the worst task status
    pub fn severity(&self) -> u8 {
        match self {
            AnswerStatus::Passed => 0,
            AnswerStatus::Unevaluated => 1,
            AnswerStatus::RoundLimitExceeded => 2,
            AnswerStatus::TimedOut => 3,
            AnswerStatus::Degraded { .. } => 4,
            AnswerStatus::NeedsClarification => 5,
            AnswerStatus::Cancelled => 6,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AnswerStatus::Passed => "passed",
            AnswerStatus::RoundLimitExceeded => "round limit exceeded (low confidence)",
            AnswerStatus::Unevaluated => "unevaluated",
            AnswerStatus::Degraded { .. } => "degraded",
            AnswerStatus::TimedOut => "timed out",
            AnswerStatus::Cancelled => "cancelled",
            AnswerStatus::NeedsClarification => "needs clarification",
        }
    }
}

/// Answer for one task. Immutable once produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub task_id: TaskId,
    pub description: String,
    pub text: String,

    /// Contributing passage source ids
    pub sources: Vec<String>,

    pub rounds_used: u32,
    pub assessment: Option<QualityAssessment>,
    pub status: AnswerStatus,
}

/// One step of the reasoning trace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "step")]
pub enum TraceEvent {
    Classified {
        query_type: QueryType,
        confidence: f64,
        parsed: bool,
    },
    ClarificationRequested {
        question: String,
    },
    Decomposed {
        tasks: usize,
        integration: IntegrationMethod,
    },
    DecompositionFallback {
        reason: String,
    },
    RoundCompleted {
        task_id: TaskId,
        round: u32,
        strategy: RetrievalStrategy,
        top_k: usize,
        similarity_threshold: f64,
        passages: usize,
        aggregate: Option<f64>,
        passed: bool,
    },
    TaskCompleted {
        task_id: TaskId,
        status: AnswerStatus,
        rounds: u32,
    },
    Assembled {
        tasks: usize,
        smoothed: bool,
    },
}

/// Result of `answer()`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgenticAnswer {
    pub query_id: QueryId,
    pub query_type: QueryType,
    pub confidence: f64,
    pub answer_text: String,

    /// Union of contributing source ids, first-seen order
    pub sources: Vec<String>,

    /// Largest round count of any task
    pub rounds_used: u32,

    pub quality_assessment: Option<QualityAssessment>,
    pub status: AnswerStatus,
    pub task_answers: Vec<Answer>,
    pub trace: Vec<TraceEvent>,
}

impl AgenticAnswer {
    pub fn is_authoritative(&self) -> bool {
        self.status.is_authoritative()
    }
}
