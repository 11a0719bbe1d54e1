//! Orchestration state machines
//!
//! Two deterministic FSMs:
//! - [`QueryPhase`]: one per query, Classifying → (Decomposing) → TaskLoop → Assembling → Done
//! - [`TaskState`]: one per sub-task, the self-reflection round loop
//!
//! Guarantees:
//! - Safety: invalid transitions are rejected with `InvalidTransition`
//! - Liveness: every task reaches Completed (Abort is valid from any state)
//! - Determinism: unique next state per (state, event)

use crate::errors::{RagError, Result};
use serde::{Deserialize, Serialize};

/// Phase of a whole query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueryPhase {
    /// Initial phase - query received
    Classifying,

    /// Splitting into sub-tasks (skipped when not applicable)
    Decomposing,

    /// Sub-tasks running their round loops
    TaskLoop,

    /// Combining task answers
    Assembling,

    /// Final answer produced (terminal)
    Done,
}

impl QueryPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, QueryPhase::Done)
    }

    /// Move to `next`
    ///
    /// Valid edges:
    /// 1. Classifying → Decomposing | TaskLoop
    /// 2. Classifying → Done          (clarification, nothing retrieved)
    /// 3. Decomposing → TaskLoop
    /// 4. TaskLoop    → Assembling
    /// 5. Assembling  → Done
    pub fn advance(&self, next: QueryPhase) -> Result<QueryPhase> {
        use QueryPhase::*;

        match (self, next) {
            (Classifying, Decomposing)
            | (Classifying, TaskLoop)
            | (Classifying, Done)
            | (Decomposing, TaskLoop)
            | (TaskLoop, Assembling)
            | (Assembling, Done) => Ok(next),
            (from, to) => Err(RagError::InvalidTransition {
                from: format!("{:?}", from),
                event: format!("{:?}", to),
            }),
        }
    }
}

/// State of one sub-task's round loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskState {
    /// Choosing retrieval parameters for the round
    Planning,

    /// Search call in flight
    Retrieving,

    /// Draft answer being written
    Synthesizing,

    /// Draft under evaluation
    Evaluating,

    /// Round failed; another round follows
    Retrying,

    /// Answer fixed (terminal)
    Completed,
}

/// Events that trigger task transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskEvent {
    /// Round parameters chosen
    Planned,

    /// Passages available for synthesis
    Retrieved,

    /// No passages yet; widen and try again
    NoEvidence,

    /// Draft written
    Drafted,

    /// Self-reflection disabled; accept the draft
    SkipEvaluation,

    /// Evaluation met the threshold
    Passed,

    /// Evaluation below the threshold
    Failed,

    /// Round budget spent
    RoundLimit,

    /// Start the next round
    NextRound,

    /// Terminal failure, cancellation or timeout
    Abort,
}

impl TaskState {
    /// Initial state of every task
    pub fn initial() -> Self {
        TaskState::Planning
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Completed)
    }

    /// Attempt state transition with validation
    ///
    /// Valid transitions:
    ///
    /// ```text
    /// 1.  Planning     → Retrieving   (on: Planned)
    /// 2.  Retrieving   → Synthesizing (on: Retrieved)
    /// 3.  Retrieving   → Retrying     (on: NoEvidence)
    /// 4.  Retrieving   → Completed    (on: RoundLimit)
    /// 5.  Synthesizing → Evaluating   (on: Drafted)
    /// 6.  Synthesizing → Completed    (on: SkipEvaluation)
    /// 7.  Evaluating   → Completed    (on: Passed | RoundLimit)
    /// 8.  Evaluating   → Retrying     (on: Failed)
    /// 9.  Retrying     → Planning     (on: NextRound)
    /// 10. *            → Completed    (on: Abort)
    /// 11. Completed    → Completed    (terminal)
    /// ```
    pub fn transition(&self, event: TaskEvent) -> Result<TaskState> {
        use TaskEvent::*;
        use TaskState::*;

        if event == Abort {
            return Ok(Completed);
        }

        let next = match (self, event) {
            (Planning, Planned) => Retrieving,

            (Retrieving, Retrieved) => Synthesizing,
            (Retrieving, NoEvidence) => Retrying,
            (Retrieving, RoundLimit) => Completed,

            (Synthesizing, Drafted) => Evaluating,
            (Synthesizing, SkipEvaluation) => Completed,

            (Evaluating, Passed) => Completed,
            (Evaluating, RoundLimit) => Completed,
            (Evaluating, Failed) => Retrying,

            (Retrying, NextRound) => Planning,

            (Completed, _) => Completed,

            (from, event) => {
                return Err(RagError::InvalidTransition {
                    from: format!("{:?}", from),
                    event: format!("{:?}", event),
                });
            }
        };

        Ok(next)
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            TaskState::Planning => "Planning",
            TaskState::Retrieving => "Retrieving",
            TaskState::Synthesizing => "Synthesizing",
            TaskState::Evaluating => "Evaluating",
            TaskState::Retrying => "Retrying",
            TaskState::Completed => "Completed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path() {
        let mut state = TaskState::initial();
        for event in [TaskEvent::Planned, TaskEvent::Retrieved, TaskEvent::Drafted, TaskEvent::Passed] {
            state = state.transition(event).unwrap();
        }
        assert_eq!(state, TaskState::Completed);
    }

    #[test]
    fn test_retry_loop() {
        let state = TaskState::Evaluating.transition(TaskEvent::Failed).unwrap();
        assert_eq!(state, TaskState::Retrying);
        assert_eq!(state.transition(TaskEvent::NextRound).unwrap(), TaskState::Planning);
        assert_eq!(
            TaskState::Retrieving.transition(TaskEvent::NoEvidence).unwrap(),
            TaskState::Retrying
        );
    }

    #[test]
    fn test_invalid_transitions() {
        assert!(matches!(
            TaskState::Planning.transition(TaskEvent::Passed),
            Err(RagError::InvalidTransition { .. })
        ));
        assert!(TaskState::Retrying.transition(TaskEvent::Retrieved).is_err());
        assert!(TaskState::Synthesizing.transition(TaskEvent::Failed).is_err());
    }

    #[test]
    fn test_abort_from_any_state() {
        for state in [
            TaskState::Planning,
            TaskState::Retrieving,
            TaskState::Synthesizing,
            TaskState::Evaluating,
            TaskState::Retrying,
            TaskState::Completed,
        ] {
            assert_eq!(state.transition(TaskEvent::Abort).unwrap(), TaskState::Completed);
        }
    }

    #[test]
    fn test_completed_is_absorbing() {
        assert!(TaskState::Completed.is_terminal());
        assert_eq!(
            TaskState::Completed.transition(TaskEvent::NextRound).unwrap(),
            TaskState::Completed
        );
    }

    #[test]
    fn test_query_phases() {
        let phase = QueryPhase::Classifying
            .advance(QueryPhase::Decomposing)
            .and_then(|p| p.advance(QueryPhase::TaskLoop))
            .and_then(|p| p.advance(QueryPhase::Assembling))
            .and_then(|p| p.advance(QueryPhase::Done))
            .unwrap();
        assert!(phase.is_terminal());

        assert!(QueryPhase::Classifying.advance(QueryPhase::Done).is_ok());
        assert!(QueryPhase::TaskLoop.advance(QueryPhase::Decomposing).is_err());
        assert!(QueryPhase::Done.advance(QueryPhase::Classifying).is_err());
    }
}
