//! Per-task self-reflection loop
//!
//! Planning → Retrieving → Synthesizing → Evaluating → [Retrying | Completed],
//! driven through [`TaskState`]. Every external call is raced against the
//! query's cancellation token and the task deadline, so an interrupted
//! task still returns the best draft it has.

use crate::agent::state::{TaskEvent, TaskState};
use crate::errors::Result;
use crate::planning::RetrievalPlanner;
use crate::rag::{AnswerSynthesizer, EvidenceBuilder, RetrievalExecutor};
use crate::types::{
    Answer, AnswerStatus, DegradedReason, PassageSet, QualityAssessment, QueryType, SubTask,
    TraceEvent, INSUFFICIENT_EVIDENCE,
};
use crate::validation::QualityEvaluator;
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Per-query parameters shared by every task of the query
#[derive(Debug, Clone)]
pub struct TaskSettings {
    /// Classification of the parent query; drives planning and temperature
    pub query_type: QueryType,
    pub max_rounds: u32,
    pub quality_threshold: f64,
    pub self_reflection: bool,
    pub temperature: f64,

    /// Wall-clock budget for the whole task
    pub timeout: Duration,
}

/// Finished task answer plus its trace events
#[derive(Debug, Clone)]
pub struct TaskOutcome {
    pub answer: Answer,
    pub trace: Vec<TraceEvent>,
}

/// Why an external call did not complete
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Interrupt {
    Cancelled,
    TimedOut,
}

/// A draft with the sources it was written from
#[derive(Debug, Clone)]
struct Draft {
    text: String,
    sources: Vec<String>,
    assessment: Option<QualityAssessment>,
}

impl Draft {
    fn aggregate(&self) -> f64 {
        self.assessment.as_ref().map(|a| a.aggregate).unwrap_or(0.0)
    }
}

/// Mutable progress of one task run
struct TaskRun<'a> {
    task: &'a SubTask,
    state: TaskState,
    round: u32,
    passages: PassageSet,
    best: Option<Draft>,
    refined_query: Option<String>,
    trace: Vec<TraceEvent>,
}

impl<'a> TaskRun<'a> {
    fn new(task: &'a SubTask) -> Self {
        Self {
            task,
            state: TaskState::initial(),
            round: 1,
            passages: PassageSet::new(),
            best: None,
            refined_query: None,
            trace: Vec::new(),
        }
    }

    fn apply(&mut self, event: TaskEvent) -> Result<()> {
        self.state = self.state.transition(event)?;
        Ok(())
    }

    /// Keep the highest aggregate; ties keep the earlier draft
    fn offer(&mut self, draft: Draft) {
        let better = match &self.best {
            Some(best) => draft.aggregate() > best.aggregate(),
            None => true,
        };
        if better {
            self.best = Some(draft);
        }
    }

    fn finish(mut self, status: AnswerStatus) -> TaskOutcome {
        self.state = TaskState::Completed;

        let (text, sources, assessment) = match self.best {
            Some(draft) => (draft.text, draft.sources, draft.assessment),
            None => (INSUFFICIENT_EVIDENCE.to_string(), Vec::new(), None),
        };

        self.trace.push(TraceEvent::TaskCompleted {
            task_id: self.task.id,
            status: status.clone(),
            rounds: self.round,
        });

        TaskOutcome {
            answer: Answer {
                task_id: self.task.id,
                description: self.task.description.clone(),
                text,
                sources,
                rounds_used: self.round,
                assessment,
                status,
            },
            trace: self.trace,
        }
    }
}

/// Runs the round loop for one task
#[derive(Clone)]
pub struct TaskPipeline {
    planner: RetrievalPlanner,
    executor: RetrievalExecutor,
    evidence: EvidenceBuilder,
    synthesizer: AnswerSynthesizer,
    evaluator: QualityEvaluator,
    settings: TaskSettings,
}

impl TaskPipeline {
    pub fn new(
        planner: RetrievalPlanner,
        executor: RetrievalExecutor,
        evidence: EvidenceBuilder,
        synthesizer: AnswerSynthesizer,
        evaluator: QualityEvaluator,
        settings: TaskSettings,
    ) -> Self {
        Self {
            planner,
            executor,
            evidence,
            synthesizer,
            evaluator,
            settings,
        }
    }

    pub fn settings(&self) -> &TaskSettings {
        &self.settings
    }

    /// Run a task to completion; never fails
    pub async fn run(
        &self,
        task: SubTask,
        dependency_context: String,
        cancel: CancellationToken,
    ) -> TaskOutcome {
        let deadline = Instant::now() + self.settings.timeout;
        let mut run = TaskRun::new(&task);

        let status = match self.rounds(&mut run, &dependency_context, &cancel, deadline).await {
            Ok(status) => status,
            Err(e) => {
                // Only reachable through an FSM bug; surface it as a degraded task
                warn!(task = %task.id, error = %e, "task loop aborted");
                AnswerStatus::Degraded {
                    reason: DegradedReason::TaskFailed(e.to_string()),
                }
            }
        };

        info!(
            task = %task.id,
            status = status.label(),
            rounds = run.round,
            "task completed"
        );
        run.finish(status)
    }

    async fn guard<F: Future>(
        cancel: &CancellationToken,
        deadline: Instant,
        future: F,
    ) -> std::result::Result<F::Output, Interrupt> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Interrupt::Cancelled),
            _ = sleep_until(deadline) => Err(Interrupt::TimedOut),
            output = future => Ok(output),
        }
    }

    fn interrupted(interrupt: Interrupt) -> AnswerStatus {
        match interrupt {
            Interrupt::Cancelled => AnswerStatus::Cancelled,
            Interrupt::TimedOut => AnswerStatus::TimedOut,
        }
    }

    async fn rounds(
        &self,
        run: &mut TaskRun<'_>,
        dependency_context: &str,
        cancel: &CancellationToken,
        deadline: Instant,
    ) -> Result<AnswerStatus> {
        let settings = &self.settings;

        loop {
            if cancel.is_cancelled() {
                run.apply(TaskEvent::Abort)?;
                return Ok(AnswerStatus::Cancelled);
            }

            let config = self
                .planner
                .plan_round(settings.query_type, run.round, settings.max_rounds);
            run.apply(TaskEvent::Planned)?;

            let query_text = run
                .refined_query
                .clone()
                .unwrap_or_else(|| run.task.description.clone());

            let retrieval = self
                .executor
                .retrieve(run.task, &query_text, &config, &mut run.passages);
            let retrieved = match Self::guard(cancel, deadline, retrieval).await {
                Ok(result) => result,
                Err(interrupt) => {
                    run.apply(TaskEvent::Abort)?;
                    return Ok(Self::interrupted(interrupt));
                }
            };

            if let Err(e) = retrieved {
                run.apply(TaskEvent::Abort)?;
                return Ok(AnswerStatus::Degraded {
                    reason: DegradedReason::RetrievalUnavailable(e.to_string()),
                });
            }

            let record_round = |run: &mut TaskRun<'_>, assessment: Option<&QualityAssessment>| {
                run.trace.push(TraceEvent::RoundCompleted {
                    task_id: run.task.id,
                    round: run.round,
                    strategy: config.strategy,
                    top_k: config.top_k,
                    similarity_threshold: config.similarity_threshold,
                    passages: run.passages.len(),
                    aggregate: assessment.map(|a| a.aggregate),
                    passed: assessment.map(|a| a.passed).unwrap_or(false),
                });
            };

            if run.passages.is_empty() {
                record_round(run, None);
                if run.round >= settings.max_rounds {
                    run.apply(TaskEvent::RoundLimit)?;
                    return Ok(AnswerStatus::Degraded {
                        reason: DegradedReason::InsufficientEvidence,
                    });
                }

                debug!(task = %run.task.id, round = run.round, "no passages; widening");
                run.apply(TaskEvent::NoEvidence)?;
                run.apply(TaskEvent::NextRound)?;
                run.round += 1;
                continue;
            }
            run.apply(TaskEvent::Retrieved)?;

            let evidence = self.evidence.build(&run.passages);
            let drafting = self.synthesizer.draft(
                run.task,
                &evidence,
                dependency_context,
                settings.temperature,
            );
            let text = match Self::guard(cancel, deadline, drafting).await {
                Ok(Ok(text)) => text,
                Ok(Err(e)) => {
                    record_round(run, None);
                    run.apply(TaskEvent::Abort)?;
                    return Ok(AnswerStatus::Degraded {
                        reason: DegradedReason::SynthesisFailed(e.to_string()),
                    });
                }
                Err(interrupt) => {
                    run.apply(TaskEvent::Abort)?;
                    return Ok(Self::interrupted(interrupt));
                }
            };

            if !settings.self_reflection {
                run.apply(TaskEvent::SkipEvaluation)?;
                record_round(run, None);
                run.best = Some(Draft {
                    text,
                    sources: evidence.source_ids,
                    assessment: None,
                });
                return Ok(AnswerStatus::Unevaluated);
            }
            run.apply(TaskEvent::Drafted)?;

            let evaluation = self.evaluator.evaluate(
                run.task,
                run.round,
                &text,
                &evidence,
                settings.quality_threshold,
            );
            let assessment = match Self::guard(cancel, deadline, evaluation).await {
                Ok(assessment) => assessment,
                Err(interrupt) => {
                    // Unevaluated drafts still beat nothing
                    if run.best.is_none() {
                        run.best = Some(Draft {
                            text,
                            sources: evidence.source_ids,
                            assessment: None,
                        });
                    }
                    run.apply(TaskEvent::Abort)?;
                    return Ok(Self::interrupted(interrupt));
                }
            };

            record_round(run, Some(&assessment));
            let passed = assessment.passed;
            let refined = assessment.refined_query.clone();

            if passed {
                run.best = Some(Draft {
                    text,
                    sources: evidence.source_ids,
                    assessment: Some(assessment),
                });
                run.apply(TaskEvent::Passed)?;
                return Ok(AnswerStatus::Passed);
            }

            run.offer(Draft {
                text,
                sources: evidence.source_ids,
                assessment: Some(assessment),
            });

            if run.round >= settings.max_rounds {
                run.apply(TaskEvent::RoundLimit)?;
                return Ok(AnswerStatus::RoundLimitExceeded);
            }

            run.apply(TaskEvent::Failed)?;
            if refined.is_some() {
                run.refined_query = refined;
            }
            run.apply(TaskEvent::NextRound)?;
            run.round += 1;
        }
    }
}
