//! Agentic orchestrator - main coordinator
//!
//! Drives one query end to end:
//! - Classification, with low confidence routed to clarification
//! - Optional decomposition into a dependency DAG
//! - Sub-task round loops dispatched from a single coordination loop
//! - Assembly of task answers into the final answer

use crate::agent::ledger::TaskLedger;
use crate::agent::pipeline::{TaskOutcome, TaskPipeline, TaskSettings};
use crate::agent::state::QueryPhase;
use crate::config::{AgenticConfig, EngineConfig};
use crate::errors::{RagError, Result};
use crate::llm::CompletionProvider;
use crate::planning::{Decomposition, QueryClassifier, RetrievalPlanner, TaskDecomposer, TaskGraph};
use crate::rag::synthesis::dependency_context;
use crate::rag::{AnswerSynthesizer, EvidenceBuilder, RetrievalExecutor, RetryPolicy};
use crate::search::SearchProvider;
use crate::types::{
    AgenticAnswer, Answer, AnswerStatus, DegradedReason, IntegrationMethod, QualityAssessment,
    QualityScores, Query, QueryClassification, QueryType, RetrievalConfig, SubTask, TaskId,
    TraceEvent, INSUFFICIENT_EVIDENCE,
};
use crate::validation::QualityEvaluator;
use futures_util::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Fallback clarification prompt when the classifier suggests none
pub const DEFAULT_CLARIFICATION: &str =
    "Could you clarify your question? Please name the system, topic or scope you are asking about.";

/// Main query orchestrator
pub struct AgenticOrchestrator {
    completion: Arc<dyn CompletionProvider>,
    search: Arc<dyn SearchProvider>,
    engine: EngineConfig,
    classifier: QueryClassifier,
    decomposer: TaskDecomposer,
    planner: RetrievalPlanner,
    synthesizer: AnswerSynthesizer,
}

/// Per-query mutable bookkeeping, dropped when `answer()` returns
struct QueryContext {
    phase: QueryPhase,
    trace: Vec<TraceEvent>,
}

impl QueryContext {
    fn new() -> Self {
        Self {
            phase: QueryPhase::Classifying,
            trace: Vec::new(),
        }
    }

    fn advance(&mut self, next: QueryPhase) -> Result<()> {
        self.phase = self.phase.advance(next)?;
        debug!(phase = ?self.phase, "query phase");
        Ok(())
    }
}

impl AgenticOrchestrator {
    /// Create orchestrator with default engine configuration
    pub fn new(completion: Arc<dyn CompletionProvider>, search: Arc<dyn SearchProvider>) -> Self {
        Self::build(completion, search, EngineConfig::default())
    }

    /// Create orchestrator with validated engine configuration
    pub fn with_engine_config(
        completion: Arc<dyn CompletionProvider>,
        search: Arc<dyn SearchProvider>,
        engine: EngineConfig,
    ) -> Result<Self> {
        engine.validate()?;
        Ok(Self::build(completion, search, engine))
    }

    fn build(
        completion: Arc<dyn CompletionProvider>,
        search: Arc<dyn SearchProvider>,
        engine: EngineConfig,
    ) -> Self {
        Self {
            classifier: QueryClassifier::new(completion.clone(), engine.classifier.clone()),
            decomposer: TaskDecomposer::new(completion.clone(), engine.decomposer.clone()),
            planner: RetrievalPlanner::new(engine.planner.clone()),
            synthesizer: AnswerSynthesizer::new(completion.clone(), engine.synthesis.clone()),
            completion,
            search,
            engine,
        }
    }

    pub fn engine_config(&self) -> &EngineConfig {
        &self.engine
    }

    /// Classify a query without answering it
    pub async fn classify(&self, query_text: &str) -> Result<QueryClassification> {
        self.classifier.classify_text(query_text).await
    }

    /// Retrieval parameters for a type at a given round
    pub fn plan(&self, query_type: QueryType, round: u32, max_rounds: u32) -> RetrievalConfig {
        self.planner.plan_round(query_type, round, max_rounds)
    }

    /// Answer a query
    pub async fn answer(&self, query_text: &str, config: &AgenticConfig) -> Result<AgenticAnswer> {
        self.answer_with_cancel(query_text, config, CancellationToken::new())
            .await
    }

    /// Answer a query under a caller-supplied cancellation token
    ///
    /// Fails only on invalid input or cancellation before any task started.
    /// Cancellation during the task loop returns the partial answer marked
    /// [`AnswerStatus::Cancelled`].
    pub async fn answer_with_cancel(
        &self,
        query_text: &str,
        config: &AgenticConfig,
        cancel: CancellationToken,
    ) -> Result<AgenticAnswer> {
        config.validate()?;
        let query = Query::new(query_text)?;
        let mut ctx = QueryContext::new();

        info!(query_id = %query.id(), "answering query");
        if config.enable_tool_use {
            warn!("enable_tool_use is set but no tools are registered; ignoring");
        }

        let classification = guard(&cancel, self.classifier.classify(&query)).await?;
        ctx.trace.push(TraceEvent::Classified {
            query_type: classification.query_type,
            confidence: classification.confidence,
            parsed: classification.is_parsed(),
        });
        info!(
            query_type = %classification.query_type,
            confidence = classification.confidence,
            "query classified"
        );

        if classification.needs_clarification(self.classifier.clarification_threshold())
            || self.planner.profile(classification.query_type).clarify
        {
            ctx.advance(QueryPhase::Done)?;
            return Ok(self.clarification(&query, &classification, ctx));
        }

        let decomposition = if config.enable_task_decomposition
            && self.decomposer.is_applicable(&query, &classification)
        {
            ctx.advance(QueryPhase::Decomposing)?;
            let decomposition = self.decompose(&query, &classification, &cancel, &mut ctx).await?;
            ctx.advance(QueryPhase::TaskLoop)?;
            decomposition
        } else {
            ctx.advance(QueryPhase::TaskLoop)?;
            Decomposition::single(&query)
        };

        let integration = decomposition.integration;
        let order = TaskGraph::build(&decomposition.tasks)
            .map(|graph| graph.execution_order())
            .unwrap_or_else(|_| decomposition.tasks.iter().map(|t| t.id).collect());
        let ledger = TaskLedger::new(decomposition.tasks, order);

        let pipeline = Arc::new(self.pipeline(&classification, config));
        let ledger = self.run_tasks(ledger, pipeline, &cancel, &mut ctx).await;

        ctx.advance(QueryPhase::Assembling)?;
        let answer = self
            .assemble(&query, &classification, config, integration, ledger, &cancel, &mut ctx)
            .await;
        ctx.advance(QueryPhase::Done)?;

        info!(
            query_id = %query.id(),
            status = answer.status.label(),
            rounds = answer.rounds_used,
            tasks = answer.task_answers.len(),
            "query answered"
        );
        Ok(answer)
    }

    async fn decompose(
        &self,
        query: &Query,
        classification: &QueryClassification,
        cancel: &CancellationToken,
        ctx: &mut QueryContext,
    ) -> Result<Decomposition> {
        match guard(cancel, self.decomposer.decompose(query, classification)).await? {
            Ok(decomposition) => {
                ctx.trace.push(TraceEvent::Decomposed {
                    tasks: decomposition.tasks.len(),
                    integration: decomposition.integration,
                });
                Ok(decomposition)
            }
            Err(e) => {
                warn!(error = %e, "decomposition failed; answering as a single task");
                ctx.trace.push(TraceEvent::DecompositionFallback {
                    reason: e.to_string(),
                });
                Ok(Decomposition::single(query))
            }
        }
    }

    /// Fresh per-query pipeline; nothing is shared across queries
    fn pipeline(&self, classification: &QueryClassification, config: &AgenticConfig) -> TaskPipeline {
        let executor = RetrievalExecutor::new(
            self.search.clone(),
            RetryPolicy::from_config(&self.engine.executor),
        )
        .with_filters(config.search_filters.clone());

        TaskPipeline::new(
            self.planner.clone(),
            executor,
            EvidenceBuilder::new(self.engine.synthesis.max_context_tokens),
            self.synthesizer.clone(),
            QualityEvaluator::new(self.completion.clone(), self.engine.evaluator.clone()),
            TaskSettings {
                query_type: classification.query_type,
                max_rounds: config.max_retrieval_rounds,
                quality_threshold: config.quality_threshold,
                self_reflection: config.enable_self_reflection,
                temperature: config.temperature_for(classification.query_type),
                timeout: self
                    .engine
                    .scheduler
                    .task_timeout(config.max_retrieval_rounds),
            },
        )
    }

    /// Coordination loop: the only place the ledger is mutated
    async fn run_tasks(
        &self,
        mut ledger: TaskLedger,
        pipeline: Arc<TaskPipeline>,
        cancel: &CancellationToken,
        ctx: &mut QueryContext,
    ) -> TaskLedger {
        let worker_limit = self.engine.scheduler.worker_limit;
        let mut workers: JoinSet<(SubTask, std::thread::Result<TaskOutcome>)> = JoinSet::new();

        loop {
            while !cancel.is_cancelled() {
                let Some(task) = ledger.next_ready(worker_limit).cloned() else {
                    break;
                };

                let context = dependency_context(&ledger.dependency_answers(task.id));
                ledger.mark_running(task.id);
                debug!(task = %task.id, running = ledger.running(), "dispatching task");

                let pipeline = pipeline.clone();
                let token = cancel.child_token();
                workers.spawn(async move {
                    let outcome = AssertUnwindSafe(pipeline.run(task.clone(), context, token))
                        .catch_unwind()
                        .await;
                    (task, outcome)
                });
            }

            let Some(joined) = workers.join_next().await else {
                break;
            };

            match joined {
                Ok((_, Ok(outcome))) => {
                    ctx.trace.extend(outcome.trace);
                    ledger.complete(outcome.answer);
                }
                Ok((task, Err(_panic))) => {
                    warn!(task = %task.id, "task panicked");
                    let answer = failed_answer(&task, "task panicked");
                    ctx.trace.push(TraceEvent::TaskCompleted {
                        task_id: task.id,
                        status: answer.status.clone(),
                        rounds: 0,
                    });
                    ledger.complete(answer);
                }
                Err(e) => {
                    // Task id is unknown; its slot stays Running until drained
                    warn!(error = %e, "worker join failed");
                }
            }
        }

        let lost = AnswerStatus::Degraded {
            reason: DegradedReason::TaskFailed("worker join failed".to_string()),
        };
        for id in ledger.close_running(lost.clone()) {
            ctx.trace.push(TraceEvent::TaskCompleted {
                task_id: id,
                status: lost.clone(),
                rounds: 0,
            });
        }

        let status = if cancel.is_cancelled() {
            AnswerStatus::Cancelled
        } else {
            AnswerStatus::Degraded {
                reason: DegradedReason::TaskFailed("task never ran".to_string()),
            }
        };
        for id in ledger.close_pending(status.clone()) {
            ctx.trace.push(TraceEvent::TaskCompleted {
                task_id: id,
                status: status.clone(),
                rounds: 0,
            });
        }

        ledger
    }

    #[allow(clippy::too_many_arguments)]
    async fn assemble(
        &self,
        query: &Query,
        classification: &QueryClassification,
        config: &AgenticConfig,
        integration: IntegrationMethod,
        ledger: TaskLedger,
        cancel: &CancellationToken,
        ctx: &mut QueryContext,
    ) -> AgenticAnswer {
        let ordered = ledger.answers_in_order();

        let status = ordered
            .iter()
            .map(|a| &a.status)
            .max_by_key(|s| s.severity())
            .cloned()
            .unwrap_or(AnswerStatus::Degraded {
                reason: DegradedReason::InsufficientEvidence,
            });

        let smooth = config.enable_final_synthesis && !cancel.is_cancelled();
        let temperature = match integration {
            IntegrationMethod::Compare => config.reasoning_temperature,
            _ => config.default_temperature,
        };
        let assembled = self
            .synthesizer
            .assemble(query.text(), &ordered, integration, smooth, temperature)
            .await;
        ctx.trace.push(TraceEvent::Assembled {
            tasks: ordered.len(),
            smoothed: assembled.smoothed,
        });

        let mut sources: Vec<String> = Vec::new();
        for source in ordered.iter().flat_map(|a| a.sources.iter()) {
            if !sources.contains(source) {
                sources.push(source.clone());
            }
        }

        let rounds_used = ordered.iter().map(|a| a.rounds_used).max().unwrap_or(0);
        let quality_assessment = self.overall_assessment(&ordered, config, rounds_used);
        let text = if assembled.text.trim().is_empty() {
            INSUFFICIENT_EVIDENCE.to_string()
        } else {
            assembled.text
        };

        AgenticAnswer {
            query_id: query.id(),
            query_type: classification.query_type,
            confidence: classification.confidence,
            answer_text: text,
            sources,
            rounds_used,
            quality_assessment,
            status,
            task_answers: ledger.into_answers(),
            trace: std::mem::take(&mut ctx.trace),
        }
    }

    /// Single task: its own assessment. Several: mean scores, passing only
    /// when every task passed.
    fn overall_assessment(
        &self,
        answers: &[&Answer],
        config: &AgenticConfig,
        rounds_used: u32,
    ) -> Option<QualityAssessment> {
        if let [single] = answers {
            return single.assessment.clone();
        }

        let assessments: Vec<&QualityAssessment> =
            answers.iter().filter_map(|a| a.assessment.as_ref()).collect();
        let scores = QualityScores::mean(assessments.iter().map(|a| &a.scores))?;

        let mut overall = QualityAssessment::new(
            TaskId(0),
            rounds_used,
            scores,
            &self.engine.evaluator.weights,
            config.quality_threshold,
        );
        overall.passed = answers.iter().all(|a| a.status.is_authoritative());
        overall.parse_failed = assessments.iter().any(|a| a.parse_failed);
        overall.missing_info = assessments
            .iter()
            .flat_map(|a| a.missing_info.iter().cloned())
            .collect();
        overall.suggestions = assessments
            .iter()
            .flat_map(|a| a.suggestions.iter().cloned())
            .collect();
        Some(overall)
    }

    fn clarification(
        &self,
        query: &Query,
        classification: &QueryClassification,
        mut ctx: QueryContext,
    ) -> AgenticAnswer {
        let question = classification
            .clarification_question
            .clone()
            .unwrap_or_else(|| DEFAULT_CLARIFICATION.to_string());

        info!(query_id = %query.id(), "routing to clarification");
        ctx.trace.push(TraceEvent::ClarificationRequested {
            question: question.clone(),
        });

        AgenticAnswer {
            query_id: query.id(),
            query_type: classification.query_type,
            confidence: classification.confidence,
            answer_text: question,
            sources: Vec::new(),
            rounds_used: 0,
            quality_assessment: None,
            status: AnswerStatus::NeedsClarification,
            task_answers: Vec::new(),
            trace: ctx.trace,
        }
    }
}

/// Race a future against query cancellation
async fn guard<F: Future>(cancel: &CancellationToken, future: F) -> Result<F::Output> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(RagError::Cancelled),
        output = future => Ok(output),
    }
}

fn failed_answer(task: &SubTask, reason: &str) -> Answer {
    Answer {
        task_id: task.id,
        description: task.description.clone(),
        text: INSUFFICIENT_EVIDENCE.to_string(),
        sources: Vec::new(),
        rounds_used: 0,
        assessment: None,
        status: AnswerStatus::Degraded {
            reason: DegradedReason::TaskFailed(reason.to_string()),
        },
    }
}
