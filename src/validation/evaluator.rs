//! Draft answer evaluation
//!
//! Rubric scoring delegated to the completion capability. All four
//! dimensions must be present; anything else yields the minimum
//! assessment so the round loop retries instead of silently passing.

use crate::config::EvaluatorConfig;
use crate::errors::{RagError, Result};
use crate::llm::parser::{number_field, string_field, string_list};
use crate::llm::{prompts, CompletionProvider, CompletionRequest, JsonExtractor, PromptRole};
use crate::rag::context::Evidence;
use crate::types::{QualityAssessment, QualityScores, SubTask};
use std::sync::Arc;
use tracing::{debug, warn};

/// Scores draft answers against their evidence
#[derive(Clone)]
pub struct QualityEvaluator {
    provider: Arc<dyn CompletionProvider>,
    config: EvaluatorConfig,
    extractor: JsonExtractor,
}

impl QualityEvaluator {
    pub fn new(provider: Arc<dyn CompletionProvider>, config: EvaluatorConfig) -> Self {
        Self {
            provider,
            config,
            extractor: JsonExtractor::new(),
        }
    }

    /// Evaluate one draft; never fails
    pub async fn evaluate(
        &self,
        task: &SubTask,
        round: u32,
        draft: &str,
        evidence: &Evidence,
        quality_threshold: f64,
    ) -> QualityAssessment {
        let request = CompletionRequest::new(
            PromptRole::Evaluate,
            prompts::EVALUATOR_SYSTEM,
            prompts::evaluate_user(&task.description, &evidence.text, draft, &evidence.source_ids),
        )
        .with_temperature(self.config.temperature)
        .with_max_tokens(self.config.max_tokens);

        let response = match self.provider.complete(&request).await {
            Ok(response) => response,
            Err(e) => {
                warn!(task = %task.id, round, error = %e, "evaluation call failed");
                return QualityAssessment::minimum(task.id, round, format!("evaluation unavailable: {}", e));
            }
        };

        match self.parse(task, round, &response, quality_threshold) {
            Ok(assessment) => {
                debug!(
                    task = %task.id,
                    round,
                    aggregate = assessment.aggregate,
                    passed = assessment.passed,
                    "evaluated draft"
                );
                assessment
            }
            Err(e) => {
                warn!(task = %task.id, round, error = %e, "forcing minimum score");
                QualityAssessment::minimum(task.id, round, e.to_string())
            }
        }
    }

    /// Parse a rubric response into an assessment
    pub fn parse(
        &self,
        task: &SubTask,
        round: u32,
        response: &str,
        quality_threshold: f64,
    ) -> Result<QualityAssessment> {
        let value = self
            .extractor
            .extract(response)
            .map_err(|e| RagError::EvaluationParse(e.to_string()))?
            .ok_or_else(|| RagError::EvaluationParse("no JSON object in response".to_string()))?;

        let score = |key: &str| {
            number_field(&value, key)
                .ok_or_else(|| RagError::EvaluationParse(format!("missing score: {}", key)))
        };

        let scores = QualityScores {
            relevance: score("relevance")?,
            completeness: score("completeness")?,
            accuracy: score("accuracy")?,
            clarity: score("clarity")?,
        };

        let mut assessment =
            QualityAssessment::new(task.id, round, scores, &self.config.weights, quality_threshold);
        assessment.suggestions = string_list(&value, "suggestions");
        assessment.missing_info = string_list(&value, "missing_info");
        assessment.refined_query = string_field(&value, "new_query");

        Ok(assessment)
    }
}
