//! Query classification
//!
//! Delegates the categorical decision to the completion capability.
//! Malformed model output never raises: it becomes an
//! [`ClassificationOutcome::Unparseable`] result typed Ambiguous at 0.0.

use crate::config::ClassifierConfig;
use crate::errors::Result;
use crate::llm::parser::{number_field, string_field};
use crate::llm::{prompts, CompletionProvider, CompletionRequest, JsonExtractor, PromptRole};
use crate::types::{Query, QueryClassification, QueryType};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// Confidence assumed when the model names a type but omits a score
pub const DEFAULT_CONFIDENCE: f64 = 0.5;

/// Classifies queries into one of the seven [`QueryType`]s
#[derive(Clone)]
pub struct QueryClassifier {
    provider: Arc<dyn CompletionProvider>,
    config: ClassifierConfig,
    extractor: JsonExtractor,
}

impl QueryClassifier {
    pub fn new(provider: Arc<dyn CompletionProvider>, config: ClassifierConfig) -> Self {
        Self {
            provider,
            config,
            extractor: JsonExtractor::new(),
        }
    }

    /// Classify raw text; blank text is rejected before any model call
    pub async fn classify_text(&self, text: &str) -> Result<QueryClassification> {
        let query = Query::new(text)?;
        Ok(self.classify(&query).await)
    }

    /// Classify a validated query
    pub async fn classify(&self, query: &Query) -> QueryClassification {
        let request = CompletionRequest::new(
            PromptRole::Classify,
            prompts::CLASSIFIER_SYSTEM,
            prompts::classify_user(query.text()),
        )
        .with_temperature(self.config.temperature)
        .with_max_tokens(self.config.max_tokens);

        let response = match self.provider.complete(&request).await {
            Ok(text) => text,
            Err(e) => {
                warn!(provider = self.provider.name(), error = %e, "classification call failed");
                return QueryClassification::unparseable(query.id(), format!("completion failed: {}", e));
            }
        };

        let classification = self.parse_response(query, &response);
        debug!(
            query_type = %classification.query_type,
            confidence = classification.confidence,
            parsed = classification.is_parsed(),
            "classified query"
        );
        classification
    }

    fn parse_response(&self, query: &Query, response: &str) -> QueryClassification {
        let value = match self.extractor.extract(response) {
            Ok(Some(value)) => value,
            Ok(None) => return Self::parse_bare_label(query, response),
            Err(e) => return QueryClassification::unparseable(query.id(), e.to_string()),
        };

        let label = string_field(&value, "query_type").or_else(|| string_field(&value, "type"));
        let Some(query_type) = label.as_deref().and_then(QueryType::parse) else {
            return QueryClassification::unparseable(
                query.id(),
                format!("unknown query type: {}", label.unwrap_or_default()),
            );
        };

        let confidence = number_field(&value, "confidence").unwrap_or(DEFAULT_CONFIDENCE);
        QueryClassification::parsed(query.id(), query_type, confidence)
            .with_clarification(clarification_question(&value))
    }

    /// A response that is nothing but a type label
    fn parse_bare_label(query: &Query, response: &str) -> QueryClassification {
        match QueryType::parse(response) {
            Some(query_type) => QueryClassification::parsed(query.id(), query_type, DEFAULT_CONFIDENCE),
            None => QueryClassification::unparseable(query.id(), "no JSON object in response"),
        }
    }

    pub fn clarification_threshold(&self) -> f64 {
        self.config.clarification_threshold
    }
}

fn clarification_question(value: &Value) -> Option<String> {
    string_field(value, "clarification_question")
}
