//! Draft synthesis and cross-task assembly

use crate::config::SynthesisConfig;
use crate::errors::{RagError, Result};
use crate::llm::{prompts, CompletionProvider, CompletionRequest, PromptRole};
use crate::rag::context::Evidence;
use crate::types::{Answer, IntegrationMethod, SubTask};
use std::sync::Arc;
use tracing::{debug, warn};

/// Final text plus whether a smoothing pass produced it
#[derive(Debug, Clone, PartialEq)]
pub struct Assembled {
    pub text: String,
    pub smoothed: bool,
}

/// Writes task drafts and assembles the final answer
#[derive(Clone)]
pub struct AnswerSynthesizer {
    provider: Arc<dyn CompletionProvider>,
    config: SynthesisConfig,
}

impl AnswerSynthesizer {
    pub fn new(provider: Arc<dyn CompletionProvider>, config: SynthesisConfig) -> Self {
        Self { provider, config }
    }

    /// Draft an answer for one task from its evidence
    ///
    /// `dependency_context` holds the completed answers of the task's
    /// dependencies, already tagged.
    pub async fn draft(
        &self,
        task: &SubTask,
        evidence: &Evidence,
        dependency_context: &str,
        temperature: f64,
    ) -> Result<String> {
        let request = CompletionRequest::new(
            PromptRole::Synthesize,
            prompts::SYNTHESIZER_SYSTEM,
            prompts::synthesize_user(&task.description, &evidence.text, dependency_context),
        )
        .with_temperature(temperature)
        .with_max_tokens(self.config.max_tokens);

        let text = self.provider.complete(&request).await?;
        let text = text.trim();
        if text.is_empty() {
            return Err(RagError::Completion("empty draft".to_string()));
        }

        Ok(text.to_string())
    }

    /// Combine task answers given in dependency order
    ///
    /// One answer is returned as is. Several are concatenated with
    /// provenance tags; when `smooth` is set and the method is not
    /// `Concatenate`, one extra model call rewrites the concatenation,
    /// falling back to it on failure.
    pub async fn assemble(
        &self,
        query_text: &str,
        answers: &[&Answer],
        method: IntegrationMethod,
        smooth: bool,
        temperature: f64,
    ) -> Assembled {
        if let [single] = answers {
            return Assembled {
                text: single.text.clone(),
                smoothed: false,
            };
        }

        let concatenated = concatenate(answers);
        if !smooth || method == IntegrationMethod::Concatenate || answers.is_empty() {
            return Assembled {
                text: concatenated,
                smoothed: false,
            };
        }

        let request = CompletionRequest::new(
            PromptRole::Assemble,
            prompts::assemble_system(method),
            prompts::assemble_user(query_text, &concatenated),
        )
        .with_temperature(temperature)
        .with_max_tokens(self.config.max_tokens);

        match self.provider.complete(&request).await {
            Ok(text) if !text.trim().is_empty() => {
                debug!(tasks = answers.len(), ?method, "smoothed final answer");
                Assembled {
                    text: text.trim().to_string(),
                    smoothed: true,
                }
            }
            Ok(_) => {
                warn!("smoothing returned empty text; using concatenation");
                Assembled {
                    text: concatenated,
                    smoothed: false,
                }
            }
            Err(e) => {
                warn!(error = %e, "smoothing failed; using concatenation");
                Assembled {
                    text: concatenated,
                    smoothed: false,
                }
            }
        }
    }
}

/// `[T<n>: description]` sections in the given order
pub fn concatenate(answers: &[&Answer]) -> String {
    answers
        .iter()
        .map(|answer| {
            let mut section = format!(
                "[{}: {}]\n{}",
                answer.task_id, answer.description, answer.text
            );
            if !answer.sources.is_empty() {
                section.push_str("\nSources: ");
                section.push_str(&answer.sources.join(", "));
            }
            section
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// `[T<n>] text` lines for a dependent task's prompt
pub fn dependency_context(answers: &[&Answer]) -> String {
    answers
        .iter()
        .map(|answer| format!("[{}] {}", answer.task_id, answer.text))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AnswerStatus, TaskId};
    use std::sync::Mutex;

    struct Recording {
        response: std::result::Result<&'static str, &'static str>,
        requests: Mutex<Vec<CompletionRequest>>,
    }

    #[async_trait::async_trait]
    impl CompletionProvider for Recording {
        fn name(&self) -> &str {
            "recording"
        }

        async fn complete(&self, request: &CompletionRequest) -> Result<String> {
            self.requests.lock().unwrap().push(request.clone());
            self.response
                .map(str::to_string)
                .map_err(|e| RagError::Completion(e.to_string()))
        }
    }

    fn synthesizer(
        response: std::result::Result<&'static str, &'static str>,
    ) -> (AnswerSynthesizer, Arc<Recording>) {
        let provider = Arc::new(Recording {
            response,
            requests: Mutex::new(Vec::new()),
        });
        (
            AnswerSynthesizer::new(provider.clone(), SynthesisConfig::default()),
            provider,
        )
    }

    fn answer(id: usize, text: &str, sources: &[&str]) -> Answer {
        Answer {
            task_id: TaskId(id),
            description: format!("question {}", id),
            text: text.to_string(),
            sources: sources.iter().map(|s| s.to_string()).collect(),
            rounds_used: 1,
            assessment: None,
            status: AnswerStatus::Passed,
        }
    }

    #[tokio::test]
    async fn test_single_answer_passes_through() {
        let (s, provider) = synthesizer(Ok("smoothed"));
        let a = answer(1, "only answer", &["doc"]);
        let assembled = s.assemble("q", &[&a], IntegrationMethod::Synthesize, true, 0.3).await;
        assert_eq!(assembled.text, "only answer");
        assert!(!assembled.smoothed);
        assert!(provider.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_concatenate_has_provenance_and_no_call() {
        let (s, provider) = synthesizer(Ok("smoothed"));
        let (a, b) = (answer(1, "first", &["d1"]), answer(2, "second", &[]));
        let assembled = s.assemble("q", &[&a, &b], IntegrationMethod::Concatenate, true, 0.3).await;

        assert_eq!(
            assembled.text,
            "[T1: question 1]\nfirst\nSources: d1\n\n[T2: question 2]\nsecond"
        );
        assert!(provider.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_smoothing_pass() {
        let (s, provider) = synthesizer(Ok("merged [T1] [T2]"));
        let (a, b) = (answer(1, "first", &[]), answer(2, "second", &[]));
        let assembled = s.assemble("q", &[&a, &b], IntegrationMethod::Compare, true, 0.7).await;

        assert!(assembled.smoothed);
        assert_eq!(assembled.text, "merged [T1] [T2]");
        let requests = provider.requests.lock().unwrap();
        assert_eq!(requests[0].role, PromptRole::Assemble);
        assert_eq!(requests[0].system_prompt, prompts::ASSEMBLE_COMPARE_SYSTEM);
        assert_eq!(requests[0].temperature, 0.7);
    }

    #[tokio::test]
    async fn test_smoothing_disabled_or_failed_falls_back() {
        let (a, b) = (answer(1, "first", &[]), answer(2, "second", &[]));

        let (s, _) = synthesizer(Ok("merged"));
        let off = s.assemble("q", &[&a, &b], IntegrationMethod::Synthesize, false, 0.3).await;
        assert!(!off.smoothed);
        assert!(off.text.starts_with("[T1: question 1]"));

        let (s, _) = synthesizer(Err("down"));
        let failed = s.assemble("q", &[&a, &b], IntegrationMethod::Synthesize, true, 0.3).await;
        assert!(!failed.smoothed);
        assert_eq!(failed.text, concatenate(&[&a, &b]));
    }

    #[tokio::test]
    async fn test_draft_prompt_carries_context() {
        let (s, provider) = synthesizer(Ok("  Agentic RAG plans retrieval [doc-1]  "));
        let task = SubTask::whole_query(uuid::Uuid::new_v4(), "What is Agentic RAG?");
        let evidence = Evidence {
            text: "[doc-1] Agentic RAG adds planning".to_string(),
            passage_count: 1,
            estimated_tokens: 8,
            source_ids: vec!["doc-1".to_string()],
        };

        let draft = s.draft(&task, &evidence, "[T1] earlier", 0.3).await.unwrap();
        assert_eq!(draft, "Agentic RAG plans retrieval [doc-1]");

        let requests = provider.requests.lock().unwrap();
        assert!(requests[0].user_prompt.contains("[T1] earlier"));
        assert!(requests[0].user_prompt.contains("[doc-1] Agentic RAG adds planning"));
    }

    #[tokio::test]
    async fn test_empty_draft_is_error() {
        let (s, _) = synthesizer(Ok("   "));
        let task = SubTask::whole_query(uuid::Uuid::new_v4(), "q");
        assert!(s.draft(&task, &Evidence::default(), "", 0.3).await.is_err());
    }

    #[test]
    fn test_dependency_context_format() {
        let (a, b) = (answer(1, "alpha", &[]), answer(2, "beta", &[]));
        assert_eq!(dependency_context(&[&a, &b]), "[T1] alpha\n[T2] beta");
    }
}
