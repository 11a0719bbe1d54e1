//! Scripted providers shared by the integration tests

#![allow(dead_code)]

use agentic_rag::{
    config::EngineConfig,
    llm::{CompletionProvider, CompletionRequest, PromptRole},
    search::{SearchHit, SearchProvider, SearchRequest},
    RagError, Result,
};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Engine settings with millisecond retry delays
pub fn fast_engine() -> EngineConfig {
    let mut engine = EngineConfig::default();
    engine.executor.base_delay_ms = 1;
    engine.executor.max_delay_ms = 2;
    engine.executor.jitter = false;
    engine
}

#[derive(Default)]
struct Script {
    /// (role, needle in user prompt, response); first match wins
    rules: Vec<(PromptRole, String, String)>,
    queues: HashMap<PromptRole, VecDeque<String>>,
    defaults: HashMap<PromptRole, String>,
    stalled: Vec<PromptRole>,
    requests: Vec<CompletionRequest>,
}

/// Completion provider answering by prompt role
#[derive(Default)]
pub struct ScriptedCompletion {
    script: Mutex<Script>,
}

impl ScriptedCompletion {
    pub fn new() -> Self {
        Self::default()
    }

    /// Response used when nothing more specific matches
    pub fn reply(self, role: PromptRole, response: &str) -> Self {
        self.script
            .lock()
            .unwrap()
            .defaults
            .insert(role, response.to_string());
        self
    }

    /// Responses consumed one per call, before the default
    pub fn queue(self, role: PromptRole, responses: &[&str]) -> Self {
        self.script
            .lock()
            .unwrap()
            .queues
            .entry(role)
            .or_default()
            .extend(responses.iter().map(|r| r.to_string()));
        self
    }

    /// Response for requests whose user prompt contains `needle`
    pub fn when(self, role: PromptRole, needle: &str, response: &str) -> Self {
        self.script
            .lock()
            .unwrap()
            .rules
            .push((role, needle.to_string(), response.to_string()));
        self
    }

    /// Calls for `role` never return
    pub fn stall(self, role: PromptRole) -> Self {
        self.script.lock().unwrap().stalled.push(role);
        self
    }

    pub fn calls(&self, role: PromptRole) -> usize {
        self.requests(role).len()
    }

    pub fn requests(&self, role: PromptRole) -> Vec<CompletionRequest> {
        self.script
            .lock()
            .unwrap()
            .requests
            .iter()
            .filter(|r| r.role == role)
            .cloned()
            .collect()
    }

    fn respond(&self, request: &CompletionRequest) -> Option<Result<String>> {
        let mut script = self.script.lock().unwrap();
        script.requests.push(request.clone());

        if script.stalled.contains(&request.role) {
            return None;
        }

        let ruled = script
            .rules
            .iter()
            .find(|(role, needle, _)| *role == request.role && request.user_prompt.contains(needle))
            .map(|(_, _, response)| response.clone());
        if let Some(response) = ruled {
            return Some(Ok(response));
        }

        if let Some(response) = script
            .queues
            .get_mut(&request.role)
            .and_then(|q| q.pop_front())
        {
            return Some(Ok(response));
        }

        Some(
            script
                .defaults
                .get(&request.role)
                .cloned()
                .ok_or_else(|| RagError::Completion(format!("no script for {:?}", request.role))),
        )
    }
}

#[async_trait]
impl CompletionProvider for ScriptedCompletion {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        match self.respond(request) {
            Some(result) => result,
            None => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(RagError::Completion("stalled".to_string()))
            }
        }
    }
}

/// Search provider returning the same hits for every request
#[derive(Default)]
pub struct ScriptedSearch {
    hits: Vec<SearchHit>,
    calls: AtomicUsize,
    requests: Mutex<Vec<SearchRequest>>,
}

impl ScriptedSearch {
    pub fn with_hits(hits: &[(&str, &str, f64)]) -> Self {
        Self {
            hits: hits
                .iter()
                .map(|(id, text, score)| SearchHit {
                    source_id: id.to_string(),
                    text: text.to_string(),
                    score: *score,
                })
                .collect(),
            ..Default::default()
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<SearchRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl SearchProvider for ScriptedSearch {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn search(&self, request: &SearchRequest) -> Result<Vec<SearchHit>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        Ok(self.hits.iter().take(request.top_k).cloned().collect())
    }
}

/// Search provider that is never reachable
#[derive(Default)]
pub struct DownSearch {
    calls: AtomicUsize,
}

impl DownSearch {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SearchProvider for DownSearch {
    fn name(&self) -> &str {
        "down"
    }

    async fn search(&self, _request: &SearchRequest) -> Result<Vec<SearchHit>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(RagError::Search("connection refused".to_string()))
    }
}

pub fn evaluation(score: f64) -> String {
    format!(
        r#"{{"relevance": {s}, "completeness": {s}, "accuracy": {s}, "clarity": {s}, "missing_info": [], "suggestions": [], "new_query": ""}}"#,
        s = score
    )
}

pub fn classification(query_type: &str, confidence: f64) -> String {
    format!(
        r#"{{"query_type": "{}", "confidence": {}, "clarification_question": ""}}"#,
        query_type, confidence
    )
}

pub fn shared<T>(value: T) -> Arc<T> {
    Arc::new(value)
}
