//! Completion capability
//!
//! The engine consumes a language model only through [`CompletionProvider`].
//! [`OllamaCompletion`] is the bundled HTTP implementation; tests plug in
//! scripted providers.

pub mod client;
pub mod parser;
pub mod prompts;

use crate::errors::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use client::OllamaCompletion;
pub use parser::{extract_json_object, JsonExtractor};

/// Which pipeline stage issued a completion request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptRole {
    Classify,
    Decompose,
    Synthesize,
    Evaluate,
    Assemble,
}

/// A single completion call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub role: PromptRole,
    pub system_prompt: String,
    pub user_prompt: String,
    pub temperature: f64,
    pub max_tokens: u32,
}

impl CompletionRequest {
    pub fn new(role: PromptRole, system_prompt: impl Into<String>, user_prompt: impl Into<String>) -> Self {
        Self {
            role,
            system_prompt: system_prompt.into(),
            user_prompt: user_prompt.into(),
            temperature: 0.3,
            max_tokens: 1024,
        }
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// Language-model completion backend
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Provider name for logging
    fn name(&self) -> &str;

    /// Return the final assembled completion text
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;
}
