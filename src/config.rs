//! Configuration management
//!
//! Three layers:
//! - [`AgenticConfig`]: the per-call surface passed to `answer()`
//! - [`EngineConfig`]: tuning knobs for each pipeline component
//! - [`Settings`]: the TOML file, default `~/.agentic-rag/config.toml`

use crate::errors::{RagError, Result};
use crate::planning::planner::StrategyProfile;
use crate::rag::retry::RetryPolicy;
use crate::types::{QualityWeights, QueryType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Caller-facing configuration for one `answer()` call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgenticConfig {
    pub max_retrieval_rounds: u32,
    pub quality_threshold: f64,
    pub enable_task_decomposition: bool,
    pub enable_self_reflection: bool,

    /// Accepted for compatibility; no tools are registered with the engine
    pub enable_tool_use: bool,

    pub default_temperature: f64,
    pub reasoning_temperature: f64,

    /// Smooth multi-task answers with one extra model call
    pub enable_final_synthesis: bool,

    /// Forwarded verbatim to the search capability
    pub search_filters: BTreeMap<String, String>,
}

impl Default for AgenticConfig {
    fn default() -> Self {
        Self {
            max_retrieval_rounds: 3,
            quality_threshold: 0.6,
            enable_task_decomposition: true,
            enable_self_reflection: true,
            enable_tool_use: false,
            default_temperature: 0.3,
            reasoning_temperature: 0.7,
            enable_final_synthesis: true,
            search_filters: BTreeMap::new(),
        }
    }
}

impl AgenticConfig {
    /// Validate caller input; failures are `InvalidInput`
    pub fn validate(&self) -> Result<()> {
        if self.max_retrieval_rounds == 0 {
            return Err(RagError::InvalidInput(
                "max_retrieval_rounds must be at least 1".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.quality_threshold) {
            return Err(RagError::InvalidInput(
                "quality_threshold must be between 0.0 and 1.0".to_string(),
            ));
        }

        for (name, value) in [
            ("default_temperature", self.default_temperature),
            ("reasoning_temperature", self.reasoning_temperature),
        ] {
            if !(0.0..=2.0).contains(&value) {
                return Err(RagError::InvalidInput(format!(
                    "{} must be between 0.0 and 2.0",
                    name
                )));
            }
        }

        Ok(())
    }

    /// Temperature for answering a task of the given type
    pub fn temperature_for(&self, query_type: QueryType) -> f64 {
        if query_type.needs_reasoning() {
            self.reasoning_temperature
        } else {
            self.default_temperature
        }
    }
}

/// Query classifier settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Confidence below this routes to clarification
    pub clarification_threshold: f64,
    pub temperature: f64,
    pub max_tokens: u32,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            clarification_threshold: 0.4,
            temperature: 0.1,
            max_tokens: 256,
        }
    }
}

/// Task decomposer settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecomposerConfig {
    /// Minimum classification confidence to decompose
    pub decomposition_threshold: f64,

    /// Minimum heuristic complexity for Analytical queries
    pub complexity_threshold: f64,

    /// Fan-out cap; extra sub-tasks merge into the last one
    pub max_subtasks: usize,

    pub temperature: f64,
    pub max_tokens: u32,
}

impl Default for DecomposerConfig {
    fn default() -> Self {
        Self {
            decomposition_threshold: 0.5,
            complexity_threshold: 0.3,
            max_subtasks: 8,
            temperature: 0.3,
            max_tokens: 1024,
        }
    }
}

/// Retrieval planner settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    pub top_k_multiplier: f64,
    pub top_k_cap: usize,
    pub threshold_decrement: f64,
    pub threshold_floor: f64,

    /// Per-type overrides keyed by type label (e.g. `multi_hop`)
    pub profiles: BTreeMap<String, StrategyProfile>,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            top_k_multiplier: 1.5,
            top_k_cap: 20,
            threshold_decrement: 0.05,
            threshold_floor: 0.3,
            profiles: BTreeMap::new(),
        }
    }
}

/// Retrieval executor settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Retries after the first failed search call
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter: bool,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay_ms: 200,
            max_delay_ms: 2000,
            jitter: true,
        }
    }
}

/// Quality evaluator settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluatorConfig {
    pub weights: QualityWeights,
    pub temperature: f64,
    pub max_tokens: u32,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            weights: QualityWeights::default(),
            temperature: 0.2,
            max_tokens: 512,
        }
    }
}

/// Draft and final answer synthesis settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisConfig {
    pub max_tokens: u32,

    /// Evidence budget per draft prompt (~4 chars per token)
    pub max_context_tokens: usize,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            max_tokens: 1024,
            max_context_tokens: 3000,
        }
    }
}

/// Sub-task scheduling settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Maximum concurrently running tasks
    pub worker_limit: usize,

    /// Task timeout = max_rounds × this
    pub per_round_timeout_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            worker_limit: 4,
            per_round_timeout_secs: 60,
        }
    }
}

impl SchedulerConfig {
    pub fn task_timeout(&self, max_rounds: u32) -> Duration {
        Duration::from_secs(self.per_round_timeout_secs.saturating_mul(max_rounds as u64))
    }
}

/// All component settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub classifier: ClassifierConfig,
    pub decomposer: DecomposerConfig,
    pub planner: PlannerConfig,
    pub executor: ExecutorConfig,
    pub evaluator: EvaluatorConfig,
    pub synthesis: SynthesisConfig,
    pub scheduler: SchedulerConfig,
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        let unit = |name: &str, v: f64| -> Result<()> {
            if (0.0..=1.0).contains(&v) {
                Ok(())
            } else {
                Err(RagError::Config(format!("{} must be between 0.0 and 1.0", name)))
            }
        };

        unit("clarification_threshold", self.classifier.clarification_threshold)?;
        unit("decomposition_threshold", self.decomposer.decomposition_threshold)?;
        unit("complexity_threshold", self.decomposer.complexity_threshold)?;
        unit("threshold_floor", self.planner.threshold_floor)?;
        unit("threshold_decrement", self.planner.threshold_decrement)?;

        if self.decomposer.max_subtasks == 0 {
            return Err(RagError::Config("max_subtasks must be greater than 0".to_string()));
        }

        if self.planner.top_k_multiplier < 1.0 {
            return Err(RagError::Config("top_k_multiplier must be at least 1.0".to_string()));
        }

        if self.planner.top_k_cap == 0 {
            return Err(RagError::Config("top_k_cap must be greater than 0".to_string()));
        }

        for (label, profile) in &self.planner.profiles {
            if QueryType::parse(label).is_none() {
                return Err(RagError::Config(format!("Unknown query type in profiles: {}", label)));
            }
            profile.validate()?;
        }

        if self.scheduler.worker_limit == 0 {
            return Err(RagError::Config("worker_limit must be greater than 0".to_string()));
        }

        if self.executor.base_delay_ms > self.executor.max_delay_ms {
            return Err(RagError::Config("base_delay_ms must not exceed max_delay_ms".to_string()));
        }

        let retry_wait = RetryPolicy::from_config(&self.executor).max_total_wait_time();
        if retry_wait >= Duration::from_secs(self.scheduler.per_round_timeout_secs) {
            return Err(RagError::Config(format!(
                "retry backoff ({}ms) must fit within per_round_timeout_secs ({}s)",
                retry_wait.as_millis(),
                self.scheduler.per_round_timeout_secs
            )));
        }

        Ok(())
    }
}

/// Ollama connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaSettings {
    pub host: String,
    pub port: u16,
    pub model: String,
    pub timeout_secs: u64,
}

impl Default for OllamaSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 11434,
            model: "qwen2.5:7b-instruct".to_string(),
            timeout_secs: 120,
        }
    }
}

/// Search capability settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    /// HTTP search endpoint
    pub endpoint: Option<String>,

    /// Local JSON corpus served by the in-memory index
    pub corpus: Option<PathBuf>,

    pub timeout_secs: Option<u64>,
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default filter when RUST_LOG is unset
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

/// Complete file configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub ollama: OllamaSettings,
    pub search: SearchSettings,
    pub agent: AgenticConfig,
    pub engine: EngineConfig,
    pub logging: LoggingSettings,
}

impl Settings {
    /// Load settings from file or use defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from_file(path),
            None => Self::load_default(),
        }
    }

    /// Load settings from a specific file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| RagError::Config(format!("Failed to read config: {}", e)))?;

        let settings: Settings = toml::from_str(&contents)
            .map_err(|e| RagError::Config(format!("Failed to parse config: {}", e)))?;

        settings.validate()?;
        Ok(settings)
    }

    /// Load from the standard location, falling back to built-in defaults
    pub fn load_default() -> Result<Self> {
        if let Some(path) = Self::default_path() {
            if path.exists() {
                return Self::load_from_file(&path);
            }
        }

        Ok(Settings::default())
    }

    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".agentic-rag").join("config.toml"))
    }

    pub fn validate(&self) -> Result<()> {
        self.agent
            .validate()
            .map_err(|e| RagError::Config(e.to_string()))?;
        self.engine.validate()?;

        if self.ollama.model.trim().is_empty() {
            return Err(RagError::Config("ollama.model must not be empty".to_string()));
        }

        if self.search.endpoint.is_some() && self.search.corpus.is_some() {
            return Err(RagError::Config(
                "search.endpoint and search.corpus are mutually exclusive".to_string(),
            ));
        }

        Ok(())
    }

    /// Save settings to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = self.to_toml()?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| RagError::Config(format!("Failed to create config dir: {}", e)))?;
        }

        std::fs::write(path, contents)
            .map_err(|e| RagError::Config(format!("Failed to write config: {}", e)))?;

        Ok(())
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| RagError::Config(format!("Failed to serialize config: {}", e)))
    }

    pub fn ollama_url(&self) -> String {
        format!("http://{}:{}", self.ollama.host, self.ollama.port)
    }
}
