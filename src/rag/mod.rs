// Retrieval, evidence assembly and answer synthesis
//
// Components:
// - Executor: one search call per round, merged into the task's passages
// - Retry: bounded exponential backoff around search calls
// - Context: token-bounded evidence block for prompts
// - Synthesis: per-task drafts and cross-task assembly

pub mod context;
pub mod executor;
pub mod retry;
pub mod synthesis;

// Re-export key types
pub use context::{Evidence, EvidenceBuilder};
pub use executor::{RetrievalExecutor, RoundRetrieval};
pub use retry::RetryPolicy;
pub use synthesis::{AnswerSynthesizer, Assembled};
