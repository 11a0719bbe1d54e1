//! Agent orchestration module
//!
//! Query and task state machines, the dependency ledger, the per-task
//! round loop and the orchestrator that ties them together.

pub mod ledger;
pub mod orchestrator;
pub mod pipeline;
pub mod state;

// Re-export commonly used types
pub use ledger::{Slot, TaskLedger};
pub use orchestrator::AgenticOrchestrator;
pub use pipeline::{TaskOutcome, TaskPipeline, TaskSettings};
pub use state::{QueryPhase, TaskEvent, TaskState};
