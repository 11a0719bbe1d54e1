//! Query analysis and retrieval planning
//!
//! Classification, decomposition into a dependency DAG, and the pure
//! type-to-parameters planner with progressive widening.

pub mod classifier;
pub mod complexity;
pub mod dag;
pub mod decomposer;
pub mod planner;

// Re-export commonly used types
pub use classifier::QueryClassifier;
pub use complexity::ComplexityEstimator;
pub use dag::TaskGraph;
pub use decomposer::{Decomposition, TaskDecomposer};
pub use planner::{RetrievalPlanner, StrategyProfile};
