//! Answer quality assurance
//! Rubric scoring that drives the self-reflection loop

pub mod evaluator;

pub use evaluator::QualityEvaluator;
