//! Retrieval planning
//!
//! Maps a classification type to retrieval parameters and widens them on
//! each subsequent round of the same task.
//!
//! Guarantees:
//! - Total: every [`QueryType`] maps to a profile
//! - Pure: same (type, round) → identical [`RetrievalConfig`]
//! - Monotonic: top_k non-decreasing, threshold non-increasing across rounds

use crate::config::PlannerConfig;
use crate::errors::{RagError, Result};
use crate::types::{QueryType, RetrievalConfig, RetrievalStrategy};
use serde::{Deserialize, Serialize};

/// Conservative profile for a type with no usable table entry
pub const CONSERVATIVE_TOP_K: usize = 5;
pub const CONSERVATIVE_THRESHOLD: f64 = 0.7;

/// Round-1 retrieval parameters for one query type
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StrategyProfile {
    pub strategy: RetrievalStrategy,
    pub top_k: usize,
    pub similarity_threshold: f64,

    /// Route through the clarification flag
    #[serde(default)]
    pub clarify: bool,
}

impl StrategyProfile {
    pub fn new(strategy: RetrievalStrategy, top_k: usize, similarity_threshold: f64) -> Self {
        Self {
            strategy,
            top_k,
            similarity_threshold,
            clarify: strategy == RetrievalStrategy::Clarify,
        }
    }

    pub fn conservative() -> Self {
        Self::new(
            RetrievalStrategy::Semantic,
            CONSERVATIVE_TOP_K,
            CONSERVATIVE_THRESHOLD,
        )
    }

    /// Built-in table entry for a query type
    pub fn for_type(query_type: QueryType) -> Self {
        use RetrievalStrategy::*;

        match query_type {
            QueryType::Factual => Self::new(Precise, 3, 0.8),
            QueryType::Conceptual => Self::new(Semantic, 5, 0.7),
            QueryType::Procedural => Self::new(Broad, 7, 0.6),
            QueryType::Comparative => Self::new(Hybrid, 5, 0.7),
            QueryType::Analytical => Self::new(MultiStage, 10, 0.6),
            QueryType::MultiHop => Self::new(MultiStage, 5, 0.7),
            QueryType::Ambiguous => Self::new(Clarify, 5, 0.65),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.top_k == 0 {
            return Err(RagError::Config("profile top_k must be greater than 0".to_string()));
        }

        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(RagError::Config(
                "profile similarity_threshold must be between 0.0 and 1.0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Pure mapping from classification to per-round retrieval parameters
#[derive(Debug, Clone, Default)]
pub struct RetrievalPlanner {
    config: PlannerConfig,
}

impl RetrievalPlanner {
    pub fn new(config: PlannerConfig) -> Self {
        Self { config }
    }

    /// Profile for a type: configured override, then built-in table.
    /// An invalid override fails closed to the conservative profile.
    pub fn profile(&self, query_type: QueryType) -> StrategyProfile {
        let configured = self
            .config
            .profiles
            .iter()
            .find(|(label, _)| QueryType::parse(label) == Some(query_type))
            .map(|(_, profile)| *profile);

        match configured {
            Some(profile) if profile.validate().is_ok() => profile,
            Some(_) => StrategyProfile::conservative(),
            None => StrategyProfile::for_type(query_type),
        }
    }

    /// Round-1 parameters
    pub fn plan(&self, query_type: QueryType, max_rounds: u32) -> RetrievalConfig {
        self.plan_round(query_type, 1, max_rounds)
    }

    /// Parameters for a given 1-based round
    ///
    /// top_k(r) = min(cap, ⌈base × multiplier^(r-1)⌉), never below base
    /// thr(r)   = max(floor, base − decrement × (r-1)), never above base
    pub fn plan_round(&self, query_type: QueryType, round: u32, max_rounds: u32) -> RetrievalConfig {
        let profile = self.profile(query_type);
        let round = round.max(1);
        let steps = (round - 1) as i32;

        let widened = (profile.top_k as f64 * self.config.top_k_multiplier.max(1.0).powi(steps)).ceil();
        let top_k = if steps == 0 {
            profile.top_k
        } else {
            (widened as usize).min(self.config.top_k_cap).max(profile.top_k)
        };

        let lowered = profile.similarity_threshold - self.config.threshold_decrement * steps as f64;
        let similarity_threshold = if steps == 0 {
            profile.similarity_threshold
        } else {
            lowered
                .max(self.config.threshold_floor)
                .min(profile.similarity_threshold)
        };

        RetrievalConfig {
            strategy: profile.strategy,
            top_k,
            similarity_threshold,
            max_rounds,
            round,
            clarify: profile.clarify,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn planner() -> RetrievalPlanner {
        RetrievalPlanner::default()
    }

    #[test]
    fn test_table_is_total() {
        let p = planner();
        for query_type in QueryType::ALL {
            let config = p.plan(query_type, 3);
            assert!(config.top_k > 0);
            assert!((0.0..=1.0).contains(&config.similarity_threshold));
        }
    }

    #[test]
    fn test_documented_defaults() {
        let p = planner();

        let factual = p.plan(QueryType::Factual, 3);
        assert_eq!(factual.top_k, 3);
        assert!((factual.similarity_threshold - 0.8).abs() < 1e-9);

        let conceptual = p.plan(QueryType::Conceptual, 3);
        assert_eq!(conceptual.top_k, 5);
        assert!((conceptual.similarity_threshold - 0.7).abs() < 1e-9);

        let analytical = p.plan(QueryType::Analytical, 3);
        assert_eq!(analytical.top_k, 10);
        assert!((analytical.similarity_threshold - 0.6).abs() < 1e-9);

        let ambiguous = p.plan(QueryType::Ambiguous, 3);
        assert_eq!(ambiguous.top_k, 5);
        assert!((ambiguous.similarity_threshold - 0.65).abs() < 1e-9);
        assert!(ambiguous.clarify);
        assert!(!conceptual.clarify);
    }

    #[test]
    fn test_plan_is_idempotent() {
        let p = planner();
        for query_type in QueryType::ALL {
            for round in 1..=5 {
                assert_eq!(
                    p.plan_round(query_type, round, 5),
                    p.plan_round(query_type, round, 5)
                );
            }
        }
    }

    #[test]
    fn test_progressive_widening() {
        let p = planner();
        let r1 = p.plan_round(QueryType::Conceptual, 1, 3);
        let r2 = p.plan_round(QueryType::Conceptual, 2, 3);
        let r3 = p.plan_round(QueryType::Conceptual, 3, 3);

        assert_eq!(r2.top_k, 8);
        assert_eq!(r3.top_k, 12);
        assert!((r2.similarity_threshold - 0.65).abs() < 1e-9);
        assert!((r3.similarity_threshold - 0.6).abs() < 1e-9);
        assert!(r1.top_k <= r2.top_k && r2.top_k <= r3.top_k);
    }

    #[test]
    fn test_widening_is_monotonic_and_bounded() {
        let p = planner();
        for query_type in QueryType::ALL {
            let mut previous = p.plan_round(query_type, 1, 20);
            for round in 2..=20 {
                let next = p.plan_round(query_type, round, 20);
                assert!(next.top_k >= previous.top_k);
                assert!(next.similarity_threshold <= previous.similarity_threshold);
                assert!(next.top_k <= 20.max(previous.top_k));
                assert!(next.similarity_threshold >= 0.3 - 1e-9);
                previous = next;
            }
        }
    }

    #[test]
    fn test_cap_and_floor() {
        let p = planner();
        let late = p.plan_round(QueryType::Analytical, 10, 10);
        assert_eq!(late.top_k, 20);
        assert!((late.similarity_threshold - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_base_above_cap_is_kept() {
        let mut config = PlannerConfig::default();
        config.top_k_cap = 4;
        let p = RetrievalPlanner::new(config);
        assert_eq!(p.plan_round(QueryType::Analytical, 3, 3).top_k, 10);
    }

    #[test]
    fn test_configured_override_and_fail_closed() {
        let mut config = PlannerConfig::default();
        config.profiles.insert(
            "factual".to_string(),
            StrategyProfile::new(RetrievalStrategy::Precise, 2, 0.9),
        );
        config.profiles.insert(
            "procedural".to_string(),
            StrategyProfile::new(RetrievalStrategy::Broad, 0, 0.5),
        );
        let p = RetrievalPlanner::new(config);

        assert_eq!(p.plan(QueryType::Factual, 3).top_k, 2);

        let procedural = p.plan(QueryType::Procedural, 3);
        assert_eq!(procedural.top_k, CONSERVATIVE_TOP_K);
        assert!((procedural.similarity_threshold - CONSERVATIVE_THRESHOLD).abs() < 1e-9);
    }
}
