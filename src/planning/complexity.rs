//! Complexity estimation for incoming queries
//!
//! Multi-factor keyword heuristics with guarantees:
//! - Bounded output: [0.0, 1.0]
//! - Monotonic in the number of clauses and analysis cues
//! - Deterministic: same text → same score

/// Complexity estimator with 5-factor weighted scoring
#[derive(Debug, Clone)]
pub struct ComplexityEstimator {
    /// Weight for clause count factor (0.25)
    weight_clauses: f64,

    /// Weight for analysis vocabulary factor (0.25)
    weight_analysis: f64,

    /// Weight for comparison factor (0.20)
    weight_comparison: f64,

    /// Weight for enumeration factor (0.15)
    weight_enumeration: f64,

    /// Weight for length factor (0.15)
    weight_length: f64,
}

impl ComplexityEstimator {
    /// Create new estimator with standard weights
    pub fn new() -> Self {
        Self {
            weight_clauses: 0.25,
            weight_analysis: 0.25,
            weight_comparison: 0.20,
            weight_enumeration: 0.15,
            weight_length: 0.15,
        }
    }

    /// Estimate complexity of a query
    ///
    /// Formula:
    /// complexity = 0.25 × clauses + 0.25 × analysis + 0.20 × comparison
    ///            + 0.15 × enumeration + 0.15 × length
    pub fn estimate(&self, query: &str) -> f64 {
        let lower = query.to_lowercase();

        let complexity = self.weight_clauses * self.estimate_clauses(&lower)
            + self.weight_analysis * self.estimate_analysis(&lower)
            + self.weight_comparison * self.estimate_comparison(&lower)
            + self.weight_enumeration * self.estimate_enumeration(&lower)
            + self.weight_length * self.estimate_length(query);

        complexity.clamp(0.0, 1.0)
    }

    /// Count of coordinated clauses and questions, normalized with max=4
    fn estimate_clauses(&self, lower: &str) -> f64 {
        let connectors = [" and ", " then ", " after ", " as well as ", "; "];
        let mut count = connectors
            .iter()
            .map(|c| lower.matches(c).count())
            .sum::<usize>();

        count += lower.matches('?').count().saturating_sub(1);
        count += lower.matches(", ").count() / 2;

        (count as f64 / 4.0).min(1.0)
    }

    /// Vocabulary that signals reasoning rather than lookup
    fn estimate_analysis(&self, lower: &str) -> f64 {
        let cues = [
            "analy", "evaluate", "assess", "recommend", "trade-off", "tradeoff", "implication",
            "impact", "why", "strength", "weakness", "pros and cons", "justify",
        ];
        let hits = cues.iter().filter(|cue| lower.contains(*cue)).count();
        (hits as f64 / 3.0).min(1.0)
    }

    fn estimate_comparison(&self, lower: &str) -> f64 {
        let cues = ["compare", "comparison", " versus ", " vs ", " vs. ", "difference", "better than", "contrast"];
        if cues.iter().any(|cue| lower.contains(cue)) {
            1.0
        } else {
            0.0
        }
    }

    /// Explicit multi-part requests ("three dimensions", "each", "all")
    fn estimate_enumeration(&self, lower: &str) -> f64 {
        let numbers = ["two ", "three ", "four ", "five ", "several ", "multiple ", "each ", "every "];
        let hits = numbers.iter().filter(|n| lower.contains(*n)).count()
            + lower
                .split_whitespace()
                .filter(|w| w.chars().all(|c| c.is_ascii_digit()) && !w.is_empty())
                .count();
        (hits as f64 / 2.0).min(1.0)
    }

    /// Long queries tend to bundle several needs; saturates at 40 words
    fn estimate_length(&self, query: &str) -> f64 {
        (query.split_whitespace().count() as f64 / 40.0).min(1.0)
    }
}

impl Default for ComplexityEstimator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weights_sum_to_one() {
        let e = ComplexityEstimator::new();
        let total = e.weight_clauses
            + e.weight_analysis
            + e.weight_comparison
            + e.weight_enumeration
            + e.weight_length;
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_simple_query_is_low() {
        let score = ComplexityEstimator::new().estimate("What is Agentic RAG?");
        assert!(score < 0.3, "score was {}", score);
    }

    #[test]
    fn test_complex_query_is_high() {
        let score = ComplexityEstimator::new().estimate(
            "Compare Agentic RAG and traditional RAG across three dimensions and recommend one for enterprise knowledge management",
        );
        assert!(score >= 0.5, "score was {}", score);
    }

    #[test]
    fn test_bounds() {
        let e = ComplexityEstimator::new();
        for q in [
            "",
            "why",
            "Analyze, evaluate and assess and compare versus and then and after each every 1 2 3 4 5",
        ] {
            let score = e.estimate(q);
            assert!((0.0..=1.0).contains(&score));
        }
    }

    #[test]
    fn test_more_clauses_never_lower() {
        let e = ComplexityEstimator::new();
        let one = e.estimate("Explain caching");
        let two = e.estimate("Explain caching and then explain eviction");
        assert!(two >= one);
    }
}
