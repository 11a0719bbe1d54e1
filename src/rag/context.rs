//! Evidence assembly for synthesis and evaluation prompts
use serde::{Deserialize, Serialize};

use crate::types::PassageSet;

/// Rough token estimate (~4 chars per token)
pub fn estimate_tokens(text: &str) -> usize {
    text.len().div_ceil(4)
}

/// Evidence block ready to embed in a prompt
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Evidence {
    /// The formatted evidence text
    pub text: String,
    /// Number of passages included
    pub passage_count: usize,
    /// Estimated token count
    pub estimated_tokens: usize,
    /// Source ids included, in ranked order
    pub source_ids: Vec<String>,
}

impl Evidence {
    pub fn is_empty(&self) -> bool {
        self.passage_count == 0
    }
}

/// Builds a token-bounded evidence block from a task's passages
#[derive(Debug, Clone)]
pub struct EvidenceBuilder {
    max_context_tokens: usize,
}

impl EvidenceBuilder {
    pub fn new(max_context_tokens: usize) -> Self {
        Self { max_context_tokens }
    }

    /// Highest-scoring passages first until the budget is spent.
    /// The top passage is always included, truncated if it alone exceeds
    /// the budget.
    pub fn build(&self, passages: &PassageSet) -> Evidence {
        let mut parts = Vec::new();
        let mut source_ids = Vec::new();
        let mut total_tokens = 0;

        for passage in passages.ranked() {
            let tokens = estimate_tokens(&passage.text);

            let content = if total_tokens + tokens > self.max_context_tokens {
                if !parts.is_empty() {
                    break;
                }
                truncate_chars(&passage.text, self.max_context_tokens * 4)
            } else {
                passage.text.as_str()
            };

            parts.push(format!(
                "[{}] (score: {:.2})\n{}",
                passage.source_id, passage.score, content
            ));
            total_tokens += estimate_tokens(content);
            source_ids.push(passage.source_id.clone());
        }

        if parts.is_empty() {
            return Evidence::default();
        }

        Evidence {
            text: format!(
                "Retrieved evidence ({} passages):\n\n{}\n",
                parts.len(),
                parts.join("\n\n")
            ),
            passage_count: parts.len(),
            estimated_tokens: total_tokens,
            source_ids,
        }
    }
}

impl Default for EvidenceBuilder {
    fn default() -> Self {
        Self::new(3000)
    }
}

fn truncate_chars(text: &str, max_bytes: usize) -> &str {
    if text.len() <= max_bytes {
        return text;
    }
    let mut end = max_bytes;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RetrievedPassage;

    fn passages(items: &[(&str, &str, f64)]) -> PassageSet {
        let mut set = PassageSet::new();
        for (id, text, score) in items {
            set.insert(RetrievedPassage {
                source_id: id.to_string(),
                text: text.to_string(),
                score: *score,
                round: 1,
            });
        }
        set
    }

    #[test]
    fn test_ranked_and_tagged() {
        let set = passages(&[("low", "beta", 0.4), ("high", "alpha", 0.9)]);
        let evidence = EvidenceBuilder::default().build(&set);

        assert_eq!(evidence.source_ids, vec!["high", "low"]);
        assert!(evidence.text.contains("[high] (score: 0.90)"));
        assert!(evidence.text.find("[high]") < evidence.text.find("[low]"));
    }

    #[test]
    fn test_budget_limits_passages() {
        let long = "x".repeat(400);
        let set = passages(&[("a", &long, 0.9), ("b", &long, 0.8)]);
        let evidence = EvidenceBuilder::new(150).build(&set);
        assert_eq!(evidence.passage_count, 1);
        assert_eq!(evidence.source_ids, vec!["a"]);
    }

    #[test]
    fn test_oversized_top_passage_is_truncated() {
        let long = "é".repeat(100);
        let set = passages(&[("a", &long, 0.9)]);
        let evidence = EvidenceBuilder::new(5).build(&set);
        assert_eq!(evidence.passage_count, 1);
        assert!(evidence.estimated_tokens <= 5);
    }

    #[test]
    fn test_empty_set() {
        let evidence = EvidenceBuilder::default().build(&PassageSet::new());
        assert!(evidence.is_empty());
        assert!(evidence.text.is_empty());
    }
}
