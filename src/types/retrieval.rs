//! Retrieval parameters and retrieved evidence

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Retrieval strategy label attached to each query type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalStrategy {
    /// High threshold, few results
    Precise,

    /// Meaning-oriented, medium threshold
    Semantic,

    /// Low threshold, many results
    Broad,

    /// Vector + keyword
    Hybrid,

    /// Wide first pass, narrowed by evaluation
    MultiStage,

    /// Query must be clarified first
    Clarify,
}

/// Concrete parameters for one retrieval round of one task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalConfig {
    pub strategy: RetrievalStrategy,

    /// Number of passages to request (> 0)
    pub top_k: usize,

    /// Minimum similarity [0.0, 1.0]
    pub similarity_threshold: f64,

    /// Round budget for the task
    pub max_rounds: u32,

    /// Round these parameters were produced for (1-based)
    pub round: u32,

    /// Planner flagged the query type for clarification
    pub clarify: bool,
}

/// A passage returned by the search capability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedPassage {
    pub source_id: String,
    pub text: String,

    /// Relevance score reported by search
    pub score: f64,

    /// Round the passage was retrieved in
    pub round: u32,
}

/// Passages for one task, deduplicated by source id keeping the highest score
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PassageSet {
    passages: BTreeMap<String, RetrievedPassage>,
}

impl PassageSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a passage; returns true when it was new or replaced a lower score
    pub fn insert(&mut self, passage: RetrievedPassage) -> bool {
        match self.passages.get(&passage.source_id) {
            Some(existing) if existing.score >= passage.score => false,
            _ => {
                self.passages.insert(passage.source_id.clone(), passage);
                true
            }
        }
    }

    /// Merge another batch into this set
    pub fn extend<I: IntoIterator<Item = RetrievedPassage>>(&mut self, passages: I) -> usize {
        passages
            .into_iter()
            .map(|p| self.insert(p))
            .filter(|changed| *changed)
            .count()
    }

    pub fn get(&self, source_id: &str) -> Option<&RetrievedPassage> {
        self.passages.get(source_id)
    }

    pub fn len(&self) -> usize {
        self.passages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }

    /// Passages by descending score, ties broken by source id
    pub fn ranked(&self) -> Vec<&RetrievedPassage> {
        let mut ranked: Vec<&RetrievedPassage> = self.passages.values().collect();
        ranked.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.source_id.cmp(&b.source_id))
        });
        ranked
    }

    /// Source ids in ranked order
    pub fn source_ids(&self) -> Vec<String> {
        self.ranked().into_iter().map(|p| p.source_id.clone()).collect()
    }
}
