//! In-process index over a small JSON corpus
//!
//! Scores a document by the fraction of distinct query terms it contains,
//! so scores stay in [0.0, 1.0] and identical requests give identical hits.

use crate::errors::{RagError, Result};
use crate::search::{SearchHit, SearchProvider, SearchRequest};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "do", "does", "for", "from", "how", "in",
    "is", "it", "of", "on", "or", "the", "to", "what", "which", "who", "why", "with",
];

/// One corpus entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorpusDocument {
    pub source_id: String,
    pub text: String,

    /// Matched against request filters
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

/// Term-overlap search over an in-memory corpus
#[derive(Debug, Clone, Default)]
pub struct InMemoryIndex {
    documents: Vec<(CorpusDocument, HashSet<String>)>,
}

impl InMemoryIndex {
    pub fn new(documents: Vec<CorpusDocument>) -> Self {
        let documents = documents
            .into_iter()
            .map(|doc| {
                let terms = tokenize(&doc.text);
                (doc, terms)
            })
            .collect();

        Self { documents }
    }

    /// Load a JSON array of [`CorpusDocument`]
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let documents: Vec<CorpusDocument> = serde_json::from_str(&contents)
            .map_err(|e| RagError::Config(format!("Invalid corpus {}: {}", path.display(), e)))?;
        Ok(Self::new(documents))
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    fn matches_filters(doc: &CorpusDocument, filters: &BTreeMap<String, String>) -> bool {
        filters
            .iter()
            .all(|(key, value)| doc.metadata.get(key) == Some(value))
    }
}

fn tokenize(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() >= 2 && !STOPWORDS.contains(t))
        .map(str::to_string)
        .collect()
}

#[async_trait]
impl SearchProvider for InMemoryIndex {
    fn name(&self) -> &str {
        "in-memory"
    }

    async fn search(&self, request: &SearchRequest) -> Result<Vec<SearchHit>> {
        let query_terms = tokenize(&request.query);
        if query_terms.is_empty() || request.top_k == 0 {
            return Ok(Vec::new());
        }

        let mut hits: Vec<SearchHit> = self
            .documents
            .iter()
            .filter(|(doc, _)| Self::matches_filters(doc, &request.filters))
            .filter_map(|(doc, terms)| {
                let overlap = query_terms.intersection(terms).count();
                let score = overlap as f64 / query_terms.len() as f64;
                (overlap > 0 && score >= request.similarity_threshold).then(|| SearchHit {
                    source_id: doc.source_id.clone(),
                    text: doc.text.clone(),
                    score,
                })
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.source_id.cmp(&b.source_id))
        });
        hits.truncate(request.top_k);

        Ok(hits)
    }
}
