//! Search capability
//!
//! The engine consumes the vector index only through [`SearchProvider`].
//! Implementations must be idempotent for identical requests within the
//! index's freshness window.

pub mod http;
pub mod memory;

use crate::errors::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub use http::HttpSearchClient;
pub use memory::{CorpusDocument, InMemoryIndex};

/// Parameters for one search call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    pub top_k: usize,
    pub similarity_threshold: f64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub filters: BTreeMap<String, String>,
}

/// One ranked search result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub source_id: String,
    pub text: String,
    pub score: f64,
}

/// Ranked passage search backend
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Provider name for logging
    fn name(&self) -> &str;

    /// Return hits ordered by descending score
    async fn search(&self, request: &SearchRequest) -> Result<Vec<SearchHit>>;
}
