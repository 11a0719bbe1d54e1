//! Retrieval rounds against the search capability
//!
//! One search call per round (plus retries), results merged into the
//! task's [`PassageSet`] with keep-max-score deduplication.

use crate::errors::{RagError, Result};
use crate::rag::retry::RetryPolicy;
use crate::search::{SearchProvider, SearchRequest};
use crate::types::{PassageSet, RetrievalConfig, RetrievedPassage, SubTask};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// What one round contributed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundRetrieval {
    /// Hits returned by search (after top_k truncation)
    pub hits: usize,

    /// Passages that were new or raised an existing score
    pub changed: usize,
}

/// Drives search calls for tasks
#[derive(Clone)]
pub struct RetrievalExecutor {
    search: Arc<dyn SearchProvider>,
    retry: RetryPolicy,
    filters: BTreeMap<String, String>,
}

impl RetrievalExecutor {
    pub fn new(search: Arc<dyn SearchProvider>, retry: RetryPolicy) -> Self {
        Self {
            search,
            retry,
            filters: BTreeMap::new(),
        }
    }

    pub fn with_filters(mut self, filters: BTreeMap<String, String>) -> Self {
        self.filters = filters;
        self
    }

    /// Run one retrieval round for `task`, merging into `passages`
    ///
    /// `query_text` is the task description or a refined query suggested by
    /// the previous evaluation. Fails with
    /// [`RagError::RetrievalUnavailable`] once retries are exhausted.
    pub async fn retrieve(
        &self,
        task: &SubTask,
        query_text: &str,
        config: &RetrievalConfig,
        passages: &mut PassageSet,
    ) -> Result<RoundRetrieval> {
        let request = SearchRequest {
            query: query_text.to_string(),
            top_k: config.top_k,
            similarity_threshold: config.similarity_threshold,
            filters: self.filters.clone(),
        };

        let hits = self
            .retry
            .execute(|| self.search.search(&request))
            .await
            .map_err(|failure| {
                warn!(
                    task = %task.id,
                    provider = self.search.name(),
                    attempts = failure.attempts,
                    error = %failure.last_error,
                    "search unavailable"
                );
                RagError::RetrievalUnavailable {
                    attempts: failure.attempts,
                    last_error: failure.last_error.to_string(),
                }
            })?;

        let batch: Vec<RetrievedPassage> = hits
            .into_iter()
            .filter(|hit| !hit.source_id.is_empty())
            .take(config.top_k)
            .map(|hit| RetrievedPassage {
                source_id: hit.source_id,
                text: hit.text,
                score: if hit.score.is_finite() { hit.score } else { 0.0 },
                round: config.round,
            })
            .collect();

        let hits = batch.len();
        let changed = passages.extend(batch);

        debug!(
            task = %task.id,
            round = config.round,
            top_k = config.top_k,
            threshold = config.similarity_threshold,
            hits,
            changed,
            total = passages.len(),
            "retrieval round complete"
        );

        Ok(RoundRetrieval { hits, changed })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExecutorConfig;
    use crate::search::SearchHit;
    use crate::types::RetrievalStrategy;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use uuid::Uuid;

    struct Scripted {
        rounds: Mutex<Vec<Vec<SearchHit>>>,
        requests: Mutex<Vec<SearchRequest>>,
    }

    #[async_trait]
    impl SearchProvider for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn search(&self, request: &SearchRequest) -> Result<Vec<SearchHit>> {
            self.requests.lock().unwrap().push(request.clone());
            let mut rounds = self.rounds.lock().unwrap();
            Ok(if rounds.is_empty() { Vec::new() } else { rounds.remove(0) })
        }
    }

    struct Down(AtomicU32);

    #[async_trait]
    impl SearchProvider for Down {
        fn name(&self) -> &str {
            "down"
        }

        async fn search(&self, _request: &SearchRequest) -> Result<Vec<SearchHit>> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Err(RagError::Search("connection refused".to_string()))
        }
    }

    fn hit(id: &str, score: f64) -> SearchHit {
        SearchHit {
            source_id: id.to_string(),
            text: format!("about {}", id),
            score,
        }
    }

    fn config(round: u32, top_k: usize) -> RetrievalConfig {
        RetrievalConfig {
            strategy: RetrievalStrategy::Semantic,
            top_k,
            similarity_threshold: 0.7,
            max_rounds: 3,
            round,
            clarify: false,
        }
    }

    fn fast_retry() -> RetryPolicy {
        RetryPolicy::from_config(&ExecutorConfig {
            max_retries: 2,
            base_delay_ms: 1,
            max_delay_ms: 2,
            jitter: false,
        })
    }

    fn task() -> SubTask {
        SubTask::whole_query(Uuid::new_v4(), "What is Agentic RAG?")
    }

    #[tokio::test]
    async fn test_merges_rounds_keeping_max_score() {
        let search = Arc::new(Scripted {
            rounds: Mutex::new(vec![
                vec![hit("a", 0.6), hit("b", 0.9)],
                vec![hit("a", 0.8), hit("b", 0.5), hit("c", 0.7)],
            ]),
            requests: Mutex::new(Vec::new()),
        });
        let executor = RetrievalExecutor::new(search.clone(), fast_retry());
        let mut passages = PassageSet::new();

        let first = executor.retrieve(&task(), "q", &config(1, 5), &mut passages).await.unwrap();
        assert_eq!(first, RoundRetrieval { hits: 2, changed: 2 });

        let second = executor.retrieve(&task(), "q", &config(2, 8), &mut passages).await.unwrap();
        assert_eq!(second.changed, 2);

        assert_eq!(passages.len(), 3);
        assert_eq!(passages.get("a").unwrap().score, 0.8);
        assert_eq!(passages.get("a").unwrap().round, 2);
        assert_eq!(passages.get("b").unwrap().score, 0.9);
        assert_eq!(passages.get("b").unwrap().round, 1);
    }

    #[tokio::test]
    async fn test_request_carries_round_parameters_and_filters() {
        let search = Arc::new(Scripted {
            rounds: Mutex::new(vec![vec![hit("a", 0.9), hit("b", 0.8), hit("c", 0.7)]]),
            requests: Mutex::new(Vec::new()),
        });
        let mut filters = BTreeMap::new();
        filters.insert("kb".to_string(), "medical".to_string());
        let executor = RetrievalExecutor::new(search.clone(), fast_retry()).with_filters(filters);
        let mut passages = PassageSet::new();

        let round = executor
            .retrieve(&task(), "refined query", &config(1, 2), &mut passages)
            .await
            .unwrap();

        assert_eq!(round.hits, 2);
        let requests = search.requests.lock().unwrap();
        assert_eq!(requests[0].query, "refined query");
        assert_eq!(requests[0].top_k, 2);
        assert_eq!(requests[0].filters.get("kb").map(String::as_str), Some("medical"));
    }

    #[tokio::test]
    async fn test_unavailable_after_retries() {
        let search = Arc::new(Down(AtomicU32::new(0)));
        let executor = RetrievalExecutor::new(search.clone(), fast_retry());
        let mut passages = PassageSet::new();

        let err = executor
            .retrieve(&task(), "q", &config(1, 5), &mut passages)
            .await
            .unwrap_err();

        assert!(matches!(err, RagError::RetrievalUnavailable { attempts: 3, .. }));
        assert_eq!(search.0.load(Ordering::SeqCst), 3);
        assert!(passages.is_empty());
    }
}
