//! HTTP search client
//!
//! `POST {endpoint}` with a JSON [`SearchRequest`]; expects
//! `{"results": [{"source_id", "text", "score"}]}` back.

use crate::errors::{RagError, Result};
use crate::search::{SearchHit, SearchProvider, SearchRequest};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

/// Default request timeout
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Remote vector index client
#[derive(Debug, Clone)]
pub struct HttpSearchClient {
    client: Client,
    endpoint: String,
    timeout: Duration,
}

impl HttpSearchClient {
    pub fn new(endpoint: &str) -> Result<Self> {
        Self::with_timeout(endpoint, REQUEST_TIMEOUT)
    }

    pub fn with_timeout(endpoint: &str, timeout: Duration) -> Result<Self> {
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(RagError::Config(format!(
                "Search endpoint must be an http(s) URL: {}",
                endpoint
            )));
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(RagError::Http)?;

        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            timeout,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl SearchProvider for HttpSearchClient {
    fn name(&self) -> &str {
        "http"
    }

    async fn search(&self, request: &SearchRequest) -> Result<Vec<SearchHit>> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RagError::Timeout {
                        duration_ms: self.timeout.as_millis() as u64,
                    }
                } else {
                    RagError::Search(format!("Failed to reach search endpoint: {}", e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(RagError::Search(format!("HTTP {}: {}", status, error_text)));
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| RagError::Search(format!("Failed to decode search response: {}", e)))?;

        Ok(body.results)
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchHit>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_non_http_endpoint() {
        assert!(matches!(
            HttpSearchClient::new("localhost:9000"),
            Err(RagError::Config(_))
        ));
    }

    #[test]
    fn test_accepts_http_endpoint() {
        let client = HttpSearchClient::new("http://localhost:9000/search").unwrap();
        assert_eq!(client.endpoint(), "http://localhost:9000/search");
    }

    #[test]
    fn test_response_decoding() {
        let raw = r#"{"results": [{"source_id": "kb/1", "text": "t", "score": 0.82}]}"#;
        let parsed: SearchResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.results.len(), 1);
        assert_eq!(parsed.results[0].source_id, "kb/1");

        let empty: SearchResponse = serde_json::from_str("{}").unwrap();
        assert!(empty.results.is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_retryable() {
        let client =
            HttpSearchClient::with_timeout("http://127.0.0.1:9/search", Duration::from_millis(200))
                .unwrap();
        let request = SearchRequest {
            query: "q".to_string(),
            top_k: 3,
            similarity_threshold: 0.5,
            filters: Default::default(),
        };

        let err = client.search(&request).await.unwrap_err();
        assert!(err.is_retryable());
    }
}
