//! Serper (Google search) backend

use super::{SearchError, SearchHit, WebSearch};
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;

/// Serper configuration
#[derive(Debug, Clone)]
pub struct SerperConfig {
    pub api_key: String,
    pub base_url: String,
    pub max_results: usize,
    pub timeout: Duration,
}

impl Default for SerperConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://google.serper.dev".to_string(),
            max_results: 5,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Web search through the Serper API
pub struct SerperSearch {
    config: SerperConfig,
    client: reqwest::Client,
    retry: RetryPolicy,
}

impl SerperSearch {
    pub fn new(config: SerperConfig, retry: RetryPolicy) -> Result<Self, SearchError> {
        if config.api_key.trim().is_empty() {
            return Err(SearchError::NotConfigured(
                "Serper API key is required".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| SearchError::Request(e.to_string()))?;

        Ok(Self {
            config,
            client,
            retry,
        })
    }

    /// Build search payload (pure function)
    fn build_search_payload(query: &str, max_results: usize) -> Value {
        json!({
            "q": query,
            "num": max_results,
            "gl": "us",
            "hl": "en"
        })
    }

    /// Parse organic results (pure function)
    fn parse_search_response(search_result: &Value, max_results: usize) -> Vec<SearchHit> {
        search_result
            .get("organic")
            .and_then(|o| o.as_array())
            .map(|organic| {
                organic
                    .iter()
                    .filter_map(|result| {
                        let title = result.get("title")?.as_str()?;
                        let link = result.get("link")?.as_str()?;
                        let snippet = result.get("snippet").and_then(|s| s.as_str()).unwrap_or("");
                        Some(SearchHit {
                            title: title.to_string(),
                            link: link.to_string(),
                            snippet: snippet.to_string(),
                        })
                    })
                    .take(max_results)
                    .collect()
            })
            .unwrap_or_default()
    }

    async fn search_once(&self, payload: &Value) -> Result<Value, SearchError> {
        let response = self
            .client
            .post(format!(
                "{}/search",
                self.config.base_url.trim_end_matches('/')
            ))
            .header("X-API-KEY", &self.config.api_key)
            .header("Content-Type", "application/json")
            .json(payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SearchError::Timeout(e.to_string())
                } else {
                    SearchError::Request(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(SearchError::Api {
                status: status.as_u16(),
                message: error_text,
            });
        }

        response
            .json()
            .await
            .map_err(|e| SearchError::Decode(e.to_string()))
    }
}

#[async_trait]
impl WebSearch for SerperSearch {
    fn name(&self) -> &str {
        "serper"
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, SearchError> {
        let payload = Self::build_search_payload(query, self.config.max_results);
        let payload = &payload;

        let search_result = self
            .retry
            .run("web_search", || async move { self.search_once(payload).await })
            .await?;

        Ok(Self::parse_search_response(
            &search_result,
            self.config.max_results,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_requires_api_key() {
        let result = SerperSearch::new(SerperConfig::default(), RetryPolicy::default());
        assert!(matches!(result, Err(SearchError::NotConfigured(_))));
    }

    #[test]
    fn test_build_search_payload() {
        let payload = SerperSearch::build_search_payload("how to paint a fence", 5);
        assert_eq!(payload["q"], "how to paint a fence");
        assert_eq!(payload["num"], 5);
    }

    #[test]
    fn test_parse_search_response_skips_incomplete_results() {
        let body = json!({
            "organic": [
                {"title": "Fence painting 101", "link": "https://a.example", "snippet": "Sand first."},
                {"title": "No link here"},
                {"title": "Primer guide", "link": "https://b.example"},
                {"title": "Third", "link": "https://c.example", "snippet": "extra"}
            ]
        });

        let hits = SerperSearch::parse_search_response(&body, 2);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].title, "Fence painting 101");
        assert_eq!(hits[1].link, "https://b.example");
        assert_eq!(hits[1].snippet, "");
    }

    #[test]
    fn test_parse_search_response_without_organic() {
        assert!(SerperSearch::parse_search_response(&json!({}), 5).is_empty());
    }
}
