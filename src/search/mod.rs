//! Web search used by the planning processor
//!
//! Search is best-effort: a missing key or a failed request degrades the
//! planning prompt, it never fails the task.

pub mod serper;

pub use serper::{SerperConfig, SerperSearch};

use crate::retry::Retryable;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// One organic search result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub link: String,
    pub snippet: String,
}

/// Web search backend
#[async_trait]
pub trait WebSearch: Send + Sync {
    fn name(&self) -> &str;

    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, SearchError>;
}

/// Web search errors
#[derive(Debug, Clone, Error)]
pub enum SearchError {
    #[error("Search not configured: {0}")]
    NotConfigured(String),
    #[error("Search request failed: {0}")]
    Request(String),
    #[error("Search API error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("Failed to parse search response: {0}")]
    Decode(String),
    #[error("Search timed out: {0}")]
    Timeout(String),
}

impl Retryable for SearchError {
    fn is_retryable(&self) -> bool {
        match self {
            SearchError::Request(_) | SearchError::Timeout(_) => true,
            SearchError::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    fn timed_out(operation: &str, after: Duration) -> Self {
        SearchError::Timeout(format!("{operation} exceeded {}s", after.as_secs_f32()))
    }
}

/// Render hits as a numbered list (pure function)
pub fn format_results(hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return "No search results found.".to_string();
    }

    hits.iter()
        .enumerate()
        .map(|(i, hit)| {
            format!(
                "{}. {}\n   {}\n   {}",
                i + 1,
                hit.title,
                hit.link,
                hit.snippet
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Cut `text` to at most `max_chars` characters (pure function)
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => text[..byte_index].to_string(),
        None => text.to_string(),
    }
}
