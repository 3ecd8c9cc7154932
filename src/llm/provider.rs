//! LLM provider abstraction and trait definitions
//!
//! One request/response shape for every backend. Providers make a single HTTP
//! attempt per call; retries and timeouts live in [`crate::llm::client`].

use crate::retry::Retryable;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

/// A single message in a conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn system<S: Into<String>>(content: S) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user<S: Into<String>>(content: S) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }
}

/// Message roles in a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

/// LLM completion request parameters
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub messages: Vec<Message>,
    pub model: String,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub stop_sequences: Option<Vec<String>>,
    pub response_format: Option<ResponseFormat>,
    pub metadata: HashMap<String, String>,
}

/// LLM completion response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub content: Option<String>,
    pub model: String,
    pub usage: TokenUsage,
    pub finish_reason: FinishReason,
    pub metadata: HashMap<String, String>,
}

/// Token usage statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Reason why completion finished
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum FinishReason {
    Stop,
    Length,
    ContentFilter,
    Error,
}

/// Response format for structured outputs
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseFormat {
    /// Plain text response
    #[default]
    Text,
    /// JSON object without schema validation
    Json,
    /// JSON constrained by a schema (OpenAI only, others fall back to JSON mode)
    JsonSchema { json_schema: JsonSchemaDefinition },
}

impl ResponseFormat {
    pub fn wants_json(&self) -> bool {
        !matches!(self, ResponseFormat::Text)
    }
}

/// JSON Schema definition for structured outputs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonSchemaDefinition {
    /// Schema name
    pub name: String,
    /// Whether to use strict mode (OpenAI only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strict: Option<bool>,
    /// The JSON Schema object
    pub schema: serde_json::Value,
}

/// LLM provider trait for dependency injection and testing
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Get the provider name (e.g., "openai", "ollama")
    fn name(&self) -> &str;

    /// Get list of well-known models for this provider
    fn available_models(&self) -> Vec<String>;

    /// Generate a completion from the given request
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError>;

    /// Check if the provider is configured and reachable
    async fn health_check(&self) -> Result<(), LlmError>;
}

/// LLM provider errors
#[derive(Debug, Clone, Error)]
pub enum LlmError {
    #[error("Provider not configured: {0}")]
    NotConfigured(String),
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),
    #[error("Model not found: {0}")]
    ModelNotFound(String),
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),
    #[error("Request failed: {0}")]
    RequestFailed(String),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Network error: {0}")]
    NetworkError(String),
    #[error("API error: {0}")]
    ApiError(String),
    #[error("Timed out: {0}")]
    Timeout(String),
}

impl Retryable for LlmError {
    fn is_retryable(&self) -> bool {
        match self {
            LlmError::NetworkError(_)
            | LlmError::RateLimitExceeded(_)
            | LlmError::RequestFailed(_)
            | LlmError::InvalidResponse(_)
            | LlmError::Timeout(_) => true,
            LlmError::ApiError(msg) => msg.contains("server error"),
            LlmError::NotConfigured(_)
            | LlmError::AuthenticationFailed(_)
            | LlmError::ModelNotFound(_)
            | LlmError::InvalidRequest(_) => false,
        }
    }

    fn timed_out(operation: &str, after: Duration) -> Self {
        LlmError::Timeout(format!("{operation} exceeded {}s", after.as_secs_f32()))
    }
}

/// Map a non-success HTTP status to the matching error (pure function)
pub fn error_for_status(provider: &str, status: StatusCode, body: &str) -> LlmError {
    let detail = format!("{provider} API error: {status} - {body}");
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => LlmError::AuthenticationFailed(detail),
        StatusCode::NOT_FOUND => LlmError::ModelNotFound(detail),
        StatusCode::TOO_MANY_REQUESTS => LlmError::RateLimitExceeded(detail),
        s if s.is_server_error() => {
            LlmError::ApiError(format!("{provider} API server error: {status} - {body}"))
        }
        _ => LlmError::InvalidRequest(detail),
    }
}

/// Map a reqwest transport failure (pure function)
pub fn error_for_transport(provider: &str, error: &reqwest::Error) -> LlmError {
    if error.is_timeout() {
        LlmError::Timeout(format!("{provider} request timed out: {error}"))
    } else {
        LlmError::NetworkError(format!(
            "{provider} HTTP request failed: {error} (is_connect: {})",
            error.is_connect()
        ))
    }
}
