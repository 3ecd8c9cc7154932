//! The LLM client used by every pipeline stage
//!
//! Wraps a provider with the run's model settings and retry policy. Each call
//! carries a `purpose` label that shows up in logs and run metrics.

use crate::llm::provider::{
    CompletionRequest, LlmError, LlmProvider, Message, ResponseFormat,
};
use crate::observability::metrics::{metrics, LlmCallRecord};
use crate::retry::RetryPolicy;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

static THINK_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<think>.*?</think>").expect("valid regex"));

/// Strip reasoning blocks emitted by local reasoning models
pub fn strip_reasoning(text: &str) -> String {
    let stripped = THINK_BLOCK.replace_all(text, "");
    // An unterminated block means the whole tail is reasoning
    let stripped = match stripped.find("<think>") {
        Some(start) => &stripped[..start],
        None => &stripped[..],
    };
    stripped.trim().to_string()
}

/// Provider plus model settings and retry policy
#[derive(Clone)]
pub struct LlmClient {
    provider: Arc<dyn LlmProvider>,
    model: String,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    system_prompt: Option<String>,
    retry: RetryPolicy,
}

impl std::fmt::Debug for LlmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmClient")
            .field("provider", &self.provider.name())
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .finish()
    }
}

impl LlmClient {
    pub fn new(provider: Arc<dyn LlmProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: None,
            max_tokens: None,
            system_prompt: None,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_system_prompt(mut self, system_prompt: Option<String>) -> Self {
        self.system_prompt = system_prompt;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Free-form prompt, free-form answer
    pub async fn prompt(&self, purpose: &str, prompt: &str) -> Result<String, LlmError> {
        self.call(purpose, prompt, None).await
    }

    /// Prompt that expects a JSON answer in the given format
    pub async fn complete_json(
        &self,
        purpose: &str,
        prompt: &str,
        format: ResponseFormat,
    ) -> Result<String, LlmError> {
        self.call(purpose, prompt, Some(format)).await
    }

    fn build_request(&self, prompt: &str, format: Option<ResponseFormat>) -> CompletionRequest {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &self.system_prompt {
            messages.push(Message::system(system.clone()));
        }
        messages.push(Message::user(prompt));

        CompletionRequest {
            messages,
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            top_p: None,
            stop_sequences: None,
            response_format: format,
            metadata: HashMap::new(),
        }
    }

    async fn call(
        &self,
        purpose: &str,
        prompt: &str,
        format: Option<ResponseFormat>,
    ) -> Result<String, LlmError> {
        let request = self.build_request(prompt, format);
        let started = Instant::now();

        debug!(
            purpose,
            provider = self.provider.name(),
            model = %self.model,
            prompt_chars = prompt.len(),
            "LLM call"
        );

        let result = self
            .retry
            .run(purpose, || {
                let request = request.clone();
                async move {
                    let response = self.provider.complete(request).await?;
                    let text = strip_reasoning(response.content.as_deref().unwrap_or_default());
                    if text.is_empty() {
                        return Err(LlmError::InvalidResponse(
                            "Model returned an empty response".to_string(),
                        ));
                    }
                    Ok(text)
                }
            })
            .await;

        let duration = started.elapsed();
        metrics().llm_call(LlmCallRecord {
            purpose,
            model: &self.model,
            duration,
            prompt_chars: prompt.len(),
            response_chars: result.as_ref().map(|text| text.len()).unwrap_or(0),
            success: result.is_ok(),
        });

        match &result {
            Ok(text) => debug!(
                purpose,
                duration_ms = duration.as_millis() as u64,
                response_chars = text.len(),
                "LLM call succeeded"
            ),
            Err(e) => warn!(purpose, error = %e, "LLM call failed"),
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::mocks::MockLlmProvider;
    use std::time::Duration;

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(1),
            timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn test_strip_reasoning_blocks() {
        assert_eq!(
            strip_reasoning("<think>\nhmm, maybe research\n</think>\nshort"),
            "short"
        );
        assert_eq!(strip_reasoning("plain answer"), "plain answer");
        assert_eq!(strip_reasoning("answer <think>never closed"), "answer");
    }

    #[tokio::test]
    async fn test_prompt_returns_cleaned_text_and_sends_settings() {
        let provider = Arc::new(MockLlmProvider::new(vec![
            "<think>deliberating</think>Call the dentist.".to_string(),
        ]));
        let client = LlmClient::new(provider.clone(), "test-model")
            .with_temperature(0.3)
            .with_system_prompt(Some("Be concise".to_string()))
            .with_retry(fast_retry());

        let text = client.prompt("next_action", "What next?").await.unwrap();
        assert_eq!(text, "Call the dentist.");

        let requests = provider.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].model, "test-model");
        assert_eq!(requests[0].temperature, Some(0.3));
        assert_eq!(requests[0].messages.len(), 2);
        assert_eq!(requests[0].messages[1].content, "What next?");
    }

    #[tokio::test]
    async fn test_empty_response_is_retried() {
        let provider = Arc::new(MockLlmProvider::new(vec![
            "   ".to_string(),
            "second try".to_string(),
        ]));
        let client = LlmClient::new(provider.clone(), "m").with_retry(fast_retry());

        let text = client.prompt("research", "plan").await.unwrap();
        assert_eq!(text, "second try");
        assert_eq!(provider.call_count(), 2);
    }

    #[tokio::test]
    async fn test_failures_surface_after_bounded_attempts() {
        let provider = Arc::new(MockLlmProvider::with_failure());
        let client = LlmClient::new(provider.clone(), "m").with_retry(fast_retry());

        let result = client.prompt("classification", "classify").await;
        assert!(result.is_err());
        assert_eq!(provider.call_count(), 3);
    }
}
