//! Ollama provider implementation
//!
//! Local models served by Ollama's `/api/chat` endpoint. No API key.

use crate::llm::provider::{
    error_for_status, error_for_transport, CompletionRequest, CompletionResponse, FinishReason,
    LlmError, LlmProvider, MessageRole, TokenUsage,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Ollama provider configuration
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            timeout: Duration::from_secs(300),
        }
    }
}

/// Ollama provider implementation
pub struct OllamaProvider {
    config: OllamaConfig,
    client: Client,
}

impl OllamaProvider {
    pub fn new(config: OllamaConfig) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::NetworkError(e.to_string()))?;

        Ok(Self { config, client })
    }

    /// Convert completion request to Ollama format (pure function)
    fn convert_request(request: &CompletionRequest) -> OllamaChatRequest {
        let messages = request
            .messages
            .iter()
            .map(|m| OllamaMessage {
                role: match m.role {
                    MessageRole::System => "system",
                    MessageRole::User => "user",
                    MessageRole::Assistant => "assistant",
                }
                .to_string(),
                content: m.content.clone(),
            })
            .collect();

        let wants_json = request
            .response_format
            .as_ref()
            .is_some_and(|rf| rf.wants_json());

        OllamaChatRequest {
            model: request.model.clone(),
            messages,
            stream: false,
            format: wants_json.then(|| "json".to_string()),
            options: OllamaOptions {
                temperature: request.temperature,
                top_p: request.top_p,
                num_predict: request.max_tokens,
                stop: request.stop_sequences.clone(),
            },
        }
    }

    fn convert_finish_reason(reason: Option<&str>) -> FinishReason {
        match reason {
            Some("stop") | None => FinishReason::Stop,
            Some("length") => FinishReason::Length,
            _ => FinishReason::Error,
        }
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    fn available_models(&self) -> Vec<String> {
        vec![
            "deepseek-r1:8b".to_string(),
            "llama3.1:8b".to_string(),
            "qwen2.5:7b".to_string(),
        ]
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let ollama_request = Self::convert_request(&request);

        let response = self
            .client
            .post(format!("{}/api/chat", self.config.base_url))
            .json(&ollama_request)
            .send()
            .await
            .map_err(|e| error_for_transport("Ollama", &e))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(error_for_status("Ollama", status, &error_text));
        }

        let chat: OllamaChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        let prompt_tokens = chat.prompt_eval_count.unwrap_or(0);
        let completion_tokens = chat.eval_count.unwrap_or(0);

        Ok(CompletionResponse {
            content: Some(chat.message.content),
            model: chat.model,
            usage: TokenUsage {
                prompt_tokens,
                completion_tokens,
                total_tokens: prompt_tokens + completion_tokens,
            },
            finish_reason: Self::convert_finish_reason(chat.done_reason.as_deref()),
            metadata: request.metadata,
        })
    }

    async fn health_check(&self) -> Result<(), LlmError> {
        let response = self
            .client
            .get(format!("{}/api/tags", self.config.base_url))
            .send()
            .await
            .map_err(|e| error_for_transport("Ollama", &e))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let error_text = response.text().await.unwrap_or_default();
            Err(error_for_status("Ollama", status, &error_text))
        }
    }
}

#[derive(Debug, Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<String>,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<Vec<String>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct OllamaMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    model: String,
    message: OllamaMessage,
    done_reason: Option<String>,
    prompt_eval_count: Option<u32>,
    eval_count: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::provider::{Message, ResponseFormat};
    use std::collections::HashMap;

    fn request(format: Option<ResponseFormat>) -> CompletionRequest {
        CompletionRequest {
            messages: vec![Message::system("Be brief"), Message::user("Hello")],
            model: "deepseek-r1:8b".to_string(),
            max_tokens: Some(256),
            temperature: Some(0.3),
            top_p: None,
            stop_sequences: None,
            response_format: format,
            metadata: HashMap::new(),
        }
    }

    #[test]
    fn test_request_disables_streaming_and_maps_options() {
        let json = serde_json::to_value(OllamaProvider::convert_request(&request(None))).unwrap();

        assert_eq!(json["stream"], false);
        assert_eq!(json["options"]["num_predict"], 256);
        assert_eq!(json["messages"][0]["role"], "system");
        assert!(json.get("format").is_none());
        assert!(json["options"].get("top_p").is_none());
    }

    #[test]
    fn test_json_response_format_sets_format_field() {
        let json = serde_json::to_value(OllamaProvider::convert_request(&request(Some(
            ResponseFormat::Json,
        ))))
        .unwrap();
        assert_eq!(json["format"], "json");
    }

    #[test]
    fn test_provider_needs_no_key() {
        let provider = OllamaProvider::new(OllamaConfig::default()).unwrap();
        assert_eq!(provider.name(), "ollama");
    }
}
