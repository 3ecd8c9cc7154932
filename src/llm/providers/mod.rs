//! LLM provider implementations
//!
//! Concrete implementations of the LlmProvider trait plus the factory that
//! picks one from configuration.

pub mod anthropic;
pub mod ollama;
pub mod openai;

pub use anthropic::*;
pub use ollama::*;
pub use openai::*;

use crate::config::LlmSection;
use crate::llm::provider::{LlmError, LlmProvider};
use std::sync::Arc;
use std::time::Duration;

/// Builds the configured provider
pub struct LlmProviderFactory;

impl LlmProviderFactory {
    /// Create a provider from the `[llm]` section and an already-resolved API key
    pub fn create(
        config: &LlmSection,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Arc<dyn LlmProvider>, LlmError> {
        match config.provider.as_str() {
            "openai" => {
                let mut provider_config = OpenAiConfig {
                    api_key: api_key.unwrap_or_default(),
                    timeout,
                    ..Default::default()
                };
                if let Some(base_url) = &config.base_url {
                    provider_config.base_url = base_url.trim_end_matches('/').to_string();
                }
                Ok(Arc::new(OpenAiProvider::new(provider_config)?))
            }
            "anthropic" => {
                let mut provider_config = AnthropicConfig {
                    api_key: api_key.unwrap_or_default(),
                    timeout,
                    ..Default::default()
                };
                if let Some(base_url) = &config.base_url {
                    provider_config.base_url = base_url.trim_end_matches('/').to_string();
                }
                Ok(Arc::new(AnthropicProvider::new(provider_config)?))
            }
            "ollama" => {
                let mut provider_config = OllamaConfig {
                    timeout,
                    ..Default::default()
                };
                if let Some(base_url) = &config.base_url {
                    provider_config.base_url = base_url.trim_end_matches('/').to_string();
                }
                Ok(Arc::new(OllamaProvider::new(provider_config)?))
            }
            other => Err(LlmError::NotConfigured(format!(
                "Unsupported LLM provider: {other}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_builds_ollama_without_key() {
        let provider =
            LlmProviderFactory::create(&LlmSection::default(), None, Duration::from_secs(5))
                .unwrap();
        assert_eq!(provider.name(), "ollama");
    }

    #[test]
    fn test_factory_requires_key_for_openai() {
        let section = LlmSection {
            provider: "openai".to_string(),
            ..Default::default()
        };
        let result = LlmProviderFactory::create(&section, None, Duration::from_secs(5));
        assert!(matches!(result, Err(LlmError::NotConfigured(_))));
    }

    #[test]
    fn test_factory_rejects_unknown_provider() {
        let section = LlmSection {
            provider: "palm".to_string(),
            ..Default::default()
        };
        let result = LlmProviderFactory::create(&section, None, Duration::from_secs(5));
        assert!(matches!(result, Err(LlmError::NotConfigured(_))));
    }
}
