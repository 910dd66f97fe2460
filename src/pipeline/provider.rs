//! Adapter running generation through an edgequake-llm provider.
//!
//! Lets any provider that crate supports (OpenAI, Anthropic, Gemini, Ollama,
//! ...) stand in for the OpenRouter HTTP client. The provider reads its own
//! credential from the environment when it is created via
//! [`ProviderBackend::from_name`].

use crate::error::TailorError;
use crate::pipeline::llm::{ChatMessage, GenerationBackend, Role};
use async_trait::async_trait;
use edgequake_llm::{CompletionOptions, LLMProvider, ProviderFactory};
use std::sync::Arc;
use tracing::debug;

/// [`GenerationBackend`] backed by an `edgequake_llm::LLMProvider`.
pub struct ProviderBackend {
    provider: Arc<dyn LLMProvider>,
    label: String,
    temperature: f32,
    max_tokens: Option<u32>,
}

impl ProviderBackend {
    /// Wrap a pre-built provider; `label` identifies it in logs.
    pub fn new(
        provider: Arc<dyn LLMProvider>,
        label: impl Into<String>,
        temperature: f32,
        max_tokens: Option<u32>,
    ) -> Self {
        Self {
            provider,
            label: label.into(),
            temperature,
            max_tokens,
        }
    }

    /// Instantiate a named provider via [`ProviderFactory::create_llm_provider`].
    pub fn from_name(
        provider_name: &str,
        model: &str,
        temperature: f32,
        max_tokens: Option<u32>,
    ) -> Result<Self, TailorError> {
        let provider = ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
            TailorError::InvalidConfig(format!(
                "provider '{provider_name}' could not be created ({e}); \
                 check that its API key variable is set"
            ))
        })?;
        Ok(Self::new(
            provider,
            format!("{provider_name}/{model}"),
            temperature,
            max_tokens,
        ))
    }

    fn options(&self) -> CompletionOptions {
        CompletionOptions {
            temperature: Some(self.temperature),
            max_tokens: self.max_tokens.map(|n| n as usize),
            ..Default::default()
        }
    }
}

fn to_provider_message(message: &ChatMessage) -> edgequake_llm::ChatMessage {
    match message.role {
        Role::System => edgequake_llm::ChatMessage::system(message.content.as_str()),
        Role::User => edgequake_llm::ChatMessage::user(message.content.as_str()),
        Role::Assistant => edgequake_llm::ChatMessage::assistant(message.content.as_str()),
    }
}

/// Providers report everything through one error type; sort it into the
/// transport / generation split by its message.
fn classify(message: String) -> TailorError {
    let lower = message.to_lowercase();
    if lower.contains("timed out") || lower.contains("timeout") || lower.contains("connection") {
        TailorError::Transport {
            timed_out: lower.contains("timed out") || lower.contains("timeout"),
            detail: message,
        }
    } else {
        TailorError::Generation {
            status: None,
            message,
        }
    }
}

#[async_trait]
impl GenerationBackend for ProviderBackend {
    fn name(&self) -> &str {
        &self.label
    }

    async fn generate(&self, messages: &[ChatMessage]) -> Result<String, TailorError> {
        let converted: Vec<edgequake_llm::ChatMessage> =
            messages.iter().map(to_provider_message).collect();
        let options = self.options();

        let response = self
            .provider
            .chat(&converted, Some(&options))
            .await
            .map_err(|e| classify(e.to_string()))?;

        debug!(
            provider = %self.label,
            "{} input tokens, {} output tokens",
            response.prompt_tokens,
            response.completion_tokens
        );

        if response.content.trim().is_empty() {
            return Err(TailorError::MalformedResponse {
                detail: "provider returned empty content".into(),
                raw_body: String::new(),
            });
        }
        Ok(response.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeouts_classify_as_transport() {
        let err = classify("request timed out after 180s".into());
        assert!(matches!(err, TailorError::Transport { timed_out: true, .. }));
        assert!(err.is_transient());
    }

    #[test]
    fn connection_errors_classify_as_transport() {
        let err = classify("Connection refused (os error 111)".into());
        assert!(matches!(err, TailorError::Transport { timed_out: false, .. }));
    }

    #[test]
    fn other_errors_classify_as_generation() {
        let err = classify("invalid api key".into());
        assert!(matches!(err, TailorError::Generation { status: None, .. }));
    }

    #[test]
    fn unknown_provider_is_a_config_error() {
        let err = ProviderBackend::from_name("no-such-provider", "m", 0.3, None)
            .err()
            .unwrap();
        assert!(matches!(err, TailorError::InvalidConfig(_)));
    }
}
