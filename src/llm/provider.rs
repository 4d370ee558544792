//! Adapter from [`VisionModel`] to any `edgequake-llm` provider.
//!
//! Lets `LLM_PROVIDER=anthropic` (or openai, gemini, azure, …) reuse
//! edgequake-llm's provider routing and API-key discovery instead of the
//! OpenAI-compatible client.

use super::{Completion, CompletionSettings, Message, Role, VisionModel};
use crate::error::{BackendError, PdfQaError};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use std::sync::Arc;

/// A [`VisionModel`] backed by an edgequake-llm provider.
pub struct ProviderModel {
    name: String,
    provider: Arc<dyn LLMProvider>,
}

impl ProviderModel {
    /// Wrap an already constructed provider.
    pub fn new(name: impl Into<String>, provider: Arc<dyn LLMProvider>) -> Self {
        Self {
            name: name.into(),
            provider,
        }
    }

    /// Construct `provider_name` for `model` through [`ProviderFactory`].
    ///
    /// API keys come from the provider's usual variables (`OPENAI_API_KEY`,
    /// `ANTHROPIC_API_KEY`, …).
    pub fn create(provider_name: &str, model: &str) -> Result<Self, PdfQaError> {
        let provider = ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
            PdfQaError::ProviderNotConfigured {
                provider: provider_name.to_string(),
                hint: format!("{e}"),
            }
        })?;
        Ok(Self::new(provider_name, provider))
    }
}

fn to_chat_message(message: &Message) -> ChatMessage {
    match message.role {
        Role::System => ChatMessage::system(message.text.as_str()),
        Role::Assistant => ChatMessage::assistant(message.text.as_str()),
        Role::User if message.images.is_empty() => ChatMessage::user(message.text.as_str()),
        Role::User => ChatMessage::user_with_images(message.text.as_str(), message.images.clone()),
    }
}

/// Authentication problems will not fix themselves on retry.
fn is_permanent(detail: &str) -> bool {
    let lower = detail.to_ascii_lowercase();
    ["401", "403", "unauthorized", "forbidden", "invalid api key"]
        .iter()
        .any(|needle| lower.contains(needle))
}

#[async_trait]
impl VisionModel for ProviderModel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(
        &self,
        messages: &[Message],
        options: &CompletionSettings,
    ) -> Result<Completion, BackendError> {
        let chat: Vec<ChatMessage> = messages.iter().map(to_chat_message).collect();
        let opts = CompletionOptions {
            temperature: options.temperature,
            max_tokens: options.max_tokens,
            ..Default::default()
        };

        match self.provider.chat(&chat, Some(&opts)).await {
            Ok(response) => Ok(Completion {
                content: response.content,
                prompt_tokens: response.prompt_tokens as usize,
                completion_tokens: response.completion_tokens as usize,
            }),
            Err(e) => {
                let detail = e.to_string();
                if is_permanent(&detail) {
                    Err(BackendError::permanent(&self.name, detail))
                } else {
                    Err(BackendError::transient(&self.name, detail))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_failures_are_permanent() {
        assert!(is_permanent("API error 401: Unauthorized"));
        assert!(is_permanent("Invalid API key provided"));
        assert!(!is_permanent("request timed out"));
    }
}
