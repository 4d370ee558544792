//! Vision-LLM client interface.
//!
//! The agent loop talks to the model only through [`VisionModel`], so any
//! backend that can take a list of chat messages with inline page images and
//! return text will do. Two implementations ship with the crate:
//!
//! * [`OpenAiCompatibleModel`] — plain `POST {API_BASE}/chat/completions`,
//!   for vLLM, Ollama, LiteLLM and OpenAI itself. This is the default.
//! * [`ProviderModel`] — wraps any `edgequake-llm` provider, selected with
//!   `LLM_PROVIDER` (openai, anthropic, gemini, azure, …).
//!
//! ## Retry Strategy
//!
//! [`complete_with_retry`] wraps every call in a timeout and retries only
//! failures classified as transient (timeouts, connection errors, 429, 5xx),
//! with exponential backoff (`retry_backoff_ms * 2^attempt`). Permanent
//! failures return immediately. The attempt count is bounded, so a dead
//! backend costs at most `max_retries + 1` calls per agent step.

mod openai;
mod provider;

pub use openai::OpenAiCompatibleModel;
pub use provider::ProviderModel;

use crate::error::{BackendError, PdfQaError};
use crate::settings::Settings;
use async_trait::async_trait;
use edgequake_llm::ImageData;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Who authored a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One chat message, optionally carrying page images.
#[derive(Debug, Clone)]
pub struct Message {
    pub role: Role,
    pub text: String,
    pub images: Vec<ImageData>,
}

impl Message {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            text: text.into(),
            images: Vec::new(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
            images: Vec::new(),
        }
    }

    pub fn user_with_images(text: impl Into<String>, images: Vec<ImageData>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
            images,
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
            images: Vec::new(),
        }
    }
}

/// Sampling options for one call.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CompletionSettings {
    pub temperature: Option<f32>,
    pub max_tokens: Option<usize>,
}

/// Model output for one call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Completion {
    pub content: String,
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
}

/// A chat-completion backend that understands images.
#[async_trait]
pub trait VisionModel: Send + Sync {
    /// Short backend name for logs and error messages.
    fn name(&self) -> &str;

    async fn complete(
        &self,
        messages: &[Message],
        options: &CompletionSettings,
    ) -> Result<Completion, BackendError>;
}

/// Timeout and retry budget for backend calls.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff_ms: u64,
    pub timeout: Duration,
}

impl RetryPolicy {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            max_retries: settings.max_retries,
            backoff_ms: settings.retry_backoff_ms,
            timeout: Duration::from_secs(settings.api_timeout_secs),
        }
    }

    /// Fail on the first error.
    pub fn no_retry(timeout: Duration) -> Self {
        Self {
            max_retries: 0,
            backoff_ms: 0,
            timeout,
        }
    }
}

/// Call `model` under `policy`'s timeout, retrying transient failures.
pub async fn complete_with_retry(
    model: &dyn VisionModel,
    messages: &[Message],
    options: &CompletionSettings,
    policy: &RetryPolicy,
) -> Result<Completion, BackendError> {
    let mut attempt: u32 = 0;
    loop {
        let result = match tokio::time::timeout(policy.timeout, model.complete(messages, options))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(BackendError::transient(
                model.name(),
                format!("no response within {}s", policy.timeout.as_secs()),
            )),
        };

        match result {
            Ok(completion) => {
                debug!(
                    "{}: {} input tokens, {} output tokens",
                    model.name(),
                    completion.prompt_tokens,
                    completion.completion_tokens
                );
                return Ok(completion);
            }
            Err(e) if e.is_transient() && attempt < policy.max_retries => {
                let backoff = policy.backoff_ms.saturating_mul(2u64.saturating_pow(attempt));
                attempt += 1;
                warn!(
                    "{}: attempt {} failed — {}; retry {}/{} after {}ms",
                    model.name(),
                    attempt,
                    e.message,
                    attempt,
                    policy.max_retries,
                    backoff
                );
                sleep(Duration::from_millis(backoff)).await;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Build the backend `settings` describe, for the given model id.
///
/// `LLM_PROVIDER` routes through edgequake-llm; otherwise the
/// OpenAI-compatible client talks to `API_BASE` directly.
pub fn build_model(
    settings: &Settings,
    model_id: &str,
) -> Result<Arc<dyn VisionModel>, PdfQaError> {
    match settings.llm_provider.as_deref() {
        Some(provider) => Ok(Arc::new(ProviderModel::create(provider, model_id)?)),
        None => Ok(Arc::new(OpenAiCompatibleModel::new(
            &settings.api_base,
            settings.api_key.clone(),
            model_id,
            Duration::from_secs(settings.api_timeout_secs),
        )?)),
    }
}
