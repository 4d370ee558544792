//! OpenAI-compatible chat-completions client.
//!
//! Speaks the `/chat/completions` wire format used by OpenAI, vLLM, Ollama
//! and LiteLLM. Images travel as base64 `data:` URLs inside `image_url`
//! content parts.

use super::{Completion, CompletionSettings, Message, VisionModel};
use crate::error::{BackendError, PdfQaError};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

const BACKEND: &str = "openai-compatible";

/// Longest error body quoted back in a [`BackendError`].
const MAX_ERROR_BODY: usize = 300;

/// Client for any OpenAI-compatible endpoint.
#[derive(Clone)]
pub struct OpenAiCompatibleModel {
    http: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
}

impl OpenAiCompatibleModel {
    pub fn new(
        api_base: &str,
        api_key: Option<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, PdfQaError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PdfQaError::InvalidConfig(format!("HTTP client: {e}")))?;
        Ok(Self {
            http,
            endpoint: format!("{}/chat/completions", api_base.trim_end_matches('/')),
            api_key,
            model: model.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<usize>,
    stream: bool,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize, Default)]
struct Usage {
    #[serde(default)]
    prompt_tokens: usize,
    #[serde(default)]
    completion_tokens: usize,
}

/// Encode one message in the OpenAI wire format.
fn to_wire(message: &Message) -> Value {
    if message.images.is_empty() {
        return json!({ "role": message.role.as_str(), "content": message.text });
    }

    let mut parts = Vec::with_capacity(message.images.len() + 1);
    if !message.text.is_empty() {
        parts.push(json!({ "type": "text", "text": message.text }));
    }
    for image in &message.images {
        parts.push(json!({
            "type": "image_url",
            "image_url": {
                "url": format!("data:{};base64,{}", image.mime_type, image.data),
                "detail": "high",
            },
        }));
    }
    json!({ "role": message.role.as_str(), "content": parts })
}

fn parse_response(body: &str) -> Result<Completion, BackendError> {
    let response: ChatResponse = serde_json::from_str(body)
        .map_err(|e| BackendError::permanent(BACKEND, format!("malformed response: {e}")))?;
    let usage = response.usage.unwrap_or_default();
    let content = response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message)
        .and_then(|m| m.content)
        .ok_or_else(|| BackendError::permanent(BACKEND, "response has no message content"))?;

    Ok(Completion {
        content,
        prompt_tokens: usage.prompt_tokens,
        completion_tokens: usage.completion_tokens,
    })
}

fn classify_status(status: StatusCode, body: &str) -> BackendError {
    let snippet: String = body.chars().take(MAX_ERROR_BODY).collect();
    let message = format!("HTTP {status}: {snippet}");
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        BackendError::transient(BACKEND, message)
    } else {
        BackendError::permanent(BACKEND, message)
    }
}

#[async_trait]
impl VisionModel for OpenAiCompatibleModel {
    fn name(&self) -> &str {
        BACKEND
    }

    async fn complete(
        &self,
        messages: &[Message],
        options: &CompletionSettings,
    ) -> Result<Completion, BackendError> {
        let payload = ChatRequest {
            model: &self.model,
            messages: messages.iter().map(to_wire).collect(),
            temperature: options.temperature,
            max_tokens: options.max_tokens,
            stream: false,
        };

        debug!(
            model = self.model.as_str(),
            messages = messages.len(),
            images = messages.iter().map(|m| m.images.len()).sum::<usize>(),
            "Sending request to OpenAI-compatible backend"
        );

        let mut request = self.http.post(&self.endpoint).json(&payload);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| BackendError::transient(BACKEND, e.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| BackendError::transient(BACKEND, e.to_string()))?;

        if !status.is_success() {
            return Err(classify_status(status, &body));
        }
        parse_response(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::post;
    use axum::{Json, Router};
    use edgequake_llm::ImageData;
    use tokio::net::TcpListener;

    #[test]
    fn text_message_is_plain_string() {
        let wire = to_wire(&Message::system("be precise"));
        assert_eq!(wire["role"], "system");
        assert_eq!(wire["content"], "be precise");
    }

    #[test]
    fn image_message_uses_content_parts() {
        let msg = Message::user_with_images(
            "Page 1 of 3",
            vec![ImageData::new("QUJD", "image/png")],
        );
        let wire = to_wire(&msg);
        let parts = wire["content"].as_array().unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0]["type"], "text");
        assert_eq!(parts[1]["type"], "image_url");
        assert_eq!(parts[1]["image_url"]["url"], "data:image/png;base64,QUJD");
    }

    #[test]
    fn parses_content_and_usage() {
        let c = parse_response(
            r#"{"choices":[{"message":{"content":"hi"}}],"usage":{"prompt_tokens":12,"completion_tokens":3}}"#,
        )
        .unwrap();
        assert_eq!(c.content, "hi");
        assert_eq!(c.prompt_tokens, 12);
        assert_eq!(c.completion_tokens, 3);
    }

    #[test]
    fn missing_content_is_permanent() {
        let err = parse_response(r#"{"choices":[]}"#).unwrap_err();
        assert!(!err.is_transient());
    }

    #[test]
    fn status_classification() {
        assert!(classify_status(StatusCode::TOO_MANY_REQUESTS, "").is_transient());
        assert!(classify_status(StatusCode::BAD_GATEWAY, "").is_transient());
        assert!(!classify_status(StatusCode::UNAUTHORIZED, "bad key").is_transient());
    }

    #[test]
    fn endpoint_joins_cleanly() {
        let m = OpenAiCompatibleModel::new(
            "http://localhost:11434/v1/",
            None,
            "gemma",
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(m.endpoint(), "http://localhost:11434/v1/chat/completions");
    }

    #[tokio::test]
    async fn round_trip_against_local_server() {
        let app = Router::new().route(
            "/v1/chat/completions",
            post(|Json(body): Json<Value>| async move {
                let model = body["model"].as_str().unwrap_or_default().to_string();
                Json(json!({
                    "choices": [{ "message": { "content": format!("model={model}") } }],
                    "usage": { "prompt_tokens": 5, "completion_tokens": 2 }
                }))
            }),
        );
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        let model = OpenAiCompatibleModel::new(
            &format!("http://{addr}/v1"),
            Some("test-key".into()),
            "gemma",
            Duration::from_secs(5),
        )
        .unwrap();
        let out = model
            .complete(&[Message::user("hello")], &CompletionSettings::default())
            .await
            .unwrap();
        assert_eq!(out.content, "model=gemma");
        assert_eq!(out.prompt_tokens, 5);
    }
}
