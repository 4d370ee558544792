//! Shared fixtures for integration tests: an in-memory renderer and a
//! scripted vision model, so the service can run without pdfium or a backend.

#![allow(dead_code)]

use async_trait::async_trait;
use edgequake_pdfqa::pipeline::encode::encode_page;
use edgequake_pdfqa::{
    BackendError, Completion, CompletionSettings, Message, PageRenderer, PdfDocument, PdfQaError,
    QaPipeline, RenderedPage, Settings, VisionModel,
};
use image::DynamicImage;
use std::sync::{Arc, Mutex};

/// Build a fake "PDF": the `%PDF` header followed by page texts separated by
/// form feeds. [`FakeRenderer`] understands this format.
pub fn fake_pdf(pages: &[&str]) -> Vec<u8> {
    format!("%PDF-1.7\n{}", pages.join("\u{c}")).into_bytes()
}

/// Renders [`fake_pdf`] bytes into tiny blank pages carrying the page text.
/// Bytes containing `BROKEN` fail to rasterise.
pub struct FakeRenderer;

impl PageRenderer for FakeRenderer {
    fn render(&self, source: &str, bytes: &[u8]) -> Result<PdfDocument, PdfQaError> {
        let body = String::from_utf8_lossy(bytes);
        if body.contains("BROKEN") {
            return Err(PdfQaError::RasterisationFailed {
                page: 1,
                detail: "corrupt page stream".into(),
            });
        }
        let body = body.split_once('\n').map(|(_, rest)| rest).unwrap_or("");
        let pages = body
            .split('\u{c}')
            .enumerate()
            .map(|(index, text)| {
                let image = encode_page(&DynamicImage::new_rgb8(4, 4)).map_err(|e| {
                    PdfQaError::RasterisationFailed {
                        page: index + 1,
                        detail: e.to_string(),
                    }
                })?;
                Ok(RenderedPage {
                    index,
                    image,
                    width: 4,
                    height: 4,
                    text: Some(text.to_string()),
                })
            })
            .collect::<Result<Vec<_>, PdfQaError>>()?;
        PdfDocument::new(source, pages)
            .ok_or_else(|| PdfQaError::InvalidDocument {
                reason: "no pages".into(),
            })
    }
}

/// Replays canned replies in order; the last reply repeats forever.
pub struct ScriptedModel {
    replies: Mutex<Vec<String>>,
    requests: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedModel {
    pub fn new(replies: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.iter().rev().map(|s| s.to_string()).collect()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<Vec<Message>> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl VisionModel for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(
        &self,
        messages: &[Message],
        _options: &CompletionSettings,
    ) -> Result<Completion, BackendError> {
        self.requests.lock().unwrap().push(messages.to_vec());
        let mut replies = self.replies.lock().unwrap();
        let content = if replies.len() > 1 {
            replies.pop().unwrap_or_default()
        } else {
            replies.last().cloned().unwrap_or_default()
        };
        Ok(Completion {
            content,
            prompt_tokens: 100,
            completion_tokens: 10,
        })
    }
}

pub fn test_settings(max_steps: usize) -> Arc<Settings> {
    Arc::new(
        Settings::builder()
            .max_steps(max_steps)
            .image_window(2)
            .max_retries(0)
            .max_upload_bytes(64 * 1024)
            .build()
            .unwrap(),
    )
}

pub fn pipeline(model: Arc<ScriptedModel>, max_steps: usize) -> Arc<QaPipeline> {
    Arc::new(QaPipeline::new(
        test_settings(max_steps),
        model,
        Arc::new(FakeRenderer),
    ))
}

/// Replies that find the revenue on page 2 of a three-page report.
pub const REVENUE_SCRIPT: &[&str] = &[
    r#"{"thought":"Cover page, keep going","action":"next_page"}"#,
    r#"{"thought":"Revenue is listed here","action":"final_answer","answer":"$5M"}"#,
];

pub fn revenue_report() -> Vec<u8> {
    fake_pdf(&[
        "Annual Report 2023",
        "Financial Summary\nTotal Revenue: $5M",
        "Outlook",
    ])
}
