//! The question-answering pipeline: validate → render → agent → answer.
//!
//! [`QaPipeline`] is shared by the HTTP layer and the evaluation harness. It
//! holds only read-only state (settings, model client, renderer), so one
//! instance behind an `Arc` serves any number of concurrent requests; every
//! call builds its own document, tracker and image window.

use crate::agent::{Agent, AgentConfig, AgentStep, TokenUsage};
use crate::document::PdfDocument;
use crate::error::PdfQaError;
use crate::llm::{build_model, VisionModel};
use crate::pipeline::input::{validate_pdf_bytes, Reference};
use crate::pipeline::render::{document_from_image, render_document, PageRenderer, PdfiumRenderer};
use crate::settings::Settings;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// A produced answer plus run statistics.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub answer: String,
    /// Page the answer was read from (1-based).
    pub page: usize,
    pub total_pages: usize,
    pub steps: Vec<AgentStep>,
    pub usage: TokenUsage,
    pub duration_ms: u64,
}

pub struct QaPipeline {
    settings: Arc<Settings>,
    agent: Agent,
    renderer: Arc<dyn PageRenderer>,
}

impl QaPipeline {
    pub fn new(
        settings: Arc<Settings>,
        model: Arc<dyn VisionModel>,
        renderer: Arc<dyn PageRenderer>,
    ) -> Self {
        let agent = Agent::new(model, AgentConfig::from_settings(&settings));
        Self {
            settings,
            agent,
            renderer,
        }
    }

    /// Wire up the configured backend and the pdfium renderer.
    pub fn from_settings(settings: Arc<Settings>) -> Result<Self, PdfQaError> {
        let model = build_model(&settings, &settings.model_id)?;
        let renderer: Arc<dyn PageRenderer> = Arc::new(PdfiumRenderer::from_settings(&settings));
        Ok(Self::new(settings, model, renderer))
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Answer `question` about an uploaded PDF.
    pub async fn ask(
        &self,
        source: &str,
        bytes: Vec<u8>,
        question: &str,
    ) -> Result<Answer, PdfQaError> {
        let question = validate_question(question)?;
        validate_pdf_bytes(&bytes, self.settings.max_upload_bytes)?;

        let document = render_document(self.renderer.clone(), source.to_string(), bytes).await?;
        self.ask_document(&document, question).await
    }

    /// Answer `question` about a PDF or raster image loaded from disk.
    pub async fn ask_reference(
        &self,
        reference: Reference,
        question: &str,
    ) -> Result<Answer, PdfQaError> {
        match reference {
            Reference::Pdf { path, bytes } => {
                self.ask(&path.display().to_string(), bytes, question).await
            }
            Reference::Image { path, bytes } => {
                let question = validate_question(question)?;
                let max_pixels = self.settings.max_rendered_pixels;
                let source = path.display().to_string();
                let document = tokio::task::spawn_blocking(move || {
                    document_from_image(&source, &bytes, max_pixels)
                })
                .await
                .map_err(|e| PdfQaError::Internal(format!("Image decode task panicked: {e}")))??;
                self.ask_document(&document, question).await
            }
        }
    }

    /// Run the agent over an already rendered document.
    pub async fn ask_document(
        &self,
        document: &PdfDocument,
        question: &str,
    ) -> Result<Answer, PdfQaError> {
        let question = validate_question(question)?;
        if document.page_count() > self.settings.max_pages {
            return Err(PdfQaError::TooManyPages {
                pages: document.page_count(),
                limit: self.settings.max_pages,
            });
        }

        let start = Instant::now();
        let outcome = self.agent.run(document, question).await?;
        let duration_ms = start.elapsed().as_millis() as u64;

        info!(
            source = document.source(),
            page = outcome.page,
            steps = outcome.usage.model_calls,
            duration_ms,
            "Question answered"
        );

        Ok(Answer {
            answer: outcome.answer,
            page: outcome.page,
            total_pages: document.page_count(),
            steps: outcome.steps,
            usage: outcome.usage,
            duration_ms,
        })
    }
}

fn validate_question(question: &str) -> Result<&str, PdfQaError> {
    let trimmed = question.trim();
    if trimmed.is_empty() {
        Err(PdfQaError::EmptyQuestion)
    } else {
        Ok(trimmed)
    }
}
