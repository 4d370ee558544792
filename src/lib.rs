//! # edgequake-pdfqa
//!
//! Answer natural-language questions about PDF documents by letting a
//! vision-LLM agent page through rendered page images.
//!
//! ## Why an agent?
//!
//! Sending every page of a long PDF to a vision model is slow and expensive,
//! and extracting text first loses tables, stamps and handwriting. Instead
//! the model is shown one page at a time and given three tools
//! (`next_page`, `previous_page`, `go_to_page`). It browses the way a person
//! would, following tables of contents and section headings, and answers
//! once the supporting page is in view. Only the last few page images stay
//! in context, so cost per step stays flat however long the run.
//!
//! ## Pipeline Overview
//!
//! ```text
//! upload (PDF bytes + question)
//!  │
//!  ├─ 1. Input     size limit, %PDF magic
//!  ├─ 2. Render    rasterise pages via pdfium (CPU-bound, spawn_blocking)
//!  ├─ 3. Encode    PNG → base64 ImageData, extract page text
//!  ├─ 4. Agent     Reasoning ⇄ ToolExecution until final_answer or MAX_STEPS
//!  │                 ├─ PageTracker   current page, clamped navigation
//!  │                 └─ ImageWindow   last K page images kept in context
//!  └─ 5. Answer    {"answer": "...", "page": N}
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_pdfqa::{QaPipeline, Settings};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // API_BASE / API_KEY / MODEL_ID from the environment or .env
//!     let settings = Arc::new(Settings::load(None)?);
//!     let pipeline = QaPipeline::from_settings(settings)?;
//!
//!     let bytes = std::fs::read("report.pdf")?;
//!     let answer = pipeline.ask("report.pdf", bytes, "What was the total revenue?").await?;
//!     println!("{} (page {})", answer.answer, answer.page);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdfqa-server` and `pdfqa-eval` binaries (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-pdfqa = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod agent;
pub mod ask;
pub mod document;
pub mod error;
pub mod eval;
pub mod llm;
pub mod memory;
pub mod navigation;
pub mod pipeline;
pub mod prompts;
pub mod server;
pub mod settings;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use agent::{Agent, AgentConfig, AgentOutcome, AgentStep, StepOutcome, TokenUsage};
pub use ask::{Answer, QaPipeline};
pub use document::{PdfDocument, RenderedPage};
pub use error::{BackendError, BackendErrorKind, EvalError, InvalidPageError, PdfQaError};
pub use llm::{
    build_model, Completion, CompletionSettings, Message, RetryPolicy, Role, VisionModel,
};
pub use memory::ImageWindow;
pub use navigation::{Navigation, NavigationCommand, PageTracker};
pub use pipeline::render::{PageRenderer, PdfiumRenderer};
pub use settings::{Environment, Settings, SettingsBuilder};
