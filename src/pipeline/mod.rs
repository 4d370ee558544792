//! Document preparation stages, run once per question before the agent starts.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ render ──▶ encode ──▶ PdfDocument
//! (%PDF)    (pdfium)   (base64)
//! ```
//!
//! 1. [`input`]  — size limit and magic-byte check for uploads; load eval
//!    references from disk
//! 2. [`render`] — rasterise every page and extract its text layer; runs in
//!    `spawn_blocking` because pdfium is not async-safe
//! 3. [`encode`] — PNG-encode and base64-wrap each page for the multimodal
//!    request body

pub mod encode;
pub mod input;
pub mod render;
