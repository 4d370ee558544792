//! In-memory representation of a rendered document.
//!
//! A [`PdfDocument`] lives exactly as long as one question: it is built by the
//! renderer when the upload arrives and dropped once the answer is sent. The
//! page sequence is immutable after rendering, which is what lets the page
//! tracker treat `page_count()` as a fixed bound.

use edgequake_llm::ImageData;

/// One rasterised page, already encoded for the vision API.
#[derive(Debug, Clone)]
pub struct RenderedPage {
    /// 0-based page index.
    pub index: usize,
    /// Base64 PNG ready to attach to a chat message.
    pub image: ImageData,
    /// Rendered width in pixels.
    pub width: u32,
    /// Rendered height in pixels.
    pub height: u32,
    /// Text layer extracted by pdfium, if the page has one.
    pub text: Option<String>,
}

/// An ordered, non-empty sequence of rendered pages.
#[derive(Debug, Clone)]
pub struct PdfDocument {
    source: String,
    pages: Vec<RenderedPage>,
}

impl PdfDocument {
    /// Wrap rendered pages. Returns `None` when `pages` is empty.
    pub fn new(source: impl Into<String>, pages: Vec<RenderedPage>) -> Option<Self> {
        if pages.is_empty() {
            return None;
        }
        Some(Self {
            source: source.into(),
            pages,
        })
    }

    /// Identity of the upload (file name or evaluation reference).
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Page at a 0-based index.
    pub fn page(&self, index: usize) -> Option<&RenderedPage> {
        self.pages.get(index)
    }

    pub fn pages(&self) -> &[RenderedPage] {
        &self.pages
    }
}
