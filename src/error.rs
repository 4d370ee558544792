//! Error types for the edgequake-pdfqa library.
//!
//! Three distinct error types reflect three distinct failure modes:
//!
//! * [`PdfQaError`] — **Fatal**: the question cannot be answered at all
//!   (not a PDF, backend unreachable, step budget exhausted). Returned as
//!   `Err(PdfQaError)` from [`crate::ask::QaPipeline`] and mapped to an HTTP
//!   status by the server.
//!
//! * [`InvalidPageError`] — **Recoverable**: the agent asked for a page that
//!   does not exist. It never leaves the agent loop; it is turned into an
//!   observation so the model can correct itself on the next turn.
//!
//! * [`BackendError`] — a single failed model call. The retry policy in
//!   [`crate::llm`] inspects [`BackendErrorKind`] to decide whether another
//!   attempt is worthwhile before surfacing it as
//!   [`PdfQaError::BackendUnavailable`].

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-pdfqa library.
#[derive(Debug, Error)]
pub enum PdfQaError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The upload is not a PDF, or pdfium could not parse it.
    #[error("Invalid document: {reason}")]
    InvalidDocument { reason: String },

    /// A required multipart field was absent.
    #[error("Missing required field '{field}'")]
    MissingField { field: &'static str },

    /// The question was present but blank.
    #[error("Question must not be empty")]
    EmptyQuestion,

    /// The upload exceeds `MAX_UPLOAD_BYTES`.
    #[error("Upload of {size} bytes exceeds the {limit} byte limit")]
    UploadTooLarge { size: usize, limit: usize },

    /// The document has more pages than `MAX_PAGES` allows.
    #[error("Document has {pages} pages; at most {limit} are supported")]
    TooManyPages { pages: usize, limit: usize },

    /// An evaluation reference could not be read from disk.
    #[error("Failed to read '{path}': {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// pdfium-render returned an error for a specific page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium (file or directory) or install pdfium system-wide."
    )]
    PdfiumBindingFailed(String),

    // ── Agent errors ──────────────────────────────────────────────────────
    /// The agent used its whole step budget without producing an answer.
    #[error("Agent did not produce an answer within {max_steps} steps")]
    StepLimitExceeded { max_steps: usize },

    /// The vision backend is unreachable or keeps failing.
    #[error("Vision backend unavailable: {message}")]
    BackendUnavailable { message: String },

    /// `LLM_PROVIDER` named a provider edgequake-llm could not construct.
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Settings validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PdfQaError {
    /// `true` when the caller sent something unusable; `false` for server-side failures.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            PdfQaError::InvalidDocument { .. }
                | PdfQaError::MissingField { .. }
                | PdfQaError::EmptyQuestion
                | PdfQaError::UploadTooLarge { .. }
                | PdfQaError::TooManyPages { .. }
        )
    }

    /// Stable machine-readable code used in HTTP error payloads and eval reports.
    pub fn code(&self) -> &'static str {
        match self {
            PdfQaError::InvalidDocument { .. } => "invalid_document",
            PdfQaError::MissingField { .. } => "missing_field",
            PdfQaError::EmptyQuestion => "empty_question",
            PdfQaError::UploadTooLarge { .. } => "upload_too_large",
            PdfQaError::TooManyPages { .. } => "too_many_pages",
            PdfQaError::ReadFailed { .. } => "read_failed",
            PdfQaError::RasterisationFailed { .. } => "rasterisation_failed",
            PdfQaError::PdfiumBindingFailed(_) => "pdfium_unavailable",
            PdfQaError::StepLimitExceeded { .. } => "step_limit_exceeded",
            PdfQaError::BackendUnavailable { .. } => "backend_unavailable",
            PdfQaError::ProviderNotConfigured { .. } => "provider_not_configured",
            PdfQaError::InvalidConfig(_) => "invalid_config",
            PdfQaError::Internal(_) => "internal",
        }
    }
}

impl From<BackendError> for PdfQaError {
    fn from(e: BackendError) -> Self {
        PdfQaError::BackendUnavailable {
            message: e.to_string(),
        }
    }
}

/// `go_to_page` was asked for a page outside `[0, total)`.
///
/// `requested` is the 0-based index the agent asked for (it may be negative
/// when the model supplied page 0 or below).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("page index {requested} is out of range (document has {total} pages)")]
pub struct InvalidPageError {
    pub requested: i64,
    pub total: usize,
}

/// Whether a failed model call is worth retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendErrorKind {
    /// Timeouts, connection failures, HTTP 429 and 5xx.
    Transient,
    /// Authentication failures, malformed requests, unusable responses.
    Permanent,
}

/// One failed call to the vision backend.
#[derive(Debug, Clone, Error)]
#[error("{backend}: {message}")]
pub struct BackendError {
    pub backend: String,
    pub kind: BackendErrorKind,
    pub message: String,
}

impl BackendError {
    pub fn transient(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            backend: backend.into(),
            kind: BackendErrorKind::Transient,
            message: message.into(),
        }
    }

    pub fn permanent(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            backend: backend.into(),
            kind: BackendErrorKind::Permanent,
            message: message.into(),
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind == BackendErrorKind::Transient
    }
}

/// Errors raised by the evaluation harness itself (not by individual items).
#[derive(Debug, Error)]
pub enum EvalError {
    /// The evaluation set file does not exist or cannot be read.
    #[error("Failed to read evaluation set '{path}': {source}")]
    EvalSetUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A JSONL line could not be parsed.
    #[error("Evaluation set '{path}' line {line}: {source}")]
    EvalSetParse {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    /// The set parsed but contains no items.
    #[error("Evaluation set '{path}' contains no questions")]
    EmptyEvalSet { path: PathBuf },

    /// Could not write the results report.
    #[error("Failed to write results to '{path}': {source}")]
    ReportWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The report could not be serialised.
    #[error("Failed to serialise report: {0}")]
    Serialise(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_limit_display() {
        let e = PdfQaError::StepLimitExceeded { max_steps: 20 };
        assert!(e.to_string().contains("20 steps"), "got: {e}");
        assert_eq!(e.code(), "step_limit_exceeded");
        assert!(!e.is_client_error());
    }

    #[test]
    fn invalid_document_is_client_error() {
        let e = PdfQaError::InvalidDocument {
            reason: "first bytes are not %PDF".into(),
        };
        assert!(e.is_client_error());
        assert!(e.to_string().contains("%PDF"));
    }

    #[test]
    fn invalid_page_display() {
        let e = InvalidPageError {
            requested: 7,
            total: 3,
        };
        assert!(e.to_string().contains("7"));
        assert!(e.to_string().contains("3 pages"));
    }

    #[test]
    fn backend_error_converts_to_unavailable() {
        let e: PdfQaError =
            BackendError::transient("openai-compatible", "connection refused").into();
        match e {
            PdfQaError::BackendUnavailable { message } => {
                assert!(message.contains("connection refused"));
                assert!(message.contains("openai-compatible"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn backend_error_kinds() {
        assert!(BackendError::transient("x", "timeout").is_transient());
        assert!(!BackendError::permanent("x", "401").is_transient());
    }
}
