use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Multipart form accepted by `POST /ask_pdf`. Documentation only.
#[allow(dead_code)]
#[derive(ToSchema)]
pub struct AskPdfForm {
    /// The PDF document.
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
    /// Natural-language question about the document.
    pub question: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AskResponse {
    /// The answer as read from the document.
    pub answer: String,
    /// 1-based page the answer was found on.
    pub page: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    /// Stable machine-readable error code, e.g. `step_limit_exceeded`.
    pub code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}
