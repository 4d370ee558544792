use super::dto::ErrorResponse;
use crate::error::PdfQaError;
use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind HTTP listener on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("HTTP server error: {0}")]
    Serve(#[from] std::io::Error),
}

/// HTTP status for each fatal pipeline error.
pub fn status_for(error: &PdfQaError) -> StatusCode {
    match error {
        PdfQaError::InvalidDocument { .. }
        | PdfQaError::MissingField { .. }
        | PdfQaError::EmptyQuestion => StatusCode::BAD_REQUEST,
        PdfQaError::UploadTooLarge { .. } | PdfQaError::TooManyPages { .. } => {
            StatusCode::PAYLOAD_TOO_LARGE
        }
        PdfQaError::StepLimitExceeded { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        PdfQaError::BackendUnavailable { .. } => StatusCode::BAD_GATEWAY,
        PdfQaError::ReadFailed { .. }
        | PdfQaError::RasterisationFailed { .. }
        | PdfQaError::PdfiumBindingFailed(_)
        | PdfQaError::ProviderNotConfigured { .. }
        | PdfQaError::InvalidConfig(_)
        | PdfQaError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// An error response: `{"error": ..., "code": ...}` with a status.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    /// Server-side and upstream details are replaced by a generic message
    /// unless `debug` is on.
    pub fn from_error(err: PdfQaError, debug: bool) -> Self {
        let status = status_for(&err);
        if status.is_server_error() {
            error!(code = err.code(), "Request failed: {err}");
        }
        let message = match status {
            _ if debug => err.to_string(),
            StatusCode::INTERNAL_SERVER_ERROR => "Internal server error".to_string(),
            StatusCode::BAD_GATEWAY => "Model backend unavailable".to_string(),
            _ => err.to_string(),
        };
        Self {
            status,
            code: err.code(),
            message,
        }
    }

    pub fn from_rejection(rejection: MultipartRejection) -> Self {
        Self {
            status: rejection.status(),
            code: "invalid_multipart",
            message: rejection.body_text(),
        }
    }

    pub fn from_multipart(err: MultipartError) -> Self {
        let status = err.status();
        let code = if status == StatusCode::PAYLOAD_TOO_LARGE {
            "upload_too_large"
        } else {
            "invalid_multipart"
        };
        Self {
            status,
            code,
            message: err.body_text(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
                code: self.code.to_string(),
            }),
        )
            .into_response()
    }
}
