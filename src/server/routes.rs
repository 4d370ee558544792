use super::docs::ApiDoc;
use super::dto::{AskPdfForm, AskResponse, ErrorResponse, HealthResponse};
use super::error::ApiError;
use crate::ask::QaPipeline;
use crate::error::PdfQaError;
use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, State};
use axum::Json;
use std::sync::Arc;
use tracing::{debug, info};
use utoipa::OpenApi;

#[utoipa::path(
    post,
    path = "/ask_pdf",
    tag = "qa",
    request_body(content = AskPdfForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Question answered", body = AskResponse),
        (status = 400, description = "Missing field, empty question or not a PDF", body = ErrorResponse),
        (status = 413, description = "Upload or page count over the limit", body = ErrorResponse),
        (status = 422, description = "Agent did not answer within the step limit", body = ErrorResponse),
        (status = 502, description = "Vision backend unavailable", body = ErrorResponse)
    )
)]
pub async fn ask_pdf(
    State(pipeline): State<Arc<QaPipeline>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<AskResponse>, ApiError> {
    let debug_errors = pipeline.settings().debug;
    let fail = |e: PdfQaError| ApiError::from_error(e, debug_errors);
    let mut multipart = multipart.map_err(ApiError::from_rejection)?;

    let mut upload: Option<(String, Vec<u8>)> = None;
    let mut question: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(ApiError::from_multipart)?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let filename = field.file_name().unwrap_or("upload.pdf").to_string();
                let bytes = field.bytes().await.map_err(ApiError::from_multipart)?;
                upload = Some((filename, bytes.to_vec()));
            }
            "question" => {
                question = Some(field.text().await.map_err(ApiError::from_multipart)?);
            }
            other => debug!(field = other, "Ignoring unknown multipart field"),
        }
    }

    let (filename, bytes) = upload.ok_or_else(|| fail(PdfQaError::MissingField { field: "file" }))?;
    let question =
        question.ok_or_else(|| fail(PdfQaError::MissingField { field: "question" }))?;

    info!(
        file = filename.as_str(),
        bytes = bytes.len(),
        "Received /ask_pdf request"
    );

    let answer = pipeline
        .ask(&filename, bytes, &question)
        .await
        .map_err(fail)?;

    Ok(Json(AskResponse {
        answer: answer.answer,
        page: answer.page,
    }))
}

#[utoipa::path(
    get,
    path = "/health",
    tag = "meta",
    responses((status = 200, description = "Service is up", body = HealthResponse))
)]
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        version: env!("CARGO_PKG_VERSION").into(),
    })
}

#[utoipa::path(
    get,
    path = "/docs",
    tag = "meta",
    responses((status = 200, description = "OpenAPI document for this service"))
)]
pub async fn docs() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
