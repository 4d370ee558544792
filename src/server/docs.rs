use super::dto::{AskPdfForm, AskResponse, ErrorResponse, HealthResponse};
use super::routes;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(title = "edgequake-pdfqa", description = "Visual question answering over PDF documents"),
    paths(routes::ask_pdf, routes::health, routes::docs),
    components(schemas(AskPdfForm, AskResponse, ErrorResponse, HealthResponse)),
    tags(
        (name = "qa", description = "Ask questions about a PDF"),
        (name = "meta", description = "Service health and API description")
    )
)]
pub struct ApiDoc;
