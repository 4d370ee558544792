//! PDF rasterisation: turn upload bytes into a [`PdfDocument`] via pdfium.
//!
//! ## Why spawn_blocking?
//!
//! `pdfium-render` wraps the pdfium C++ library, which is CPU-bound and not
//! async-aware. [`render_document`] moves the whole render onto Tokio's
//! blocking pool so concurrent requests keep flowing while one large PDF is
//! being rasterised.
//!
//! ## Why a trait?
//!
//! [`PageRenderer`] is the seam between the QA pipeline and pdfium. The
//! service uses [`PdfiumRenderer`]; tests plug in an in-memory renderer so
//! the agent loop and HTTP layer can be exercised without a pdfium binary.

use crate::document::{PdfDocument, RenderedPage};
use crate::error::PdfQaError;
use crate::pipeline::encode::{encode_page, fit_within};
use crate::settings::{Settings, RENDERED_PIXELS_LIMIT};
use pdfium_render::prelude::{PdfRenderConfig, Pdfium};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

/// Converts raw PDF bytes into rendered pages.
///
/// Implementations are called from the blocking thread pool and must not
/// assume an async context.
pub trait PageRenderer: Send + Sync {
    /// Render every page of `bytes`. `source` names the upload for logs and errors.
    fn render(&self, source: &str, bytes: &[u8]) -> Result<PdfDocument, PdfQaError>;
}

/// Render on the blocking pool.
pub async fn render_document(
    renderer: Arc<dyn PageRenderer>,
    source: String,
    bytes: Vec<u8>,
) -> Result<PdfDocument, PdfQaError> {
    tokio::task::spawn_blocking(move || renderer.render(&source, &bytes))
        .await
        .map_err(|e| PdfQaError::Internal(format!("Render task panicked: {e}")))?
}

/// Wrap a PNG/JPEG as a one-page document.
pub fn document_from_image(
    source: &str,
    bytes: &[u8],
    max_pixels: u32,
) -> Result<PdfDocument, PdfQaError> {
    let img = image::load_from_memory(bytes).map_err(|e| PdfQaError::InvalidDocument {
        reason: format!("cannot decode image '{source}': {e}"),
    })?;
    let img = fit_within(img, max_pixels);
    let encoded = encode_page(&img).map_err(|e| PdfQaError::RasterisationFailed {
        page: 1,
        detail: format!("Image encoding failed: {e}"),
    })?;

    let page = RenderedPage {
        index: 0,
        image: encoded,
        width: img.width(),
        height: img.height(),
        text: None,
    };
    PdfDocument::new(source, vec![page])
        .ok_or_else(|| PdfQaError::Internal("single-page document was empty".into()))
}

/// pdfium-backed renderer.
#[derive(Debug, Clone)]
pub struct PdfiumRenderer {
    dpi: u32,
    max_pixels: u32,
    max_pages: usize,
    lib_path: Option<PathBuf>,
}

impl PdfiumRenderer {
    pub fn new(dpi: u32, max_pixels: u32, max_pages: usize, lib_path: Option<PathBuf>) -> Self {
        Self {
            dpi,
            max_pixels: max_pixels.clamp(1, RENDERED_PIXELS_LIMIT),
            max_pages,
            lib_path,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.dpi,
            settings.max_rendered_pixels,
            settings.max_pages,
            settings.pdfium_lib_path.clone(),
        )
    }

    /// Bind to `PDFIUM_LIB_PATH` if configured, else to the system library.
    fn bind(&self) -> Result<Pdfium, PdfQaError> {
        let bindings = match &self.lib_path {
            Some(path) if path.is_dir() => {
                Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(path))
            }
            Some(path) => Pdfium::bind_to_library(path),
            None => Pdfium::bind_to_system_library(),
        }
        .map_err(|e| PdfQaError::PdfiumBindingFailed(format!("{e:?}")))?;
        Ok(Pdfium::new(bindings))
    }

    /// Target width in pixels for a page `width_points` wide at the configured DPI.
    fn target_width(&self, width_points: f32) -> i32 {
        let px = (width_points / 72.0 * self.dpi as f32).round() as u32;
        px.clamp(1, self.max_pixels) as i32
    }
}

impl PageRenderer for PdfiumRenderer {
    fn render(&self, source: &str, bytes: &[u8]) -> Result<PdfDocument, PdfQaError> {
        let pdfium = self.bind()?;

        let document = pdfium
            .load_pdf_from_byte_slice(bytes, None)
            .map_err(|e| load_error(source, &format!("{e:?}")))?;

        let pages = document.pages();
        let total_pages = pages.len() as usize;
        info!("PDF '{}' loaded: {} pages", source, total_pages);

        if total_pages == 0 {
            return Err(PdfQaError::InvalidDocument {
                reason: format!("'{source}' has no pages"),
            });
        }
        if total_pages > self.max_pages {
            return Err(PdfQaError::TooManyPages {
                pages: total_pages,
                limit: self.max_pages,
            });
        }

        let mut rendered = Vec::with_capacity(total_pages);
        for idx in 0..total_pages {
            let page = pages
                .get(idx as u16)
                .map_err(|e| PdfQaError::RasterisationFailed {
                    page: idx + 1,
                    detail: format!("{e:?}"),
                })?;

            let render_config = PdfRenderConfig::new()
                .set_target_width(self.target_width(page.width().value))
                .set_maximum_height(self.max_pixels as i32);

            let bitmap = page.render_with_config(&render_config).map_err(|e| {
                PdfQaError::RasterisationFailed {
                    page: idx + 1,
                    detail: format!("{e:?}"),
                }
            })?;
            let image = bitmap.as_image();

            let text = page
                .text()
                .map(|t| t.all())
                .ok()
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty());

            let encoded = encode_page(&image).map_err(|e| PdfQaError::RasterisationFailed {
                page: idx + 1,
                detail: format!("Image encoding failed: {e}"),
            })?;

            debug!(
                "Rendered page {} → {}x{} px, {} text chars",
                idx + 1,
                image.width(),
                image.height(),
                text.as_ref().map_or(0, |t| t.len())
            );

            rendered.push(RenderedPage {
                index: idx,
                image: encoded,
                width: image.width(),
                height: image.height(),
                text,
            });
        }

        PdfDocument::new(source, rendered)
            .ok_or_else(|| PdfQaError::Internal("rendered document was empty".into()))
    }
}

/// Map a pdfium load failure to a client-facing document error.
fn load_error(source: &str, detail: &str) -> PdfQaError {
    if detail.contains("Password") || detail.contains("password") {
        PdfQaError::InvalidDocument {
            reason: format!("'{source}' is encrypted and requires a password"),
        }
    } else {
        PdfQaError::InvalidDocument {
            reason: format!("'{source}' could not be parsed as a PDF: {detail}"),
        }
    }
}
