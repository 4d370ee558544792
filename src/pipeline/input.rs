//! Input validation: reject unusable uploads before pdfium sees them.
//!
//! pdfium happily spends CPU on garbage and reports a generic load failure,
//! so we check the cheap things first: size limit and the `%PDF` magic bytes.
//! The same module loads evaluation references from disk, where a reference
//! may be either a PDF or a single raster image.

use crate::error::PdfQaError;
use std::path::{Path, PathBuf};
use tracing::debug;

/// How far into the file a `%PDF` header may start.
///
/// Some generators emit a few junk bytes (BOM, whitespace) before the header;
/// pdfium tolerates up to 1024.
const MAGIC_SEARCH_WINDOW: usize = 1024;

/// An evaluation reference resolved from disk.
#[derive(Debug)]
pub enum Reference {
    /// A PDF file, still unrendered.
    Pdf { path: PathBuf, bytes: Vec<u8> },
    /// A PNG/JPEG treated as a one-page document.
    Image { path: PathBuf, bytes: Vec<u8> },
}

impl Reference {
    pub fn path(&self) -> &Path {
        match self {
            Reference::Pdf { path, .. } | Reference::Image { path, .. } => path,
        }
    }
}

/// Check that `bytes` is a plausible PDF upload within `max_bytes`.
pub fn validate_pdf_bytes(bytes: &[u8], max_bytes: usize) -> Result<(), PdfQaError> {
    if bytes.len() > max_bytes {
        return Err(PdfQaError::UploadTooLarge {
            size: bytes.len(),
            limit: max_bytes,
        });
    }
    if bytes.is_empty() {
        return Err(PdfQaError::InvalidDocument {
            reason: "upload is empty".into(),
        });
    }
    if !has_pdf_magic(bytes) {
        let mut magic = [0u8; 4];
        let n = bytes.len().min(4);
        magic[..n].copy_from_slice(&bytes[..n]);
        return Err(PdfQaError::InvalidDocument {
            reason: format!("not a PDF file (first bytes: {magic:?})"),
        });
    }
    Ok(())
}

/// `true` if `%PDF` appears within the first [`MAGIC_SEARCH_WINDOW`] bytes.
pub fn has_pdf_magic(bytes: &[u8]) -> bool {
    let head = &bytes[..bytes.len().min(MAGIC_SEARCH_WINDOW)];
    head.windows(4).any(|w| w == b"%PDF")
}

/// `true` for references that should be loaded as a raster image.
pub fn is_image_reference(path: &Path) -> bool {
    matches!(
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref(),
        Some("png") | Some("jpg") | Some("jpeg")
    )
}

/// Read an evaluation reference from disk.
pub async fn load_reference(path: &Path) -> Result<Reference, PdfQaError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|source| PdfQaError::ReadFailed {
            path: path.to_path_buf(),
            source,
        })?;
    debug!("Loaded reference {} ({} bytes)", path.display(), bytes.len());

    let path = path.to_path_buf();
    if is_image_reference(&path) {
        Ok(Reference::Image { path, bytes })
    } else {
        Ok(Reference::Pdf { path, bytes })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_pdf_header() {
        assert!(validate_pdf_bytes(b"%PDF-1.7\n...", 1024).is_ok());
    }

    #[test]
    fn accepts_header_after_junk() {
        assert!(validate_pdf_bytes(b"\xEF\xBB\xBF%PDF-1.4", 1024).is_ok());
    }

    #[test]
    fn rejects_non_pdf() {
        let err = validate_pdf_bytes(b"PK\x03\x04 zip archive", 1024).unwrap_err();
        assert!(matches!(err, PdfQaError::InvalidDocument { .. }));
        assert!(err.is_client_error());
    }

    #[test]
    fn rejects_empty_upload() {
        assert!(matches!(
            validate_pdf_bytes(b"", 1024),
            Err(PdfQaError::InvalidDocument { .. })
        ));
    }

    #[test]
    fn rejects_oversized_upload() {
        let err = validate_pdf_bytes(b"%PDF-1.7 with a body", 4).unwrap_err();
        assert!(matches!(
            err,
            PdfQaError::UploadTooLarge { size: 20, limit: 4 }
        ));
    }

    #[test]
    fn image_reference_detection() {
        assert!(is_image_reference(Path::new("tests/test.png")));
        assert!(is_image_reference(Path::new("scan.JPG")));
        assert!(!is_image_reference(Path::new("report.pdf")));
        assert!(!is_image_reference(Path::new("no_extension")));
    }

    #[tokio::test]
    async fn missing_reference_reports_path() {
        let err = load_reference(Path::new("/definitely/not/here.pdf"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("/definitely/not/here.pdf"));
    }

    #[tokio::test]
    async fn reference_kind_follows_extension() {
        let dir = tempfile::tempdir().unwrap();
        let png = dir.path().join("page.png");
        let pdf = dir.path().join("doc.pdf");
        std::fs::write(&png, b"not really a png").unwrap();
        std::fs::write(&pdf, b"%PDF-1.7").unwrap();

        assert!(matches!(
            load_reference(&png).await.unwrap(),
            Reference::Image { .. }
        ));
        let r = load_reference(&pdf).await.unwrap();
        assert!(matches!(r, Reference::Pdf { .. }));
        assert_eq!(r.path(), pdf.as_path());
    }
}
