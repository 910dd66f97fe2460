//! Text extraction: resume PDF bytes → plain text via pdfium.
//!
//! The PDF is opened straight from memory; uploads never need to touch disk
//! before this stage. pdfium is synchronous and keeps thread-local state, so
//! the work runs under `tokio::task::spawn_blocking`.
//!
//! Every page is extracted, in document order, and pages are joined with a
//! newline. A structurally valid document with zero pages yields an empty
//! string; a document whose pages carry no text at all (a scanned resume) is
//! an extraction error, because the model would have nothing truthful to
//! work from.

use crate::error::TailorError;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// PDF files must carry their `%PDF` header within the first 1024 bytes.
const HEADER_WINDOW: usize = 1024;

/// Extract the text layer of every page.
pub async fn extract_text(
    pdf_bytes: &[u8],
    pdfium_library: Option<&Path>,
) -> Result<String, TailorError> {
    check_pdf_header(pdf_bytes)?;

    let bytes = pdf_bytes.to_vec();
    let library = pdfium_library.map(Path::to_path_buf);

    tokio::task::spawn_blocking(move || extract_text_blocking(&bytes, library.as_deref()))
        .await
        .map_err(|e| TailorError::Internal(format!("Extraction task panicked: {}", e)))?
}

/// Blocking implementation of text extraction.
pub fn extract_text_blocking(
    pdf_bytes: &[u8],
    pdfium_library: Option<&Path>,
) -> Result<String, TailorError> {
    check_pdf_header(pdf_bytes)?;

    let pdfium = bind_pdfium(pdfium_library)?;

    let document = pdfium
        .load_pdf_from_byte_slice(pdf_bytes, None)
        .map_err(|e| {
            let err_str = format!("{:?}", e);
            let detail = if err_str.contains("Password") || err_str.contains("password") {
                "the PDF is encrypted; export an unprotected copy".to_string()
            } else {
                format!("the PDF could not be parsed: {err_str}")
            };
            TailorError::Extraction { detail }
        })?;

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    info!("Resume PDF loaded: {} pages", total_pages);

    let mut page_texts = Vec::with_capacity(total_pages);
    for (idx, page) in pages.iter().enumerate() {
        let text = page
            .text()
            .map_err(|e| TailorError::Extraction {
                detail: format!("page {}: {:?}", idx + 1, e),
            })?
            .all();
        debug!("Page {}: {} chars", idx + 1, text.chars().count());
        page_texts.push(text);
    }

    let text = page_texts.join("\n");
    if total_pages > 0 && text.trim().is_empty() {
        return Err(TailorError::Extraction {
            detail: format!(
                "none of the {total_pages} pages has a text layer (scanned or image-only resume)"
            ),
        });
    }

    Ok(text)
}

/// Reject byte streams that cannot be a PDF before loading pdfium at all.
fn check_pdf_header(bytes: &[u8]) -> Result<(), TailorError> {
    if bytes.is_empty() {
        return Err(TailorError::Extraction {
            detail: "the resume upload is empty".into(),
        });
    }
    let window = &bytes[..bytes.len().min(HEADER_WINDOW)];
    if !window.windows(4).any(|w| w == b"%PDF") {
        let mut magic = [0u8; 4];
        let n = bytes.len().min(4);
        magic[..n].copy_from_slice(&bytes[..n]);
        return Err(TailorError::Extraction {
            detail: format!("not a PDF (first bytes: {magic:?})"),
        });
    }
    Ok(())
}

/// Bind to pdfium: an explicit library file or directory if configured,
/// otherwise the current directory, then the system library paths.
fn bind_pdfium(library: Option<&Path>) -> Result<Pdfium, TailorError> {
    let bindings = match library {
        Some(path) => {
            let lib_path: PathBuf = if path.is_dir() {
                Pdfium::pdfium_platform_library_name_at_path(path)
            } else {
                path.to_path_buf()
            };
            Pdfium::bind_to_library(&lib_path)
        }
        None => Pdfium::bind_to_library(&Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library()),
    }
    .map_err(|e| TailorError::PdfEngineUnavailable(format!("{:?}", e)))?;

    Ok(Pdfium::new(bindings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn empty_bytes_are_an_extraction_error() {
        let err = check_pdf_header(b"").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Extraction);
    }

    #[test]
    fn non_pdf_bytes_are_an_extraction_error() {
        let err = check_pdf_header(b"PK\x03\x04 this is a zip").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Extraction);
        assert!(err.to_string().contains("not a PDF"));
    }

    #[test]
    fn header_may_follow_leading_garbage() {
        let mut bytes = b"\xEF\xBB\xBF\r\n".to_vec();
        bytes.extend_from_slice(b"%PDF-1.4\n");
        assert!(check_pdf_header(&bytes).is_ok());
    }

    #[test]
    fn header_beyond_window_is_rejected() {
        let mut bytes = vec![b' '; HEADER_WINDOW + 10];
        bytes.extend_from_slice(b"%PDF-1.4\n");
        assert!(check_pdf_header(&bytes).is_err());
    }

    #[tokio::test]
    async fn html_error_page_fails_before_pdfium_is_needed() {
        let err = extract_text(b"<html><body>502 Bad Gateway</body></html>", None)
            .await
            .unwrap_err();
        assert!(matches!(err, TailorError::Extraction { .. }));
    }
}
