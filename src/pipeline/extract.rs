//! Text extraction: PDF bytes → plain text.
//!
//! ## Why spawn_blocking?
//!
//! The `pdfium-render` crate wraps the pdfium C++ library, which is not
//! async-aware. Loading a large PDF and walking its text layer is CPU-bound,
//! so the work runs on tokio's blocking pool to keep the worker threads free
//! for other users' events.
//!
//! An extraction that succeeds but yields only whitespace is returned as-is;
//! deciding that this means "scanned PDF" is the caller's business.

use crate::error::AssistError;
use crate::pipeline::format::normalise_extracted;
use async_trait::async_trait;
use tracing::{debug, info};

/// Magic bytes every PDF starts with.
pub const PDF_MAGIC: &[u8; 4] = b"%PDF";

/// Extracts plain text from document bytes.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract_text(&self, bytes: Vec<u8>) -> Result<String, AssistError>;
}

/// Check the PDF magic bytes.
pub fn ensure_pdf(bytes: &[u8]) -> Result<(), AssistError> {
    if bytes.len() < PDF_MAGIC.len() || &bytes[..PDF_MAGIC.len()] != PDF_MAGIC {
        return Err(AssistError::NotAPdf {
            magic: bytes.iter().take(PDF_MAGIC.len()).copied().collect(),
        });
    }
    Ok(())
}

/// [`TextExtractor`] backed by pdfium, auto-downloaded on first use.
#[derive(Debug, Clone, Default)]
pub struct PdfiumExtractor {
    password: Option<String>,
}

impl PdfiumExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `password` for encrypted documents.
    pub fn with_password(password: impl Into<String>) -> Self {
        Self {
            password: Some(password.into()),
        }
    }
}

#[async_trait]
impl TextExtractor for PdfiumExtractor {
    async fn extract_text(&self, bytes: Vec<u8>) -> Result<String, AssistError> {
        ensure_pdf(&bytes)?;
        let password = self.password.clone();

        let text = tokio::task::spawn_blocking(move || {
            extract_text_blocking(&bytes, password.as_deref())
        })
        .await
        .map_err(|e| AssistError::Internal(format!("Extraction task panicked: {}", e)))??;

        Ok(normalise_extracted(&text))
    }
}

/// Blocking implementation of text extraction.
fn extract_text_blocking(bytes: &[u8], password: Option<&str>) -> Result<String, AssistError> {
    let pdfium = pdfium_auto::bind_pdfium_silent().map_err(|e| AssistError::Extraction {
        detail: format!("PDF engine unavailable: {e}"),
    })?;

    let document = pdfium
        .load_pdf_from_byte_slice(bytes, password)
        .map_err(|e| AssistError::Extraction {
            detail: format!("{:?}", e),
        })?;

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    info!("PDF loaded: {} pages", total_pages);

    let mut parts = Vec::with_capacity(total_pages);
    for (idx, page) in pages.iter().enumerate() {
        let text = page.text().map_err(|e| AssistError::Extraction {
            detail: format!("page {}: {:?}", idx + 1, e),
        })?;
        let page_text = text.all();
        debug!("Page {}: {} chars", idx + 1, page_text.chars().count());
        parts.push(page_text);
    }

    Ok(parts.join("\n"))
}
