//! Input resolution: read a user-supplied path or URL into PDF bytes.
//!
//! Used by the terminal transport, where documents come from the command
//! line rather than a chat upload. The PDF magic bytes are validated before
//! returning so callers get a meaningful error instead of a pdfium failure.

use crate::error::AssistError;
use crate::pipeline::extract::ensure_pdf;
use std::path::PathBuf;
use tracing::{debug, info};

/// A document loaded into memory, ready for a `DocumentReceived` event.
#[derive(Debug, Clone)]
pub struct LoadedDocument {
    pub bytes: Vec<u8>,
    /// Best-effort file name (last path or URL segment).
    pub file_name: String,
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Load a local PDF file or download one from an HTTP(S) URL.
pub async fn load_document(input: &str, timeout_secs: u64) -> Result<LoadedDocument, AssistError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(AssistError::InvalidInput {
            input: input.to_string(),
        });
    }
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        load_local(input).await
    }
}

async fn load_local(path_str: &str) -> Result<LoadedDocument, AssistError> {
    let path = PathBuf::from(path_str);
    let bytes = tokio::fs::read(&path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => AssistError::FileNotFound { path: path.clone() },
        _ => AssistError::Extraction {
            detail: format!("cannot read '{}': {}", path.display(), e),
        },
    })?;
    ensure_pdf(&bytes)?;

    debug!("Loaded local PDF: {} ({} bytes)", path.display(), bytes.len());
    Ok(LoadedDocument {
        file_name: path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "document.pdf".to_string()),
        bytes,
    })
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<LoadedDocument, AssistError> {
    info!("Downloading PDF from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| AssistError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            AssistError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            AssistError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(AssistError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| AssistError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?
        .to_vec();
    ensure_pdf(&bytes)?;

    info!("Downloaded {} bytes", bytes.len());
    Ok(LoadedDocument {
        file_name: file_name_from_url(url),
        bytes,
    })
}

/// Extract a reasonable filename from the URL path.
fn file_name_from_url(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() && last.contains('.') {
                    return last.to_string();
                }
            }
        }
    }
    "downloaded.pdf".to_string()
}
