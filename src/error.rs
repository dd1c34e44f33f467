//! Error types for the edgequake-docassist library.
//!
//! Three distinct error types reflect three distinct failure scopes:
//!
//! * [`AssistError`]: **Operation-fatal**: the requested operation cannot
//!   produce a result (unreadable file, no extractable text, summarisation
//!   failed, stale button). Never fatal to the process: the state machine turns
//!   every variant into a localized notice and returns to a stable menu.
//!
//! * [`CompletionError`]: a single LLM call failed, timed out, or was
//!   rejected before sending because it exceeds the request-size ceiling.
//!
//! * [`ChunkError`]: **Non-fatal**: one chunk of a map phase failed. Stored
//!   inside [`crate::pipeline::transform::ChunkResult`] so the failure policy
//!   of the operation decides whether the whole transform aborts (summaries)
//!   or substitutes an inline marker (translations).
//!
//! Language classification failures have no type here on purpose: the
//! classifier resolves them to its fallback and only logs them.

use std::path::PathBuf;
use thiserror::Error;

/// All operation-level errors returned by the edgequake-docassist library.
#[derive(Debug, Error)]
pub enum AssistError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'")]
    FileNotFound { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'")]
    DownloadTimeout { url: String, secs: u64 },

    /// The bytes received are not a PDF.
    #[error("Document is not a PDF (first bytes: {magic:?})")]
    NotAPdf { magic: Vec<u8> },

    // ── Extraction errors ─────────────────────────────────────────────────
    /// The PDF could not be opened or decoded.
    #[error("Text extraction failed: {detail}")]
    Extraction { detail: String },

    /// The PDF decoded fine but contains no extractable text (likely scanned).
    #[error("Document contains no extractable text")]
    EmptyText,

    // ── LLM errors ────────────────────────────────────────────────────────
    /// A completion call failed in a way the operation cannot tolerate.
    #[error(transparent)]
    Completion(#[from] CompletionError),

    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── Session errors ────────────────────────────────────────────────────
    /// An action refers to a document or artifact that is no longer current.
    #[error("Action refers to a document that is no longer current")]
    StaleState,

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A failed call to the completion collaborator.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CompletionError {
    /// The provider returned an error (after retries).
    #[error("LLM API error: {detail}")]
    Api { detail: String },

    /// The call did not finish within the configured timeout.
    #[error("LLM call timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The request exceeds the upstream input-size ceiling and was not sent.
    #[error("Request of {chars} chars exceeds the {limit}-char input limit")]
    RequestTooLarge { chars: usize, limit: usize },
}

/// A non-fatal error for a single chunk of a map phase.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChunkError {
    /// The completion call for this chunk (1-indexed) failed.
    #[error("Chunk {chunk}: completion failed: {cause}")]
    CompletionFailed {
        chunk: usize,
        #[source]
        cause: CompletionError,
    },
}

impl ChunkError {
    /// The underlying completion failure.
    pub fn cause(&self) -> &CompletionError {
        match self {
            ChunkError::CompletionFailed { cause, .. } => cause,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completion_error_converts_into_assist_error() {
        let e: AssistError = CompletionError::Timeout { secs: 60 }.into();
        assert!(matches!(e, AssistError::Completion(_)));
        assert!(e.to_string().contains("60s"), "got: {e}");
    }

    #[test]
    fn request_too_large_display() {
        let e = CompletionError::RequestTooLarge {
            chars: 15000,
            limit: 12000,
        };
        let msg = e.to_string();
        assert!(msg.contains("15000"));
        assert!(msg.contains("12000"));
    }

    #[test]
    fn chunk_error_display() {
        let e = ChunkError::CompletionFailed {
            chunk: 2,
            cause: CompletionError::Api {
                detail: "rate limited".into(),
            },
        };
        assert!(e.to_string().contains("Chunk 2"));
        assert!(e.to_string().contains("rate limited"));
    }

    #[test]
    fn not_a_pdf_display() {
        let e = AssistError::NotAPdf {
            magic: b"PK\x03\x04".to_vec(),
        };
        assert!(e.to_string().contains("not a PDF"));
    }
}
