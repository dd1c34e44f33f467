//! Pipeline stages for turning an uploaded PDF into a derived artifact.
//!
//! Each submodule implements exactly one step, so each is testable on its
//! own and the LLM and PDF backends can be swapped behind their traits.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ extract ──▶ chunk ──▶ llm (map) ──▶ llm (reduce) ──▶ format
//! (path/URL) (pdfium)   (split)   (per chunk)   (merge)          (polish, truncate)
//! ```
//!
//! 1. [`input`]     read a local path or download a URL (terminal transport)
//! 2. [`extract`]   PDF bytes → plain text; `spawn_blocking` around pdfium
//! 3. [`chunk`]     lossless positional split into bounded chunks
//! 4. [`llm`]       the [`llm::Completer`] seam with timeout and retry
//! 5. [`transform`] the map-reduce engine shared by every operation
//! 6. [`format`]    deterministic cleanup and message-size truncation

pub mod chunk;
pub mod extract;
pub mod format;
pub mod input;
pub mod llm;
pub mod transform;
