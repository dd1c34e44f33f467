//! Progress-callback trait for per-chunk transform events.
//!
//! Inject an [`Arc<dyn TransformProgressCallback>`] via
//! [`crate::config::AssistantConfigBuilder::progress_callback`] to receive
//! events while the map-reduce engine works through a document.
//!
//! The callback is the least-invasive integration point: a chat transport can
//! turn events into "typing…" indicators, a terminal can drive a progress bar,
//! and the library does not need to know which. The trait is `Send + Sync`
//! because map-phase chunks are processed concurrently.
//!
//! # Example
//!
//! ```rust
//! use edgequake_docassist::{AssistantConfig, TransformProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     completed: AtomicUsize,
//! }
//!
//! impl TransformProgressCallback for CountingCallback {
//!     fn on_chunk_complete(&self, chunk: usize, total_chunks: usize, output_len: usize) {
//!         self.completed.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("chunk {}/{} done ({} chars)", chunk, total_chunks, output_len);
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { completed: AtomicUsize::new(0) });
//!
//! let config = AssistantConfig::builder()
//!     .progress_callback(counter as Arc<dyn TransformProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the transform engine as it processes each chunk.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. `on_chunk_start`, `on_chunk_complete` and
/// `on_chunk_error` may be called concurrently from different tasks.
pub trait TransformProgressCallback: Send + Sync {
    /// Called once after the source text has been chunked.
    fn on_transform_start(&self, total_chunks: usize) {
        let _ = total_chunks;
    }

    /// Called just before the completion request for a chunk (1-indexed).
    fn on_chunk_start(&self, chunk: usize, total_chunks: usize) {
        let _ = (chunk, total_chunks);
    }

    /// Called when a chunk's completion succeeded.
    fn on_chunk_complete(&self, chunk: usize, total_chunks: usize, output_len: usize) {
        let _ = (chunk, total_chunks, output_len);
    }

    /// Called when a chunk's completion failed after all retries.
    fn on_chunk_error(&self, chunk: usize, total_chunks: usize, error: &str) {
        let _ = (chunk, total_chunks, error);
    }

    /// Called before each merge level of the reduce phase.
    fn on_reduce_start(&self, partials: usize) {
        let _ = partials;
    }

    /// Called once after the final result exists (after reduce or
    /// concatenation) or the transform failed. Not called for empty sources.
    fn on_transform_complete(&self, total_chunks: usize, success_count: usize) {
        let _ = (total_chunks, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl TransformProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::AssistantConfig`].
pub type ProgressCallback = Arc<dyn TransformProgressCallback>;
