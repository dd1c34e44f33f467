//! # edgequake-docassist
//!
//! A conversational assistant for PDF documents: a user uploads a PDF, the
//! assistant extracts its text, detects its language and offers a menu of
//! derived operations (short summary, long summary, key points, simple
//! explanation, translation into one of six languages).
//!
//! ## Why map-reduce?
//!
//! LLM providers cap the size of a single request, so documents of arbitrary
//! length are split into bounded chunks, each chunk is transformed on its own
//! (map), and the partial results are merged by further calls (reduce).
//! Translations skip the reduce pass and are concatenated in order.
//!
//! ## Pipeline Overview
//!
//! ```text
//! event
//!  │
//!  ├─ 1. Session   lock the user's session, decode the button action
//!  ├─ 2. Extract   PDF bytes → text via pdfium (spawn_blocking)
//!  ├─ 3. Classify  document / user language (temperature 0, fail-open)
//!  ├─ 4. Map       one completion per chunk, bounded concurrency
//!  ├─ 5. Reduce    hierarchical merge of ordered partials
//!  └─ 6. Format    polish + truncate to the transport's message limit
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_docassist::{AssistantConfig, DocumentAssistant, Inbound, UserId};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / EDGEQUAKE_LLM_PROVIDER / …
//!     let assistant = DocumentAssistant::from_config(AssistantConfig::default())?;
//!     let bytes = std::fs::read("document.pdf")?;
//!     let user = UserId(42);
//!
//!     for effect in assistant
//!         .handle(user, Inbound::DocumentReceived { bytes, mime_type: None })
//!         .await
//!     {
//!         println!("{}", serde_json::to_string(&effect)?);
//!     }
//!     let summary = assistant
//!         .handle(user, Inbound::ButtonPressed { action_id: "summary_short".into() })
//!         .await;
//!     println!("{summary:?}");
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `docassist` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when embedding the assistant in another transport:
//! ```toml
//! edgequake-docassist = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod language;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod session;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{AssistantConfig, AssistantConfigBuilder};
pub use error::{AssistError, ChunkError, CompletionError};
pub use language::{
    normalize_language_label, DetectedLanguage, LanguageClassifier, LanguageCode, TargetLanguage,
};
pub use pipeline::extract::{PdfiumExtractor, TextExtractor};
pub use pipeline::format::format;
pub use pipeline::llm::{Completer, LlmCompleter};
pub use pipeline::transform::{
    FailurePolicy, Operation, TransformEngine, TransformOutput, TransformRequest, TransformStats,
};
pub use progress::{NoopProgressCallback, ProgressCallback, TransformProgressCallback};
pub use session::action::{
    ActionKind, DocumentId, Inbound, MenuOption, MenuSpec, Outbound, TranslateScope, UserId,
};
pub use session::machine::DocumentAssistant;
pub use session::store::{MenuState, SessionStore};
