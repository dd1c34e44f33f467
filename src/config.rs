//! Configuration for the document assistant.
//!
//! All behaviour is controlled through [`AssistantConfig`], built via its
//! [`AssistantConfigBuilder`]. One struct carries every knob so the same
//! config can be shared by the transform engine, the completer and the
//! session store, and logged as a whole when diagnosing a run.

use crate::error::AssistError;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Configuration for a [`crate::DocumentAssistant`].
///
/// # Example
/// ```rust
/// use edgequake_docassist::AssistantConfig;
///
/// let config = AssistantConfig::builder()
///     .summary_chunk_chars(2500)
///     .concurrency(2)
///     .model("gpt-4o-mini")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct AssistantConfig {
    /// Chunk size (characters) for summary, key-point and explanation map
    /// passes. Default: 3000.
    ///
    /// Kept small so instruction, chunk and generated output all fit well
    /// under the provider's input ceiling.
    pub summary_chunk_chars: usize,

    /// Chunk size (characters) for translation map passes. Default: 4000.
    ///
    /// Translation has no reduce step, so fewer, larger chunks mean fewer
    /// seams in the concatenated output.
    pub translation_chunk_chars: usize,

    /// Maximum combined size of the partial outputs fed to one merge call.
    /// Default: 9000. Larger reduce inputs are merged hierarchically.
    pub reduce_input_chars: usize,

    /// Upstream request-size ceiling (system + user prompt characters).
    /// Default: 12000. Requests above it are rejected without being sent.
    pub max_input_chars: usize,

    /// Number of concurrent map-phase completion calls. Default: 4.
    ///
    /// Lower it when the provider answers with rate-limit errors.
    pub concurrency: usize,

    /// Sampling temperature for transform calls. Default: 0.3.
    ///
    /// Language classification always runs at temperature 0 regardless.
    pub temperature: f32,

    /// Maximum tokens generated per completion. Default: 2048.
    pub max_tokens: usize,

    /// Maximum retry attempts on a transient completion failure. Default: 2.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds (exponential backoff). Default: 500.
    pub retry_backoff_ms: u64,

    /// Per-completion timeout in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// Transport message-size limit used by the output formatter. Default: 4000.
    pub message_limit: usize,

    /// Sessions idle for longer than this are evicted. Default: 24 h.
    /// `None` keeps sessions for the process lifetime.
    pub session_idle_ttl_secs: Option<u64>,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// LLM model identifier, e.g. "gpt-4o-mini". If None, uses the default.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Per-chunk progress events. Default: None.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            summary_chunk_chars: 3000,
            translation_chunk_chars: 4000,
            reduce_input_chars: 9000,
            max_input_chars: 12000,
            concurrency: 4,
            temperature: 0.3,
            max_tokens: 2048,
            max_retries: 2,
            retry_backoff_ms: 500,
            api_timeout_secs: 60,
            message_limit: 4000,
            session_idle_ttl_secs: Some(24 * 60 * 60),
            download_timeout_secs: 120,
            model: None,
            provider_name: None,
            provider: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for AssistantConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssistantConfig")
            .field("summary_chunk_chars", &self.summary_chunk_chars)
            .field("translation_chunk_chars", &self.translation_chunk_chars)
            .field("reduce_input_chars", &self.reduce_input_chars)
            .field("max_input_chars", &self.max_input_chars)
            .field("concurrency", &self.concurrency)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("message_limit", &self.message_limit)
            .field("session_idle_ttl_secs", &self.session_idle_ttl_secs)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn TransformProgressCallback>"),
            )
            .finish()
    }
}

impl AssistantConfig {
    /// Create a new builder for `AssistantConfig`.
    pub fn builder() -> AssistantConfigBuilder {
        AssistantConfigBuilder {
            config: Self::default(),
        }
    }

    /// Per-completion timeout as a `Duration`.
    pub fn api_timeout(&self) -> Duration {
        Duration::from_secs(self.api_timeout_secs)
    }

    /// Idle-session time-to-live as a `Duration`, if eviction is enabled.
    pub fn session_idle_ttl(&self) -> Option<Duration> {
        self.session_idle_ttl_secs.map(Duration::from_secs)
    }
}

/// Builder for [`AssistantConfig`].
#[derive(Debug)]
pub struct AssistantConfigBuilder {
    config: AssistantConfig,
}

impl AssistantConfigBuilder {
    pub fn summary_chunk_chars(mut self, n: usize) -> Self {
        self.config.summary_chunk_chars = n;
        self
    }

    pub fn translation_chunk_chars(mut self, n: usize) -> Self {
        self.config.translation_chunk_chars = n;
        self
    }

    pub fn reduce_input_chars(mut self, n: usize) -> Self {
        self.config.reduce_input_chars = n;
        self
    }

    pub fn max_input_chars(mut self, n: usize) -> Self {
        self.config.max_input_chars = n;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn message_limit(mut self, n: usize) -> Self {
        self.config.message_limit = n;
        self
    }

    pub fn session_idle_ttl_secs(mut self, secs: Option<u64>) -> Self {
        self.config.session_idle_ttl_secs = secs;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<AssistantConfig, AssistError> {
        let c = &self.config;
        if c.summary_chunk_chars == 0 || c.translation_chunk_chars == 0 {
            return Err(AssistError::InvalidConfig(
                "Chunk sizes must be ≥ 1".into(),
            ));
        }
        if c.reduce_input_chars == 0 {
            return Err(AssistError::InvalidConfig(
                "Reduce input size must be ≥ 1".into(),
            ));
        }
        if c.summary_chunk_chars >= c.max_input_chars
            || c.translation_chunk_chars >= c.max_input_chars
        {
            return Err(AssistError::InvalidConfig(format!(
                "Chunk sizes must stay below the {}-char input limit",
                c.max_input_chars
            )));
        }
        if c.concurrency == 0 {
            return Err(AssistError::InvalidConfig("Concurrency must be ≥ 1".into()));
        }
        if c.message_limit <= crate::pipeline::format::TRUNCATION_MARKER.chars().count() {
            return Err(AssistError::InvalidConfig(format!(
                "Message limit must exceed the truncation marker, got {}",
                c.message_limit
            )));
        }
        Ok(self.config)
    }
}
