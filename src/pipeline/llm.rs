//! The completion seam: one `(system, user, temperature) → text` call.
//!
//! Everything above this module talks to [`Completer`] only, so the transform
//! engine and the language classifier can be driven by a scripted completer
//! in tests. [`LlmCompleter`] is the production implementation over any
//! `edgequake_llm` provider.
//!
//! ## Retry Strategy
//!
//! HTTP 429 / 503 errors from LLM APIs are transient and frequent under
//! concurrent load. Exponential backoff (`retry_backoff_ms * 2^attempt`)
//! avoids a thundering herd: with 500 ms base and 2 retries the wait sequence
//! is 500 ms → 1 s. Each attempt is bounded by `api_timeout_secs`; an attempt
//! that times out counts as a failed attempt.

use crate::config::AssistantConfig;
use crate::error::{AssistError, CompletionError};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, warn};

/// Default model when neither the config nor the environment names one.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// A single, fallible LLM completion.
#[async_trait]
pub trait Completer: Send + Sync {
    /// Complete `user_prompt` under `system_prompt` at the given temperature.
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        temperature: f32,
    ) -> Result<String, CompletionError>;
}

/// [`Completer`] backed by an `edgequake_llm` provider, with an input-size
/// ceiling, a per-attempt timeout and retry with exponential backoff.
pub struct LlmCompleter {
    provider: Arc<dyn LLMProvider>,
    max_input_chars: usize,
    max_tokens: usize,
    max_retries: u32,
    retry_backoff_ms: u64,
    api_timeout: Duration,
}

impl LlmCompleter {
    /// Wrap `provider` using the limits from `config`.
    pub fn new(provider: Arc<dyn LLMProvider>, config: &AssistantConfig) -> Self {
        Self {
            provider,
            max_input_chars: config.max_input_chars,
            max_tokens: config.max_tokens,
            max_retries: config.max_retries,
            retry_backoff_ms: config.retry_backoff_ms,
            api_timeout: config.api_timeout(),
        }
    }

    /// Resolve the provider from `config` and the environment, then wrap it.
    pub fn from_config(config: &AssistantConfig) -> Result<Self, AssistError> {
        let provider = resolve_provider(config)?;
        Ok(Self::new(provider, config))
    }
}

#[async_trait]
impl Completer for LlmCompleter {
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        temperature: f32,
    ) -> Result<String, CompletionError> {
        check_request_size(system_prompt, user_prompt, self.max_input_chars)?;

        let messages = vec![
            ChatMessage::system(system_prompt),
            ChatMessage::user(user_prompt),
        ];
        let options = CompletionOptions {
            temperature: Some(temperature),
            max_tokens: Some(self.max_tokens),
            ..Default::default()
        };

        let start = Instant::now();
        let mut last_err = CompletionError::Api {
            detail: "no attempt made".to_string(),
        };

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let backoff = backoff_delay(self.retry_backoff_ms, attempt);
                warn!(
                    "Completion retry {}/{} after {:?}",
                    attempt, self.max_retries, backoff
                );
                sleep(backoff).await;
            }

            match timeout(self.api_timeout, self.provider.chat(&messages, Some(&options))).await {
                Ok(Ok(response)) => {
                    debug!(
                        "Completion: {} input tokens, {} output tokens, {:?}",
                        response.prompt_tokens,
                        response.completion_tokens,
                        start.elapsed()
                    );
                    return Ok(response.content);
                }
                Ok(Err(e)) => {
                    warn!("Completion attempt {} failed: {}", attempt + 1, e);
                    last_err = CompletionError::Api {
                        detail: e.to_string(),
                    };
                }
                Err(_) => {
                    warn!(
                        "Completion attempt {} timed out after {}s",
                        attempt + 1,
                        self.api_timeout.as_secs()
                    );
                    last_err = CompletionError::Timeout {
                        secs: self.api_timeout.as_secs(),
                    };
                }
            }
        }

        Err(last_err)
    }
}

/// Reject requests above the upstream ceiling before sending them.
fn check_request_size(
    system_prompt: &str,
    user_prompt: &str,
    limit: usize,
) -> Result<usize, CompletionError> {
    let chars = system_prompt.chars().count() + user_prompt.chars().count();
    if chars > limit {
        return Err(CompletionError::RequestTooLarge { chars, limit });
    }
    Ok(chars)
}

/// Wait before retry `attempt` (1-based): `base_ms * 2^(attempt - 1)`.
fn backoff_delay(base_ms: u64, attempt: u32) -> Duration {
    let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
    Duration::from_millis(base_ms.saturating_mul(factor))
}

/// Instantiate a named provider with the given model.
fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, AssistError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        AssistError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the LLM provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`), used as-is.
/// 2. **Named provider + model** (`config.provider_name`).
/// 3. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`).
/// 4. **OpenAI key present** (`OPENAI_API_KEY`), with the configured or
///    default model.
/// 5. **Full auto-detection** (`ProviderFactory::from_env`).
pub fn resolve_provider(config: &AssistantConfig) -> Result<Arc<dyn LLMProvider>, AssistError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);

    if let Some(ref name) = config.provider_name {
        return create_provider(name, model);
    }

    if let (Ok(prov), Ok(env_model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !env_model.is_empty() {
            return create_provider(&prov, &env_model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            return create_provider("openai", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| AssistError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}

#[cfg(test)]
mod tests {
    use super::*;
    use edgequake_llm::{LLMResponse, LlmError};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio_test::{assert_err, assert_ok};

    /// Provider that fails its first `failures` chats, optionally stalls,
    /// and counts every call.
    struct FlakyProvider {
        failures: usize,
        stall: Option<Duration>,
        calls: AtomicUsize,
    }

    impl FlakyProvider {
        fn new(failures: usize, stall: Option<Duration>) -> Arc<Self> {
            Arc::new(Self {
                failures,
                stall,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LLMProvider for FlakyProvider {
        fn name(&self) -> &str {
            "flaky"
        }

        fn model(&self) -> &str {
            "flaky-1"
        }

        fn max_context_length(&self) -> usize {
            128_000
        }

        async fn complete(&self, prompt: &str) -> edgequake_llm::Result<LLMResponse> {
            self.chat(&[ChatMessage::user(prompt)], None).await
        }

        async fn complete_with_options(
            &self,
            prompt: &str,
            options: &CompletionOptions,
        ) -> edgequake_llm::Result<LLMResponse> {
            self.chat(&[ChatMessage::user(prompt)], Some(options)).await
        }

        async fn chat(
            &self,
            _messages: &[ChatMessage],
            _options: Option<&CompletionOptions>,
        ) -> edgequake_llm::Result<LLMResponse> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(stall) = self.stall {
                sleep(stall).await;
            }
            if call < self.failures {
                return Err(LlmError::RateLimited("slow down".into()));
            }
            Ok(LLMResponse::new("ok", "flaky-1"))
        }
    }

    fn completer(provider: Arc<FlakyProvider>, max_retries: u32, timeout_ms: u64) -> LlmCompleter {
        LlmCompleter {
            provider,
            max_input_chars: 100,
            max_tokens: 64,
            max_retries,
            retry_backoff_ms: 1,
            api_timeout: Duration::from_millis(timeout_ms),
        }
    }

    #[tokio::test]
    async fn transient_failures_are_retried() {
        let provider = FlakyProvider::new(2, None);
        let llm = completer(Arc::clone(&provider), 2, 1_000);

        let out = assert_ok!(llm.complete("sys", "user", 0.2).await);
        assert_eq!(out, "ok");
        assert_eq!(provider.calls(), 3);
    }

    #[tokio::test]
    async fn exhausted_retries_surface_the_api_error() {
        let provider = FlakyProvider::new(usize::MAX, None);
        let llm = completer(Arc::clone(&provider), 2, 1_000);

        let err = assert_err!(llm.complete("sys", "user", 0.2).await);
        assert!(matches!(err, CompletionError::Api { ref detail } if detail.contains("slow down")));
        assert_eq!(provider.calls(), 3);
    }

    #[tokio::test]
    async fn stalled_attempts_time_out_and_count_as_failures() {
        let provider = FlakyProvider::new(0, Some(Duration::from_secs(3600)));
        let llm = completer(Arc::clone(&provider), 1, 20);

        let err = assert_err!(llm.complete("sys", "user", 0.2).await);
        assert!(matches!(err, CompletionError::Timeout { .. }), "got {err:?}");
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn oversized_request_is_never_sent() {
        let provider = FlakyProvider::new(0, None);
        let llm = completer(Arc::clone(&provider), 2, 1_000);

        let err = assert_err!(llm.complete("sys", &"x".repeat(200), 0.2).await);
        assert!(matches!(err, CompletionError::RequestTooLarge { limit: 100, .. }));
        assert_eq!(provider.calls(), 0);
    }

    #[test]
    fn request_size_counts_both_prompts() {
        assert_eq!(assert_ok!(check_request_size("abc", "de", 5)), 5);
        let err = assert_err!(check_request_size("abc", "def", 5));
        assert_eq!(err, CompletionError::RequestTooLarge { chars: 6, limit: 5 });
    }

    #[test]
    fn request_size_counts_chars_not_bytes() {
        assert_ok!(check_request_size("ñññ", "жжж", 6));
    }

    #[test]
    fn backoff_doubles_per_attempt() {
        assert_eq!(backoff_delay(500, 1), Duration::from_millis(500));
        assert_eq!(backoff_delay(500, 2), Duration::from_millis(1000));
        assert_eq!(backoff_delay(500, 3), Duration::from_millis(2000));
    }

    #[test]
    fn backoff_saturates() {
        assert_eq!(backoff_delay(u64::MAX, 10), Duration::from_millis(u64::MAX));
    }

    #[test]
    fn summary_chunks_fit_the_default_ceiling() {
        let config = AssistantConfig::default();
        let prompt = crate::prompts::map_prompt(
            &crate::prompts::in_user_language(
                crate::prompts::SIMPLE_EXPLANATION_INSTRUCTION,
                crate::language::LanguageCode::Ru,
            ),
            &"x".repeat(config.translation_chunk_chars),
        );
        assert_ok!(check_request_size(
            crate::prompts::ANALYST_PERSONA,
            &prompt,
            config.max_input_chars
        ));
    }
}
