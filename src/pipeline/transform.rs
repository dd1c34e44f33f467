//! Map-reduce text transformation over a bounded-context LLM.
//!
//! The completion collaborator enforces an input-size ceiling, so any
//! document longer than that must be processed in pieces:
//!
//! ```text
//! source ──▶ split ──▶ map (one call per chunk, concurrent) ──┬─▶ reduce (merge calls) ──▶ text
//!                                                           └─▶ concatenate (translation)
//! ```
//!
//! Summaries, key points and explanations need the reduce pass because
//! naive concatenation of partial summaries is not itself a coherent summary.
//! Translations skip it: order-preserved translated segments are already
//! coherent when joined.
//!
//! Every operation is described by a [`TransformRequest`] carrying its persona,
//! chunk size and [`FailurePolicy`], so one engine serves all of them.

use crate::config::AssistantConfig;
use crate::error::{AssistError, ChunkError};
use crate::language::{LanguageCode, TargetLanguage};
use crate::pipeline::chunk;
use crate::pipeline::format::polish;
use crate::pipeline::llm::Completer;
use crate::progress::ProgressCallback;
use crate::prompts;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// A user-selectable transformation of document text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    ShortSummary,
    LongSummary,
    KeyPoints,
    SimpleExplanation,
    Translate(TargetLanguage),
}

impl Operation {
    pub fn is_translation(self) -> bool {
        matches!(self, Operation::Translate(_))
    }
}

/// What happens when a single chunk's completion fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailurePolicy {
    /// Abort the whole transform. Used when a reduce pass follows, since a
    /// merge of real and missing partials is not meaningful.
    FailFast,
    /// Replace the failed chunk with an inline error marker and carry on.
    SubstituteMarker,
}

/// Everything the engine needs to know about one kind of transformation.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformRequest {
    /// System prompt for every call of this transform.
    pub persona: String,
    /// Prepended to each chunk in the map phase; quoted in merge calls.
    pub instruction: String,
    /// Maximum characters per chunk.
    pub chunk_chars: usize,
    pub policy: FailurePolicy,
    /// Whether partial results are merged by a reduce pass (otherwise they
    /// are concatenated in order).
    pub merge: bool,
}

impl TransformRequest {
    /// A fail-fast map-reduce request with the analyst persona.
    pub fn summarize(instruction: impl Into<String>, chunk_chars: usize) -> Self {
        Self {
            persona: prompts::ANALYST_PERSONA.to_string(),
            instruction: instruction.into(),
            chunk_chars,
            policy: FailurePolicy::FailFast,
            merge: true,
        }
    }

    /// A marker-substituting, concatenating translation request.
    pub fn translate(target: TargetLanguage, chunk_chars: usize) -> Self {
        Self {
            persona: prompts::translator_persona(target),
            instruction: prompts::translation_instruction(target),
            chunk_chars,
            policy: FailurePolicy::SubstituteMarker,
            merge: false,
        }
    }

    /// The request for `operation`, answering in `user_language`.
    pub fn for_operation(
        operation: Operation,
        user_language: LanguageCode,
        config: &AssistantConfig,
    ) -> Self {
        let instruction = match operation {
            Operation::ShortSummary => prompts::SHORT_SUMMARY_INSTRUCTION,
            Operation::LongSummary => prompts::LONG_SUMMARY_INSTRUCTION,
            Operation::KeyPoints => prompts::KEY_POINTS_INSTRUCTION,
            Operation::SimpleExplanation => prompts::SIMPLE_EXPLANATION_INSTRUCTION,
            Operation::Translate(target) => {
                return Self::translate(target, config.translation_chunk_chars)
            }
        };
        Self::summarize(
            prompts::in_user_language(instruction, user_language),
            config.summary_chunk_chars,
        )
    }
}

/// Outcome of one map-phase call.
#[derive(Debug, Clone)]
pub struct ChunkResult {
    /// 1-indexed chunk position.
    pub index: usize,
    /// Polished completion output; empty when `error` is set.
    pub text: String,
    pub error: Option<ChunkError>,
}

/// Counters for one transform invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformStats {
    pub chunk_count: usize,
    pub failed_chunks: usize,
    /// Map plus reduce calls actually issued.
    pub completion_calls: usize,
    pub reduce_levels: usize,
    pub duration_ms: u64,
}

/// Final text of a transform plus its counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformOutput {
    pub text: String,
    pub stats: TransformStats,
}

/// Map-reduce engine over a [`Completer`].
#[derive(Clone)]
pub struct TransformEngine {
    completer: Arc<dyn Completer>,
    concurrency: usize,
    temperature: f32,
    reduce_input_chars: usize,
    progress: Option<ProgressCallback>,
}

impl TransformEngine {
    pub fn new(completer: Arc<dyn Completer>, config: &AssistantConfig) -> Self {
        Self {
            completer,
            concurrency: config.concurrency.max(1),
            temperature: config.temperature,
            reduce_input_chars: config.reduce_input_chars.max(1),
            progress: config.progress_callback.clone(),
        }
    }

    /// Apply `request` to `source_text`.
    ///
    /// # Returns
    /// * the fixed [`prompts::NO_TEXT_SENTINEL`] without any completion call
    ///   when the source is empty
    /// * for merging requests, the output of the final merge call
    /// * for concatenating requests, the chunk outputs in order joined by a
    ///   blank line, with failed chunks replaced by an inline marker
    ///
    /// # Errors
    /// [`AssistError::Completion`] when a chunk fails under
    /// [`FailurePolicy::FailFast`] (no reduce call is issued) or when a merge
    /// call fails.
    pub async fn transform(
        &self,
        source_text: &str,
        request: &TransformRequest,
    ) -> Result<TransformOutput, AssistError> {
        let start = Instant::now();
        let chunks = chunk::split(source_text, request.chunk_chars);
        let total = chunks.len();

        if total == 0 {
            debug!("Transform skipped: empty source");
            return Ok(TransformOutput {
                text: prompts::NO_TEXT_SENTINEL.to_string(),
                stats: TransformStats::default(),
            });
        }

        info!(
            "Transform: {} chars → {} chunks of ≤{} ({:?})",
            source_text.chars().count(),
            total,
            request.chunk_chars,
            request.policy
        );
        if let Some(ref cb) = self.progress {
            cb.on_transform_start(total);
        }

        let calls = AtomicUsize::new(0);
        let results = self.map_chunks(&chunks, request, &calls).await;
        let failed = results.iter().filter(|r| r.error.is_some()).count();

        let mut stats = TransformStats {
            chunk_count: total,
            failed_chunks: failed,
            ..Default::default()
        };

        let first_error = results.iter().find_map(|r| r.error.clone());
        let outcome = match request.policy {
            FailurePolicy::FailFast => match first_error {
                Some(err) => {
                    warn!("Transform aborted: {}/{} chunks failed, first: {}", failed, total, err);
                    Err(AssistError::Completion(err.cause().clone()))
                }
                None => {
                    let partials: Vec<String> = results.into_iter().map(|r| r.text).collect();
                    if request.merge {
                        self.reduce(partials, request, &calls, &mut stats).await
                    } else {
                        Ok(partials.join("\n\n"))
                    }
                }
            },
            FailurePolicy::SubstituteMarker => {
                let parts: Vec<String> = results
                    .into_iter()
                    .map(|r| match r.error {
                        None => r.text,
                        Some(_) => prompts::translation_error_marker(r.index, total),
                    })
                    .collect();
                if request.merge && failed == 0 {
                    self.reduce(parts, request, &calls, &mut stats).await
                } else {
                    Ok(parts.join("\n\n"))
                }
            }
        };

        if let Some(ref cb) = self.progress {
            cb.on_transform_complete(total, total - failed);
        }
        let text = outcome?;

        stats.completion_calls = calls.load(Ordering::SeqCst);
        stats.duration_ms = start.elapsed().as_millis() as u64;
        info!(
            "Transform complete: {} calls, {}/{} chunks failed, {}ms",
            stats.completion_calls, stats.failed_chunks, total, stats.duration_ms
        );

        Ok(TransformOutput { text, stats })
    }

    /// Shorthand for [`Self::transform`] with [`TransformRequest::for_operation`].
    pub async fn run(
        &self,
        source_text: &str,
        operation: Operation,
        user_language: LanguageCode,
        config: &AssistantConfig,
    ) -> Result<TransformOutput, AssistError> {
        let request = TransformRequest::for_operation(operation, user_language, config);
        self.transform(source_text, &request).await
    }

    /// Map phase: one independent call per chunk, bounded concurrency,
    /// results returned in chunk order.
    async fn map_chunks(
        &self,
        chunks: &[&str],
        request: &TransformRequest,
        calls: &AtomicUsize,
    ) -> Vec<ChunkResult> {
        let total = chunks.len();
        let calls_per_chunk: Vec<_> = chunks
            .iter()
            .enumerate()
            .map(|(i, chunk)| {
                let index = i + 1;
                let prompt = prompts::map_prompt(&request.instruction, chunk);
                async move {
                    if let Some(ref cb) = self.progress {
                        cb.on_chunk_start(index, total);
                    }
                    calls.fetch_add(1, Ordering::SeqCst);
                    match self
                        .completer
                        .complete(&request.persona, &prompt, self.temperature)
                        .await
                    {
                        Ok(raw) => {
                            let text = polish(&raw);
                            if let Some(ref cb) = self.progress {
                                cb.on_chunk_complete(index, total, text.chars().count());
                            }
                            ChunkResult {
                                index,
                                text,
                                error: None,
                            }
                        }
                        Err(cause) => {
                            warn!("Chunk {}/{} failed: {}", index, total, cause);
                            if let Some(ref cb) = self.progress {
                                cb.on_chunk_error(index, total, &cause.to_string());
                            }
                            ChunkResult {
                                index,
                                text: String::new(),
                                error: Some(ChunkError::CompletionFailed {
                                    chunk: index,
                                    cause,
                                }),
                            }
                        }
                    }
                }
            })
            .collect();

        let mut results: Vec<ChunkResult> = stream::iter(calls_per_chunk)
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        results.sort_by_key(|r| r.index);
        results
    }

    /// Reduce phase: merge ordered partials until one result remains.
    ///
    /// Partials that fit `reduce_input_chars` together are merged by exactly
    /// one call. Otherwise groups are merged concurrently and the merged
    /// outputs are reduced again.
    async fn reduce(
        &self,
        mut partials: Vec<String>,
        request: &TransformRequest,
        calls: &AtomicUsize,
        stats: &mut TransformStats,
    ) -> Result<String, AssistError> {
        loop {
            stats.reduce_levels += 1;
            if let Some(ref cb) = self.progress {
                cb.on_reduce_start(partials.len());
            }

            let lens: Vec<usize> = partials.iter().map(|p| p.chars().count()).collect();
            let groups = plan_merge_groups(&lens, self.reduce_input_chars);
            debug!(
                "Reduce level {}: {} partials in {} groups",
                stats.reduce_levels,
                partials.len(),
                groups.len()
            );

            if groups.len() == 1 {
                return self.merge(&partials, request, calls).await;
            }

            // Collect first: streaming a lazy `map` here makes callers' futures non-`Send`.
            let partials_ref = &partials;
            let group_merges: Vec<_> = groups
                .into_iter()
                .map(|range| async move {
                    let group = &partials_ref[range];
                    if group.len() == 1 {
                        Ok(group[0].clone())
                    } else {
                        self.merge(group, request, calls).await
                    }
                })
                .collect();
            let merged: Vec<Result<String, AssistError>> = stream::iter(group_merges)
                .buffered(self.concurrency)
                .collect()
                .await;

            partials = merged.into_iter().collect::<Result<Vec<_>, _>>()?;
        }
    }

    async fn merge(
        &self,
        partials: &[String],
        request: &TransformRequest,
        calls: &AtomicUsize,
    ) -> Result<String, AssistError> {
        calls.fetch_add(1, Ordering::SeqCst);
        let prompt = prompts::merge_prompt(&request.instruction, partials);
        let raw = self
            .completer
            .complete(&request.persona, &prompt, self.temperature)
            .await?;
        Ok(polish(&raw))
    }
}

/// Group consecutive partials so each group's total length fits `budget`.
///
/// A partial longer than `budget` forms its own group. When grouping would
/// not shrink the number of partials, consecutive pairs are used instead so
/// every reduce level makes progress.
pub fn plan_merge_groups(lens: &[usize], budget: usize) -> Vec<Range<usize>> {
    let mut groups = Vec::new();
    let mut start = 0;
    let mut size = 0;

    for (i, &len) in lens.iter().enumerate() {
        if i > start && size + len > budget {
            groups.push(start..i);
            start = i;
            size = 0;
        }
        size += len;
    }
    if start < lens.len() {
        groups.push(start..lens.len());
    }

    if lens.len() > 1 && groups.len() == lens.len() {
        return (0..lens.len())
            .step_by(2)
            .map(|i| i..(i + 2).min(lens.len()))
            .collect();
    }
    groups
}
