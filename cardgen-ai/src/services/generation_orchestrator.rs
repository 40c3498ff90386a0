//! Generation orchestrator
//!
//! Turns raw content into validated, tagged cards:
//! 1. Chunk the content, summarizing first when it is too large
//! 2. Run chunks in batches of `max_parallel_requests` concurrent calls
//! 3. Validate each chunk's output, falling back to repaired cards
//! 4. Apply tags and provenance
//!
//! # Error Handling
//! - Missing credential or blank input fail the whole call
//! - A failed chunk contributes zero cards and never aborts its siblings
//! - A credential the service rejects stops generation after the current batch

use crate::config::Settings;
use crate::error::{PipelineError, PipelineResult};
use crate::models::{Card, Chunk, GenerationMode, DEFAULT_TAG};
use crate::services::card_validator::{self, normalize_tags, tags_or_default};
use crate::services::chunker;
use crate::services::generation_client::{
    ChatMessage, ChatRequest, GenerationService, GenerationServiceError,
};
use crate::services::prompts;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};

/// Size the summary call compresses oversized content to
pub const SUMMARY_TARGET_TOKENS: usize = 4000;
/// Hard truncation budget used when the summary call fails
pub const TRUNCATION_FALLBACK_TOKENS: usize = 8000;

const CARD_TEMPERATURE: f32 = 0.7;
const SUMMARY_TEMPERATURE: f32 = 0.3;
const CARD_RESPONSE_MAX_TOKENS: u32 = 4000;

/// Progress events emitted during generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum GenerationEvent {
    /// Content exceeded the summarization threshold
    SummarizationStarted {
        /// Estimated tokens before summarization
        total_tokens: usize,
    },

    /// A batch of concurrent chunk calls is starting
    BatchStarted {
        /// Batch index (0-based)
        batch_index: usize,
        total_batches: usize,
        /// Chunks in this batch
        chunk_count: usize,
    },

    ChunkCompleted {
        chunk_index: usize,
        card_count: usize,
    },

    ChunkFailed {
        chunk_index: usize,
        error: String,
    },

    /// Generation finished
    Completed {
        card_count: usize,
        chunks_total: usize,
        chunks_failed: usize,
    },
}

/// Outcome of one generation run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationReport {
    pub cards: Vec<Card>,
    pub chunks_total: usize,
    /// Chunks whose call failed or whose output could not be salvaged
    pub chunks_failed: usize,
    /// Content was replaced by a service-generated summary before chunking
    pub summarized: bool,
}

impl GenerationReport {
    /// One-line partial-success summary, e.g. "12 generated, 1 chunks failed"
    pub fn summary_line(&self) -> String {
        format!(
            "{} generated, {} chunks failed",
            self.cards.len(),
            self.chunks_failed
        )
    }
}

/// Orchestrates chunking, generation calls and validation
pub struct GenerationOrchestrator {
    service: Arc<dyn GenerationService>,
    settings: RwLock<Settings>,
    event_tx: Option<mpsc::Sender<GenerationEvent>>,
}

impl GenerationOrchestrator {
    pub fn new(service: Arc<dyn GenerationService>, settings: Settings) -> Self {
        Self {
            service,
            settings: RwLock::new(settings),
            event_tx: None,
        }
    }

    /// Create orchestrator with event channel for progress reporting
    pub fn with_events(
        service: Arc<dyn GenerationService>,
        settings: Settings,
        event_tx: mpsc::Sender<GenerationEvent>,
    ) -> Self {
        Self {
            service,
            settings: RwLock::new(settings),
            event_tx: Some(event_tx),
        }
    }

    /// Replace runtime settings; takes effect on the next `generate` call
    pub async fn reconfigure(&self, settings: Settings) {
        *self.settings.write().await = settings;
        debug!("Generation settings replaced");
    }

    /// Generate cards from content
    ///
    /// See [`generate_with_report`](Self::generate_with_report) for failure counts.
    pub async fn generate(
        &self,
        content: &str,
        mode: GenerationMode,
        user_tags: &[String],
        source: Option<&str>,
    ) -> PipelineResult<Vec<Card>> {
        Ok(self
            .generate_with_report(content, mode, user_tags, source)
            .await?
            .cards)
    }

    /// Generate cards from content, reporting per-chunk failures
    ///
    /// # Errors
    /// - [`PipelineError::Configuration`] when no usable credential is set or
    ///   the service rejects it
    /// - [`PipelineError::EmptyInput`] when content is blank
    pub async fn generate_with_report(
        &self,
        content: &str,
        mode: GenerationMode,
        user_tags: &[String],
        source: Option<&str>,
    ) -> PipelineResult<GenerationReport> {
        let settings = self.settings.read().await.clone();

        let api_key = settings.credential().ok_or_else(|| {
            PipelineError::Configuration("Generation API key is not configured".to_string())
        })?;

        if content.trim().is_empty() {
            return Err(PipelineError::EmptyInput);
        }

        let mut tags: Vec<String> = user_tags.to_vec();
        tags.extend(settings.default_tags.iter().cloned());
        let tags = normalize_tags(&tags);

        let mut outcome = chunker::chunk(content, settings.max_chunk_tokens);
        let mut summarized = false;

        if outcome.requires_summarization {
            info!(
                total_tokens = outcome.total_tokens,
                "Content exceeds summarization threshold"
            );
            self.emit_event(GenerationEvent::SummarizationStarted {
                total_tokens: outcome.total_tokens,
            })
            .await;

            let condensed = match self.summarize(api_key, content, &settings).await {
                Ok(summary) => {
                    summarized = true;
                    summary
                }
                Err(GenerationServiceError::InvalidApiKey) => {
                    return Err(rejected_credential());
                }
                Err(e) => {
                    warn!(
                        error = %e,
                        budget = TRUNCATION_FALLBACK_TOKENS,
                        "Summarization failed, truncating content"
                    );
                    chunker::truncate_to_tokens(content, TRUNCATION_FALLBACK_TOKENS)
                }
            };

            outcome = chunker::chunk(&condensed, settings.max_chunk_tokens);
        }

        let chunks = outcome.chunks;
        let chunks_total = chunks.len();
        let batch_size = settings.max_parallel_requests.max(1);
        let total_batches = chunks_total.div_ceil(batch_size);

        info!(
            chunks = chunks_total,
            batches = total_batches,
            max_parallel = batch_size,
            ?mode,
            "Starting card generation"
        );

        let mut cards = Vec::new();
        let mut chunks_failed = 0;

        for (batch_index, batch) in chunks.chunks(batch_size).enumerate() {
            if batch_index > 0 && !settings.batch_delay.is_zero() {
                tokio::time::sleep(settings.batch_delay).await;
            }

            self.emit_event(GenerationEvent::BatchStarted {
                batch_index,
                total_batches,
                chunk_count: batch.len(),
            })
            .await;

            let calls = batch
                .iter()
                .map(|chunk| self.process_chunk(api_key, chunk, mode, &tags, &settings));
            let results = join_all(calls).await;

            let mut credential_rejected = false;

            for (chunk, result) in batch.iter().zip(results) {
                match result {
                    Ok(chunk_cards) if !chunk_cards.is_empty() => {
                        self.emit_event(GenerationEvent::ChunkCompleted {
                            chunk_index: chunk.index,
                            card_count: chunk_cards.len(),
                        })
                        .await;
                        cards.extend(chunk_cards);
                    }
                    Ok(_) => {
                        chunks_failed += 1;
                        self.emit_event(GenerationEvent::ChunkFailed {
                            chunk_index: chunk.index,
                            error: "No usable cards in response".to_string(),
                        })
                        .await;
                    }
                    Err(e) => {
                        chunks_failed += 1;
                        if matches!(e, GenerationServiceError::InvalidApiKey) {
                            credential_rejected = true;
                        }
                        warn!(
                            chunk_index = chunk.index,
                            error = %e,
                            "Chunk generation failed (per-chunk error isolation)"
                        );
                        self.emit_event(GenerationEvent::ChunkFailed {
                            chunk_index: chunk.index,
                            error: e.to_string(),
                        })
                        .await;
                    }
                }
            }

            if credential_rejected {
                return Err(rejected_credential());
            }
        }

        let cards: Vec<Card> = cards
            .into_iter()
            .map(|card| apply_tags(card, mode, &tags).with_source(source))
            .collect();

        info!(
            cards = cards.len(),
            chunks_total,
            chunks_failed,
            summarized,
            "Card generation complete"
        );

        self.emit_event(GenerationEvent::Completed {
            card_count: cards.len(),
            chunks_total,
            chunks_failed,
        })
        .await;

        Ok(GenerationReport {
            cards,
            chunks_total,
            chunks_failed,
            summarized,
        })
    }

    /// One chunk: prompt, call, validate, repair
    ///
    /// Unsalvageable output yields an empty list rather than an error.
    async fn process_chunk(
        &self,
        api_key: &str,
        chunk: &Chunk,
        mode: GenerationMode,
        tags: &[String],
        settings: &Settings,
    ) -> Result<Vec<Card>, GenerationServiceError> {
        let request = ChatRequest {
            model: settings.model.clone(),
            messages: vec![
                ChatMessage::system(prompts::CARD_SYSTEM_PROMPT),
                ChatMessage::user(prompts::card_prompt(&chunk.content, mode, tags)),
            ],
            temperature: CARD_TEMPERATURE,
            max_tokens: CARD_RESPONSE_MAX_TOKENS,
        };

        let raw = self.service.complete(api_key, &request).await?;

        let candidates = card_validator::parse_candidates(&raw);
        let outcome = card_validator::validate_batch(&candidates);

        if !outcome.valid {
            debug!(
                chunk_index = chunk.index,
                errors = ?outcome.errors,
                "Generator output failed validation"
            );
        }

        let errors = outcome.errors.clone();
        match outcome.into_cards() {
            Some(cards) => {
                debug!(
                    chunk_index = chunk.index,
                    cards = cards.len(),
                    "Chunk produced cards"
                );
                Ok(cards)
            }
            None => {
                warn!(
                    chunk_index = chunk.index,
                    errors = ?errors,
                    "Generator output could not be repaired, chunk skipped"
                );
                Ok(Vec::new())
            }
        }
    }

    async fn summarize(
        &self,
        api_key: &str,
        content: &str,
        settings: &Settings,
    ) -> Result<String, GenerationServiceError> {
        let request = ChatRequest {
            model: settings.model.clone(),
            messages: vec![
                ChatMessage::system(prompts::SUMMARY_SYSTEM_PROMPT),
                ChatMessage::user(prompts::summary_prompt(content, SUMMARY_TARGET_TOKENS)),
            ],
            temperature: SUMMARY_TEMPERATURE,
            max_tokens: SUMMARY_TARGET_TOKENS as u32,
        };

        let summary = self.service.complete(api_key, &request).await?;
        let summary = summary.trim();

        if summary.is_empty() {
            return Err(GenerationServiceError::ParseError(
                "empty summary".to_string(),
            ));
        }

        info!(
            summary_tokens = chunker::estimate_tokens(summary),
            "Content summarized"
        );
        Ok(summary.to_string())
    }

    async fn emit_event(&self, event: GenerationEvent) {
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(event).await;
        }
    }
}

fn rejected_credential() -> PipelineError {
    PipelineError::Configuration("Generation service rejected the API key".to_string())
}

/// Fixed mode: exactly the caller's tags. Dynamic: inferred tags plus the caller's.
fn apply_tags(mut card: Card, mode: GenerationMode, tags: &[String]) -> Card {
    card.tags = match mode {
        GenerationMode::Fixed => tags_or_default(tags),
        GenerationMode::Dynamic => {
            // Drop the placeholder when the caller supplies real tags
            let inferred_placeholder = card.tags.len() == 1 && card.tags[0] == DEFAULT_TAG;
            let mut merged = if inferred_placeholder && !tags.is_empty() {
                Vec::new()
            } else {
                std::mem::take(&mut card.tags)
            };
            merged.extend(tags.iter().cloned());
            tags_or_default(&merged)
        }
    };
    card
}
