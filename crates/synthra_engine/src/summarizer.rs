use engine_logging::{engine_debug, engine_info, engine_warn};
use synthra_core::{
    char_budget, char_len, chunk_prompt, consolidation_prompt, split_into_chunks,
    strip_boilerplate, summary_prompt, Language, Tier,
};

use crate::{
    CompletionRequest, EngineLifecycleManager, InferenceError, ReadyEngine, SummarizeError,
};

/// Separator used when chunk summaries are returned without consolidation.
pub const PARTIAL_SEPARATOR: &str = "\n\n";

#[derive(Debug, Clone)]
pub struct SummarizerSettings {
    /// Share of the context window the input may use.
    pub safety_margin: f32,
    /// Rough characters-per-token estimate; over- or under-shooting is tolerated.
    pub chars_per_token: u32,
    pub chunk_chars: usize,
    pub free_max_tokens: u32,
    pub premium_max_tokens: u32,
}

impl Default for SummarizerSettings {
    fn default() -> Self {
        Self {
            safety_margin: 0.75,
            chars_per_token: 3,
            chunk_chars: 4000,
            free_max_tokens: 512,
            premium_max_tokens: 1024,
        }
    }
}

impl SummarizerSettings {
    pub fn max_output_tokens(&self, tier: Tier) -> u32 {
        match tier {
            Tier::Free => self.free_max_tokens,
            Tier::Premium => self.premium_max_tokens,
        }
    }

    pub fn char_budget(&self, context_window: u32) -> usize {
        char_budget(context_window, self.safety_margin, self.chars_per_token)
    }
}

/// Turns transcripts into summaries using the engine owned by the lifecycle manager.
#[derive(Clone)]
pub struct Summarizer {
    lifecycle: EngineLifecycleManager,
    settings: SummarizerSettings,
}

impl Summarizer {
    pub fn new(lifecycle: EngineLifecycleManager, settings: SummarizerSettings) -> Self {
        Self {
            lifecycle,
            settings,
        }
    }

    pub fn settings(&self) -> &SummarizerSettings {
        &self.settings
    }

    pub async fn summarize(
        &self,
        transcript: &str,
        language: Language,
        tier: Tier,
    ) -> Result<String, SummarizeError> {
        let transcript = transcript.trim();
        if transcript.is_empty() {
            return Err(SummarizeError::TranscriptEmpty);
        }
        let engine = self
            .lifecycle
            .ready_engine()
            .ok_or(SummarizeError::EngineNotReady)?;

        let budget = self.settings.char_budget(engine.context_window);
        let length = char_len(transcript);
        let raw = if length <= budget {
            engine_debug!("Transcript of {} chars fits budget {}", length, budget);
            self.summarize_single(&engine, budget, transcript, language, tier)
                .await?
        } else {
            engine_info!(
                "Transcript of {} chars exceeds budget {}; chunking",
                length,
                budget
            );
            let max_chars = self.chunk_limit(budget, language, tier);
            self.summarize_chunked(&engine, max_chars, transcript, language, tier)
                .await?
        };

        let summary = strip_boilerplate(&raw);
        if summary.is_empty() {
            engine_warn!("Summary generation produced no text");
            return Ok(language.empty_summary_placeholder().to_string());
        }
        Ok(summary.to_string())
    }

    /// Largest chunk whose chunk prompt still fits `budget`, capped by `chunk_chars`.
    fn chunk_limit(&self, budget: usize, language: Language, tier: Tier) -> usize {
        let overhead = char_len(&chunk_prompt(language, tier, 999, 999, ""));
        self.settings
            .chunk_chars
            .min(budget.saturating_sub(overhead))
            .max(1)
    }

    async fn summarize_single(
        &self,
        engine: &ReadyEngine,
        budget: usize,
        transcript: &str,
        language: Language,
        tier: Tier,
    ) -> Result<String, SummarizeError> {
        let request = CompletionRequest::summary(
            summary_prompt(language, tier, transcript),
            self.settings.max_output_tokens(tier),
        );
        match engine.handle.complete(request).await {
            Ok(text) => Ok(text),
            Err(InferenceError::ContextLengthExceeded(detail)) => {
                engine_warn!("Context length exceeded ({}); falling back to chunking", detail);
                // Chunks must be smaller than the input the engine just rejected.
                let max_chars = self
                    .chunk_limit(budget, language, tier)
                    .min(char_len(transcript).div_ceil(2))
                    .max(1);
                self.summarize_chunked(engine, max_chars, transcript, language, tier)
                    .await
            }
            Err(err) => Err(SummarizeError::GenerationFailed(err.to_string())),
        }
    }

    /// Summarizes chunks one at a time, then merges the partial summaries.
    async fn summarize_chunked(
        &self,
        engine: &ReadyEngine,
        max_chars: usize,
        transcript: &str,
        language: Language,
        tier: Tier,
    ) -> Result<String, SummarizeError> {
        let chunks = split_into_chunks(transcript, max_chars);
        let total = chunks.len();
        let max_tokens = self.settings.max_output_tokens(tier);
        let mut partials = Vec::with_capacity(total);
        let mut last_error = None;

        for (idx, chunk) in chunks.iter().enumerate() {
            let request =
                CompletionRequest::summary(chunk_prompt(language, tier, idx + 1, total, chunk), max_tokens);
            match engine.handle.complete(request).await {
                Ok(text) => {
                    // Lead-ins are stripped once, from the final summary.
                    if strip_boilerplate(&text).is_empty() {
                        engine_warn!("Chunk {}/{} produced no text; skipping", idx + 1, total);
                    } else {
                        engine_debug!("Chunk {}/{} summarized", idx + 1, total);
                        partials.push(text.trim().to_string());
                    }
                }
                Err(err) => {
                    engine_warn!("Chunk {}/{} failed: {}; skipping", idx + 1, total, err);
                    last_error = Some(err);
                }
            }
        }

        match partials.len() {
            0 => match last_error {
                Some(err) => Err(SummarizeError::GenerationFailed(err.to_string())),
                None => Ok(String::new()),
            },
            1 => Ok(partials.remove(0)),
            count => {
                engine_info!("Consolidating {} chunk summaries", count);
                let request = CompletionRequest::summary(
                    consolidation_prompt(language, tier, &partials),
                    max_tokens,
                );
                match engine.handle.complete(request).await {
                    Ok(text) if !strip_boilerplate(&text).is_empty() => Ok(text),
                    Ok(_) => {
                        engine_warn!("Consolidation produced no text; joining chunk summaries");
                        Ok(partials.join(PARTIAL_SEPARATOR))
                    }
                    Err(err) => {
                        engine_warn!("Consolidation failed: {}; joining chunk summaries", err);
                        Ok(partials.join(PARTIAL_SEPARATOR))
                    }
                }
            }
        }
    }
}
