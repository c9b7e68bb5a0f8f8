//! Synthra core: pure engine-state, queue, history and prompt helpers.
mod chunking;
mod content;
mod engine_state;
mod history;
mod language;
mod pending;
mod prompt;
mod settings;
mod tier;

pub use chunking::{char_budget, char_len, split_into_chunks};
pub use content::{content_id_from_url, is_supported_content_url, thumbnail_ref};
pub use engine_state::EngineState;
pub use history::{SummaryHistory, SummaryHistoryEntry, HISTORY_LIMIT};
pub use language::{Language, UnknownLanguage};
pub use pending::{PendingQueue, PendingTranscriptItem};
pub use prompt::{
    chunk_prompt, consolidation_prompt, probe_prompt, strip_boilerplate, summary_prompt,
    BOILERPLATE_PREFIXES,
};
pub use settings::Settings;
pub use tier::{Tier, UnknownTier};

/// Opaque identifier of a host browser tab.
pub type TabId = u64;
