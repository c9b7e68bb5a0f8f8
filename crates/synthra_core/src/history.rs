use serde::{Deserialize, Serialize};

use crate::{Language, Tier};

/// Maximum number of summaries kept in history.
pub const HISTORY_LIMIT: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryHistoryEntry {
    pub content_id: String,
    pub title: String,
    pub summary_text: String,
    /// RFC 3339 timestamp supplied by the caller's clock.
    pub created_at: String,
    pub thumbnail_ref: Option<String>,
    #[serde(default)]
    pub language: Language,
    #[serde(default)]
    pub tier: Tier,
}

/// Bounded, most-recent-first list of summaries keyed by content id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SummaryHistory {
    entries: Vec<SummaryHistoryEntry>,
}

impl SummaryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds history from persisted entries, keeping the first entry seen
    /// for each content id and at most [`HISTORY_LIMIT`] entries.
    pub fn from_entries(entries: Vec<SummaryHistoryEntry>) -> Self {
        let mut history = Self::new();
        for entry in entries {
            if history.len() >= HISTORY_LIMIT {
                break;
            }
            if history.get(&entry.content_id).is_none() {
                history.entries.push(entry);
            }
        }
        history
    }

    /// Puts `entry` at the front, replacing an older entry for the same
    /// content and evicting the oldest entries beyond the limit.
    pub fn append(&mut self, entry: SummaryHistoryEntry) {
        self.entries
            .retain(|existing| existing.content_id != entry.content_id);
        self.entries.insert(0, entry);
        self.entries.truncate(HISTORY_LIMIT);
    }

    pub fn remove(&mut self, content_id: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.content_id != content_id);
        self.entries.len() != before
    }

    pub fn list(&self) -> &[SummaryHistoryEntry] {
        &self.entries
    }

    pub fn get(&self, content_id: &str) -> Option<&SummaryHistoryEntry> {
        self.entries
            .iter()
            .find(|entry| entry.content_id == content_id)
    }

    /// Cached summary for the same content, tier and language.
    pub fn cached(
        &self,
        content_id: &str,
        tier: Tier,
        language: Language,
    ) -> Option<&SummaryHistoryEntry> {
        self.get(content_id)
            .filter(|entry| entry.tier == tier && entry.language == language)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
