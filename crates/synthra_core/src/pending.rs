use std::time::Instant;

use crate::{Language, TabId, Tier};

/// A transcript waiting for the engine to become ready.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingTranscriptItem {
    pub tab_id: TabId,
    pub transcript_text: String,
    pub source_url: String,
    pub title: String,
    pub language: Language,
    pub tier: Tier,
    pub enqueued_at: Instant,
}

/// Arrival-ordered queue holding at most one item per tab.
#[derive(Debug, Default)]
pub struct PendingQueue {
    items: Vec<PendingTranscriptItem>,
}

impl PendingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `item`, dropping any earlier item for the same tab.
    ///
    /// The new item takes its own arrival position at the back of the queue.
    /// Returns the superseded item, if any.
    pub fn enqueue(&mut self, item: PendingTranscriptItem) -> Option<PendingTranscriptItem> {
        let replaced = self
            .items
            .iter()
            .position(|queued| queued.tab_id == item.tab_id)
            .map(|idx| self.items.remove(idx));
        self.items.push(item);
        replaced
    }

    /// Empties the queue and hands back its items in arrival order.
    ///
    /// Items enqueued while the returned iterator is being consumed stay in the
    /// queue for the next drain.
    pub fn drain_all(&mut self) -> std::vec::IntoIter<PendingTranscriptItem> {
        std::mem::take(&mut self.items).into_iter()
    }

    pub fn remove_tab(&mut self, tab_id: TabId) -> Option<PendingTranscriptItem> {
        let idx = self.items.iter().position(|item| item.tab_id == tab_id)?;
        Some(self.items.remove(idx))
    }

    pub fn get(&self, tab_id: TabId) -> Option<&PendingTranscriptItem> {
        self.items.iter().find(|item| item.tab_id == tab_id)
    }

    pub fn contains_tab(&self, tab_id: TabId) -> bool {
        self.items.iter().any(|item| item.tab_id == tab_id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
