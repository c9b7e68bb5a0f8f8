use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use engine_logging::{engine_debug, engine_trace};
use synthra_core::{is_supported_content_url, TabId};

use crate::ScheduledTask;

/// Receives navigations once they have settled on a supported page.
pub trait NavigationSink: Send + Sync {
    fn settled(&self, tab_id: TabId, url: String);
}

#[derive(Debug)]
struct DebounceEntry {
    pending_url: String,
    registered_at: Instant,
    seq: u64,
    task: ScheduledTask,
}

/// Coalesces bursts of navigation events per tab into one settled notification.
#[derive(Clone)]
pub struct NavigationDebouncer {
    inner: Arc<Inner>,
}

struct Inner {
    window: Duration,
    sink: Arc<dyn NavigationSink>,
    entries: Mutex<HashMap<TabId, DebounceEntry>>,
    next_seq: AtomicU64,
}

impl NavigationDebouncer {
    pub fn new(window: Duration, sink: Arc<dyn NavigationSink>) -> Self {
        Self {
            inner: Arc::new(Inner {
                window,
                sink,
                entries: Mutex::new(HashMap::new()),
                next_seq: AtomicU64::new(0),
            }),
        }
    }

    /// Records a raw navigation event. Must be called from within a Tokio runtime.
    pub fn observe(&self, tab_id: TabId, url: impl Into<String>) {
        let url = url.into();
        let mut entries = self.inner.lock_entries();
        if let Some(existing) = entries.get(&tab_id) {
            if existing.pending_url == url {
                engine_trace!("Duplicate navigation for tab {} ignored", tab_id);
                return;
            }
            existing.task.cancel();
            engine_trace!(
                "Navigation for tab {} superseded after {:?}",
                tab_id,
                existing.registered_at.elapsed()
            );
        }

        let seq = self.inner.next_seq.fetch_add(1, Ordering::Relaxed);
        let inner = self.inner.clone();
        let task = ScheduledTask::after(self.inner.window, async move {
            inner.fire(tab_id, seq);
        });
        entries.insert(
            tab_id,
            DebounceEntry {
                pending_url: url,
                registered_at: Instant::now(),
                seq,
                task,
            },
        );
    }

    /// Drops any pending notification for `tab_id`, e.g. when the tab closes.
    pub fn cancel(&self, tab_id: TabId) -> bool {
        match self.inner.lock_entries().remove(&tab_id) {
            Some(entry) => {
                entry.task.cancel();
                true
            }
            None => false,
        }
    }

    pub fn pending_url(&self, tab_id: TabId) -> Option<String> {
        self.inner
            .lock_entries()
            .get(&tab_id)
            .map(|entry| entry.pending_url.clone())
    }

    pub fn pending_count(&self) -> usize {
        self.inner.lock_entries().len()
    }
}

impl Inner {
    fn lock_entries(&self) -> MutexGuard<'_, HashMap<TabId, DebounceEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn fire(&self, tab_id: TabId, seq: u64) {
        let url = {
            let mut entries = self.lock_entries();
            let is_current = entries.get(&tab_id).is_some_and(|entry| entry.seq == seq);
            if is_current {
                entries.remove(&tab_id).map(|entry| entry.pending_url)
            } else {
                None
            }
        };
        let Some(url) = url else {
            return;
        };
        if is_supported_content_url(&url) {
            engine_debug!("Navigation settled for tab {}: {}", tab_id, url);
            self.sink.settled(tab_id, url);
        } else {
            engine_trace!("Settled navigation for tab {} is not a video page", tab_id);
        }
    }
}
