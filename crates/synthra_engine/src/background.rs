//! The background service tying everything together.
//!
//! Navigation events are debounced per tab; a settled navigation to a video
//! page (with auto-summarize on) fetches the transcript and summarizes it. If
//! the engine is not ready the transcript waits in the pending queue, engine
//! initialization is triggered, and the queue is drained once the engine
//! reports `Ready`.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::{Duration, Instant};

use engine_logging::{engine_debug, engine_error, engine_info, engine_warn};
use synthra_core::{
    content_id_from_url, thumbnail_ref, EngineState, Language, PendingQueue,
    PendingTranscriptItem, Settings, SummaryHistoryEntry, TabId, Tier,
};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::{
    EngineFactory, EngineLifecycleManager, LifecycleSettings, LocalStore, NavigationDebouncer,
    NavigationSink, PersistError, SummarizeError, Summarizer, SummarizerSettings, TabContext,
    TabTracker, TranscriptSource,
};

/// Produces the timestamp stored with history entries.
pub type Clock = Arc<dyn Fn() -> String + Send + Sync>;

const EVENT_CAPACITY: usize = 64;

/// Pushed to live observers whenever a request finishes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SummaryEvent {
    Completed {
        tab_id: TabId,
        content_id: String,
        title: String,
        summary: String,
        cached: bool,
    },
    Failed {
        tab_id: TabId,
        message: String,
    },
}

#[derive(Clone)]
pub struct BackgroundConfig {
    pub lifecycle: LifecycleSettings,
    pub summarizer: SummarizerSettings,
    pub debounce_window: Duration,
    pub clock: Clock,
}

impl BackgroundConfig {
    pub fn with_clock(clock: Clock) -> Self {
        Self {
            lifecycle: LifecycleSettings::default(),
            summarizer: SummarizerSettings::default(),
            debounce_window: Duration::from_millis(1500),
            clock,
        }
    }
}

/// Explicit request to summarize the page shown in a tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SummarizeRequest {
    pub tab_id: TabId,
    pub language: Language,
    pub tier: Tier,
    /// Ignore a cached summary for the same content, tier and language.
    pub refresh: bool,
}

#[derive(Clone)]
pub struct Background {
    inner: Arc<Inner>,
}

struct Inner {
    lifecycle: EngineLifecycleManager,
    summarizer: Summarizer,
    debouncer: NavigationDebouncer,
    tabs: TabTracker,
    queue: Mutex<PendingQueue>,
    store: Mutex<LocalStore>,
    transcripts: Arc<dyn TranscriptSource>,
    events: broadcast::Sender<SummaryEvent>,
    clock: Clock,
    shutdown: CancellationToken,
}

struct SettleHandler {
    inner: Weak<Inner>,
}

impl NavigationSink for SettleHandler {
    fn settled(&self, tab_id: TabId, url: String) {
        if let Some(inner) = self.inner.upgrade() {
            Background { inner }.on_settled(tab_id, url);
        }
    }
}

impl Background {
    pub fn new(
        factory: Arc<dyn EngineFactory>,
        transcripts: Arc<dyn TranscriptSource>,
        store: LocalStore,
        config: BackgroundConfig,
    ) -> Self {
        let lifecycle = EngineLifecycleManager::new(factory, config.lifecycle);
        let summarizer = Summarizer::new(lifecycle.clone(), config.summarizer);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        let inner = Arc::new_cyclic(|weak: &Weak<Inner>| Inner {
            lifecycle,
            summarizer,
            debouncer: NavigationDebouncer::new(
                config.debounce_window,
                Arc::new(SettleHandler {
                    inner: weak.clone(),
                }),
            ),
            tabs: TabTracker::new(),
            queue: Mutex::new(PendingQueue::new()),
            store: Mutex::new(store),
            transcripts,
            events,
            clock: config.clock,
            shutdown: CancellationToken::new(),
        });
        Self { inner }
    }

    /// Hooks queue draining onto engine readiness and starts initialization.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self) {
        let weak = Arc::downgrade(&self.inner);
        self.inner.lifecycle.on_state_change(move |state| {
            if !state.is_ready() {
                return;
            }
            if let Some(inner) = weak.upgrade() {
                let background = Background { inner };
                tokio::spawn(async move {
                    background.drain_pending().await;
                });
            }
        });
        self.inner.lifecycle.request_initialization();
    }

    /// Starts periodic liveness probes, stopped by [`shutdown`](Self::shutdown).
    pub fn start_health_monitor(&self, interval: Duration) {
        self.inner
            .lifecycle
            .spawn_health_monitor(interval, self.inner.shutdown.child_token());
    }

    pub fn shutdown(&self) {
        self.inner.shutdown.cancel();
    }

    pub fn lifecycle(&self) -> &EngineLifecycleManager {
        &self.inner.lifecycle
    }

    pub fn engine_state(&self) -> EngineState {
        self.inner.lifecycle.state()
    }

    /// External trigger; clears an exhausted retry budget.
    pub fn request_initialization(&self) {
        self.inner.lifecycle.request_initialization();
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SummaryEvent> {
        self.inner.events.subscribe()
    }

    /// Raw navigation event from the host. Must be called from within a Tokio runtime.
    pub fn navigation(&self, tab_id: TabId, url: impl Into<String>, title: Option<String>) {
        let url = url.into();
        self.inner.tabs.update(tab_id, url.clone(), title);
        self.inner.debouncer.observe(tab_id, url);
    }

    pub fn tab_closed(&self, tab_id: TabId) {
        self.inner.tabs.close(tab_id);
        self.inner.debouncer.cancel(tab_id);
        if self.lock_queue().remove_tab(tab_id).is_some() {
            engine_debug!("Dropped pending transcript for closed tab {}", tab_id);
        }
    }

    pub fn pending_count(&self) -> usize {
        self.lock_queue().len()
    }

    pub fn settings(&self) -> Settings {
        self.lock_store().settings()
    }

    pub fn set_language(&self, language: Language) -> Result<(), PersistError> {
        self.lock_store()
            .update_settings(|settings| settings.language = language)
    }

    pub fn set_auto_summarize(&self, enabled: bool) -> Result<(), PersistError> {
        self.lock_store()
            .update_settings(|settings| settings.auto_summarize = enabled)
    }

    pub fn set_tier(&self, tier: Tier) -> Result<(), PersistError> {
        self.lock_store().update_settings(|settings| settings.tier = tier)
    }

    pub fn history(&self) -> Vec<SummaryHistoryEntry> {
        self.lock_store().history().list().to_vec()
    }

    pub fn forget(&self, content_id: &str) -> Result<bool, PersistError> {
        self.lock_store().remove_history(content_id)
    }

    /// Summarizes the video shown in a tab.
    ///
    /// When the engine is not ready the transcript is queued, initialization is
    /// triggered and `EngineNotReady` is returned; the queued item is replayed
    /// once the engine is ready.
    pub async fn summarize_tab(&self, request: SummarizeRequest) -> Result<String, SummarizeError> {
        let SummarizeRequest {
            tab_id,
            language,
            tier,
            refresh,
        } = request;
        let tab = self
            .inner
            .tabs
            .get(tab_id)
            .ok_or(SummarizeError::TabGone(tab_id))?;
        let Some(content_id) = content_id_from_url(&tab.url) else {
            return Err(self.report(tab_id, language, SummarizeError::UnsupportedPage));
        };

        if !refresh {
            let cached = self
                .lock_store()
                .history()
                .cached(&content_id, tier, language)
                .cloned();
            if let Some(entry) = cached {
                engine_info!("Returning cached summary for {}", content_id);
                let _ = self.inner.events.send(SummaryEvent::Completed {
                    tab_id,
                    content_id,
                    title: entry.title,
                    summary: entry.summary_text.clone(),
                    cached: true,
                });
                return Ok(entry.summary_text);
            }
        }

        let context = TabContext {
            tab_id,
            url: tab.url.clone(),
            content_id: content_id.clone(),
            title: tab.title.clone(),
        };
        let transcript = match self.inner.transcripts.transcript(&context).await {
            Ok(transcript) => transcript,
            Err(err) => return Err(self.report(tab_id, language, err.into())),
        };
        if !self.inner.tabs.is_current(tab_id, &tab.url) {
            engine_debug!("Tab {} navigated away while fetching transcript", tab_id);
            return Err(SummarizeError::StaleNavigation(tab_id));
        }
        if transcript.text.trim().is_empty() {
            return Err(self.report(tab_id, language, SummarizeError::TranscriptEmpty));
        }

        let item = PendingTranscriptItem {
            tab_id,
            transcript_text: transcript.text,
            source_url: tab.url,
            title: transcript
                .title
                .or(tab.title)
                .unwrap_or_else(|| content_id.clone()),
            language,
            tier,
            enqueued_at: Instant::now(),
        };

        if !self.inner.lifecycle.state().is_ready() {
            self.defer(item);
            return Err(SummarizeError::EngineNotReady);
        }
        self.dispatch(item, content_id).await
    }

    /// Replays queued transcripts in arrival order, dropping items whose tab
    /// closed or moved to another URL. Returns how many were dispatched.
    pub async fn drain_pending(&self) -> usize {
        let items: Vec<PendingTranscriptItem> = self.lock_queue().drain_all().collect();
        if items.is_empty() {
            return 0;
        }
        engine_info!("Draining {} pending transcript(s)", items.len());

        let mut dispatched = 0;
        for item in items {
            if !self.inner.tabs.is_current(item.tab_id, &item.source_url) {
                engine_debug!(
                    "Dropping stale pending transcript for tab {} ({})",
                    item.tab_id,
                    item.source_url
                );
                continue;
            }
            let Some(content_id) = content_id_from_url(&item.source_url) else {
                continue;
            };
            engine_debug!(
                "Dispatching pending transcript for tab {} queued {:?} ago",
                item.tab_id,
                item.enqueued_at.elapsed()
            );
            dispatched += 1;
            // Not-ready errors requeue inside dispatch; everything else was reported there.
            let _ = self.dispatch(item, content_id).await;
        }
        dispatched
    }

    async fn dispatch(
        &self,
        item: PendingTranscriptItem,
        content_id: String,
    ) -> Result<String, SummarizeError> {
        let result = self
            .inner
            .summarizer
            .summarize(&item.transcript_text, item.language, item.tier)
            .await;

        match result {
            Ok(summary) => {
                self.record(&item, content_id, summary.clone());
                Ok(summary)
            }
            Err(SummarizeError::EngineNotReady) => {
                self.defer(item);
                Err(SummarizeError::EngineNotReady)
            }
            Err(err @ SummarizeError::GenerationFailed(_)) => {
                // A dead engine still reports Ready; a health check rebuilds it.
                self.inner.lifecycle.request_initialization();
                Err(self.report(item.tab_id, item.language, err))
            }
            Err(err) => Err(self.report(item.tab_id, item.language, err)),
        }
    }

    fn defer(&self, item: PendingTranscriptItem) {
        let tab_id = item.tab_id;
        {
            let mut queue = self.lock_queue();
            // A replayed item never displaces a newer request for the same tab.
            let newer_queued = queue
                .get(tab_id)
                .is_some_and(|queued| queued.enqueued_at > item.enqueued_at);
            if !newer_queued {
                queue.enqueue(item);
            }
        }
        engine_info!("Engine not ready; queued transcript for tab {}", tab_id);
        self.inner.lifecycle.request_initialization();
    }

    fn record(&self, item: &PendingTranscriptItem, content_id: String, summary: String) {
        let entry = SummaryHistoryEntry {
            content_id: content_id.clone(),
            title: item.title.clone(),
            summary_text: summary.clone(),
            created_at: (self.inner.clock)(),
            thumbnail_ref: Some(thumbnail_ref(&content_id)),
            language: item.language,
            tier: item.tier,
        };
        if let Err(err) = self.lock_store().append_history(entry) {
            engine_error!("Failed to persist summary history: {}", err);
        }
        engine_info!("Summary ready for tab {} ({})", item.tab_id, content_id);
        let _ = self.inner.events.send(SummaryEvent::Completed {
            tab_id: item.tab_id,
            content_id,
            title: item.title.clone(),
            summary,
            cached: false,
        });
    }

    fn report(&self, tab_id: TabId, language: Language, err: SummarizeError) -> SummarizeError {
        if err.is_silent() {
            engine_debug!("Request for tab {} dropped: {}", tab_id, err);
        } else {
            engine_warn!("Request for tab {} failed: {}", tab_id, err);
            let _ = self.inner.events.send(SummaryEvent::Failed {
                tab_id,
                message: err.user_message(language),
            });
        }
        err
    }

    fn on_settled(&self, tab_id: TabId, url: String) {
        let settings = self.settings();
        if !settings.auto_summarize {
            engine_debug!("Auto-summarize off; ignoring settled navigation to {}", url);
            return;
        }
        let background = self.clone();
        tokio::spawn(async move {
            let request = SummarizeRequest {
                tab_id,
                language: settings.language,
                tier: settings.tier,
                refresh: false,
            };
            if let Err(err) = background.summarize_tab(request).await {
                engine_debug!("Auto-summarize for tab {} ended with: {}", tab_id, err);
            }
        });
    }

    fn lock_queue(&self) -> MutexGuard<'_, PendingQueue> {
        self.inner
            .queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_store(&self) -> MutexGuard<'_, LocalStore> {
        self.inner
            .store
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
