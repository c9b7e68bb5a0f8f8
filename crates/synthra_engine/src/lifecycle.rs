//! Ownership of the single inference engine.
//!
//! [`EngineLifecycleManager`] drives `Uninitialized -> Initializing -> Ready | Error`,
//! allows one construction in flight at a time, races construction against a
//! timeout, verifies the engine with a liveness probe before exposing it, and
//! retries failed initialization a bounded number of times.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use engine_logging::{engine_debug, engine_info, engine_warn};
use synthra_core::EngineState;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{CompletionRequest, EngineFactory, InferenceEngine, InferenceError, InitProgress, ProgressSink};

#[derive(Debug, Clone)]
pub struct LifecycleSettings {
    pub init_timeout: Duration,
    pub probe_timeout: Duration,
    pub retry_delay: Duration,
    pub max_retries: u32,
    /// Used when the engine cannot report its context window.
    pub fallback_context_window: u32,
}

impl Default for LifecycleSettings {
    fn default() -> Self {
        Self {
            init_timeout: Duration::from_secs(120),
            probe_timeout: Duration::from_secs(5),
            retry_delay: Duration::from_secs(5),
            max_retries: 3,
            fallback_context_window: 4096,
        }
    }
}

/// An engine that passed its liveness probe.
#[derive(Clone)]
pub struct ReadyEngine {
    pub handle: Arc<dyn InferenceEngine>,
    pub context_window: u32,
}

pub type ObserverId = u64;
type Observer = Arc<dyn Fn(&EngineState) + Send + Sync>;

#[derive(Clone)]
pub struct EngineLifecycleManager {
    inner: Arc<Inner>,
}

struct Inner {
    factory: Arc<dyn EngineFactory>,
    settings: LifecycleSettings,
    shared: Mutex<Shared>,
    observers: Mutex<Vec<(ObserverId, Observer)>>,
    next_observer: AtomicU64,
    state_tx: watch::Sender<EngineState>,
    constructions: AtomicU64,
}

struct Shared {
    state: EngineState,
    engine: Option<ReadyEngine>,
    retry_count: u32,
    in_flight: bool,
    /// Bumped for every fresh initialization; results from older runs are ignored.
    generation: u64,
}

enum FailureAction {
    Retry,
    Stop,
}

impl EngineLifecycleManager {
    pub fn new(factory: Arc<dyn EngineFactory>, settings: LifecycleSettings) -> Self {
        let (state_tx, _) = watch::channel(EngineState::Uninitialized);
        Self {
            inner: Arc::new(Inner {
                factory,
                settings,
                shared: Mutex::new(Shared {
                    state: EngineState::Uninitialized,
                    engine: None,
                    retry_count: 0,
                    in_flight: false,
                    generation: 0,
                }),
                observers: Mutex::new(Vec::new()),
                next_observer: AtomicU64::new(1),
                state_tx,
                constructions: AtomicU64::new(0),
            }),
        }
    }

    pub fn settings(&self) -> &LifecycleSettings {
        &self.inner.settings
    }

    /// Starts a fresh initialization unless one is in flight.
    ///
    /// A ready engine is health-checked instead and rebuilt only if the check
    /// fails (see [`check_health`](Self::check_health)). Resets the retry counter.
    /// Must be called from within a Tokio runtime.
    pub fn request_initialization(&self) {
        let (generation, state) = {
            let mut shared = self.inner.lock_shared();
            if shared.in_flight {
                engine_debug!("Initialization already in flight; ignoring request");
                return;
            }
            if shared.state.is_ready() && shared.engine.is_some() {
                drop(shared);
                engine_debug!("Engine ready; checking health instead of reinitializing");
                let manager = self.clone();
                tokio::spawn(async move {
                    manager.check_health().await;
                });
                return;
            }
            shared.retry_count = 0;
            let state = self
                .inner
                .begin_generation(&mut shared, EngineState::initializing(0.0, "Starting engine"));
            (shared.generation, state)
        };
        engine_info!("Engine initialization requested (generation {})", generation);
        self.inner.notify(&state);
        tokio::spawn(drive(self.inner.clone(), generation));
    }

    pub fn state(&self) -> EngineState {
        self.inner.lock_shared().state.clone()
    }

    pub fn retry_count(&self) -> u32 {
        self.inner.lock_shared().retry_count
    }

    /// Number of engine constructions started since creation.
    pub fn construction_count(&self) -> u64 {
        self.inner.constructions.load(Ordering::SeqCst)
    }

    /// The engine, only while the state is `Ready`.
    pub fn ready_engine(&self) -> Option<ReadyEngine> {
        let shared = self.inner.lock_shared();
        if shared.state.is_ready() {
            shared.engine.clone()
        } else {
            None
        }
    }

    /// Registers a callback run synchronously on every state transition.
    ///
    /// A panicking observer is logged and skipped; the others still run.
    pub fn on_state_change<F>(&self, observer: F) -> ObserverId
    where
        F: Fn(&EngineState) + Send + Sync + 'static,
    {
        let id = self.inner.next_observer.fetch_add(1, Ordering::Relaxed);
        self.inner
            .observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(observer)));
        id
    }

    pub fn remove_observer(&self, id: ObserverId) -> bool {
        let mut observers = self
            .inner
            .observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let before = observers.len();
        observers.retain(|(existing, _)| *existing != id);
        observers.len() != before
    }

    /// Watch channel carrying the latest state; late subscribers see the current value.
    pub fn subscribe(&self) -> watch::Receiver<EngineState> {
        self.inner.state_tx.subscribe()
    }

    /// Probes a ready engine. A failed probe discards the engine, moves back to
    /// `Initializing` and reconstructs it. Returns whether the engine answered.
    pub async fn check_health(&self) -> bool {
        let (engine, generation) = {
            let shared = self.inner.lock_shared();
            match (&shared.state, &shared.engine) {
                (EngineState::Ready, Some(engine)) => (engine.clone(), shared.generation),
                _ => return false,
            }
        };

        let result = probe(engine.handle.as_ref(), self.inner.settings.probe_timeout).await;
        let Err(err) = result else {
            engine_debug!("Liveness probe passed");
            return true;
        };

        let restart = {
            let mut shared = self.inner.lock_shared();
            if shared.generation != generation || !shared.state.is_ready() {
                None
            } else {
                shared.engine = None;
                shared.retry_count = 0;
                let state = self.inner.begin_generation(
                    &mut shared,
                    EngineState::initializing(0.0, "Engine stopped responding; restarting"),
                );
                Some((shared.generation, state))
            }
        };

        if let Some((generation, state)) = restart {
            engine_warn!("Liveness probe failed ({}); reinitializing engine", err);
            self.inner.notify(&state);
            tokio::spawn(drive(self.inner.clone(), generation));
        }
        false
    }

    /// Runs [`check_health`](Self::check_health) every `interval` until `cancel` fires.
    pub fn spawn_health_monitor(
        &self,
        interval: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let manager = self.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {
                        if manager.state().is_ready() {
                            manager.check_health().await;
                        }
                    }
                }
            }
            engine_debug!("Health monitor stopped");
        })
    }
}

impl Inner {
    fn lock_shared(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn commit(&self, shared: &mut Shared, state: EngineState) -> EngineState {
        shared.state = state.clone();
        self.state_tx.send_replace(state.clone());
        state
    }

    fn begin_generation(&self, shared: &mut Shared, state: EngineState) -> EngineState {
        shared.in_flight = true;
        shared.generation += 1;
        self.commit(shared, state)
    }

    fn notify(&self, state: &EngineState) {
        let observers: Vec<Observer> = self
            .observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, observer)| observer.clone())
            .collect();
        for observer in observers {
            if catch_unwind(AssertUnwindSafe(|| observer(state))).is_err() {
                engine_warn!("Engine state observer panicked; continuing");
            }
        }
    }

    fn report_progress(&self, generation: u64, progress: InitProgress) {
        let state = {
            let mut shared = self.lock_shared();
            if shared.generation != generation || !shared.state.is_initializing() {
                return;
            }
            self.commit(
                &mut shared,
                EngineState::initializing(progress.fraction, progress.text),
            )
        };
        self.notify(&state);
    }

    async fn attempt(&self, generation: u64) -> Result<ReadyEngine, String> {
        let sink = GenerationProgress {
            inner: self,
            generation,
        };
        self.constructions.fetch_add(1, Ordering::SeqCst);

        // A construction that loses the race is dropped with the timeout future.
        let handle = match tokio::time::timeout(
            self.settings.init_timeout,
            self.factory.create(&sink),
        )
        .await
        {
            Err(_) => {
                return Err(format!(
                    "engine initialization timed out after {}s",
                    self.settings.init_timeout.as_secs()
                ))
            }
            Ok(Err(err)) => return Err(err.to_string()),
            Ok(Ok(handle)) => handle,
        };

        self.report_progress(generation, InitProgress::new(1.0, "Verifying engine"));
        probe(handle.as_ref(), self.settings.probe_timeout)
            .await
            .map_err(|err| format!("liveness probe failed: {err}"))?;

        let context_window = handle
            .context_window()
            .unwrap_or(self.settings.fallback_context_window);
        Ok(ReadyEngine {
            handle,
            context_window,
        })
    }

    fn finish_ready(&self, generation: u64, engine: ReadyEngine) {
        let state = {
            let mut shared = self.lock_shared();
            if shared.generation != generation {
                engine_debug!("Discarding engine from stale generation {}", generation);
                return;
            }
            shared.engine = Some(engine);
            shared.retry_count = 0;
            shared.in_flight = false;
            self.commit(&mut shared, EngineState::Ready)
        };
        engine_info!("Engine ready");
        self.notify(&state);
    }

    fn record_failure(&self, generation: u64, message: String) -> FailureAction {
        let max_retries = self.settings.max_retries;
        let (action, state) = {
            let mut shared = self.lock_shared();
            if shared.generation != generation {
                return FailureAction::Stop;
            }
            let action = if shared.retry_count < max_retries {
                shared.retry_count += 1;
                FailureAction::Retry
            } else {
                shared.in_flight = false;
                FailureAction::Stop
            };
            let state = EngineState::Error {
                message: message.clone(),
                retry_count: shared.retry_count,
                max_retries,
                is_retrying: matches!(action, FailureAction::Retry),
            };
            (action, self.commit(&mut shared, state))
        };
        match action {
            FailureAction::Retry => engine_warn!(
                "Engine initialization failed: {}; retrying in {:?}",
                message,
                self.settings.retry_delay
            ),
            FailureAction::Stop => engine_warn!(
                "Engine initialization failed: {}; giving up after {} retries",
                message,
                max_retries
            ),
        }
        self.notify(&state);
        action
    }

    /// Restarts the attempt from `Uninitialized`, then moves on to `Initializing`.
    fn begin_retry(&self, generation: u64) -> bool {
        let (reset, state) = {
            let mut shared = self.lock_shared();
            if shared.generation != generation {
                return false;
            }
            let reset = self.commit(&mut shared, EngineState::Uninitialized);
            let phase = format!(
                "Retrying ({}/{})",
                shared.retry_count, self.settings.max_retries
            );
            (reset, self.commit(&mut shared, EngineState::initializing(0.0, phase)))
        };
        self.notify(&reset);
        self.notify(&state);
        true
    }
}

async fn drive(inner: Arc<Inner>, generation: u64) {
    loop {
        match inner.attempt(generation).await {
            Ok(engine) => {
                inner.finish_ready(generation, engine);
                return;
            }
            Err(message) => match inner.record_failure(generation, message) {
                FailureAction::Stop => return,
                FailureAction::Retry => {
                    tokio::time::sleep(inner.settings.retry_delay).await;
                    if !inner.begin_retry(generation) {
                        return;
                    }
                }
            },
        }
    }
}

async fn probe(engine: &dyn InferenceEngine, limit: Duration) -> Result<(), InferenceError> {
    tokio::time::timeout(limit, engine.complete(CompletionRequest::probe()))
        .await
        .map_err(|_| InferenceError::Timeout(limit))?
        .map(|_| ())
}

struct GenerationProgress<'a> {
    inner: &'a Inner,
    generation: u64,
}

impl ProgressSink for GenerationProgress<'_> {
    fn report(&self, progress: InitProgress) {
        self.inner.report_progress(self.generation, progress);
    }
}
