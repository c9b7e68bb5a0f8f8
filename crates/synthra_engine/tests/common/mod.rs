#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use synthra_core::EngineState;
use synthra_engine::{
    CompletionRequest, EngineFactory, EngineLifecycleManager, InferenceEngine, InferenceError,
    InitProgress, ProgressSink, TabContext, Transcript, TranscriptError, TranscriptSource,
};

pub fn init_logging() {
    engine_logging::initialize_for_tests();
}

type Responder = dyn Fn(usize, &CompletionRequest) -> Result<String, InferenceError> + Send + Sync;

/// Engine answering from a closure; probe calls are answered separately and not recorded.
pub struct ScriptedEngine {
    responder: Box<Responder>,
    prompts: Mutex<Vec<String>>,
    probe_fails: AtomicBool,
    context_window: Option<u32>,
}

impl ScriptedEngine {
    pub fn new<F>(responder: F) -> Arc<Self>
    where
        F: Fn(usize, &CompletionRequest) -> Result<String, InferenceError> + Send + Sync + 'static,
    {
        Self::with_context_window(None, responder)
    }

    pub fn with_context_window<F>(context_window: Option<u32>, responder: F) -> Arc<Self>
    where
        F: Fn(usize, &CompletionRequest) -> Result<String, InferenceError> + Send + Sync + 'static,
    {
        Arc::new(Self {
            responder: Box::new(responder),
            prompts: Mutex::new(Vec::new()),
            probe_fails: AtomicBool::new(false),
            context_window,
        })
    }

    /// Echoes a fixed summary for every call.
    pub fn constant(summary: &str) -> Arc<Self> {
        let summary = summary.to_string();
        Self::new(move |_, _| Ok(summary.clone()))
    }

    pub fn set_probe_fails(&self, fails: bool) {
        self.probe_fails.store(fails, Ordering::SeqCst);
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl InferenceEngine for ScriptedEngine {
    async fn complete(&self, request: CompletionRequest) -> Result<String, InferenceError> {
        if request.is_probe() {
            if self.probe_fails.load(Ordering::SeqCst) {
                return Err(InferenceError::Network("engine crashed".to_string()));
            }
            return Ok(String::new());
        }
        let index = {
            let mut prompts = self.prompts.lock().unwrap();
            prompts.push(request.prompt().to_string());
            prompts.len() - 1
        };
        (self.responder)(index, &request)
    }

    fn context_window(&self) -> Option<u32> {
        self.context_window
    }
}

#[derive(Debug, Clone)]
pub enum Construction {
    Fail(String),
    Hang,
    Succeed,
}

/// Factory replaying scripted construction outcomes; `Succeed` once the script runs out.
pub struct ScriptedFactory {
    engine: Arc<ScriptedEngine>,
    script: Mutex<VecDeque<Construction>>,
    delay: Duration,
    created: AtomicUsize,
}

impl ScriptedFactory {
    pub fn new(engine: Arc<ScriptedEngine>) -> Arc<Self> {
        Self::scripted(engine, Vec::new(), Duration::from_secs(10))
    }

    pub fn scripted(
        engine: Arc<ScriptedEngine>,
        script: Vec<Construction>,
        delay: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            engine,
            script: Mutex::new(script.into()),
            delay,
            created: AtomicUsize::new(0),
        })
    }

    pub fn failing(engine: Arc<ScriptedEngine>, failures: usize) -> Arc<Self> {
        let script = (0..failures)
            .map(|i| Construction::Fail(format!("load failure {}", i + 1)))
            .collect();
        Self::scripted(engine, script, Duration::from_secs(10))
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl EngineFactory for ScriptedFactory {
    async fn create(
        &self,
        progress: &dyn ProgressSink,
    ) -> Result<Arc<dyn InferenceEngine>, InferenceError> {
        self.created.fetch_add(1, Ordering::SeqCst);
        let next = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Construction::Succeed);
        progress.report(InitProgress::new(0.5, "Loading weights"));
        tokio::time::sleep(self.delay).await;
        match next {
            Construction::Fail(message) => Err(InferenceError::ModelUnavailable(message)),
            Construction::Hang => std::future::pending().await,
            Construction::Succeed => Ok(self.engine.clone() as Arc<dyn InferenceEngine>),
        }
    }
}

/// Waits (on virtual time) until the manager's state matches `predicate`.
pub async fn wait_for_state<F>(manager: &EngineLifecycleManager, predicate: F) -> EngineState
where
    F: Fn(&EngineState) -> bool,
{
    let mut rx = manager.subscribe();
    let state = tokio::time::timeout(Duration::from_secs(3600), rx.wait_for(|s| predicate(s)))
        .await
        .expect("state reached in time")
        .expect("manager alive")
        .clone();
    state
}

pub async fn ready_manager(engine: Arc<ScriptedEngine>) -> EngineLifecycleManager {
    let manager = EngineLifecycleManager::new(ScriptedFactory::new(engine), Default::default());
    manager.request_initialization();
    wait_for_state(&manager, EngineState::is_ready).await;
    manager
}

/// Transcript source backed by a map of content id to result.
#[derive(Default)]
pub struct MemoryTranscripts {
    transcripts: Mutex<HashMap<String, Result<Transcript, TranscriptError>>>,
    requests: AtomicUsize,
}

impl MemoryTranscripts {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn insert(&self, content_id: &str, text: &str) {
        self.transcripts.lock().unwrap().insert(
            content_id.to_string(),
            Ok(Transcript {
                text: text.to_string(),
                title: Some(format!("Video {content_id}")),
            }),
        );
    }

    pub fn insert_error(&self, content_id: &str, err: TranscriptError) {
        self.transcripts
            .lock()
            .unwrap()
            .insert(content_id.to_string(), Err(err));
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl TranscriptSource for MemoryTranscripts {
    async fn transcript(&self, tab: &TabContext) -> Result<Transcript, TranscriptError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        self.transcripts
            .lock()
            .unwrap()
            .get(&tab.content_id)
            .cloned()
            .unwrap_or(Err(TranscriptError::NoCaptionsAvailable))
    }
}

pub fn watch_url(content_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={content_id}")
}
