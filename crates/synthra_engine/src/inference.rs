use std::sync::Arc;

use crate::{CompletionRequest, InferenceError, InitProgress};

/// Receives advisory progress while an engine is being constructed.
pub trait ProgressSink: Send + Sync {
    fn report(&self, progress: InitProgress);
}

/// A constructed inference engine able to answer chat completions.
#[async_trait::async_trait]
pub trait InferenceEngine: Send + Sync {
    /// Returns the generated text; an empty string means the engine produced nothing.
    async fn complete(&self, request: CompletionRequest) -> Result<String, InferenceError>;

    /// Context window in tokens, when the engine can report it.
    fn context_window(&self) -> Option<u32> {
        None
    }
}

/// Builds engines. Construction may take minutes and may fail.
#[async_trait::async_trait]
pub trait EngineFactory: Send + Sync {
    async fn create(
        &self,
        progress: &dyn ProgressSink,
    ) -> Result<Arc<dyn InferenceEngine>, InferenceError>;
}
