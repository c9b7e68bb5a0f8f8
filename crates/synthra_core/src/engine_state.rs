/// Lifecycle state of the single inference engine.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum EngineState {
    #[default]
    Uninitialized,
    Initializing {
        /// Advisory progress in `0.0..=1.0`.
        progress: f32,
        phase: String,
    },
    Ready,
    Error {
        message: String,
        retry_count: u32,
        max_retries: u32,
        is_retrying: bool,
    },
}

impl EngineState {
    pub fn initializing(progress: f32, phase: impl Into<String>) -> Self {
        EngineState::Initializing {
            progress: progress.clamp(0.0, 1.0),
            phase: phase.into(),
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, EngineState::Ready)
    }

    pub fn is_initializing(&self) -> bool {
        matches!(self, EngineState::Initializing { .. })
    }

    /// Short status label: `uninitialized`, `initializing`, `ready` or `error`.
    pub fn label(&self) -> &'static str {
        match self {
            EngineState::Uninitialized => "uninitialized",
            EngineState::Initializing { .. } => "initializing",
            EngineState::Ready => "ready",
            EngineState::Error { .. } => "error",
        }
    }
}
