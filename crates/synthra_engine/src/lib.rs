//! Synthra engine: engine lifecycle, request orchestration and IO adapters.
mod background;
mod debounce;
mod error;
mod inference;
mod lifecycle;
mod openai;
mod store;
mod summarizer;
mod tabs;
mod timer;
mod transcript;
mod types;

pub use background::{Background, BackgroundConfig, Clock, SummarizeRequest, SummaryEvent};
pub use debounce::{NavigationDebouncer, NavigationSink};
pub use error::{InferenceError, SummarizeError, TranscriptError};
pub use inference::{EngineFactory, InferenceEngine, ProgressSink};
pub use lifecycle::{EngineLifecycleManager, LifecycleSettings, ObserverId, ReadyEngine};
pub use openai::{OpenAiEngine, OpenAiEngineFactory, OpenAiSettings};
pub use store::{ensure_state_dir, LocalStore, PersistError, STATE_FILENAME};
pub use summarizer::{Summarizer, SummarizerSettings, PARTIAL_SEPARATOR};
pub use tabs::{TabInfo, TabTracker};
pub use timer::ScheduledTask;
pub use transcript::{DirectoryTranscriptSource, TabContext, Transcript, TranscriptSource};
pub use types::{ChatMessage, ChatRole, CompletionRequest, InitProgress};
