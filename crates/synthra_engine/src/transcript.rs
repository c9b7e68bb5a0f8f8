use std::io::ErrorKind;
use std::path::PathBuf;

use engine_logging::engine_debug;
use synthra_core::TabId;

use crate::TranscriptError;

/// The page a transcript is requested for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabContext {
    pub tab_id: TabId,
    pub url: String,
    pub content_id: String,
    pub title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcript {
    pub text: String,
    pub title: Option<String>,
}

/// Supplies transcript text for a page.
#[async_trait::async_trait]
pub trait TranscriptSource: Send + Sync {
    async fn transcript(&self, tab: &TabContext) -> Result<Transcript, TranscriptError>;
}

/// Reads `<dir>/<content_id>.txt`; an optional first line `# Title` names the video.
#[derive(Debug, Clone)]
pub struct DirectoryTranscriptSource {
    dir: PathBuf,
}

impl DirectoryTranscriptSource {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }
}

#[async_trait::async_trait]
impl TranscriptSource for DirectoryTranscriptSource {
    async fn transcript(&self, tab: &TabContext) -> Result<Transcript, TranscriptError> {
        let path = self.dir.join(format!("{}.txt", tab.content_id));
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                engine_debug!("No transcript file at {:?}", path);
                return Err(TranscriptError::NoCaptionsAvailable);
            }
            Err(err) => return Err(TranscriptError::PageDisconnected(err.to_string())),
        };
        Ok(parse_transcript_file(&raw))
    }
}

fn parse_transcript_file(raw: &str) -> Transcript {
    let raw = raw.strip_prefix('\u{feff}').unwrap_or(raw);
    match raw.split_once('\n') {
        Some((first, rest)) if first.starts_with("# ") => Transcript {
            text: rest.to_string(),
            title: Some(first[2..].trim().to_string()).filter(|t| !t.is_empty()),
        },
        None if raw.starts_with("# ") => Transcript {
            text: String::new(),
            title: Some(raw[2..].trim().to_string()).filter(|t| !t.is_empty()),
        },
        _ => Transcript {
            text: raw.to_string(),
            title: None,
        },
    }
}
