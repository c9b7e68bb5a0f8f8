use std::time::Duration;

use synthra_core::{Language, TabId};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InferenceError {
    #[error("context length exceeded: {0}")]
    ContextLengthExceeded(String),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("http status {status}: {message}")]
    Http { status: u16, message: String },
    #[error("network error: {0}")]
    Network(String),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("model {0} is not available")]
    ModelUnavailable(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TranscriptError {
    #[error("no captions available for this video")]
    NoCaptionsAvailable,
    #[error("page disconnected: {0}")]
    PageDisconnected(String),
}

/// Why a summarization request did not produce a summary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SummarizeError {
    #[error("engine is not ready")]
    EngineNotReady,
    #[error("transcript is empty")]
    TranscriptEmpty,
    #[error("transcript unavailable: {0}")]
    TranscriptUnavailable(#[from] TranscriptError),
    #[error("generation failed: {0}")]
    GenerationFailed(String),
    #[error("page is not a supported video page")]
    UnsupportedPage,
    #[error("tab {0} is gone")]
    TabGone(TabId),
    #[error("tab {0} navigated away")]
    StaleNavigation(TabId),
}

impl SummarizeError {
    /// Conditions recovered internally (requeue, navigation churn) that are
    /// never shown to the user.
    pub fn is_silent(&self) -> bool {
        matches!(
            self,
            SummarizeError::EngineNotReady
                | SummarizeError::TabGone(_)
                | SummarizeError::StaleNavigation(_)
        )
    }

    /// Human-readable message in the request's language.
    pub fn user_message(&self, language: Language) -> String {
        match self {
            SummarizeError::GenerationFailed(detail) => {
                let detail = if detail.trim().is_empty() {
                    language.unknown_error()
                } else {
                    detail.as_str()
                };
                format!("{}: {}", language.generation_failed_prefix(), detail)
            }
            SummarizeError::TranscriptUnavailable(TranscriptError::PageDisconnected(_)) => {
                let message = match language {
                    Language::En => "Cannot connect to the page. Make sure the video page is loaded.",
                    Language::Ko => "페이지에 연결할 수 없습니다. 동영상 페이지가 로드되었는지 확인하세요.",
                    Language::Ja => "ページに接続できません。動画ページが読み込まれていることを確認してください。",
                    Language::Zh => "无法连接到页面。请确认视频页面已加载。",
                };
                message.to_string()
            }
            SummarizeError::TranscriptUnavailable(TranscriptError::NoCaptionsAvailable)
            | SummarizeError::TranscriptEmpty => match language {
                Language::En => "No transcript is available for this video.",
                Language::Ko => "이 동영상에는 사용할 수 있는 스크립트가 없습니다.",
                Language::Ja => "この動画には利用可能なトランスクリプトがありません。",
                Language::Zh => "该视频没有可用的文字记录。",
            }
            .to_string(),
            SummarizeError::UnsupportedPage => match language {
                Language::En => "Open a video page to summarize it.",
                Language::Ko => "요약하려면 동영상 페이지를 여세요.",
                Language::Ja => "要約するには動画ページを開いてください。",
                Language::Zh => "请打开视频页面以生成摘要。",
            }
            .to_string(),
            SummarizeError::EngineNotReady
            | SummarizeError::TabGone(_)
            | SummarizeError::StaleNavigation(_) => match language {
                Language::En => "The summarizer is still starting up.",
                Language::Ko => "요약 엔진을 준비하고 있습니다.",
                Language::Ja => "要約エンジンを準備しています。",
                Language::Zh => "摘要引擎正在启动。",
            }
            .to_string(),
        }
    }
}
