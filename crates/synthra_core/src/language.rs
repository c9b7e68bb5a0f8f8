use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Output languages supported for summaries and user-facing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Ko,
    Ja,
    Zh,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownLanguage(pub String);

impl fmt::Display for UnknownLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unsupported language code {:?}", self.0)
    }
}

impl std::error::Error for UnknownLanguage {}

impl Language {
    pub const ALL: [Language; 4] = [Language::En, Language::Ko, Language::Ja, Language::Zh];

    pub fn code(self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Ko => "ko",
            Language::Ja => "ja",
            Language::Zh => "zh",
        }
    }

    /// Returned in place of a summary when the engine produced no text.
    pub fn empty_summary_placeholder(self) -> &'static str {
        match self {
            Language::En => "(Could not generate summary)",
            Language::Ko => "(요약을 생성하지 못했습니다)",
            Language::Ja => "(要約を生成できませんでした)",
            Language::Zh => "(未能生成摘要)",
        }
    }

    pub fn generation_failed_prefix(self) -> &'static str {
        match self {
            Language::En => "AI Generation Failed",
            Language::Ko => "AI 생성 실패",
            Language::Ja => "AI生成に失敗しました",
            Language::Zh => "AI 生成失败",
        }
    }

    pub fn unknown_error(self) -> &'static str {
        match self {
            Language::En => "Unknown error",
            Language::Ko => "알 수 없는 오류",
            Language::Ja => "不明なエラー",
            Language::Zh => "未知错误",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Language {
    type Err = UnknownLanguage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim().to_ascii_lowercase();
        Language::ALL
            .into_iter()
            .find(|lang| lang.code() == code)
            .ok_or(UnknownLanguage(s.to_string()))
    }
}
