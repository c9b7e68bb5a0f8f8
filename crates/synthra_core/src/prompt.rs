use crate::{Language, Tier};

/// Lead-ins models like to emit before the actual summary. Checked in order;
/// only the first match is removed.
pub const BOILERPLATE_PREFIXES: &[&str] = &[
    "Here is a structured summary of the key points from the transcript:",
    "Here is a structured summary of the transcript:",
    "Here is a summary of the transcript:",
    "Here's a summary of the transcript:",
    "Here is a combined summary:",
    "Structured Summary:",
    "Summary:",
    "정리된 내용:",
    "요약:",
    "整理された内容:",
    "要約:",
    "结构化摘要:",
    "摘要：",
];

fn instruction(language: Language, tier: Tier) -> String {
    match (language, tier) {
        (Language::En, Tier::Free) => "Please provide a concise, structured summary of the key points from the following transcript in English. Present the main ideas clearly.".to_string(),
        (Language::En, Tier::Premium) => "Please provide a detailed, structured summary of the key points from the following transcript in English. Present the main ideas clearly and include important supporting details.".to_string(),
        (Language::Ko, Tier::Free) => "다음 스크립트의 핵심 내용을 한국어로 간결하게 구조화하여 정리해 주세요.".to_string(),
        (Language::Ko, Tier::Premium) => "다음 스크립트의 핵심 내용을 한국어로 자세하게 구조화하여 정리해 주세요. 중요한 세부 사항도 포함해 주세요.".to_string(),
        (Language::Ja, Tier::Free) => "以下のトランスクリプトの要点を日本語で簡潔に構造化してまとめてください。".to_string(),
        (Language::Ja, Tier::Premium) => "以下のトランスクリプトの要点を日本語で詳しく構造化してまとめてください。重要な詳細も含めてください。".to_string(),
        (Language::Zh, Tier::Free) => "请用中文简洁地、结构化地总结以下文字记录的要点。".to_string(),
        (Language::Zh, Tier::Premium) => "请用中文详细地、结构化地总结以下文字记录的要点，并包含重要的细节。".to_string(),
    }
}

fn transcript_label(language: Language) -> &'static str {
    match language {
        Language::En => "Transcript",
        Language::Ko => "스크립트",
        Language::Ja => "トランスクリプト",
        Language::Zh => "文字记录",
    }
}

/// Prompt for summarizing a transcript in one call.
pub fn summary_prompt(language: Language, tier: Tier, transcript: &str) -> String {
    format!(
        "{instruction}\n{label}:\n\n{transcript}",
        instruction = instruction(language, tier),
        label = transcript_label(language),
    )
}

/// Prompt for one chunk; `index` is 1-based.
pub fn chunk_prompt(
    language: Language,
    tier: Tier,
    index: usize,
    total: usize,
    chunk: &str,
) -> String {
    let marker = match language {
        Language::En => format!("This is chunk {index} of {total} of a longer transcript."),
        Language::Ko => format!("이것은 긴 스크립트의 {total}개 중 {index}번째 부분입니다."),
        Language::Ja => format!("これは長いトランスクリプトの{total}個中{index}番目の部分です。"),
        Language::Zh => format!("这是较长文字记录的第{index}部分，共{total}部分。"),
    };
    format!(
        "{marker}\n{instruction}\n{label}:\n\n{chunk}",
        instruction = instruction(language, tier),
        label = transcript_label(language),
    )
}

/// Prompt merging chunk-level summaries into one.
pub fn consolidation_prompt(language: Language, tier: Tier, partials: &[String]) -> String {
    let lead = match language {
        Language::En => "Combine these partial summaries into one coherent summary in English.",
        Language::Ko => "다음 부분 요약들을 하나의 일관된 한국어 요약으로 통합해 주세요.",
        Language::Ja => "以下の部分的な要約を、一つのまとまった日本語の要約に統合してください。",
        Language::Zh => "请将以下部分摘要合并为一个连贯的中文摘要。",
    };
    let detail = match tier {
        Tier::Free => "Keep it concise.",
        Tier::Premium => "Keep the important details.",
    };
    let body = partials
        .iter()
        .enumerate()
        .map(|(i, partial)| format!("[{}] {}", i + 1, partial))
        .collect::<Vec<_>>()
        .join("\n\n");
    format!("{lead} {detail}\n\n{body}")
}

/// Minimal prompt for engine liveness probes.
pub fn probe_prompt() -> &'static str {
    "ping"
}

/// Trims `text` and removes the first matching boilerplate lead-in.
pub fn strip_boilerplate(text: &str) -> &str {
    let trimmed = text.trim();
    BOILERPLATE_PREFIXES
        .iter()
        .find_map(|prefix| trimmed.strip_prefix(prefix))
        .map(str::trim)
        .unwrap_or(trimmed)
}
