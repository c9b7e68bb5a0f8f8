use serde::Serialize;

/// Role of a chat message sent to the inference engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

const SUMMARY_SYSTEM_PROMPT: &str =
    "You are an assistant that specializes in summarizing video transcripts. Provide a concise and informative summary.";

/// One chat-completion call, bounded by `max_tokens` of output.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
}

impl CompletionRequest {
    pub fn summary(prompt: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            messages: vec![
                ChatMessage::system(SUMMARY_SYSTEM_PROMPT),
                ChatMessage::user(prompt),
            ],
            max_tokens,
            temperature: 0.7,
            top_p: 0.95,
        }
    }

    /// Cheapest possible call, used to check that an engine answers at all.
    pub fn probe() -> Self {
        Self {
            messages: vec![ChatMessage::user(synthra_core::probe_prompt())],
            max_tokens: 1,
            temperature: 0.0,
            top_p: 1.0,
        }
    }

    pub fn is_probe(&self) -> bool {
        self.max_tokens == 1
            && self.messages.len() == 1
            && self.messages[0].content == synthra_core::probe_prompt()
    }

    /// Content of the last user message.
    pub fn prompt(&self) -> &str {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == ChatRole::User)
            .map(|m| m.content.as_str())
            .unwrap_or("")
    }
}

/// Initialization progress reported while an engine is being constructed.
#[derive(Debug, Clone, PartialEq)]
pub struct InitProgress {
    pub fraction: f32,
    pub text: String,
}

impl InitProgress {
    pub fn new(fraction: f32, text: impl Into<String>) -> Self {
        Self {
            fraction,
            text: text.into(),
        }
    }
}
