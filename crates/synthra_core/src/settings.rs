use crate::{Language, Tier};

/// User preferences held in the persisted key-value store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    pub language: Language,
    /// Summarize automatically once navigation to a supported page settles.
    pub auto_summarize: bool,
    pub tier: Tier,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            language: Language::default(),
            auto_summarize: true,
            tier: Tier::default(),
        }
    }
}
