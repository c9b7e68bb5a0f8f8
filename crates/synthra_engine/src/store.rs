use std::fs;
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};

use engine_logging::{engine_debug, engine_info, engine_warn};
use serde::{Deserialize, Serialize};
use synthra_core::{Language, Settings, SummaryHistory, SummaryHistoryEntry, Tier};
use tempfile::NamedTempFile;
use thiserror::Error;

pub const STATE_FILENAME: &str = ".synthra_state.ron";

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("state directory {path} is unusable: {reason}")]
    StateDir { path: PathBuf, reason: String },
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("could not serialize state: {0}")]
    Serialize(String),
}

/// Creates `dir` when missing and checks that files can be created in it.
pub fn ensure_state_dir(dir: &Path) -> Result<(), PersistError> {
    let unusable = |reason: String| PersistError::StateDir {
        path: dir.to_path_buf(),
        reason,
    };
    fs::create_dir_all(dir).map_err(|err| unusable(err.to_string()))?;
    if !dir.is_dir() {
        return Err(unusable("not a directory".to_string()));
    }
    tempfile::tempfile_in(dir).map_err(|err| unusable(err.to_string()))?;
    Ok(())
}

/// Replaces `<dir>/.synthra_state.ron` in one rename; readers see the old or
/// the new state, never a partial file.
fn replace_state_file(dir: &Path, content: &str) -> Result<PathBuf, PersistError> {
    ensure_state_dir(dir)?;
    let target = dir.join(STATE_FILENAME);
    let mut staged = NamedTempFile::new_in(dir)?;
    staged.write_all(content.as_bytes())?;
    staged.as_file().sync_all()?;
    staged
        .persist(&target)
        .map_err(|err| PersistError::Io(err.error))?;
    Ok(target)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PersistedState {
    #[serde(default)]
    selected_language: Language,
    #[serde(default = "default_auto_summarize", alias = "auto_summary_enabled")]
    auto_summarize: bool,
    #[serde(default)]
    tier: Tier,
    #[serde(default)]
    history: Vec<SummaryHistoryEntry>,
}

fn default_auto_summarize() -> bool {
    true
}

/// Small persisted key-value store: settings plus the summary history.
///
/// Without a directory (see [`LocalStore::in_memory`]) nothing is written.
#[derive(Debug, Default)]
pub struct LocalStore {
    dir: Option<PathBuf>,
    settings: Settings,
    history: SummaryHistory,
}

impl LocalStore {
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Loads `<dir>/.synthra_state.ron`; a missing or unreadable file yields defaults.
    pub fn load(dir: &Path) -> Self {
        let mut store = Self {
            dir: Some(dir.to_path_buf()),
            ..Self::default()
        };
        let path = dir.join(STATE_FILENAME);
        let content = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) if err.kind() == ErrorKind::NotFound => return store,
            Err(err) => {
                engine_warn!("Failed to read persisted state from {:?}: {}", path, err);
                return store;
            }
        };

        let persisted: PersistedState = match ron::from_str(&content) {
            Ok(state) => state,
            Err(err) => {
                engine_warn!("Failed to parse persisted state from {:?}: {}", path, err);
                return store;
            }
        };

        store.settings = Settings {
            language: persisted.selected_language,
            auto_summarize: persisted.auto_summarize,
            tier: persisted.tier,
        };
        store.history = SummaryHistory::from_entries(persisted.history);
        engine_info!(
            "Loaded persisted state from {:?} ({} history entries)",
            path,
            store.history.len()
        );
        store
    }

    pub fn settings(&self) -> Settings {
        self.settings
    }

    pub fn history(&self) -> &SummaryHistory {
        &self.history
    }

    pub fn update_settings(&mut self, update: impl FnOnce(&mut Settings)) -> Result<(), PersistError> {
        update(&mut self.settings);
        self.save()
    }

    pub fn append_history(&mut self, entry: SummaryHistoryEntry) -> Result<(), PersistError> {
        self.history.append(entry);
        self.save()
    }

    pub fn remove_history(&mut self, content_id: &str) -> Result<bool, PersistError> {
        let removed = self.history.remove(content_id);
        if removed {
            self.save()?;
        }
        Ok(removed)
    }

    pub fn save(&self) -> Result<(), PersistError> {
        let Some(dir) = &self.dir else {
            return Ok(());
        };
        let state = PersistedState {
            selected_language: self.settings.language,
            auto_summarize: self.settings.auto_summarize,
            tier: self.settings.tier,
            history: self.history.list().to_vec(),
        };
        let content = ron::ser::to_string_pretty(&state, ron::ser::PrettyConfig::new())
            .map_err(|err| PersistError::Serialize(err.to_string()))?;
        let path = replace_state_file(dir, &content)?;
        engine_debug!("Saved state to {:?}", path);
        Ok(())
    }
}
