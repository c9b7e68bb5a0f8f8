use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use synthra_core::TabId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabInfo {
    pub url: String,
    pub title: Option<String>,
}

/// Latest known URL of every open tab, fed by navigation events.
#[derive(Debug, Default)]
pub struct TabTracker {
    tabs: Mutex<HashMap<TabId, TabInfo>>,
}

impl TabTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<TabId, TabInfo>> {
        self.tabs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn update(&self, tab_id: TabId, url: impl Into<String>, title: Option<String>) {
        self.lock().insert(
            tab_id,
            TabInfo {
                url: url.into(),
                title,
            },
        );
    }

    pub fn close(&self, tab_id: TabId) -> bool {
        self.lock().remove(&tab_id).is_some()
    }

    pub fn get(&self, tab_id: TabId) -> Option<TabInfo> {
        self.lock().get(&tab_id).cloned()
    }

    /// True when the tab still exists and is still showing `url`.
    pub fn is_current(&self, tab_id: TabId, url: &str) -> bool {
        self.lock()
            .get(&tab_id)
            .is_some_and(|info| info.url == url)
    }
}
