//! Client-owned view state: active tab, visibility, and the watcher form.

use crate::models::{
    join_error_patterns, split_error_patterns, Watcher, WatcherDraft, WatcherUpdate,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubTab {
    #[default]
    Watchers,
    Investigations,
}

impl SubTab {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubTab::Watchers => "watchers",
            SubTab::Investigations => "investigations",
        }
    }
}

/// Whether the form creates a new watcher or edits an existing one.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum FormMode {
    #[default]
    Create,
    Edit { watcher_id: String },
}

/// Typed form state. The rendered form is a view of this; there is no
/// second copy of the field values anywhere else.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WatcherForm {
    pub mode: FormMode,
    pub name: String,
    pub directory: String,
    pub file_pattern: String,
    pub prompt: String,
    /// One pattern per line
    pub error_patterns: String,
    /// Set while a save for this form is in flight
    #[serde(default)]
    pub submitting: bool,
}

impl WatcherForm {
    pub fn blank() -> Self {
        Self::default()
    }

    /// Snapshot of a watcher's current values.
    pub fn from_watcher(watcher: &Watcher) -> Self {
        Self {
            mode: FormMode::Edit {
                watcher_id: watcher.id.clone(),
            },
            name: watcher.name.clone(),
            directory: watcher.directory.clone(),
            file_pattern: watcher.file_pattern.clone().unwrap_or_default(),
            prompt: watcher.prompt.clone(),
            error_patterns: join_error_patterns(&watcher.error_patterns),
            submitting: false,
        }
    }

    pub fn watcher_id(&self) -> Option<&str> {
        match &self.mode {
            FormMode::Create => None,
            FormMode::Edit { watcher_id } => Some(watcher_id),
        }
    }

    pub fn is_edit(&self) -> bool {
        self.watcher_id().is_some()
    }

    pub fn to_draft(&self) -> WatcherDraft {
        WatcherDraft {
            name: self.name.clone(),
            directory: self.directory.clone(),
            file_pattern: self.file_pattern.clone(),
            prompt: self.prompt.clone(),
            error_patterns: split_error_patterns(&self.error_patterns),
        }
    }

    /// Update payload for edit mode; `None` in create mode.
    pub fn to_update(&self) -> Option<WatcherUpdate> {
        self.watcher_id()
            .map(|id| WatcherUpdate::from_draft(id, self.to_draft()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewState {
    pub active_tab: SubTab,
    /// Polling only refreshes while the panel is shown
    pub visible: bool,
    pub form: Option<WatcherForm>,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            active_tab: SubTab::Watchers,
            visible: true,
            form: None,
        }
    }
}

impl ViewState {
    pub fn editing_watcher_id(&self) -> Option<&str> {
        self.form.as_ref().and_then(WatcherForm::watcher_id)
    }
}
