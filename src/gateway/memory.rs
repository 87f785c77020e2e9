//! In-process backend with the same request contract as the HTTP service.
//!
//! Used by the integration tests and the binary's demo mode. Supports fault
//! injection and artificial latency so overlapping requests can be staged.

use super::RemoteGateway;
use crate::error::PanelError;
use crate::models::{
    Investigation, InvestigationStatus, RecentInvestigation, Watcher, WatcherDraft,
    WatcherState, WatcherUpdate,
};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use uuid::Uuid;

pub const DEFAULT_ERROR_PATTERNS: [&str; 5] = [
    r"(?i)\berror\b",
    r"(?i)\bexception\b",
    r"(?i)\bfailed\b",
    r"(?i)\bcrash",
    r"(?i)\bcritical\b",
];

pub const DEFAULT_PROMPT: &str =
    "Investigate the error found in the log file and determine its root cause.";

const RECENT_INVESTIGATIONS: usize = 5;
const RECENT_PATTERN_CHARS: usize = 100;

/// A request as received by the in-memory backend, recorded even when it fails.
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayCall {
    ListWatchers,
    CreateWatcher(WatcherDraft),
    UpdateWatcher(WatcherUpdate),
    DeleteWatcher(String),
    ListInvestigations,
    SetInvestigationStatus(String, InvestigationStatus),
}

#[derive(Debug, Default)]
struct MemoryBackend {
    watchers: IndexMap<String, Watcher>,
    investigations: IndexMap<String, Investigation>,
    offline: bool,
    latency: Option<Duration>,
    calls: Vec<GatewayCall>,
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryGateway {
    inner: Arc<Mutex<MemoryBackend>>,
}

fn app_error(message: impl Into<String>) -> PanelError {
    let message = message.into();
    PanelError::from_response(200, Some(&message), "")
}

impl InMemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryBackend>, PanelError> {
        Ok(self.inner.lock()?)
    }

    /// Make every subsequent request fail as if the backend were unreachable.
    pub fn set_offline(&self, offline: bool) {
        if let Ok(mut backend) = self.inner.lock() {
            backend.offline = offline;
        }
    }

    /// Delay every response by `latency`.
    pub fn set_latency(&self, latency: Option<Duration>) {
        if let Ok(mut backend) = self.inner.lock() {
            backend.latency = latency;
        }
    }

    pub fn calls(&self) -> Vec<GatewayCall> {
        self.inner
            .lock()
            .map(|backend| backend.calls.clone())
            .unwrap_or_default()
    }

    pub fn clear_calls(&self) {
        if let Ok(mut backend) = self.inner.lock() {
            backend.calls.clear();
        }
    }

    /// Insert a watcher as-is, bypassing create validation.
    pub fn seed_watcher(&self, watcher: Watcher) {
        if let Ok(mut backend) = self.inner.lock() {
            backend.watchers.insert(watcher.id.clone(), watcher);
        }
    }

    /// Record a pattern match for a watcher and return the investigation id.
    pub fn seed_investigation(
        &self,
        watcher_id: &str,
        error_pattern: &str,
        file_path: &str,
        occurrences: u64,
        last_seen: DateTime<Utc>,
    ) -> String {
        let id = Uuid::new_v4().to_string();
        let investigation = Investigation {
            id: id.clone(),
            watcher_id: Some(watcher_id.to_string()),
            watcher_name: String::new(),
            error_pattern: error_pattern.to_string(),
            file_path: file_path.to_string(),
            occurrences,
            first_seen: Some(last_seen),
            last_seen,
            investigation_status: InvestigationStatus::Pending,
            investigation_result: None,
        };
        if let Ok(mut backend) = self.inner.lock() {
            backend.investigations.insert(id.clone(), investigation);
        }
        id
    }

    pub fn watcher(&self, watcher_id: &str) -> Option<Watcher> {
        self.inner
            .lock()
            .ok()
            .and_then(|backend| backend.watchers.get(watcher_id).cloned())
    }

    pub fn watcher_count(&self) -> usize {
        self.inner
            .lock()
            .map(|backend| backend.watchers.len())
            .unwrap_or(0)
    }

    pub fn investigation_status(&self, investigation_id: &str) -> Option<InvestigationStatus> {
        self.inner.lock().ok().and_then(|backend| {
            backend
                .investigations
                .get(investigation_id)
                .map(|inv| inv.investigation_status)
        })
    }

    /// Record the call, then apply latency and the offline switch.
    async fn begin(&self, call: GatewayCall) -> Result<(), PanelError> {
        let latency = {
            let mut backend = self.lock()?;
            backend.calls.push(call);
            backend.latency
        };

        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        if self.lock()?.offline {
            return Err(PanelError::Other("backend unreachable".to_string()));
        }
        Ok(())
    }
}

impl MemoryBackend {
    fn listing(&self, watcher: &Watcher) -> Watcher {
        let owned: Vec<&Investigation> = self
            .investigations
            .values()
            .filter(|inv| inv.watcher_id.as_deref() == Some(watcher.id.as_str()))
            .collect();

        let skip = owned.len().saturating_sub(RECENT_INVESTIGATIONS);
        let recent_investigations = owned[skip..]
            .iter()
            .map(|inv| RecentInvestigation {
                id: inv.id.clone(),
                error_pattern: truncate_pattern(&inv.error_pattern),
                status: inv.investigation_status,
                occurrences: inv.occurrences,
                last_seen: inv.last_seen,
            })
            .collect();

        Watcher {
            investigation_count: owned.len() as u64,
            recent_investigations,
            ..watcher.clone()
        }
    }
}

fn truncate_pattern(pattern: &str) -> String {
    if pattern.chars().count() > RECENT_PATTERN_CHARS {
        let head: String = pattern.chars().take(RECENT_PATTERN_CHARS).collect();
        format!("{}...", head)
    } else {
        pattern.to_string()
    }
}

impl RemoteGateway for InMemoryGateway {
    async fn list_watchers(&self) -> Result<Vec<Watcher>, PanelError> {
        self.begin(GatewayCall::ListWatchers).await?;
        let backend = self.lock()?;
        Ok(backend
            .watchers
            .values()
            .map(|watcher| backend.listing(watcher))
            .collect())
    }

    async fn create_watcher(&self, draft: &WatcherDraft) -> Result<(), PanelError> {
        self.begin(GatewayCall::CreateWatcher(draft.clone())).await?;

        let name = draft.name.trim();
        let directory = draft.directory.trim();
        if name.is_empty() {
            return Err(app_error("Name is required"));
        }
        if directory.is_empty() {
            return Err(app_error("Directory is required"));
        }

        let error_patterns = if draft.error_patterns.is_empty() {
            DEFAULT_ERROR_PATTERNS.iter().map(|p| p.to_string()).collect()
        } else {
            draft.error_patterns.clone()
        };
        let prompt = match draft.prompt.trim() {
            "" => DEFAULT_PROMPT.to_string(),
            prompt => prompt.to_string(),
        };
        let file_pattern = match draft.file_pattern.trim() {
            "" => None,
            pattern => Some(pattern.to_string()),
        };

        let now = Utc::now();
        let watcher = Watcher {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            directory: directory.to_string(),
            file_pattern,
            prompt,
            error_patterns,
            state: WatcherState::Active,
            // Watching starts once the backend attaches an agent context
            is_running: false,
            investigation_count: 0,
            recent_investigations: Vec::new(),
            created_at: Some(now),
            updated_at: Some(now),
        };

        self.lock()?.watchers.insert(watcher.id.clone(), watcher);
        Ok(())
    }

    async fn update_watcher(&self, update: &WatcherUpdate) -> Result<(), PanelError> {
        self.begin(GatewayCall::UpdateWatcher(update.clone())).await?;

        let watcher_id = update.watcher_id.trim();
        if watcher_id.is_empty() {
            return Err(app_error("Watcher ID is required"));
        }

        let mut backend = self.lock()?;
        let watcher = backend
            .watchers
            .get_mut(watcher_id)
            .ok_or_else(|| app_error(format!("Watcher with ID '{}' not found", watcher_id)))?;

        if let Some(ref name) = update.name {
            watcher.name = name.trim().to_string();
        }
        if let Some(ref directory) = update.directory {
            watcher.directory = directory.trim().to_string();
        }
        if let Some(ref file_pattern) = update.file_pattern {
            let trimmed = file_pattern.trim();
            watcher.file_pattern = (!trimmed.is_empty()).then(|| trimmed.to_string());
        }
        if let Some(ref prompt) = update.prompt {
            watcher.prompt = prompt.trim().to_string();
        }
        if let Some(ref error_patterns) = update.error_patterns {
            watcher.error_patterns = error_patterns.clone();
        }
        // State names are matched case-insensitively; unrecognised ones are ignored
        let state = update
            .state
            .as_ref()
            .map(|state| WatcherState::parse(&state.as_str().to_ascii_lowercase()))
            .filter(WatcherState::is_known);
        if let Some(state) = state {
            watcher.is_running = state == WatcherState::Active;
            watcher.state = state;
        }
        watcher.updated_at = Some(Utc::now());

        Ok(())
    }

    async fn delete_watcher(&self, watcher_id: &str) -> Result<(), PanelError> {
        self.begin(GatewayCall::DeleteWatcher(watcher_id.to_string()))
            .await?;

        let watcher_id = watcher_id.trim();
        if watcher_id.is_empty() {
            return Err(app_error("Watcher ID is required"));
        }

        let mut backend = self.lock()?;
        match backend.watchers.shift_remove(watcher_id) {
            Some(_) => Ok(()),
            None => Err(app_error(format!(
                "Watcher with ID '{}' not found",
                watcher_id
            ))),
        }
    }

    async fn list_investigations(&self) -> Result<Vec<Investigation>, PanelError> {
        self.begin(GatewayCall::ListInvestigations).await?;

        let backend = self.lock()?;
        let mut investigations: Vec<Investigation> = backend
            .investigations
            .values()
            .map(|inv| {
                let watcher_name = inv
                    .watcher_id
                    .as_deref()
                    .and_then(|id| backend.watchers.get(id))
                    .map(|watcher| watcher.name.clone())
                    .unwrap_or_else(|| "Unknown".to_string());
                Investigation {
                    watcher_name,
                    ..inv.clone()
                }
            })
            .collect();

        investigations.sort_by(|a, b| b.last_seen.cmp(&a.last_seen));
        Ok(investigations)
    }

    async fn set_investigation_status(
        &self,
        investigation_id: &str,
        status: InvestigationStatus,
    ) -> Result<(), PanelError> {
        self.begin(GatewayCall::SetInvestigationStatus(
            investigation_id.to_string(),
            status,
        ))
        .await?;

        let investigation_id = investigation_id.trim();
        if investigation_id.is_empty() {
            return Err(app_error("Investigation ID is required"));
        }

        let mut backend = self.lock()?;
        let investigation = backend
            .investigations
            .get_mut(investigation_id)
            .ok_or_else(|| {
                app_error(format!(
                    "Investigation with ID '{}' not found",
                    investigation_id
                ))
            })?;
        investigation.investigation_status = status;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    fn draft(name: &str, directory: &str) -> WatcherDraft {
        WatcherDraft {
            name: name.to_string(),
            directory: directory.to_string(),
            ..WatcherDraft::default()
        }
    }

    #[tokio::test]
    async fn test_create_applies_backend_defaults() {
        let gateway = InMemoryGateway::new();
        gateway
            .create_watcher(&draft("  app  ", "/var/log/app"))
            .await
            .unwrap();

        let watchers = gateway.list_watchers().await.unwrap();
        assert_eq!(watchers.len(), 1);
        let watcher = &watchers[0];
        assert_eq!(watcher.name, "app");
        assert_eq!(watcher.error_patterns.len(), DEFAULT_ERROR_PATTERNS.len());
        assert_eq!(watcher.prompt, DEFAULT_PROMPT);
        assert!(watcher.file_pattern.is_none());
        assert_eq!(watcher.state, WatcherState::Active);
        assert!(!watcher.is_running);
    }

    #[tokio::test]
    async fn test_create_requires_name_and_directory() {
        let gateway = InMemoryGateway::new();

        let err = gateway.create_watcher(&draft(" ", "/tmp")).await.unwrap_err();
        assert_eq!(err.reason(), "Name is required");

        let err = gateway.create_watcher(&draft("x", "")).await.unwrap_err();
        assert_eq!(err.reason(), "Directory is required");

        assert!(gateway.list_watchers().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_state_flips_running() {
        let gateway = InMemoryGateway::new();
        gateway.create_watcher(&draft("app", "/tmp")).await.unwrap();
        let id = gateway.list_watchers().await.unwrap()[0].id.clone();

        gateway
            .update_watcher(&WatcherUpdate::state_only(&id, WatcherState::Active))
            .await
            .unwrap();
        assert!(gateway.watcher(&id).unwrap().is_running);

        gateway
            .update_watcher(&WatcherUpdate::state_only(&id, WatcherState::Stopped))
            .await
            .unwrap();
        let watcher = gateway.watcher(&id).unwrap();
        assert_eq!(watcher.state, WatcherState::Stopped);
        assert!(!watcher.is_running);

        // Names match case-insensitively; unknown names leave the state alone
        gateway
            .update_watcher(&WatcherUpdate::state_only(&id, WatcherState::Other("ACTIVE".to_string())))
            .await
            .unwrap();
        assert_eq!(gateway.watcher(&id).unwrap().state, WatcherState::Active);

        gateway
            .update_watcher(&WatcherUpdate::state_only(&id, WatcherState::Other("archived".to_string())))
            .await
            .unwrap();
        let watcher = gateway.watcher(&id).unwrap();
        assert_eq!(watcher.state, WatcherState::Active);
        assert!(watcher.is_running);
    }

    #[tokio::test]
    async fn test_delete_unknown_watcher_fails() {
        let gateway = InMemoryGateway::new();
        let err = gateway.delete_watcher("missing").await.unwrap_err();
        assert_eq!(err.reason(), "Watcher with ID 'missing' not found");
    }

    #[tokio::test]
    async fn test_investigations_sorted_and_named() {
        let gateway = InMemoryGateway::new();
        gateway.create_watcher(&draft("api", "/srv")).await.unwrap();
        let id = gateway.list_watchers().await.unwrap()[0].id.clone();

        let now = Utc::now();
        let older = gateway.seed_investigation(&id, "timeout", "/srv/a.log", 1, now - ChronoDuration::minutes(5));
        let newer = gateway.seed_investigation(&id, "panic", "/srv/b.log", 2, now);
        gateway.seed_investigation("gone", "oops", "/srv/c.log", 1, now - ChronoDuration::hours(1));

        let investigations = gateway.list_investigations().await.unwrap();
        assert_eq!(investigations[0].id, newer);
        assert_eq!(investigations[1].id, older);
        assert_eq!(investigations[0].watcher_name, "api");
        assert_eq!(investigations[2].watcher_name, "Unknown");

        let watchers = gateway.list_watchers().await.unwrap();
        assert_eq!(watchers[0].investigation_count, 2);
        assert_eq!(watchers[0].recent_investigations.len(), 2);
    }

    #[tokio::test]
    async fn test_status_change_is_idempotent() {
        let gateway = InMemoryGateway::new();
        let id = gateway.seed_investigation("w", "err", "/x.log", 1, Utc::now());

        gateway
            .set_investigation_status(&id, InvestigationStatus::Ignored)
            .await
            .unwrap();
        gateway
            .set_investigation_status(&id, InvestigationStatus::Ignored)
            .await
            .unwrap();
        assert_eq!(
            gateway.investigation_status(&id),
            Some(InvestigationStatus::Ignored)
        );
    }

    #[tokio::test]
    async fn test_offline_records_call_and_fails() {
        let gateway = InMemoryGateway::new();
        gateway.set_offline(true);

        assert!(gateway.list_investigations().await.is_err());
        assert_eq!(gateway.calls(), vec![GatewayCall::ListInvestigations]);
    }

    #[test]
    fn test_truncate_long_patterns() {
        let long = "e".repeat(150);
        let truncated = truncate_pattern(&long);
        assert_eq!(truncated.len(), 103);
        assert!(truncated.ends_with("..."));
        assert_eq!(truncate_pattern("short"), "short");
    }
}
