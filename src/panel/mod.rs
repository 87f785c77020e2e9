//! The filewatcher panel: one instance per mount.
//!
//! Owns the state store and view state, keeps them in sync with the backend
//! through the poll scheduler, and exposes the operator commands (see
//! `commands.rs`). All shared state sits behind one mutex that is never held
//! across an `.await`, so each completion applies atomically.

mod commands;
mod scheduler;

pub use scheduler::PollScheduler;

use crate::config::PanelConfig;
use crate::error::PanelError;
use crate::events::{EventReceiver, PanelEventBus, PanelEventPayload};
use crate::gateway::RemoteGateway;
use crate::models::{Investigation, Watcher};
use crate::render::render_panel;
use crate::store::{Collection, RefreshOutcome, RefreshTicket, StateStore};
use crate::view::{SubTab, ViewState, WatcherForm};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace};

pub const DELETE_CONFIRMATION: &str = "Are you sure you want to delete this watcher?";

/// Operator confirmation for destructive commands.
pub trait Confirm: Send + Sync {
    fn confirm(&self, message: &str) -> bool;
}

impl<F> Confirm for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn confirm(&self, message: &str) -> bool {
        self(message)
    }
}

/// Declines every confirmation; used when no operator prompt is wired up.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeclineAll;

impl Confirm for DeclineAll {
    fn confirm(&self, _message: &str) -> bool {
        false
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PanelSettings {
    pub poll_interval: Duration,
    pub investigation_limit: usize,
}

impl From<&PanelConfig> for PanelSettings {
    fn from(config: &PanelConfig) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            investigation_limit: config.investigation_limit.max(1),
        }
    }
}

impl Default for PanelSettings {
    fn default() -> Self {
        Self::from(&PanelConfig::default())
    }
}

#[derive(Debug, Default)]
struct PanelState {
    store: StateStore,
    view: ViewState,
    attached: bool,
}

struct PanelInner<G> {
    gateway: G,
    settings: PanelSettings,
    state: Mutex<PanelState>,
    events: PanelEventBus,
    confirm: Box<dyn Confirm>,
    scheduler: PollScheduler,
    lifetime: Mutex<CancellationToken>,
}

/// Cheaply cloneable handle to one panel instance.
pub struct FilewatcherPanel<G: RemoteGateway> {
    inner: Arc<PanelInner<G>>,
}

impl<G: RemoteGateway> Clone for FilewatcherPanel<G> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<G: RemoteGateway> std::fmt::Debug for FilewatcherPanel<G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilewatcherPanel")
            .field("settings", &self.inner.settings)
            .field("gateway", &"<gateway>")
            .field("state", &"<panel state>")
            .field("scheduler", &self.inner.scheduler)
            .finish()
    }
}

impl<G: RemoteGateway> FilewatcherPanel<G> {
    /// Panel whose delete confirmations are always declined.
    pub fn new(gateway: G, settings: PanelSettings) -> Self {
        Self::with_confirm(gateway, settings, DeclineAll)
    }

    pub fn with_confirm(gateway: G, settings: PanelSettings, confirm: impl Confirm + 'static) -> Self {
        Self {
            inner: Arc::new(PanelInner {
                gateway,
                settings,
                state: Mutex::new(PanelState::default()),
                events: PanelEventBus::default(),
                confirm: Box::new(confirm),
                scheduler: PollScheduler::new(settings.poll_interval),
                lifetime: Mutex::new(CancellationToken::new()),
            }),
        }
    }

    pub fn gateway(&self) -> &G {
        &self.inner.gateway
    }

    pub fn settings(&self) -> PanelSettings {
        self.inner.settings
    }

    pub fn events(&self) -> &PanelEventBus {
        &self.inner.events
    }

    pub fn subscribe(&self) -> EventReceiver {
        self.inner.events.subscribe()
    }

    fn state(&self) -> MutexGuard<'_, PanelState> {
        // Poisoned state is still usable
        match self.inner.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut PanelState) -> R) -> R {
        let mut state = self.state();
        f(&mut state)
    }

    fn lifetime(&self) -> CancellationToken {
        match self.inner.lifetime.lock() {
            Ok(token) => token.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Mount the panel: start polling and load both collections.
    pub async fn attach(&self) {
        let newly_attached = self.with_state(|state| !std::mem::replace(&mut state.attached, true));
        if !newly_attached {
            return;
        }

        if let Ok(mut lifetime) = self.inner.lifetime.lock() {
            if lifetime.is_cancelled() {
                *lifetime = CancellationToken::new();
            }
        }

        info!(
            poll_interval_ms = self.inner.settings.poll_interval.as_millis() as u64,
            "Filewatcher panel attached"
        );

        self.start_polling();
        self.refresh_all().await;
    }

    /// Unmount the panel. Polling stops and completions of requests still in
    /// flight are discarded.
    pub fn detach(&self) {
        let was_attached = self.with_state(|state| std::mem::replace(&mut state.attached, false));
        self.stop_polling();
        if let Ok(lifetime) = self.inner.lifetime.lock() {
            lifetime.cancel();
        }
        if was_attached {
            info!("Filewatcher panel detached");
        }
    }

    pub fn is_attached(&self) -> bool {
        self.state().attached
    }

    /// Start the poll timer. Returns `false` if it was already running.
    pub fn start_polling(&self) -> bool {
        let weak: Weak<PanelInner<G>> = Arc::downgrade(&self.inner);
        self.inner.scheduler.start(move || {
            let weak = weak.clone();
            async move {
                match weak.upgrade() {
                    Some(inner) => {
                        FilewatcherPanel { inner }.poll_tick().await;
                        true
                    }
                    None => false,
                }
            }
        })
    }

    pub fn stop_polling(&self) -> bool {
        self.inner.scheduler.stop()
    }

    pub fn is_polling(&self) -> bool {
        self.inner.scheduler.is_running()
    }

    /// One poll cycle. Hidden panels skip the cycle entirely.
    pub async fn poll_tick(&self) {
        if !self.is_visible() {
            trace!("Panel hidden, skipping poll");
            return;
        }
        self.refresh_all().await;
    }

    pub fn set_visible(&self, visible: bool) {
        let changed = self.with_state(|state| std::mem::replace(&mut state.view.visible, visible) != visible);
        if changed {
            debug!(visible, "Panel visibility changed");
            self.inner.events.publish(PanelEventPayload::ViewChanged);
        }
    }

    pub fn is_visible(&self) -> bool {
        self.state().view.visible
    }

    pub fn switch_tab(&self, tab: SubTab) {
        self.with_state(|state| state.view.active_tab = tab);
        self.inner.events.publish(PanelEventPayload::ViewChanged);
    }

    pub fn active_tab(&self) -> SubTab {
        self.state().view.active_tab
    }

    /// Refresh both collections concurrently; one failing does not block the other.
    pub async fn refresh_all(&self) -> (RefreshOutcome, RefreshOutcome) {
        tokio::join!(self.refresh_watchers(), self.refresh_investigations())
    }

    pub async fn refresh_watchers(&self) -> RefreshOutcome {
        let lifetime = self.lifetime();
        let ticket = self.with_state(|state| state.store.begin_refresh(Collection::Watchers));
        let result = self.inner.gateway.list_watchers().await;

        self.finish_refresh(&lifetime, ticket, result, |store, ticket, result| {
            store.apply_watchers(ticket, result)
        })
    }

    pub async fn refresh_investigations(&self) -> RefreshOutcome {
        let lifetime = self.lifetime();
        let ticket = self.with_state(|state| state.store.begin_refresh(Collection::Investigations));
        let result = self.inner.gateway.list_investigations().await;

        self.finish_refresh(&lifetime, ticket, result, |store, ticket, result| {
            store.apply_investigations(ticket, result)
        })
    }

    fn finish_refresh<T>(
        &self,
        lifetime: &CancellationToken,
        ticket: RefreshTicket,
        result: Result<Vec<T>, PanelError>,
        apply: impl FnOnce(&mut StateStore, RefreshTicket, Result<Vec<T>, PanelError>) -> RefreshOutcome,
    ) -> RefreshOutcome {
        let collection = ticket.collection;
        if lifetime.is_cancelled() {
            debug!(%collection, "Discarding refresh that completed after detach");
            return RefreshOutcome::Detached;
        }

        if let Err(ref err) = result {
            error!(%collection, error = %err, "Failed to load {}", collection);
        }

        let outcome = self.with_state(|state| apply(&mut state.store, ticket, result));
        match &outcome {
            RefreshOutcome::Replaced(count) => {
                self.inner.events.publish(PanelEventPayload::Refreshed {
                    collection,
                    count: *count,
                });
            }
            RefreshOutcome::Cleared(reason) => {
                self.inner.events.publish(PanelEventPayload::RefreshFailed {
                    collection,
                    reason: reason.clone(),
                });
            }
            RefreshOutcome::Stale => {
                debug!(%collection, sequence = ticket.sequence, "Dropped overtaken refresh");
            }
            RefreshOutcome::Detached => {}
        }
        outcome
    }

    pub fn watchers(&self) -> Vec<Watcher> {
        self.state().store.watchers().to_vec()
    }

    pub fn investigations(&self) -> Vec<Investigation> {
        self.state().store.investigations().to_vec()
    }

    pub fn view(&self) -> ViewState {
        self.state().view.clone()
    }

    pub fn form(&self) -> Option<WatcherForm> {
        self.state().view.form.clone()
    }

    /// Render the whole panel from current state.
    pub fn render(&self) -> String {
        let state = self.state();
        render_panel(&state.store, &state.view, self.inner.settings.investigation_limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{GatewayCall, InMemoryGateway};
    use crate::models::WatcherDraft;
    use chrono::Utc;

    fn settings(poll_ms: u64) -> PanelSettings {
        PanelSettings {
            poll_interval: Duration::from_millis(poll_ms),
            investigation_limit: 10,
        }
    }

    async fn seeded_gateway() -> InMemoryGateway {
        let gateway = InMemoryGateway::new();
        gateway
            .create_watcher(&WatcherDraft {
                name: "api".to_string(),
                directory: "/srv/api".to_string(),
                ..WatcherDraft::default()
            })
            .await
            .unwrap();
        let id = gateway.list_watchers().await.unwrap()[0].id.clone();
        gateway.seed_investigation(&id, "panic", "/srv/api/app.log", 1, Utc::now());
        gateway.clear_calls();
        gateway
    }

    #[tokio::test]
    async fn test_attach_loads_both_collections() {
        let panel = FilewatcherPanel::new(seeded_gateway().await, settings(5_000));
        panel.attach().await;

        assert!(panel.is_attached());
        assert!(panel.is_polling());
        assert_eq!(panel.watchers().len(), 1);
        assert_eq!(panel.investigations().len(), 1);

        // Second attach is a no-op
        panel.gateway().clear_calls();
        panel.attach().await;
        assert!(panel.gateway().calls().is_empty());

        panel.detach();
        assert!(!panel.is_polling());
    }

    #[tokio::test]
    async fn test_failed_refresh_clears_and_keeps_panel_usable() {
        let panel = FilewatcherPanel::new(seeded_gateway().await, settings(5_000));
        panel.refresh_all().await;
        assert_eq!(panel.investigations().len(), 1);

        let mut events = panel.subscribe();
        panel.gateway().set_offline(true);
        let (_, investigations) = panel.refresh_all().await;

        assert!(matches!(investigations, RefreshOutcome::Cleared(_)));
        assert!(panel.investigations().is_empty());
        assert!(panel.watchers().is_empty());

        panel.switch_tab(SubTab::Investigations);
        assert_eq!(panel.active_tab(), SubTab::Investigations);
        assert!(panel.render().contains("No investigations yet"));

        let mut failures = 0;
        while let Ok(event) = events.try_recv() {
            if let PanelEventPayload::RefreshFailed { .. } = event.payload {
                failures += 1;
            }
        }
        assert_eq!(failures, 2);
    }

    #[tokio::test]
    async fn test_hidden_panel_skips_poll() {
        let panel = FilewatcherPanel::new(seeded_gateway().await, settings(20));
        panel.set_visible(false);
        assert!(panel.start_polling());

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(panel.gateway().calls().is_empty());

        panel.set_visible(true);
        tokio::time::sleep(Duration::from_millis(100)).await;
        let calls = panel.gateway().calls();
        assert!(calls.contains(&GatewayCall::ListWatchers));
        assert!(calls.contains(&GatewayCall::ListInvestigations));

        panel.stop_polling();
    }

    #[tokio::test]
    async fn test_completion_after_detach_is_discarded() {
        let gateway = seeded_gateway().await;
        gateway.set_latency(Some(Duration::from_millis(50)));
        let panel = FilewatcherPanel::new(gateway, settings(5_000));

        let in_flight = {
            let panel = panel.clone();
            tokio::spawn(async move { panel.refresh_watchers().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        panel.detach();

        assert_eq!(in_flight.await.unwrap(), RefreshOutcome::Detached);
        assert!(panel.watchers().is_empty());
    }

    #[tokio::test]
    async fn test_dropping_panel_stops_scheduler_task() {
        let gateway = seeded_gateway().await;
        let backend = gateway.clone();
        let panel = FilewatcherPanel::new(gateway, settings(20));
        panel.start_polling();
        drop(panel);

        tokio::time::sleep(Duration::from_millis(80)).await;
        backend.clear_calls();
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(backend.calls().is_empty());
    }
}
