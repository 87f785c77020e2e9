//! Operator commands: watcher lifecycle and investigation triage.

use super::{FilewatcherPanel, DELETE_CONFIRMATION};
use crate::error::PanelError;
use crate::events::{Notification, PanelEventPayload};
use crate::gateway::RemoteGateway;
use crate::models::{InvestigationStatus, WatcherState, WatcherUpdate};
use crate::store::RefreshOutcome;
use crate::view::WatcherForm;
use tracing::{debug, error, info, warn};

impl<G: RemoteGateway> FilewatcherPanel<G> {
    fn notify(&self, notification: Notification) {
        self.inner.events.notify(notification);
    }

    fn form_changed(&self) {
        self.inner.events.publish(PanelEventPayload::FormChanged);
    }

    /// Open a blank create form, or close whatever form is open.
    /// Returns whether a form is open afterwards.
    pub fn toggle_create_form(&self) -> bool {
        let open = self.with_state(|state| {
            if state.view.form.take().is_some() {
                false
            } else {
                state.view.form = Some(WatcherForm::blank());
                true
            }
        });
        self.form_changed();
        open
    }

    /// Close the form, discarding unsaved input.
    pub fn cancel_edit(&self) -> bool {
        let closed = self.with_state(|state| state.view.form.take().is_some());
        if closed {
            self.form_changed();
        }
        closed
    }

    /// Apply an edit to the open form. Returns `false` when no form is open.
    pub fn update_form(&self, edit: impl FnOnce(&mut WatcherForm)) -> bool {
        let applied = self.with_state(|state| match state.view.form.as_mut() {
            Some(form) => {
                edit(form);
                true
            }
            None => false,
        });
        if applied {
            self.form_changed();
        }
        applied
    }

    /// Load the current watcher collection and open the form in edit mode for
    /// `watcher_id`. An unknown id leaves the form untouched and returns `false`.
    pub async fn edit_watcher(&self, watcher_id: &str) -> Result<bool, PanelError> {
        match self.refresh_watchers().await {
            RefreshOutcome::Detached => return Err(PanelError::Detached),
            RefreshOutcome::Cleared(reason) => return Err(PanelError::Other(reason)),
            RefreshOutcome::Replaced(_) | RefreshOutcome::Stale => {}
        }

        let opened = self.with_state(|state| {
            let form = state.store.find_watcher(watcher_id).map(WatcherForm::from_watcher);
            match form {
                Some(form) => {
                    state.view.form = Some(form);
                    true
                }
                None => false,
            }
        });

        if opened {
            debug!(watcher_id, "Editing watcher");
            self.form_changed();
        } else {
            warn!(watcher_id, "Watcher not found for editing");
        }
        Ok(opened)
    }

    /// Submit the open form as a create or an update.
    ///
    /// On success the form closes, the watcher collection is refreshed and a
    /// success notification goes out. On failure the form stays open with the
    /// operator's input intact. A second save while one is in flight returns
    /// [`PanelError::Busy`] without issuing a request.
    pub async fn save_watcher(&self) -> Result<(), PanelError> {
        let lifetime = self.lifetime();
        let form = self.with_state(|state| match state.view.form.as_mut() {
            None => Err(PanelError::Validation("No watcher form is open".to_string())),
            Some(form) if form.submitting => Err(PanelError::Busy),
            Some(form) => {
                form.submitting = true;
                Ok(form.clone())
            }
        })?;
        self.form_changed();

        let result = match form.to_update() {
            Some(update) => self.inner.gateway.update_watcher(&update).await,
            None => self.inner.gateway.create_watcher(&form.to_draft()).await,
        };

        // Only the form this save was issued from is touched
        let is_same_form = |open: &WatcherForm| open.submitting && open.mode == form.mode;
        let release_form = || {
            self.with_state(|state| {
                if let Some(open) = state.view.form.as_mut().filter(|open| is_same_form(&**open)) {
                    open.submitting = false;
                }
            })
        };

        if lifetime.is_cancelled() {
            // The result is dropped but the form stays editable
            debug!("Discarding save that completed after detach");
            release_form();
            return Err(PanelError::Detached);
        }

        match result {
            Ok(()) => {
                info!(name = %form.name, edit = form.is_edit(), "Watcher saved");
                self.with_state(|state| {
                    if state.view.form.as_ref().is_some_and(is_same_form) {
                        state.view.form = None;
                    }
                });
                self.form_changed();
                self.refresh_watchers().await;
                self.notify(Notification::success("Watcher saved successfully"));
                Ok(())
            }
            Err(err) => {
                error!(name = %form.name, error = %err, "Failed to save watcher");
                release_form();
                self.form_changed();
                self.notify(Notification::error(format!(
                    "Failed to save watcher: {}",
                    err.reason()
                )));
                Err(err)
            }
        }
    }

    /// Delete a watcher after operator confirmation. Returns `false` when the
    /// operator declined and nothing was sent.
    pub async fn delete_watcher(&self, watcher_id: &str) -> Result<bool, PanelError> {
        if !self.inner.confirm.confirm(DELETE_CONFIRMATION) {
            debug!(watcher_id, "Delete declined");
            return Ok(false);
        }

        let lifetime = self.lifetime();
        let result = self.inner.gateway.delete_watcher(watcher_id).await;
        if lifetime.is_cancelled() {
            return Err(PanelError::Detached);
        }

        match result {
            Ok(()) => {
                info!(watcher_id, "Watcher deleted");
                self.notify(Notification::success("Watcher deleted successfully"));
                self.refresh_watchers().await;
                Ok(true)
            }
            Err(err) => {
                error!(watcher_id, error = %err, "Failed to delete watcher");
                self.notify(Notification::error(format!(
                    "Failed to delete watcher: {}",
                    err.reason()
                )));
                Err(err)
            }
        }
    }

    /// Request the opposite of `current_state` for a watcher and return the
    /// requested state. The target is computed here from what the caller
    /// last saw, so a stale `current_state` requests the wrong target.
    pub async fn toggle_watcher(
        &self,
        watcher_id: &str,
        current_state: WatcherState,
    ) -> Result<WatcherState, PanelError> {
        let target = current_state.toggled();
        let lifetime = self.lifetime();
        let result = self
            .inner
            .gateway
            .update_watcher(&WatcherUpdate::state_only(watcher_id, target.clone()))
            .await;
        if lifetime.is_cancelled() {
            return Err(PanelError::Detached);
        }

        match result {
            Ok(()) => {
                info!(watcher_id, from = %current_state, to = %target, "Watcher toggled");
                self.refresh_watchers().await;
                Ok(target)
            }
            Err(err) => {
                error!(watcher_id, error = %err, "Failed to toggle watcher");
                self.notify(Notification::error(format!(
                    "Failed to toggle watcher: {}",
                    err.reason()
                )));
                Err(err)
            }
        }
    }

    /// Set an investigation's status. No local change is made before the
    /// backend acknowledges; redundant requests rely on backend idempotence.
    pub async fn update_investigation(
        &self,
        investigation_id: &str,
        status: InvestigationStatus,
    ) -> Result<(), PanelError> {
        let lifetime = self.lifetime();
        let result = self
            .inner
            .gateway
            .set_investigation_status(investigation_id, status)
            .await;
        if lifetime.is_cancelled() {
            return Err(PanelError::Detached);
        }

        match result {
            Ok(()) => {
                info!(investigation_id, status = status.as_str(), "Investigation updated");
                self.notify(Notification::success("Investigation updated"));
                self.refresh_investigations().await;
                Ok(())
            }
            Err(err) => {
                error!(investigation_id, error = %err, "Failed to update investigation");
                self.notify(Notification::error(format!(
                    "Failed to update investigation: {}",
                    err.reason()
                )));
                Err(err)
            }
        }
    }

    pub async fn ignore_investigation(&self, investigation_id: &str) -> Result<(), PanelError> {
        self.update_investigation(investigation_id, InvestigationStatus::Ignored)
            .await
    }

    pub async fn reinvestigate_investigation(&self, investigation_id: &str) -> Result<(), PanelError> {
        self.update_investigation(investigation_id, InvestigationStatus::Pending)
            .await
    }
}
