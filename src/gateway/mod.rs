//! Remote gateway seam.
//!
//! The panel never talks to the backend directly; every request goes through
//! a [`RemoteGateway`], either the HTTP client or the in-memory backend.

pub mod http;
pub mod memory;

pub use http::HttpGateway;
pub use memory::{GatewayCall, InMemoryGateway};

use crate::error::PanelError;
use crate::models::{Investigation, InvestigationStatus, Watcher, WatcherDraft, WatcherUpdate};
use std::future::Future;

/// Backend operation names, also used as HTTP endpoint paths.
pub mod operations {
    pub const LIST_WATCHERS: &str = "filewatcher_list";
    pub const CREATE_WATCHER: &str = "filewatcher_create";
    pub const UPDATE_WATCHER: &str = "filewatcher_update";
    pub const DELETE_WATCHER: &str = "filewatcher_delete";
    pub const LIST_INVESTIGATIONS: &str = "filewatcher_investigations";
    pub const UPDATE_INVESTIGATION: &str = "filewatcher_update_investigation";
}

/// Request/response operations exposed by the watcher backend.
///
/// Status changes must be idempotent: setting a status that is already set
/// succeeds without effect.
pub trait RemoteGateway: Send + Sync + 'static {
    fn list_watchers(&self) -> impl Future<Output = Result<Vec<Watcher>, PanelError>> + Send;

    fn create_watcher(
        &self,
        draft: &WatcherDraft,
    ) -> impl Future<Output = Result<(), PanelError>> + Send;

    fn update_watcher(
        &self,
        update: &WatcherUpdate,
    ) -> impl Future<Output = Result<(), PanelError>> + Send;

    fn delete_watcher(&self, watcher_id: &str)
        -> impl Future<Output = Result<(), PanelError>> + Send;

    fn list_investigations(
        &self,
    ) -> impl Future<Output = Result<Vec<Investigation>, PanelError>> + Send;

    fn set_investigation_status(
        &self,
        investigation_id: &str,
        status: InvestigationStatus,
    ) -> impl Future<Output = Result<(), PanelError>> + Send;
}
