//! HTTP gateway: every operation is a JSON POST to `{server_url}/{operation}`.

use super::{operations, RemoteGateway};
use crate::config::PanelConfig;
use crate::error::PanelError;
use crate::models::{
    Investigation, InvestigationListResponse, InvestigationStatus, InvestigationStatusUpdate,
    Watcher, WatcherDraft, WatcherIdRequest, WatcherListResponse, WatcherUpdate,
};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: reqwest::Client,
    base_url: Url,
    api_key: Option<String>,
}

impl HttpGateway {
    pub fn new(base_url: Url, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            api_key,
        }
    }

    pub fn from_config(config: &PanelConfig) -> Result<Self, PanelError> {
        Ok(Self::new(config.server_url()?, config.api_key.clone()))
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, operation: &str) -> String {
        format!("{}/{}", self.base_url.as_str().trim_end_matches('/'), operation)
    }

    /// Send one request. Returns the parsed body, or `Value::Null` when the
    /// body is empty or not JSON.
    async fn send<B: Serialize + ?Sized>(
        &self,
        operation: &str,
        body: &B,
    ) -> Result<Value, PanelError> {
        let url = self.endpoint(operation);

        let mut request = self.client.post(&url).json(body);
        if let Some(ref api_key) = self.api_key {
            request = request.header("Authorization", format!("Bearer {}", api_key));
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        let value: Value = serde_json::from_str(&text).unwrap_or(Value::Null);

        // The backend reports application errors in the body, even on 200
        let error_field = value.get("error").and_then(Value::as_str);

        let has_error = value.get("error").is_some_and(|error| !error.is_null());
        if !status.is_success() || has_error {
            let err = PanelError::from_response(status.as_u16(), error_field, &text);
            warn!(operation, status = status.as_u16(), error = %err, "Gateway request failed");
            return Err(err);
        }

        debug!(operation, status = status.as_u16(), "Gateway request completed");
        Ok(value)
    }
}

impl RemoteGateway for HttpGateway {
    async fn list_watchers(&self) -> Result<Vec<Watcher>, PanelError> {
        let value = self
            .send(operations::LIST_WATCHERS, &serde_json::json!({}))
            .await?;
        let response: WatcherListResponse = serde_json::from_value(value)?;
        Ok(response.watchers)
    }

    async fn create_watcher(&self, draft: &WatcherDraft) -> Result<(), PanelError> {
        self.send(operations::CREATE_WATCHER, draft).await?;
        Ok(())
    }

    async fn update_watcher(&self, update: &WatcherUpdate) -> Result<(), PanelError> {
        self.send(operations::UPDATE_WATCHER, update).await?;
        Ok(())
    }

    async fn delete_watcher(&self, watcher_id: &str) -> Result<(), PanelError> {
        let body = WatcherIdRequest {
            watcher_id: watcher_id.to_string(),
        };
        self.send(operations::DELETE_WATCHER, &body).await?;
        Ok(())
    }

    async fn list_investigations(&self) -> Result<Vec<Investigation>, PanelError> {
        let value = self
            .send(operations::LIST_INVESTIGATIONS, &serde_json::json!({}))
            .await?;
        let response: InvestigationListResponse = serde_json::from_value(value)?;
        Ok(response.investigations)
    }

    async fn set_investigation_status(
        &self,
        investigation_id: &str,
        status: InvestigationStatus,
    ) -> Result<(), PanelError> {
        let body = InvestigationStatusUpdate {
            investigation_id: investigation_id.to_string(),
            status,
        };
        self.send(operations::UPDATE_INVESTIGATION, &body).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joins_without_double_slash() {
        let gateway = HttpGateway::new(Url::parse("http://localhost:50001/").unwrap(), None);
        assert_eq!(
            gateway.endpoint(operations::LIST_WATCHERS),
            "http://localhost:50001/filewatcher_list"
        );

        let gateway = HttpGateway::new(Url::parse("http://localhost:50001/api").unwrap(), None);
        assert_eq!(
            gateway.endpoint(operations::DELETE_WATCHER),
            "http://localhost:50001/api/filewatcher_delete"
        );
    }

    #[test]
    fn test_from_config_rejects_bad_url() {
        let config = PanelConfig {
            server_url: "::nope::".to_string(),
            ..PanelConfig::default()
        };
        assert!(HttpGateway::from_config(&config).is_err());
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_transport_error() {
        // Port 9 (discard) on localhost is expected to refuse connections
        let gateway = HttpGateway::new(Url::parse("http://127.0.0.1:9").unwrap(), None);
        let err = gateway.list_watchers().await.unwrap_err();
        assert!(matches!(err, PanelError::Transport(_)));
    }
}
