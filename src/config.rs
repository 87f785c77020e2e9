use crate::error::PanelError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:50001";
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;
pub const DEFAULT_INVESTIGATION_LIMIT: usize = 10;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PanelConfig {
    #[serde(rename = "serverUrl", default = "default_server_url")]
    pub server_url: String,
    #[serde(rename = "apiKey", default)]
    pub api_key: Option<String>,
    #[serde(rename = "pollIntervalSecs", default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    #[serde(rename = "investigationLimit", default = "default_investigation_limit")]
    pub investigation_limit: usize,
    #[serde(rename = "logLevel", default = "default_log_level")]
    pub log_level: String,
}

fn default_server_url() -> String {
    DEFAULT_SERVER_URL.to_string()
}

fn default_poll_interval() -> u64 {
    DEFAULT_POLL_INTERVAL_SECS
}

fn default_investigation_limit() -> usize {
    DEFAULT_INVESTIGATION_LIMIT
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            api_key: None,
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            investigation_limit: DEFAULT_INVESTIGATION_LIMIT,
            log_level: default_log_level(),
        }
    }
}

impl PanelConfig {
    /// Poll period; a zero interval is clamped to one second.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    /// Parsed backend base URL.
    pub fn server_url(&self) -> Result<Url, PanelError> {
        let url = Url::parse(&self.server_url).map_err(|e| {
            PanelError::Config(format!("Invalid server URL '{}': {}", self.server_url, e))
        })?;

        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(PanelError::Config(format!(
                "Unsupported server URL scheme '{}'",
                other
            ))),
        }
    }

    pub fn validate(&self) -> Result<(), PanelError> {
        self.server_url()?;
        if self.investigation_limit == 0 {
            return Err(PanelError::Config(
                "investigationLimit must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

pub fn get_config_dir() -> Result<PathBuf, PanelError> {
    dirs::home_dir()
        .map(|home_dir| home_dir.join(".filewatch-panel"))
        .ok_or_else(|| PanelError::Config("Could not find home directory".to_string()))
}

pub fn get_config_file_path() -> Result<PathBuf, PanelError> {
    Ok(get_config_dir()?.join("config.json"))
}

pub fn get_logs_dir() -> Result<PathBuf, PanelError> {
    Ok(get_config_dir()?.join("logs"))
}

/// Create a directory readable only by the owner.
pub fn ensure_private_dir(dir: &Path) -> Result<(), PanelError> {
    if !dir.exists() {
        fs::create_dir_all(dir)?;

        // Set permissions to 700 (read/write/execute for owner only) on Unix systems
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let metadata = fs::metadata(dir)?;
            let mut permissions = metadata.permissions();
            permissions.set_mode(0o700);
            fs::set_permissions(dir, permissions)?;
        }
    }
    Ok(())
}

pub fn ensure_config_dir() -> Result<(), PanelError> {
    ensure_private_dir(&get_config_dir()?)
}

pub fn ensure_logs_dir() -> Result<(), PanelError> {
    ensure_private_dir(&get_logs_dir()?)
}

pub fn load_config() -> Result<PanelConfig, PanelError> {
    ensure_config_dir()?;
    load_config_from(&get_config_file_path()?)
}

pub fn save_config(config: &PanelConfig) -> Result<(), PanelError> {
    ensure_config_dir()?;
    save_config_to(&get_config_file_path()?, config)
}

/// Load a config file, falling back to defaults when it does not exist.
pub fn load_config_from(path: &Path) -> Result<PanelConfig, PanelError> {
    if !path.exists() {
        return Ok(PanelConfig::default());
    }

    let content = fs::read_to_string(path)?;
    let config: PanelConfig = serde_json::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

pub fn save_config_to(path: &Path, config: &PanelConfig) -> Result<(), PanelError> {
    config.validate()?;
    if let Some(parent) = path.parent() {
        ensure_private_dir(parent)?;
    }

    let content = serde_json::to_string_pretty(config)?;
    fs::write(path, content)?;

    // Set permissions to 600 (read/write for owner only) on Unix systems
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let metadata = fs::metadata(path)?;
        let mut permissions = metadata.permissions();
        permissions.set_mode(0o600);
        fs::set_permissions(path, permissions)?;
    }

    Ok(())
}
