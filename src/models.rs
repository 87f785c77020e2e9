//! Typed records exchanged with the watcher backend.
//!
//! Defines Watcher, Investigation, their status enums, and the request
//! payloads for the mutating operations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Run state requested for a watcher.
///
/// State names this panel does not know are kept verbatim in `Other` so they
/// can still be shown to the operator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum WatcherState {
    #[default]
    Active,
    Paused,
    Stopped,
    Other(String),
}

impl WatcherState {
    /// Parse a wire state name. Only exact lowercase names are recognised.
    pub fn parse(raw: &str) -> WatcherState {
        match raw {
            "active" => WatcherState::Active,
            "paused" => WatcherState::Paused,
            "stopped" => WatcherState::Stopped,
            _ => WatcherState::Other(raw.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            WatcherState::Active => "active",
            WatcherState::Paused => "paused",
            WatcherState::Stopped => "stopped",
            WatcherState::Other(raw) => raw,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, WatcherState::Other(_))
    }

    /// Target state for a start/stop toggle. Only `active` maps to
    /// `stopped`; everything else maps to `active`.
    pub fn toggled(&self) -> WatcherState {
        match self {
            WatcherState::Active => WatcherState::Stopped,
            _ => WatcherState::Active,
        }
    }
}

impl fmt::Display for WatcherState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for WatcherState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for WatcherState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(WatcherState::parse(&raw))
    }
}

/// Triage status of an investigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvestigationStatus {
    #[default]
    Pending,
    Investigating,
    Completed,
    Ignored,
    #[serde(other)]
    Unknown,
}

impl InvestigationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvestigationStatus::Pending => "pending",
            InvestigationStatus::Investigating => "investigating",
            InvestigationStatus::Completed => "completed",
            InvestigationStatus::Ignored => "ignored",
            InvestigationStatus::Unknown => "unknown",
        }
    }
}

impl fmt::Display for InvestigationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Short investigation summary embedded in a watcher listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecentInvestigation {
    pub id: String,
    pub error_pattern: String,
    pub status: InvestigationStatus,
    pub occurrences: u64,
    #[serde(with = "timestamp")]
    pub last_seen: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Watcher {
    pub id: String,
    pub name: String,
    pub directory: String,
    /// Glob restricting which files are tailed; `None` matches everything
    #[serde(default)]
    pub file_pattern: Option<String>,
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub error_patterns: Vec<String>,
    #[serde(default)]
    pub state: WatcherState,
    /// Observed run state; may lag `state` while the backend transitions
    #[serde(default)]
    pub is_running: bool,
    #[serde(default)]
    pub investigation_count: u64,
    #[serde(default)]
    pub recent_investigations: Vec<RecentInvestigation>,
    #[serde(default, with = "timestamp::option")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, with = "timestamp::option")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Investigation {
    pub id: String,
    #[serde(default)]
    pub watcher_id: Option<String>,
    #[serde(default)]
    pub watcher_name: String,
    pub error_pattern: String,
    pub file_path: String,
    pub occurrences: u64,
    #[serde(default, with = "timestamp::option")]
    pub first_seen: Option<DateTime<Utc>>,
    #[serde(with = "timestamp")]
    pub last_seen: DateTime<Utc>,
    #[serde(default)]
    pub investigation_status: InvestigationStatus,
    #[serde(default)]
    pub investigation_result: Option<String>,
}

/// Payload for creating a watcher.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct WatcherDraft {
    pub name: String,
    pub directory: String,
    /// Empty string means "match all files"
    pub file_pattern: String,
    pub prompt: String,
    pub error_patterns: Vec<String>,
}

/// Partial update for a watcher; absent fields are left untouched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct WatcherUpdate {
    pub watcher_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_patterns: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<WatcherState>,
}

impl WatcherUpdate {
    pub fn from_draft(watcher_id: &str, draft: WatcherDraft) -> Self {
        Self {
            watcher_id: watcher_id.to_string(),
            name: Some(draft.name),
            directory: Some(draft.directory),
            file_pattern: Some(draft.file_pattern),
            prompt: Some(draft.prompt),
            error_patterns: Some(draft.error_patterns),
            state: None,
        }
    }

    pub fn state_only(watcher_id: &str, state: WatcherState) -> Self {
        Self {
            watcher_id: watcher_id.to_string(),
            state: Some(state),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WatcherIdRequest {
    pub watcher_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InvestigationStatusUpdate {
    pub investigation_id: String,
    pub status: InvestigationStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WatcherListResponse {
    #[serde(default)]
    pub watchers: Vec<Watcher>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct InvestigationListResponse {
    #[serde(default)]
    pub investigations: Vec<Investigation>,
}

/// Join error patterns into the newline-delimited block the form edits.
pub fn join_error_patterns(patterns: &[String]) -> String {
    patterns.join("\n")
}

/// Split an edited block back into patterns, dropping blank lines.
pub fn split_error_patterns(text: &str) -> Vec<String> {
    text.split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .filter(|line| !line.trim().is_empty())
        .map(str::to_string)
        .collect()
}

/// Timestamps arrive either as RFC 3339 or as naive local ISO-8601 strings.
pub mod timestamp {
    use chrono::{DateTime, Local, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn parse(raw: &str) -> Option<DateTime<Utc>> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc));
        }
        let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
            .ok()?;
        naive
            .and_local_timezone(Local)
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
            .or_else(|| Some(naive.and_utc()))
    }

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_rfc3339())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp '{}'", raw)))
    }

    pub mod option {
        use chrono::{DateTime, Utc};
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            value: &Option<DateTime<Utc>>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(dt) => serializer.serialize_str(&dt.to_rfc3339()),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<DateTime<Utc>>, D::Error> {
            let raw: Option<String> = Option::deserialize(deserializer)?;
            match raw {
                None => Ok(None),
                Some(raw) => super::parse(&raw).map(Some).ok_or_else(|| {
                    serde::de::Error::custom(format!("invalid timestamp '{}'", raw))
                }),
            }
        }
    }
}
