use thiserror::Error;

/// Filewatch panel errors
#[derive(Debug, Error)]
pub enum PanelError {
    /// The request never reached the backend or its response never arrived
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The backend answered with an error indication
    #[error("{message}")]
    Server { status: u16, message: String },

    /// Configuration file errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Validation errors (missing fields, unknown ids)
    #[error("Validation error: {0}")]
    Validation(String),

    /// A save is already in flight for the open form
    #[error("A save is already in progress")]
    Busy,

    /// The panel was detached before the operation completed
    #[error("Panel is detached")]
    Detached,

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Mutex poison error
    #[error("Lock poisoned: {0}")]
    LockPoisoned(String),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl PanelError {
    /// Build a server error from a response, preferring the body's `error`
    /// field, then the raw body text, then a generic status message.
    pub fn from_response(status: u16, error_field: Option<&str>, raw_body: &str) -> Self {
        let message = error_field
            .map(str::trim)
            .filter(|msg| !msg.is_empty())
            .map(str::to_string)
            .or_else(|| {
                let raw = raw_body.trim();
                (!raw.is_empty()).then(|| raw.to_string())
            })
            .unwrap_or_else(|| format!("server error ({})", status));

        PanelError::Server { status, message }
    }

    /// Human-readable reason suitable for an operator notification.
    pub fn reason(&self) -> String {
        match self {
            PanelError::Server { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

impl<T> From<std::sync::PoisonError<T>> for PanelError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        PanelError::LockPoisoned(err.to_string())
    }
}
