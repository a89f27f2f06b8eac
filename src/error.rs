use thiserror::Error;

/// Failures surfaced by the tracker, the hiscores fetcher and the store.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Validation(String),

    /// `status` is `None` for transport failures and timeouts.
    #[error("Hiscores request failed: {message}")]
    Upstream { status: Option<u16>, message: String },

    #[error("Malformed hiscores payload: {reason}")]
    Parse { reason: String },

    #[error("Database error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Failed to encode skills: {0}")]
    Encode(#[from] serde_json::Error),
}

impl AppError {
    pub fn parse(reason: impl Into<String>) -> Self {
        AppError::Parse {
            reason: reason.into(),
        }
    }

    /// Stable tag returned to API clients alongside the message.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "not_found",
            AppError::Validation(_) => "validation",
            AppError::Upstream { .. } => "upstream",
            AppError::Parse { .. } => "parse",
            AppError::Storage(_) | AppError::Encode(_) => "storage",
        }
    }
}
