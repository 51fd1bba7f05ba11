use thiserror::Error;

pub type SyncResult<T> = Result<T, SyncError>;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    #[error("Tracker API error: {status} - {message}")]
    TrackerApiError { status: u16, message: String },

    #[error("Source error: {0}")]
    SourceError(String),

    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Rate limited: retry after {retry_after_seconds}s")]
    RateLimited { retry_after_seconds: u64 },

    #[error("Parent {parent_key} of {key} has no remote mapping")]
    MissingParent { key: String, parent_key: String },

    #[error("Parent {parent_key} of {key} is a {actual} but a {expected} is required")]
    ParentLevelMismatch {
        key: String,
        parent_key: String,
        expected: String,
        actual: String
    },

    #[error("Status transition rejected for {issue}: {reason}")]
    TransitionRejected { issue: String, reason: String },

    #[error("State persistence failed: {0}")]
    PersistenceError(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Scheduler error: {0}")]
    SchedulerError(String)
}

impl SyncError {
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::HttpError(_) | Self::RateLimited { .. } => true,
            Self::TrackerApiError { status, .. } => *status >= 500,
            _ => false
        }
    }

    pub fn retry_after(&self) -> Option<u64> {
        if let Self::RateLimited {
            retry_after_seconds
        } = self
        {
            Some(*retry_after_seconds)
        } else {
            None
        }
    }

    /// Category name used in run reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::HttpError(_) => "transport",
            Self::ConfigError(_) => "config",
            Self::AuthenticationError(_) => "authentication",
            Self::TrackerApiError { .. } => "tracker_api",
            Self::SourceError(_) => "source",
            Self::NotFound(_) => "not_found",
            Self::RateLimited { .. } => "rate_limited",
            Self::MissingParent { .. } => "missing_parent",
            Self::ParentLevelMismatch { .. } => "parent_level_mismatch",
            Self::TransitionRejected { .. } => "transition_rejected",
            Self::PersistenceError(_) => "persistence",
            Self::SerializationError(_) => "serialization",
            Self::IoError(_) => "io",
            Self::SchedulerError(_) => "scheduler"
        }
    }
}
