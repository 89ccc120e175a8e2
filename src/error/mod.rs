//! Error types for voxrelay.

pub mod unified;

pub use unified::{ErrorCategory, ErrorCode, RecoverySuggestion};

use std::path::PathBuf;

use thiserror::Error;

/// Primary error type for all voxrelay operations.
#[derive(Error, Debug)]
pub enum VoxError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Voice reference not found at {}", .0.display())]
    VoiceReferenceMissing(PathBuf),

    #[error("Engine error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Engine failure: {0}")]
    Engine(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Rate limited: retry after {retry_after_ms:?}ms")]
    RateLimited { retry_after_ms: Option<u64> },

    #[error("Timeout after {0}ms")]
    Timeout(u64),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Task payload is empty")]
    EmptyTask,

    #[error("Job queue is full ({capacity} pending)")]
    QueueFull { capacity: usize },

    #[error("Job queue is closed")]
    QueueClosed,

    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl VoxError {
    /// Create an engine API error.
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Classify this error into a category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Authentication(_) => ErrorCategory::Authentication,
            Self::RateLimited { .. } => ErrorCategory::RateLimit,
            Self::Network(_) => ErrorCategory::Network,
            Self::Timeout(_) => ErrorCategory::Timeout,
            Self::Configuration(_) | Self::VoiceReferenceMissing(_) => {
                ErrorCategory::Configuration
            }
            Self::Serialization(_) => ErrorCategory::Serialization,
            Self::Engine(_) => ErrorCategory::Server,
            Self::Io(_) => ErrorCategory::Storage,
            Self::InvalidArgument(_) | Self::EmptyTask => ErrorCategory::InvalidInput,
            Self::QueueFull { .. } | Self::QueueClosed => ErrorCategory::Capacity,
            Self::Api { status, .. } => match status {
                401 | 403 => ErrorCategory::Authentication,
                429 => ErrorCategory::RateLimit,
                500..=599 => ErrorCategory::Server,
                _ => ErrorCategory::Api,
            },
            _ => ErrorCategory::Unknown,
        }
    }

    /// Whether a failed synthesis attempt with this error is worth repeating.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::RateLimit
                | ErrorCategory::Network
                | ErrorCategory::Timeout
                | ErrorCategory::Server
                | ErrorCategory::Storage
        )
    }

    /// Machine-readable code used in HTTP error bodies and dead-letter records.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::EmptyTask => ErrorCode::EmptyText,
            Self::InvalidArgument(_) => ErrorCode::InvalidRequest,
            Self::QueueFull { .. } => ErrorCode::QueueFull,
            Self::QueueClosed => ErrorCode::ServiceUnavailable,
            Self::JobNotFound(_) => ErrorCode::NotFound,
            Self::Timeout(_) => ErrorCode::Timeout,
            _ => match self.category() {
                ErrorCategory::Authentication
                | ErrorCategory::RateLimit
                | ErrorCategory::Network
                | ErrorCategory::Server
                | ErrorCategory::Api => ErrorCode::EngineFailure,
                _ => ErrorCode::Internal,
            },
        }
    }

    /// Suggest recovery actions.
    pub fn recovery_suggestion(&self) -> RecoverySuggestion {
        match self.category() {
            ErrorCategory::Authentication => RecoverySuggestion::CheckCredentials,
            ErrorCategory::RateLimit => RecoverySuggestion::RetryWithBackoff,
            ErrorCategory::Network => RecoverySuggestion::RetryWithBackoff,
            ErrorCategory::Timeout => RecoverySuggestion::IncreaseTimeout,
            ErrorCategory::Server => RecoverySuggestion::RetryWithBackoff,
            ErrorCategory::Storage => RecoverySuggestion::RetryWithBackoff,
            ErrorCategory::Configuration => RecoverySuggestion::CheckConfiguration,
            ErrorCategory::InvalidInput => RecoverySuggestion::FixInput,
            ErrorCategory::Capacity => RecoverySuggestion::RetryLater,
            _ => RecoverySuggestion::InspectDeadLetter,
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, VoxError>;
