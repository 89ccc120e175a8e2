//! Error classification and recovery.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Machine-readable error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ErrorCode {
    EmptyText,
    InvalidRequest,
    QueueFull,
    ServiceUnavailable,
    NotFound,
    Timeout,
    EngineFailure,
    Internal,
}

/// Broad error category for routing recovery logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Authentication,
    RateLimit,
    Network,
    Timeout,
    Server,
    Api,
    Configuration,
    Serialization,
    Storage,
    InvalidInput,
    Capacity,
    Unknown,
}

/// Suggested recovery action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoverySuggestion {
    RetryWithBackoff,
    RetryLater,
    CheckCredentials,
    CheckConfiguration,
    IncreaseTimeout,
    FixInput,
    InspectDeadLetter,
}
