//! Job, job state and job snapshot types.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

use crate::engine::VoiceReference;
use crate::error::ErrorCode;

/// Unique identifier of a job; also names its result artifact.
pub type JobId = Uuid;

/// Where a job came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobOrigin {
    Http,
    /// A task marker file in the inbox directory.
    ///
    /// `marker` is the name the task arrived under and decides where the
    /// result lands; `claim` is the renamed file the job owns until it is
    /// acknowledged or quarantined.
    Inbox { marker: PathBuf, claim: PathBuf },
}

/// Lifecycle of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobState {
    Queued,
    Running,
    Succeeded,
    DeadLettered,
    Cancelled,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::DeadLettered | Self::Cancelled)
    }
}

/// What a caller submits.
#[derive(Debug, Clone)]
pub struct Submission {
    pub text: String,
    /// Falls back to the queue's default language.
    pub language: Option<String>,
    pub origin: JobOrigin,
}

impl Submission {
    pub fn http(text: impl Into<String>, language: Option<String>) -> Self {
        Self {
            text: text.into(),
            language,
            origin: JobOrigin::Http,
        }
    }

    pub fn inbox(
        text: impl Into<String>,
        marker: impl Into<PathBuf>,
        claim: impl Into<PathBuf>,
    ) -> Self {
        Self {
            text: text.into(),
            language: None,
            origin: JobOrigin::Inbox {
                marker: marker.into(),
                claim: claim.into(),
            },
        }
    }
}

/// A unit of work on the queue.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: JobId,
    /// Trimmed, never empty.
    pub text: String,
    pub language: String,
    pub voice: Arc<VoiceReference>,
    pub origin: JobOrigin,
    pub submitted_at: DateTime<Utc>,
}

/// Point-in-time view of a job, as reported over the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub id: JobId,
    pub state: JobState,
    pub attempts: u32,
    pub language: String,
    pub voice: String,
    pub origin: JobOrigin,
    pub submitted_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    /// File name of the result artifact, once written.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<ErrorCode>,
}

impl JobSnapshot {
    pub fn queued(job: &Job) -> Self {
        Self {
            id: job.id,
            state: JobState::Queued,
            attempts: 0,
            language: job.language.clone(),
            voice: job.voice.fingerprint().to_string(),
            origin: job.origin.clone(),
            submitted_at: job.submitted_at,
            finished_at: None,
            artifact: None,
            error: None,
            error_code: None,
        }
    }
}
