use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ErrorCode;
use crate::queue::{Job, JobId, JobOrigin};

/// A job removed from retry rotation, kept for inspection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadLetterRecord {
    pub job_id: JobId,
    pub text: String,
    pub language: String,
    pub voice: String,
    pub origin: JobOrigin,
    pub attempts: u32,
    pub error: String,
    pub error_code: ErrorCode,
    pub submitted_at: DateTime<Utc>,
    pub failed_at: DateTime<Utc>,
}

impl DeadLetterRecord {
    pub fn new(job: &Job, attempts: u32, error: String, error_code: ErrorCode) -> Self {
        Self {
            job_id: job.id,
            text: job.text.clone(),
            language: job.language.clone(),
            voice: job.voice.fingerprint().to_string(),
            origin: job.origin.clone(),
            attempts,
            error,
            error_code,
            submitted_at: job.submitted_at,
            failed_at: Utc::now(),
        }
    }
}
