//! Bounded job queue with single-flight workers, bounded retry and a
//! dead-letter path.
//!
//! Every front door (HTTP form, JSON API, inbox markers) deposits work here.
//! Submissions never block: a full queue is reported to the caller as
//! [`VoxError::QueueFull`] so the caller can apply backpressure.

pub mod registry;
pub mod types;
pub mod worker;

pub use registry::{JobRegistry, JobTicket};
pub use types::{Job, JobId, JobOrigin, JobSnapshot, JobState, Submission};
pub use worker::{WorkerPool, WorkerSettings};

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{mpsc, Mutex};
use uuid::Uuid;

use crate::config::{normalize_language, validate_language};
use crate::engine::VoiceReference;
use crate::error::{Result, VoxError};

/// Receiving half shared by the workers.
pub type JobReceiver = Arc<Mutex<mpsc::Receiver<Job>>>;

/// Sending half of the job queue. Cheap to clone.
#[derive(Clone)]
pub struct JobQueue {
    tx: mpsc::Sender<Job>,
    registry: JobRegistry,
    capacity: usize,
    default_language: String,
    voice: Arc<VoiceReference>,
}

impl std::fmt::Debug for JobQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobQueue")
            .field("capacity", &self.capacity)
            .field("default_language", &self.default_language)
            .field("voice", &self.voice.fingerprint())
            .field("jobs", &self.registry.len())
            .finish()
    }
}

impl JobQueue {
    /// Create a queue holding at most `capacity` pending jobs.
    pub fn new(
        capacity: usize,
        default_language: impl Into<String>,
        voice: Arc<VoiceReference>,
    ) -> (Self, JobReceiver) {
        Self::with_registry(capacity, default_language, voice, JobRegistry::default())
    }

    pub fn with_registry(
        capacity: usize,
        default_language: impl Into<String>,
        voice: Arc<VoiceReference>,
        registry: JobRegistry,
    ) -> (Self, JobReceiver) {
        let capacity = capacity.max(1);
        let (tx, rx) = mpsc::channel(capacity);
        let queue = Self {
            tx,
            registry,
            capacity,
            default_language: default_language.into(),
            voice,
        };
        (queue, Arc::new(Mutex::new(rx)))
    }

    /// Validate and enqueue a submission.
    ///
    /// # Errors
    ///
    /// - [`VoxError::EmptyTask`] for empty or whitespace-only text
    /// - [`VoxError::InvalidArgument`] for a malformed language code
    /// - [`VoxError::QueueFull`] when `capacity` jobs are already pending
    /// - [`VoxError::QueueClosed`] once the workers are gone
    pub fn submit(&self, submission: Submission) -> Result<JobTicket> {
        let text = submission.text.trim();
        if text.is_empty() {
            return Err(VoxError::EmptyTask);
        }
        let language = match submission.language.as_deref().map(str::trim) {
            Some(lang) if !lang.is_empty() => normalize_language(lang),
            _ => self.default_language.clone(),
        };
        validate_language(&language)?;

        let job = Job {
            id: Uuid::new_v4(),
            text: text.to_string(),
            language,
            voice: self.voice.clone(),
            origin: submission.origin,
            submitted_at: Utc::now(),
        };
        let id = job.id;
        let ticket = self.registry.insert(JobSnapshot::queued(&job));

        match self.tx.try_send(job) {
            Ok(()) => {
                tracing::debug!(job_id = %id, "job queued");
                Ok(ticket)
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.registry.remove(id);
                Err(VoxError::QueueFull {
                    capacity: self.capacity,
                })
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.registry.remove(id);
                Err(VoxError::QueueClosed)
            }
        }
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    pub fn get(&self, id: JobId) -> Option<JobSnapshot> {
        self.registry.get(id)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Jobs accepted but not yet finished (queued or running).
    pub fn pending(&self) -> usize {
        self.registry.pending()
    }

    pub fn default_language(&self) -> &str {
        &self.default_language
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
