//! Lookup table from job id to its live status.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tokio::sync::watch;

use super::types::{JobId, JobSnapshot, JobState};
use crate::error::VoxError;

/// How many finished jobs stay queryable before the oldest are forgotten.
pub const DEFAULT_RETAINED_FINISHED: usize = 1024;

/// Shared job registry.
///
/// Each job owns a [`watch`] channel so waiters are woken on every state
/// change instead of polling.
#[derive(Clone)]
pub struct JobRegistry {
    inner: Arc<RwLock<RegistryInner>>,
    retain_finished: usize,
}

struct RegistryInner {
    jobs: HashMap<JobId, watch::Sender<JobSnapshot>>,
    finished: VecDeque<JobId>,
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_RETAINED_FINISHED)
    }
}

impl JobRegistry {
    pub fn new(retain_finished: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(RegistryInner {
                jobs: HashMap::new(),
                finished: VecDeque::new(),
            })),
            retain_finished,
        }
    }

    pub(crate) fn insert(&self, snapshot: JobSnapshot) -> JobTicket {
        let id = snapshot.id;
        let (tx, rx) = watch::channel(snapshot);
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        inner.jobs.insert(id, tx);
        JobTicket { id, rx }
    }

    pub(crate) fn remove(&self, id: JobId) {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        inner.jobs.remove(&id);
    }

    /// Apply `f` to the job's snapshot and notify waiters.
    ///
    /// Terminal transitions enter the retention window.
    pub(crate) fn update<F>(&self, id: JobId, f: F)
    where
        F: FnOnce(&mut JobSnapshot),
    {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        let Some(tx) = inner.jobs.get(&id) else {
            return;
        };
        let was_terminal = tx.borrow().state.is_terminal();
        tx.send_modify(f);
        let now_terminal = tx.borrow().state.is_terminal();

        if now_terminal && !was_terminal {
            inner.finished.push_back(id);
            while inner.finished.len() > self.retain_finished {
                if let Some(old) = inner.finished.pop_front() {
                    inner.jobs.remove(&old);
                }
            }
        }
    }

    pub fn get(&self, id: JobId) -> Option<JobSnapshot> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner.jobs.get(&id).map(|tx| tx.borrow().clone())
    }

    /// Re-attach to a job's updates.
    pub fn subscribe(&self, id: JobId) -> Option<JobTicket> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner.jobs.get(&id).map(|tx| JobTicket {
            id,
            rx: tx.subscribe(),
        })
    }

    /// Number of jobs not yet in a terminal state.
    pub fn pending(&self) -> usize {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner
            .jobs
            .values()
            .filter(|tx| !tx.borrow().state.is_terminal())
            .count()
    }

    pub fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .jobs
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Receipt for a submitted job; resolves when the job reaches a terminal state.
#[derive(Debug, Clone)]
pub struct JobTicket {
    id: JobId,
    rx: watch::Receiver<JobSnapshot>,
}

impl JobTicket {
    pub fn id(&self) -> JobId {
        self.id
    }

    /// Latest known snapshot.
    pub fn snapshot(&self) -> JobSnapshot {
        self.rx.borrow().clone()
    }

    /// Wait until the job succeeds, is dead-lettered or is cancelled.
    pub async fn wait(&mut self) -> Result<JobSnapshot, VoxError> {
        let outcome = self
            .rx
            .wait_for(|s| s.state.is_terminal())
            .await
            .map(|snapshot| snapshot.clone());
        match outcome {
            Ok(snapshot) => Ok(snapshot),
            // Sender dropped: the job was evicted or the registry is gone.
            Err(_) => {
                let last = self.rx.borrow().clone();
                if last.state.is_terminal() {
                    Ok(last)
                } else {
                    Err(VoxError::InvalidState(format!(
                        "job {} was dropped while {}",
                        self.id, last.state
                    )))
                }
            }
        }
    }

    /// [`wait`](Self::wait) bounded by `timeout`.
    pub async fn wait_timeout(&mut self, timeout: Duration) -> Result<JobSnapshot, VoxError> {
        match tokio::time::timeout(timeout, self.wait()).await {
            Ok(result) => result,
            Err(_) => Err(VoxError::Timeout(timeout.as_millis() as u64)),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.rx.borrow().state.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::VoiceReference;
    use crate::queue::types::{Job, JobOrigin};
    use chrono::Utc;
    use uuid::Uuid;

    fn snapshot() -> JobSnapshot {
        let job = Job {
            id: Uuid::new_v4(),
            text: "hello".to_string(),
            language: "en".to_string(),
            voice: Arc::new(VoiceReference::from_bytes("v.wav", vec![1, 2, 3])),
            origin: JobOrigin::Http,
            submitted_at: Utc::now(),
        };
        JobSnapshot::queued(&job)
    }

    #[tokio::test]
    async fn ticket_resolves_on_terminal_update() {
        let registry = JobRegistry::default();
        let mut ticket = registry.insert(snapshot());
        let id = ticket.id();

        let updater = registry.clone();
        tokio::spawn(async move {
            updater.update(id, |s| s.state = JobState::Running);
            updater.update(id, |s| {
                s.state = JobState::Succeeded;
                s.attempts = 1;
            });
        });

        let done = ticket.wait_timeout(Duration::from_secs(5)).await.unwrap();
        assert_eq!(done.state, JobState::Succeeded);
        assert_eq!(done.attempts, 1);
        assert_eq!(registry.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn wait_timeout_reports_timeout_for_stuck_job() {
        let registry = JobRegistry::default();
        let mut ticket = registry.insert(snapshot());

        let err = ticket
            .wait_timeout(Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, VoxError::Timeout(50)));
    }

    #[test]
    fn finished_jobs_are_evicted_beyond_retention() {
        let registry = JobRegistry::new(2);
        let ids: Vec<JobId> = (0..3).map(|_| registry.insert(snapshot()).id()).collect();

        for id in &ids {
            registry.update(*id, |s| s.state = JobState::Succeeded);
        }

        assert!(registry.get(ids[0]).is_none());
        assert!(registry.get(ids[1]).is_some());
        assert!(registry.get(ids[2]).is_some());
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn updates_to_unknown_jobs_are_ignored() {
        let registry = JobRegistry::default();
        registry.update(Uuid::new_v4(), |s| s.state = JobState::Running);
        assert!(registry.is_empty());
    }
}
