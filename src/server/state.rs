use std::time::Duration;

use crate::queue::JobQueue;
use crate::runtime::VoxRuntime;
use crate::store::ResultStore;

/// Shared handler state. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub queue: JobQueue,
    pub store: ResultStore,
    /// How long the synchronous endpoints wait for a job to finish.
    pub request_timeout: Duration,
    pub workers: usize,
}

impl AppState {
    pub fn new(queue: JobQueue, store: ResultStore, request_timeout: Duration) -> Self {
        Self {
            queue,
            store,
            request_timeout,
            workers: 0,
        }
    }

    pub fn from_runtime(runtime: &VoxRuntime) -> Self {
        Self {
            queue: runtime.queue().clone(),
            store: runtime.store().clone(),
            request_timeout: runtime.config().request_timeout(),
            workers: runtime.worker_count(),
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }
}
