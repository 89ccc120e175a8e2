//! Shared test helpers and a scripted synthesis engine.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use voxrelay::config::VoxConfig;
use voxrelay::engine::{SynthesisEngine, SynthesisRequest, VoiceReference};
use voxrelay::error::VoxError;
use voxrelay::queue::{JobQueue, WorkerPool, WorkerSettings};
use voxrelay::store::ResultStore;
use voxrelay::util::retry::RetryPolicy;

/// Minimal RIFF/WAVE payload whose data chunk echoes `text`.
pub fn fake_wav(text: &str) -> Vec<u8> {
    let data = text.as_bytes();
    let mut out = Vec::with_capacity(data.len() + 12);
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&((data.len() as u32) + 4).to_le_bytes());
    out.extend_from_slice(b"WAVE");
    out.extend_from_slice(data);
    out
}

type ErrorFactory = Arc<dyn Fn() -> VoxError + Send + Sync>;

/// Engine that echoes the text into a WAV payload, optionally failing first.
pub struct ScriptedEngine {
    calls: AtomicUsize,
    fail_first: usize,
    error: Option<ErrorFactory>,
    delay: Duration,
    texts: Mutex<Vec<String>>,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail_first: 0,
            error: None,
            delay: Duration::ZERO,
            texts: Mutex::new(Vec::new()),
        }
    }

    /// Fail the first `n` calls with `make()`, then succeed.
    pub fn failing_first(
        mut self,
        n: usize,
        make: impl Fn() -> VoxError + Send + Sync + 'static,
    ) -> Self {
        self.fail_first = n;
        self.error = Some(Arc::new(make));
        self
    }

    /// Fail every call with `make()`.
    pub fn always_failing(self, make: impl Fn() -> VoxError + Send + Sync + 'static) -> Self {
        self.failing_first(usize::MAX, make)
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn texts(&self) -> Vec<String> {
        self.texts.lock().unwrap().clone()
    }
}

#[async_trait]
impl SynthesisEngine for ScriptedEngine {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn synthesize(&self, request: &SynthesisRequest) -> Result<Vec<u8>, VoxError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        self.texts.lock().unwrap().push(request.text.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if call < self.fail_first {
            if let Some(make) = &self.error {
                return Err(make());
            }
        }
        Ok(fake_wav(&request.text))
    }
}

/// Write a small voice reference recording into `dir`.
pub fn write_voice(dir: &Path) -> PathBuf {
    let path = dir.join("sample.wav");
    std::fs::write(&path, fake_wav("reference voice")).unwrap();
    path
}

pub fn voice(dir: &Path) -> Arc<VoiceReference> {
    Arc::new(VoiceReference::load(write_voice(dir)).unwrap())
}

/// Config rooted in `dir` with a voice reference present and fast polling.
pub fn test_config(dir: &Path) -> VoxConfig {
    VoxConfig {
        voice_reference: write_voice(dir),
        output_dir: dir.join("outputs"),
        poll_interval_ms: 20,
        ..VoxConfig::default()
    }
}

/// Retry budget with near-zero backoff.
pub fn fast_retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        initial_backoff: Duration::from_millis(1),
        max_backoff: Duration::from_millis(2),
        multiplier: 2.0,
    }
}

pub fn fast_settings(max_attempts: u32, workers: usize) -> WorkerSettings {
    WorkerSettings {
        workers,
        retry_policy: fast_retry(max_attempts),
        attempt_timeout: Duration::from_secs(5),
        ..WorkerSettings::default()
    }
}

/// Queue, store and running worker pool over `engine`.
pub struct Harness {
    pub queue: JobQueue,
    pub store: ResultStore,
    pub workers: WorkerPool,
    pub cancel: CancellationToken,
}

impl Harness {
    pub async fn start(
        dir: &Path,
        engine: Arc<dyn SynthesisEngine>,
        capacity: usize,
        settings: WorkerSettings,
    ) -> Self {
        let store = ResultStore::new(dir.join("outputs"));
        store.ensure_dirs().await.unwrap();
        let (queue, receiver) = JobQueue::new(capacity, "hi", voice(dir));
        let cancel = CancellationToken::new();
        let workers = WorkerPool::spawn(
            receiver,
            engine,
            store.clone(),
            queue.registry().clone(),
            settings,
            cancel.clone(),
        );
        Self {
            queue,
            store,
            workers,
            cancel,
        }
    }

    pub async fn stop(self) {
        self.workers.shutdown().await;
    }
}
