//! Process lifecycle: build the engine, queue, workers and optional inbox
//! watcher from a [`VoxConfig`], and tear them down in order.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::VoxConfig;
use crate::engine::{HttpSynthesisEngine, SynthesisEngine, VoiceReference};
use crate::error::Result;
use crate::inbox::InboxWatcher;
use crate::queue::{JobQueue, WorkerPool, WorkerSettings};
use crate::store::ResultStore;

/// A running voxrelay service.
///
/// # Example
///
/// ```no_run
/// # async fn example() -> voxrelay::error::Result<()> {
/// let config = voxrelay::config::VoxConfig::load(None)?;
/// let runtime = voxrelay::runtime::VoxRuntime::start(config).await?;
/// let inbox = runtime.spawn_inbox();
/// // ... serve until a shutdown signal ...
/// runtime.shutdown().await;
/// let _ = inbox.await;
/// # Ok(())
/// # }
/// ```
pub struct VoxRuntime {
    config: VoxConfig,
    engine: Arc<dyn SynthesisEngine>,
    queue: JobQueue,
    store: ResultStore,
    workers: WorkerPool,
    cancel: CancellationToken,
}

impl VoxRuntime {
    /// Start against the HTTP engine named in `config.engine_url`.
    ///
    /// `engine_timeout` bounds each attempt in the workers, so the client
    /// itself carries no deadline.
    pub async fn start(config: VoxConfig) -> Result<Self> {
        let engine = HttpSynthesisEngine::new(config.engine_url.clone())
            .with_api_key(config.engine_api_key.clone());
        Self::start_with_engine(config, Arc::new(engine)).await
    }

    /// Start with an already constructed engine.
    ///
    /// Fails before spawning anything when the configuration is invalid or the
    /// voice reference cannot be loaded.
    pub async fn start_with_engine(
        config: VoxConfig,
        engine: Arc<dyn SynthesisEngine>,
    ) -> Result<Self> {
        config.validate()?;
        let voice = Arc::new(VoiceReference::load(&config.voice_reference)?);
        tracing::info!(
            path = %voice.path().display(),
            fingerprint = voice.fingerprint(),
            "voice reference loaded"
        );

        let store = ResultStore::new(config.output_dir.clone());
        store.ensure_dirs().await?;

        match engine.warm_up().await {
            Ok(()) => tracing::info!(engine = engine.name(), device = %config.device, "engine ready"),
            Err(err) => tracing::warn!(
                engine = engine.name(),
                error = %err,
                "engine health check failed; jobs will retry until it is reachable"
            ),
        }

        let (queue, receiver) =
            JobQueue::new(config.queue_capacity, config.language.clone(), voice);
        let cancel = CancellationToken::new();
        let settings = WorkerSettings {
            workers: config.workers,
            retry_policy: config.retry_policy(),
            attempt_timeout: config.engine_timeout(),
            device: config.device,
            sample_rate: config.sample_rate,
        };
        let workers = WorkerPool::spawn(
            receiver,
            engine.clone(),
            store.clone(),
            queue.registry().clone(),
            settings,
            cancel.child_token(),
        );
        tracing::info!(
            workers = workers.len(),
            queue_capacity = queue.capacity(),
            max_attempts = config.max_attempts,
            "job queue started"
        );

        Ok(Self {
            config,
            engine,
            queue,
            store,
            workers,
            cancel,
        })
    }

    /// Spawn the inbox watcher on `config.inbox_dir()`.
    pub fn spawn_inbox(&self) -> JoinHandle<()> {
        let watcher = InboxWatcher::new(
            self.config.inbox_dir().to_path_buf(),
            self.queue.clone(),
            self.config.poll_interval(),
        );
        tokio::spawn(watcher.run(self.cancel.child_token()))
    }

    pub fn config(&self) -> &VoxConfig {
        &self.config
    }

    pub fn queue(&self) -> &JobQueue {
        &self.queue
    }

    pub fn store(&self) -> &ResultStore {
        &self.store
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stop intake and workers, then release the engine.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        self.workers.join().await;
        self.engine.shutdown().await;
        tracing::info!("runtime stopped");
    }
}
