//! Worker pool: one job in flight per worker slot.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::registry::JobRegistry;
use super::types::{Job, JobOrigin, JobState};
use super::JobReceiver;
use crate::engine::{Device, SynthesisEngine, SynthesisRequest};
use crate::error::VoxError;
use crate::store::{remove_if_present, Artifact, DeadLetterRecord, ResultStore};
use crate::util::retry::RetryPolicy;
use crate::util::timeout::with_timeout;

/// Per-attempt engine settings and the retry budget.
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub workers: usize,
    pub retry_policy: RetryPolicy,
    pub attempt_timeout: Duration,
    pub device: Device,
    pub sample_rate: u32,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            workers: 1,
            retry_policy: RetryPolicy::default(),
            attempt_timeout: Duration::from_secs(120),
            device: Device::Auto,
            sample_rate: 48_000,
        }
    }
}

struct WorkerContext {
    engine: Arc<dyn SynthesisEngine>,
    store: ResultStore,
    registry: JobRegistry,
    settings: WorkerSettings,
}

/// Handles to the spawned workers.
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
    cancel: CancellationToken,
}

impl WorkerPool {
    /// Spawn `settings.workers` consumers on `receiver`.
    ///
    /// Workers block on the queue (no polling) and exit when `cancel` fires or
    /// every sender is dropped.
    pub fn spawn(
        receiver: JobReceiver,
        engine: Arc<dyn SynthesisEngine>,
        store: ResultStore,
        registry: JobRegistry,
        settings: WorkerSettings,
        cancel: CancellationToken,
    ) -> Self {
        let count = settings.workers.max(1);
        let ctx = Arc::new(WorkerContext {
            engine,
            store,
            registry,
            settings,
        });

        let handles = (0..count)
            .map(|index| {
                let ctx = ctx.clone();
                let receiver = receiver.clone();
                let cancel = cancel.clone();
                tokio::spawn(async move { run_worker(index, ctx, receiver, cancel).await })
            })
            .collect();

        Self { handles, cancel }
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Cancel the workers and wait for them to exit.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        self.join().await;
    }

    /// Wait for the workers to exit on their own.
    pub async fn join(self) {
        for result in futures::future::join_all(self.handles).await {
            if let Err(err) = result {
                tracing::error!(error = %err, "worker task panicked");
            }
        }
    }
}

async fn run_worker(
    index: usize,
    ctx: Arc<WorkerContext>,
    receiver: JobReceiver,
    cancel: CancellationToken,
) {
    tracing::debug!(worker = index, "worker started");
    loop {
        let job = tokio::select! {
            _ = cancel.cancelled() => break,
            job = async { receiver.lock().await.recv().await } => job,
        };
        let Some(job) = job else {
            break;
        };
        let id = job.id;

        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::warn!(worker = index, job_id = %id, "shutdown interrupted job");
                ctx.registry.update(id, |s| {
                    s.state = JobState::Cancelled;
                    s.finished_at = Some(Utc::now());
                });
                break;
            }
            _ = process_job(index, &ctx, job) => {}
        }
    }
    tracing::debug!(worker = index, "worker stopped");
}

async fn process_job(worker: usize, ctx: &WorkerContext, job: Job) {
    let id = job.id;
    tracing::info!(
        worker,
        job_id = %id,
        language = %job.language,
        chars = job.text.chars().count(),
        "synthesizing"
    );
    ctx.registry.update(id, |s| s.state = JobState::Running);

    let request = SynthesisRequest::builder()
        .text(job.text.clone())
        .language(job.language.clone())
        .voice(job.voice.clone())
        .device(ctx.settings.device)
        .sample_rate(ctx.settings.sample_rate)
        .build();

    let outcome = ctx
        .settings
        .retry_policy
        .run(|attempt| {
            ctx.registry.update(id, |s| s.attempts = attempt);
            let request = &request;
            let job = &job;
            async move {
                let audio = with_timeout(
                    ctx.settings.attempt_timeout,
                    ctx.engine.synthesize(request),
                )
                .await?;
                publish(ctx, job, &audio).await
            }
        })
        .await;
    let attempts = outcome.attempts;

    match outcome.result {
        Ok(artifact) => {
            if let JobOrigin::Inbox { claim, .. } = &job.origin {
                // Acknowledge only after the result is durable.
                if let Err(err) = remove_if_present(claim).await {
                    tracing::error!(
                        job_id = %id,
                        claim = %claim.display(),
                        error = %err,
                        "failed to remove completed task"
                    );
                }
            }
            tracing::info!(
                job_id = %id,
                attempts,
                artifact = %artifact.path.display(),
                bytes = artifact.len,
                "speech generated"
            );
            ctx.registry.update(id, |s| {
                s.state = JobState::Succeeded;
                s.attempts = attempts;
                s.artifact = Some(artifact.file_name.clone());
                s.finished_at = Some(Utc::now());
            });
        }
        Err(err) => dead_letter(ctx, &job, attempts, err).await,
    }
}

async fn publish(ctx: &WorkerContext, job: &Job, audio: &[u8]) -> Result<Artifact, VoxError> {
    let artifact = ctx.store.publish(job.id, audio).await?;
    if let JobOrigin::Inbox { marker, .. } = &job.origin {
        ctx.store.publish_for_marker(marker, audio).await?;
    }
    Ok(artifact)
}

async fn dead_letter(ctx: &WorkerContext, job: &Job, attempts: u32, err: VoxError) {
    let id = job.id;
    let code = err.code();
    let message = err.to_string();
    tracing::error!(
        job_id = %id,
        attempts,
        retryable = err.is_retryable(),
        error = %message,
        "job failed permanently; dead-lettering"
    );

    let record = DeadLetterRecord::new(job, attempts, message.clone(), code);
    if let Err(store_err) = ctx.store.dead_letter(&record).await {
        tracing::error!(job_id = %id, error = %store_err, "failed to write dead-letter record");
    }
    if let JobOrigin::Inbox { claim, .. } = &job.origin {
        match ctx.store.quarantine_marker(id, claim).await {
            Ok(path) => tracing::warn!(
                job_id = %id,
                moved_to = %path.display(),
                "task marker moved to dead-letter"
            ),
            Err(move_err) => {
                tracing::error!(job_id = %id, error = %move_err, "failed to quarantine marker");
                if let Err(remove_err) = remove_if_present(claim).await {
                    tracing::error!(
                        job_id = %id,
                        claim = %claim.display(),
                        error = %remove_err,
                        "failed to remove poison task; the inbox watcher will skip it"
                    );
                }
            }
        }
    }

    ctx.registry.update(id, |s| {
        s.state = JobState::DeadLettered;
        s.attempts = attempts;
        s.error = Some(message);
        s.error_code = Some(code);
        s.finished_at = Some(Utc::now());
    });
}
