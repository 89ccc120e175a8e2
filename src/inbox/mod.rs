//! Filesystem task intake.
//!
//! A `*.txt` file in the inbox directory is a pending task; its content is the
//! text to speak. At intake the marker is claimed by renaming it to a hidden
//! `.<name>.<token>.claim` file, so a new task written under the same name is
//! never confused with the one in flight. The worker removes (or quarantines)
//! the claim once the job is done. Empty or unreadable markers are consumed
//! immediately and logged, so they are never rescanned.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::{Result, VoxError};
use crate::queue::{JobId, JobQueue, Submission};
use crate::store::remove_if_present;

const MARKER_EXTENSION: &str = "txt";
const CLAIM_SUFFIX: &str = ".claim";

/// Outcome of one scan of the inbox directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    /// Markers handed to the queue.
    pub submitted: Vec<JobId>,
    /// Empty or unreadable markers that were deleted.
    pub discarded: Vec<PathBuf>,
    /// Markers left in place because the queue is full.
    pub deferred: usize,
}

/// Watches a directory for task markers and feeds them to the queue.
pub struct InboxWatcher {
    dir: PathBuf,
    queue: JobQueue,
    interval: Duration,
    /// Claims owned by a queued or running job.
    in_flight: HashMap<PathBuf, JobId>,
    /// Claims that must not be submitted again: their job already finished,
    /// or they could not be deleted.
    settled: HashSet<PathBuf>,
}

enum Intake {
    Submitted(JobId),
    Discarded,
    Deferred,
    Skipped,
}

impl InboxWatcher {
    pub fn new(dir: impl Into<PathBuf>, queue: JobQueue, interval: Duration) -> Self {
        Self {
            dir: dir.into(),
            queue,
            interval,
            in_flight: HashMap::new(),
            settled: HashSet::new(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Markers currently owned by a queued or running job.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Scan every `interval` until `cancel` fires.
    ///
    /// Scan failures (for example an unreadable directory) are logged and the
    /// scan is repeated on the next tick.
    pub async fn run(mut self, cancel: CancellationToken) {
        tracing::info!(
            dir = %self.dir.display(),
            interval_ms = self.interval.as_millis() as u64,
            "inbox watcher started"
        );
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    match self.scan_once().await {
                        Ok(report) if report.deferred > 0 => {
                            tracing::debug!(deferred = report.deferred, "queue full; markers deferred");
                        }
                        Ok(_) => {}
                        Err(VoxError::QueueClosed) => {
                            tracing::warn!("job queue closed; inbox watcher stopping");
                            break;
                        }
                        Err(err) => {
                            tracing::warn!(dir = %self.dir.display(), error = %err, "inbox scan failed");
                        }
                    }
                }
            }
        }
        tracing::info!("inbox watcher stopped");
    }

    /// Pick up every new marker, and every claim left behind, once.
    ///
    /// A single bad marker never aborts the scan; only a failure to list the
    /// directory or a closed queue does.
    pub async fn scan_once(&mut self) -> Result<ScanReport> {
        self.forget_finished();
        tokio::fs::create_dir_all(&self.dir).await?;

        let (markers, claims) = self.list_entries().await?;
        self.settled.retain(|claim| claims.contains(claim));

        let mut report = ScanReport::default();
        for claim in claims {
            if self.in_flight.contains_key(&claim) || self.settled.contains(&claim) {
                continue;
            }
            let Some(marker) = claimed_marker(&claim) else {
                continue;
            };
            if report.deferred > 0 {
                report.deferred += 1;
                continue;
            }
            tracing::info!(claim = %claim.display(), "resuming unfinished task");
            let outcome = self.intake(&marker, claim).await?;
            record(&mut report, outcome, marker);
        }

        for marker in markers {
            // Once the queue is full the rest wait, unclaimed, for a later scan.
            if report.deferred > 0 {
                report.deferred += 1;
                continue;
            }
            let claim = match self.claim(&marker).await {
                Ok(claim) => claim,
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => continue,
                Err(err) => {
                    tracing::warn!(marker = %marker.display(), error = %err, "failed to claim task; will retry");
                    continue;
                }
            };
            let outcome = self.intake(&marker, claim).await?;
            record(&mut report, outcome, marker);
        }
        Ok(report)
    }

    /// Read a claimed task and hand it to the queue.
    async fn intake(&mut self, marker: &Path, claim: PathBuf) -> Result<Intake> {
        let text = match read_marker(&claim).await {
            Ok(Some(text)) => text,
            Ok(None) => {
                tracing::warn!(marker = %marker.display(), "empty task; discarding");
                return Ok(self.discard(claim).await);
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Intake::Skipped),
            Err(err) if err.kind() == std::io::ErrorKind::InvalidData => {
                tracing::warn!(marker = %marker.display(), "task is not valid UTF-8; discarding");
                return Ok(self.discard(claim).await);
            }
            Err(err) => {
                tracing::warn!(marker = %marker.display(), error = %err, "unreadable task; discarding");
                return Ok(self.discard(claim).await);
            }
        };

        match self.queue.submit(Submission::inbox(text, marker, claim.clone())) {
            Ok(ticket) => {
                tracing::info!(
                    marker = %marker.display(),
                    job_id = %ticket.id(),
                    "detected new text input"
                );
                self.in_flight.insert(claim, ticket.id());
                Ok(Intake::Submitted(ticket.id()))
            }
            Err(VoxError::QueueFull { .. }) => {
                self.release(marker, &claim).await;
                Ok(Intake::Deferred)
            }
            Err(VoxError::EmptyTask) | Err(VoxError::InvalidArgument(_)) => {
                tracing::warn!(marker = %marker.display(), "invalid task; discarding");
                Ok(self.discard(claim).await)
            }
            Err(err) => {
                self.release(marker, &claim).await;
                Err(err)
            }
        }
    }

    /// Move claims whose job has finished out of `in_flight`, so they are
    /// never submitted again even if the file survived.
    fn forget_finished(&mut self) {
        let registry = self.queue.registry();
        let settled = &mut self.settled;
        self.in_flight.retain(|claim, id| {
            let running = registry
                .get(*id)
                .is_some_and(|snapshot| !snapshot.state.is_terminal());
            if !running {
                settled.insert(claim.clone());
            }
            running
        });
    }

    /// Visible `*.txt` markers and hidden claims, each sorted by name.
    async fn list_entries(&self) -> Result<(Vec<PathBuf>, Vec<PathBuf>)> {
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        let mut markers = Vec::new();
        let mut claims = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let file_type = entry.file_type().await?;
            if !(file_type.is_file() || file_type.is_symlink()) {
                continue;
            }
            if is_marker(&path) {
                markers.push(path);
            } else if claimed_marker(&path).is_some() {
                claims.push(path);
            }
        }
        markers.sort();
        claims.sort();
        Ok((markers, claims))
    }

    async fn claim(&self, marker: &Path) -> std::io::Result<PathBuf> {
        let claim = claim_path(marker);
        tokio::fs::rename(marker, &claim).await?;
        Ok(claim)
    }

    /// Put a claim back under its original name; if a new task already took
    /// that name the claim stays and is retried as a leftover.
    async fn release(&self, marker: &Path, claim: &Path) {
        if tokio::fs::hard_link(claim, marker).await.is_ok() {
            if let Err(err) = remove_if_present(claim).await {
                tracing::warn!(claim = %claim.display(), error = %err, "failed to release claim");
            }
        }
    }

    async fn discard(&mut self, claim: PathBuf) -> Intake {
        match remove_if_present(&claim).await {
            Ok(()) => Intake::Discarded,
            Err(err) => {
                tracing::error!(claim = %claim.display(), error = %err, "failed to delete discarded task; skipping it");
                self.settled.insert(claim);
                Intake::Skipped
            }
        }
    }
}

fn record(report: &mut ScanReport, outcome: Intake, marker: PathBuf) {
    match outcome {
        Intake::Submitted(id) => report.submitted.push(id),
        Intake::Discarded => report.discarded.push(marker),
        Intake::Deferred => report.deferred += 1,
        Intake::Skipped => {}
    }
}

fn is_marker(path: &Path) -> bool {
    let visible = path
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| !n.starts_with('.'));
    visible && path.extension().and_then(|e| e.to_str()) == Some(MARKER_EXTENSION)
}

/// `inbox/input.txt` is claimed as `inbox/.input.txt.<token>.claim`.
fn claim_path(marker: &Path) -> PathBuf {
    let name = marker
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("task.txt");
    marker.with_file_name(format!(".{name}.{}{CLAIM_SUFFIX}", Uuid::new_v4().simple()))
}

/// The marker a claim was taken from, or `None` if `path` is not a claim.
fn claimed_marker(path: &Path) -> Option<PathBuf> {
    let name = path.file_name()?.to_str()?;
    let inner = name.strip_prefix('.')?.strip_suffix(CLAIM_SUFFIX)?;
    let (original, token) = inner.rsplit_once('.')?;
    if Uuid::try_parse(token).is_err() {
        return None;
    }
    let marker = path.with_file_name(original);
    is_marker(&marker).then_some(marker)
}

/// Read a marker; `Ok(None)` means it holds only whitespace.
async fn read_marker(path: &Path) -> std::io::Result<Option<String>> {
    let bytes = tokio::fs::read(path).await?;
    let text = String::from_utf8(bytes)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    let trimmed = text.trim();
    if trimmed.is_empty() {
        Ok(None)
    } else {
        Ok(Some(trimmed.to_string()))
    }
}
