//! Result publisher: per-job audio artifacts and dead-letter records.
//!
//! Artifacts are written to a temporary file and renamed into place, so a
//! reader either sees the complete file or no file at all.

mod dead_letter;

pub use dead_letter::DeadLetterRecord;

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use uuid::Uuid;

use crate::engine::{AUDIO_EXTENSION, AUDIO_MIME};
use crate::error::{Result, VoxError};
use crate::queue::JobId;

const DEAD_LETTER_DIR: &str = "dead-letter";
/// Marker name of the single-file task protocol.
pub const LEGACY_MARKER: &str = "input.txt";
/// Result name of the single-file task protocol.
pub const LEGACY_RESULT: &str = "output.wav";

static DOWNLOAD_NAME: OnceLock<Regex> = OnceLock::new();

fn download_name_pattern() -> &'static Regex {
    DOWNLOAD_NAME.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9_-]{1,128}\.wav$").expect("download pattern is valid")
    })
}

/// A published audio file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub file_name: String,
    pub path: PathBuf,
    pub media_type: &'static str,
    pub len: u64,
}

/// Filesystem layout for results under one output directory.
#[derive(Debug, Clone)]
pub struct ResultStore {
    output_dir: PathBuf,
}

impl ResultStore {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn dead_letter_dir(&self) -> PathBuf {
        self.output_dir.join(DEAD_LETTER_DIR)
    }

    /// Create the output and dead-letter directories.
    pub async fn ensure_dirs(&self) -> Result<()> {
        tokio::fs::create_dir_all(self.dead_letter_dir()).await?;
        Ok(())
    }

    pub fn artifact_name(id: JobId) -> String {
        format!("{}.{AUDIO_EXTENSION}", id.simple())
    }

    pub fn artifact_path(&self, id: JobId) -> PathBuf {
        self.output_dir.join(Self::artifact_name(id))
    }

    /// Write the job's audio under its own id.
    pub async fn publish(&self, id: JobId, audio: &[u8]) -> Result<Artifact> {
        if audio.is_empty() {
            return Err(VoxError::Engine(
                "refusing to publish an empty audio payload".to_string(),
            ));
        }
        let path = self.artifact_path(id);
        write_atomic(&path, audio).await?;
        Ok(Artifact {
            file_name: Self::artifact_name(id),
            path,
            media_type: AUDIO_MIME,
            len: audio.len() as u64,
        })
    }

    /// Write the result that sits next to an inbox marker.
    pub async fn publish_for_marker(&self, marker: &Path, audio: &[u8]) -> Result<PathBuf> {
        let path = marker_result_path(marker);
        write_atomic(&path, audio).await?;
        Ok(path)
    }

    /// Map a requested download name to a file inside the output directory.
    ///
    /// Only flat `*.wav` names are accepted, so no request can escape the
    /// output directory.
    pub fn resolve_download(&self, file_name: &str) -> Result<PathBuf> {
        if !download_name_pattern().is_match(file_name) {
            return Err(VoxError::InvalidArgument(format!(
                "invalid download name '{file_name}'"
            )));
        }
        Ok(self.output_dir.join(file_name))
    }

    /// Persist a dead-letter record as `dead-letter/<job_id>.json`.
    pub async fn dead_letter(&self, record: &DeadLetterRecord) -> Result<PathBuf> {
        let path = self
            .dead_letter_dir()
            .join(format!("{}.json", record.job_id.simple()));
        let body = serde_json::to_vec_pretty(record)?;
        write_atomic(&path, &body).await?;
        Ok(path)
    }

    /// Move a poisoned marker out of the inbox into the dead-letter directory.
    pub async fn quarantine_marker(&self, id: JobId, marker: &Path) -> Result<PathBuf> {
        let target = self.dead_letter_dir().join(format!("{}.txt", id.simple()));
        tokio::fs::create_dir_all(self.dead_letter_dir()).await?;
        match tokio::fs::rename(marker, &target).await {
            Ok(()) => Ok(target),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(target),
            Err(_) => {
                // Cross-device inboxes cannot be renamed into place.
                tokio::fs::copy(marker, &target).await?;
                remove_if_present(marker).await?;
                Ok(target)
            }
        }
    }

    pub async fn read_dead_letter(&self, id: JobId) -> Result<DeadLetterRecord> {
        let path = self.dead_letter_dir().join(format!("{}.json", id.simple()));
        let raw = tokio::fs::read(&path).await?;
        Ok(serde_json::from_slice(&raw)?)
    }
}

/// `input.txt` publishes `output.wav`; any other `name.txt` publishes `name.wav`.
pub fn marker_result_path(marker: &Path) -> PathBuf {
    let is_legacy = marker
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n == LEGACY_MARKER);
    if is_legacy {
        marker.with_file_name(LEGACY_RESULT)
    } else {
        marker.with_extension(AUDIO_EXTENSION)
    }
}

/// Delete a file, treating "already gone" as success.
pub async fn remove_if_present(path: &Path) -> Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(VoxError::Io(err)),
    }
}

/// Write through a sibling temp file and rename, so readers never see a partial file.
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("artifact");
    let temp_path = path.with_file_name(format!(".{file_name}.{}.tmp", Uuid::new_v4().simple()));

    tokio::fs::write(&temp_path, bytes).await?;
    if let Err(err) = tokio::fs::rename(&temp_path, path).await {
        let _ = tokio::fs::remove_file(&temp_path).await;
        return Err(VoxError::Io(err));
    }
    Ok(())
}
