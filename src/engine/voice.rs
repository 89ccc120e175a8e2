//! Voice reference sample used to condition the engine's output voice.

use std::fmt;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::error::{Result, VoxError};

/// A loaded voice reference sample and its content fingerprint.
///
/// The fingerprint is the voice reference identifier carried by every job, so
/// two deployments using the same sample report the same identifier.
#[derive(Clone, PartialEq, Eq)]
pub struct VoiceReference {
    path: PathBuf,
    bytes: Vec<u8>,
    fingerprint: String,
}

impl fmt::Debug for VoiceReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VoiceReference")
            .field("path", &self.path)
            .field("len", &self.bytes.len())
            .field("fingerprint", &self.fingerprint)
            .finish()
    }
}

impl VoiceReference {
    /// Read the sample from disk.
    ///
    /// Fails with [`VoxError::VoiceReferenceMissing`] when the file does not
    /// exist, so callers can abort startup.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(VoxError::VoiceReferenceMissing(path.to_path_buf()))
            }
            Err(err) => return Err(VoxError::Io(err)),
        };
        if bytes.is_empty() {
            return Err(VoxError::InvalidArgument(format!(
                "voice reference {} is empty",
                path.display()
            )));
        }
        Ok(Self::from_bytes(path, bytes))
    }

    pub fn from_bytes(path: impl Into<PathBuf>, bytes: Vec<u8>) -> Self {
        let fingerprint = fingerprint(&bytes);
        Self {
            path: path.into(),
            bytes,
            fingerprint,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Short hex SHA-256 of the sample contents.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// File name sent to the engine alongside the sample.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("speaker.wav")
            .to_string()
    }
}

fn fingerprint(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    digest
        .iter()
        .take(8)
        .map(|byte| format!("{byte:02x}"))
        .collect()
}
