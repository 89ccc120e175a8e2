//! Synthesis engine trait.

use async_trait::async_trait;

use super::types::SynthesisRequest;
use crate::error::VoxError;

/// The external voice-cloning TTS engine.
///
/// The engine is constructed once at startup, shared by every worker through
/// an `Arc`, warmed up before the service accepts work and shut down when the
/// process exits.
#[async_trait]
pub trait SynthesisEngine: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Generate WAV audio for `request.text` in the reference voice.
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<Vec<u8>, VoxError>;

    /// Check the engine is ready to serve requests.
    async fn warm_up(&self) -> Result<(), VoxError> {
        Ok(())
    }

    /// Release engine resources.
    async fn shutdown(&self) {}
}
