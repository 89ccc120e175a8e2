//! Types shared by every synthesis engine.

use std::sync::Arc;

use bon::Builder;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::voice::VoiceReference;

/// Media type of every artifact the engine produces.
pub const AUDIO_MIME: &str = "audio/wav";

/// File extension matching [`AUDIO_MIME`].
pub const AUDIO_EXTENSION: &str = "wav";

/// Compute device requested from the engine.
///
/// `Auto` lets the engine prefer an accelerator when one is available.
#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Device {
    #[default]
    Auto,
    Cpu,
    Cuda,
}

/// One call to the engine: `synthesize(text, voice_reference, language)`.
#[derive(Debug, Clone, Builder)]
pub struct SynthesisRequest {
    #[builder(into)]
    pub text: String,
    #[builder(into)]
    pub language: String,
    pub voice: Arc<VoiceReference>,
    #[builder(default)]
    pub device: Device,
    #[builder(default = 48_000)]
    pub sample_rate: u32,
}
