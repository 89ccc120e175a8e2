//! Convenience re-exports for common use.

pub use crate::config::VoxConfig;
pub use crate::engine::{Device, HttpSynthesisEngine, SynthesisEngine, SynthesisRequest, VoiceReference};
pub use crate::error::{Result, VoxError};
pub use crate::queue::{JobId, JobQueue, JobSnapshot, JobState, JobTicket, Submission};
pub use crate::runtime::VoxRuntime;
pub use crate::store::ResultStore;
