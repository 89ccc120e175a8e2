//! The external synthesis engine: request types, the engine seam and the HTTP
//! client that talks to a running XTTS server.

mod helpers;
pub mod http;
pub mod transport;
pub mod tts;
pub mod types;
pub mod voice;

pub use http::HttpSynthesisEngine;
pub use tts::SynthesisEngine;
pub use types::*;
pub use voice::VoiceReference;
