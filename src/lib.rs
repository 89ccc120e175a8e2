//! voxrelay: a queue-backed front door for a voice-cloning TTS engine.
//!
//! Text arrives over HTTP or as marker files in an inbox directory, becomes a
//! job on one bounded queue, and is synthesized by a small worker pool that
//! retries engine failures and dead-letters jobs that keep failing.
//!
//! # Quick Start
//!
//! ```no_run
//! use voxrelay::prelude::*;
//!
//! # async fn example() -> voxrelay::error::Result<()> {
//! let runtime = VoxRuntime::start(VoxConfig::load(None)?).await?;
//! let mut ticket = runtime.queue().submit(Submission::http("नमस्ते", None))?;
//! let snapshot = ticket.wait().await?;
//! println!("{} -> {:?}", snapshot.id, snapshot.artifact);
//! runtime.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod inbox;
pub mod prelude;
pub mod queue;
pub mod runtime;
pub mod store;
pub mod util;

#[cfg(feature = "server")]
pub mod server;

#[cfg(feature = "cli")]
pub mod cli;
