//! CLI entry point for voxrelay.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::{normalize_language, VoxConfig};
use crate::engine::Device;

/// voxrelay: queue-backed front door for an XTTS speech engine
#[derive(Parser, Debug)]
#[command(name = "voxrelay", version, about = "Text-to-speech front door for an XTTS engine")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Flags that override the config file and environment.
#[derive(Args, Debug, Default)]
pub struct GlobalArgs {
    /// TOML config file (defaults to voxrelay.toml in the platform config dir)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Reference recording used to clone the voice
    #[arg(long, global = true)]
    pub voice_reference: Option<PathBuf>,

    /// Default language code (e.g. hi, en)
    #[arg(short, long, global = true)]
    pub language: Option<String>,

    /// Compute device requested from the engine (auto, cpu, cuda)
    #[arg(long, global = true)]
    pub device: Option<Device>,

    /// Directory for results and the dead-letter folder
    #[arg(short, long, global = true)]
    pub output_dir: Option<PathBuf>,

    /// Base URL of the XTTS engine server
    #[arg(long, global = true)]
    pub engine_url: Option<String>,
}

impl GlobalArgs {
    /// Apply explicit flags on top of a loaded configuration.
    pub fn apply(&self, config: &mut VoxConfig) {
        if let Some(path) = &self.voice_reference {
            config.voice_reference = path.clone();
        }
        if let Some(language) = &self.language {
            config.language = normalize_language(language);
        }
        if let Some(device) = self.device {
            config.device = device;
        }
        if let Some(dir) = &self.output_dir {
            config.output_dir = dir.clone();
        }
        if let Some(url) = &self.engine_url {
            config.engine_url = url.clone();
        }
    }
}

/// Top-level CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP server
    Serve(ServeArgs),
    /// Poll the inbox directory for task markers
    Worker(WorkerArgs),
    /// Synthesize one text straight to a file
    Speak(SpeakArgs),
}

/// Arguments for `voxrelay serve`.
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to bind
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Also poll the inbox directory in this process
    #[arg(long)]
    pub inbox: bool,
}

impl ServeArgs {
    pub fn apply(&self, config: &mut VoxConfig) {
        if let Some(host) = &self.host {
            config.host = host.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
    }
}

/// Arguments for `voxrelay worker`.
#[derive(Args, Debug)]
pub struct WorkerArgs {
    /// Directory to poll (defaults to the output directory)
    #[arg(long)]
    pub inbox_dir: Option<PathBuf>,

    /// Poll interval in milliseconds
    #[arg(long)]
    pub poll_interval_ms: Option<u64>,
}

impl WorkerArgs {
    pub fn apply(&self, config: &mut VoxConfig) {
        if let Some(dir) = &self.inbox_dir {
            config.inbox_dir = Some(dir.clone());
        }
        if let Some(ms) = self.poll_interval_ms {
            config.poll_interval_ms = ms;
        }
    }
}

/// Arguments for `voxrelay speak`.
#[derive(Args, Debug)]
pub struct SpeakArgs {
    /// Text to speak
    pub text: String,

    /// Where to write the audio
    #[arg(long, default_value = "speech_output.wav")]
    pub out: PathBuf,
}
