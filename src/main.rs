//! voxrelay binary entry point.

use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use voxrelay::cli::{Cli, Commands, ServeArgs, SpeakArgs, WorkerArgs};
use voxrelay::config::VoxConfig;
use voxrelay::engine::{HttpSynthesisEngine, SynthesisEngine, SynthesisRequest, VoiceReference};
use voxrelay::runtime::VoxRuntime;
use voxrelay::server::{self, AppState};

type CliResult = Result<(), Box<dyn std::error::Error>>;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "voxrelay=info,tower_http=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let result = match load_config(&cli) {
        Ok(config) => match cli.command {
            Commands::Serve(args) => handle_serve(config, args).await,
            Commands::Worker(args) => handle_worker(config, args).await,
            Commands::Speak(args) => handle_speak(config, args).await,
        },
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        tracing::error!(error = %e, "voxrelay exited with an error");
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn load_config(cli: &Cli) -> Result<VoxConfig, Box<dyn std::error::Error>> {
    let mut config = VoxConfig::load(cli.global.config.as_deref())?;
    cli.global.apply(&mut config);
    Ok(config)
}

async fn handle_serve(mut config: VoxConfig, args: ServeArgs) -> CliResult {
    args.apply(&mut config);
    let addr = config.bind_addr();
    let runtime = VoxRuntime::start(config).await?;
    let inbox = args.inbox.then(|| runtime.spawn_inbox());

    let listener = TcpListener::bind(&addr).await?;
    let stop_http = CancellationToken::new();
    tokio::spawn({
        let stop_http = stop_http.clone();
        async move {
            shutdown_signal().await;
            stop_http.cancel();
        }
    });

    let served = server::serve(listener, AppState::from_runtime(&runtime), stop_http).await;

    runtime.shutdown().await;
    if let Some(inbox) = inbox {
        let _ = inbox.await;
    }
    served?;
    Ok(())
}

async fn handle_worker(mut config: VoxConfig, args: WorkerArgs) -> CliResult {
    args.apply(&mut config);
    let runtime = VoxRuntime::start(config).await?;
    let inbox = runtime.spawn_inbox();
    tracing::info!(
        dir = %runtime.config().inbox_dir().display(),
        "worker running; press Ctrl+C to stop"
    );

    shutdown_signal().await;
    runtime.shutdown().await;
    let _ = inbox.await;
    Ok(())
}

/// One direct engine call with the configured retries, no queue.
async fn handle_speak(config: VoxConfig, args: SpeakArgs) -> CliResult {
    config.validate()?;
    let voice = Arc::new(VoiceReference::load(&config.voice_reference)?);
    let engine = HttpSynthesisEngine::new(config.engine_url.clone())
        .with_api_key(config.engine_api_key.clone())
        .with_timeout(config.engine_timeout());

    let request = SynthesisRequest::builder()
        .text(args.text.trim())
        .language(config.language.clone())
        .voice(voice)
        .device(config.device)
        .sample_rate(config.sample_rate)
        .build();

    let outcome = config
        .retry_policy()
        .run(|_| engine.synthesize(&request))
        .await;
    let audio = outcome.result?;
    voxrelay::store::write_atomic(&args.out, &audio).await?;
    engine.shutdown().await;

    tracing::info!(
        path = %args.out.display(),
        bytes = audio.len(),
        attempts = outcome.attempts,
        "audio written"
    );
    println!("{}", args.out.display());
    Ok(())
}

/// Resolve on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
