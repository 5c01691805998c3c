//! GDJ Engine (gdj-ap) - Main entry point
//!
//! Streaming playback engine for a remote generative-music service:
//! holds the live generation session, schedules the audio stream, animates
//! the prompt knobs, and serves the HTTP/SSE control surface.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gdj_ap::api;
use gdj_ap::midi::MidiListener;
use gdj_ap::playback::{AudioSink, Command, CpalSink, PlaybackController};
use gdj_ap::prompts::PromptBank;
use gdj_ap::session::{ConnectParams, HttpTransport};
use gdj_ap::state::SharedState;
use gdj_common::config::Config;
use gdj_common::params::GenerationConfig;

/// Command-line arguments for gdj-ap
#[derive(Parser, Debug)]
#[command(name = "gdj-ap")]
#[command(about = "Generative music playback engine")]
#[command(version)]
struct Args {
    /// Port to listen on (overrides the config file)
    #[arg(short, long, env = "GDJ_AP_PORT")]
    port: Option<u16>,

    /// Path to a TOML config file
    #[arg(short, long, env = "GDJ_CONFIG")]
    config: Option<PathBuf>,

    /// MIDI input port index to connect (see /api/v1/midi/ports)
    #[arg(short, long, env = "GDJ_MIDI_PORT")]
    midi_port: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gdj_ap=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let config = Config::load(args.config.as_deref()).context("Failed to load configuration")?;
    let port = args.port.unwrap_or(config.port);
    let api_key = config.api_key().context("Failed to resolve API key")?;

    info!("Starting GDJ engine on port {}", port);
    info!("Remote service: {}", config.remote.endpoint);

    // Audio output
    let sink = CpalSink::new(config.audio.device.clone(), config.audio.buffer_size)
        .context("Failed to initialize audio output")?;
    info!(
        "Audio output ready ({} Hz, {} channels)",
        sink.sample_rate(),
        sink.channels()
    );

    // Remote session transport
    let transport = Arc::new(
        HttpTransport::new(config.remote.endpoint.clone(), api_key)
            .context("Failed to build session transport")?,
    );
    let connect_params = ConnectParams {
        model: config.remote.model.clone(),
    };

    // Shared state, prompt bank, generation config
    let state = Arc::new(SharedState::new());
    let bank = Arc::new(Mutex::new(PromptBank::new()));
    let generation = Arc::new(Mutex::new(GenerationConfig::default()));

    // Playback controller task
    let (controller, commands) = PlaybackController::new(
        transport,
        connect_params,
        Arc::clone(&state),
        Arc::clone(&bank),
        Arc::clone(&generation),
        Box::new(sink),
    );
    let controller_handle = tokio::spawn(controller.run());

    // Knob animation driver (~60 fps)
    let anim_bank = Arc::clone(&bank);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_millis(16));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            anim_bank.lock().unwrap().tick();
        }
    });

    // Optional MIDI control surface
    let _midi = match args.midi_port {
        Some(index) => match connect_midi(index, commands.clone()) {
            Ok(listener) => {
                info!("MIDI input connected: {}", listener.port_name());
                Some(listener)
            }
            Err(e) => {
                warn!("MIDI input unavailable: {}", e);
                None
            }
        },
        None => None,
    };

    // Build the application router
    let app_state = api::AppState {
        commands: commands.clone(),
        state,
        bank,
        config: generation,
        port,
    };
    let app = api::create_router(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // Let the controller release the session cleanly
    let _ = commands.send(Command::Shutdown);
    let _ = controller_handle.await;

    info!("Server shutdown complete");
    Ok(())
}

/// Connect a MIDI input port and forward CC messages to the controller
fn connect_midi(
    index: usize,
    commands: mpsc::UnboundedSender<Command>,
) -> gdj_ap::Result<MidiListener> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let listener = MidiListener::connect(index, tx)?;
    tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if commands.send(Command::Cc(msg)).is_err() {
                break;
            }
        }
    });
    Ok(listener)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
