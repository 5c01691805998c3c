//! REST API implementation for the GDJ engine
//!
//! Control surface for a front end: prompt weights, generation config,
//! playback transport, volume, and the SSE event stream.

pub mod handlers;
pub mod sse;

use axum::{
    extract::State,
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::json;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::playback::Command;
use crate::prompts::PromptBank;
use crate::state::SharedState;
use gdj_common::params::GenerationConfig;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Command channel into the playback controller task
    pub commands: mpsc::UnboundedSender<Command>,
    /// Shared playback state
    pub state: Arc<SharedState>,
    /// Prompt bank (read here, mutated by the controller)
    pub bank: Arc<Mutex<PromptBank>>,
    /// Current generation parameters
    pub config: Arc<Mutex<GenerationConfig>>,
    /// Server port
    pub port: u16,
}

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check (no prefix for health endpoint)
        .route("/health", get(health_check))
        // API v1 routes
        .nest(
            "/api/v1",
            Router::new()
                // Prompt endpoints
                .route("/prompts", get(handlers::get_prompts))
                .route("/prompts/:prompt_id/weight", post(handlers::set_prompt_weight))
                .route("/prompts/:prompt_id/auto", post(handlers::set_prompt_auto))
                // Generation config endpoints
                .route("/config", get(handlers::get_config))
                .route("/config", post(handlers::set_config))
                // Playback control endpoints
                .route("/playback/toggle", post(handlers::toggle_play_pause))
                .route("/playback/stop", post(handlers::stop))
                .route("/playback/status", get(handlers::get_status))
                // Audio endpoints
                .route("/audio/volume", get(handlers::get_volume))
                .route("/audio/volume", post(handlers::set_volume))
                .route("/audio/devices", get(handlers::list_audio_devices))
                // MIDI endpoints
                .route("/midi/ports", get(handlers::list_midi_ports))
                // SSE events
                .route("/events", get(sse::event_stream)),
        )
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint
async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "module": "gdj-ap",
        "version": env!("CARGO_PKG_VERSION"),
        "port": state.port,
    }))
}
