//! HTTP request handlers
//!
//! REST endpoints for the prompt bank, generation config, playback
//! transport, and audio output. Mutations go through the controller's
//! command channel; reads come straight from shared state.

use crate::api::AppState;
use crate::playback::Command;
use crate::prompts::PromptStatus;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use gdj_common::events::PlaybackState;
use gdj_common::params::{GenerationConfig, MAX_WEIGHT};
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use uuid::Uuid;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    status: String,
}

#[derive(Debug, Deserialize)]
pub struct WeightRequest {
    weight: f64,
}

#[derive(Debug, Deserialize)]
pub struct AutoRequest {
    auto: bool,
}

#[derive(Debug, Serialize)]
pub struct PromptListResponse {
    prompts: Vec<PromptStatus>,
}

#[derive(Debug, Deserialize)]
pub struct VolumeRequest {
    /// 0.0 - 1.0
    volume: f64,
}

#[derive(Debug, Serialize)]
pub struct VolumeResponse {
    volume: f64,
}

#[derive(Debug, Serialize)]
pub struct PlaybackStatusResponse {
    state: String,
    volume: f64,
    audio_level: f32,
    active_prompts: usize,
}

#[derive(Debug, Serialize)]
pub struct DeviceListResponse {
    devices: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct MidiPortListResponse {
    ports: Vec<String>,
}

type HandlerError = (StatusCode, Json<StatusResponse>);

fn internal_error(e: impl std::fmt::Display) -> HandlerError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(StatusResponse {
            status: format!("error: {}", e),
        }),
    )
}

fn not_found(what: impl std::fmt::Display) -> HandlerError {
    (
        StatusCode::NOT_FOUND,
        Json(StatusResponse {
            status: format!("not found: {}", what),
        }),
    )
}

fn ok() -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "ok".to_string(),
    })
}

// ============================================================================
// Prompt Endpoints
// ============================================================================

/// GET /prompts - Snapshot of the prompt bank with knob visuals
pub async fn get_prompts(State(ctx): State<AppState>) -> Json<PromptListResponse> {
    let level = ctx.state.audio_level() as f64;
    let prompts = ctx.bank.lock().unwrap().status(level);
    Json(PromptListResponse { prompts })
}

/// POST /prompts/:prompt_id/weight - Set a prompt's weight (0.0 - 2.0)
pub async fn set_prompt_weight(
    State(ctx): State<AppState>,
    Path(prompt_id): Path<Uuid>,
    Json(req): Json<WeightRequest>,
) -> Result<Json<StatusResponse>, HandlerError> {
    if !req.weight.is_finite() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(StatusResponse {
                status: format!("weight must be a finite number in 0.0-{}", MAX_WEIGHT),
            }),
        ));
    }
    if ctx.bank.lock().unwrap().visuals(prompt_id, 0.0).is_none() {
        return Err(not_found(prompt_id));
    }

    ctx.commands
        .send(Command::SetPromptWeight {
            prompt_id,
            weight: req.weight,
        })
        .map_err(internal_error)?;
    Ok(ok())
}

/// POST /prompts/:prompt_id/auto - Toggle a prompt's auto mode
pub async fn set_prompt_auto(
    State(ctx): State<AppState>,
    Path(prompt_id): Path<Uuid>,
    Json(req): Json<AutoRequest>,
) -> Result<Json<StatusResponse>, HandlerError> {
    if ctx.bank.lock().unwrap().visuals(prompt_id, 0.0).is_none() {
        return Err(not_found(prompt_id));
    }

    ctx.commands
        .send(Command::SetPromptAuto {
            prompt_id,
            auto: req.auto,
        })
        .map_err(internal_error)?;
    Ok(ok())
}

// ============================================================================
// Generation Config Endpoints
// ============================================================================

/// GET /config - Current generation parameters
pub async fn get_config(State(ctx): State<AppState>) -> Json<GenerationConfig> {
    Json(ctx.config.lock().unwrap().clone())
}

/// POST /config - Replace generation parameters (values are clamped)
pub async fn set_config(
    State(ctx): State<AppState>,
    Json(config): Json<GenerationConfig>,
) -> Result<Json<StatusResponse>, HandlerError> {
    info!("Generation config update requested");
    ctx.commands
        .send(Command::SetConfig(config))
        .map_err(internal_error)?;
    Ok(ok())
}

// ============================================================================
// Playback Control Endpoints
// ============================================================================

/// POST /playback/toggle - The main action: play, pause, or cancel loading
pub async fn toggle_play_pause(
    State(ctx): State<AppState>,
) -> Result<Json<StatusResponse>, HandlerError> {
    info!("Play/pause toggle requested");
    ctx.commands
        .send(Command::TogglePlayPause)
        .map_err(internal_error)?;
    Ok(ok())
}

/// POST /playback/stop - Release the session and stop
pub async fn stop(State(ctx): State<AppState>) -> Result<Json<StatusResponse>, HandlerError> {
    info!("Stop requested");
    ctx.commands.send(Command::Stop).map_err(internal_error)?;
    Ok(ok())
}

/// GET /playback/status - Current playback state snapshot
pub async fn get_status(State(ctx): State<AppState>) -> Json<PlaybackStatusResponse> {
    let state = ctx.state.playback_state().await;
    let volume = ctx.state.volume().await;
    let audio_level = ctx.state.audio_level();
    let active_prompts = ctx.bank.lock().unwrap().active_prompts().len();

    let state_str = match state {
        PlaybackState::Stopped => "stopped",
        PlaybackState::Loading => "loading",
        PlaybackState::Playing => "playing",
        PlaybackState::Paused => "paused",
    };

    Json(PlaybackStatusResponse {
        state: state_str.to_string(),
        volume,
        audio_level,
        active_prompts,
    })
}

// ============================================================================
// Audio Endpoints
// ============================================================================

/// GET /audio/volume - Get master volume
pub async fn get_volume(State(ctx): State<AppState>) -> Json<VolumeResponse> {
    Json(VolumeResponse {
        volume: ctx.state.volume().await,
    })
}

/// POST /audio/volume - Set master volume (0.0 - 1.0)
pub async fn set_volume(
    State(ctx): State<AppState>,
    Json(req): Json<VolumeRequest>,
) -> Result<Json<VolumeResponse>, HandlerError> {
    if !(0.0..=1.0).contains(&req.volume) {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(StatusResponse {
                status: "volume must be in 0.0-1.0".to_string(),
            }),
        ));
    }

    ctx.commands
        .send(Command::SetVolume(req.volume))
        .map_err(internal_error)?;
    Ok(Json(VolumeResponse { volume: req.volume }))
}

/// GET /audio/devices - List available audio output devices
pub async fn list_audio_devices() -> Result<Json<DeviceListResponse>, HandlerError> {
    match crate::playback::output::list_devices() {
        Ok(devices) => {
            info!("Found {} audio devices", devices.len());
            Ok(Json(DeviceListResponse { devices }))
        }
        Err(e) => {
            error!("Failed to list audio devices: {}", e);
            Err(internal_error(e))
        }
    }
}

// ============================================================================
// MIDI Endpoints
// ============================================================================

/// GET /midi/ports - List available MIDI input ports
pub async fn list_midi_ports() -> Result<Json<MidiPortListResponse>, HandlerError> {
    match crate::midi::MidiListener::list_ports() {
        Ok(ports) => Ok(Json(MidiPortListResponse { ports })),
        Err(e) => {
            error!("Failed to list MIDI ports: {}", e);
            Err(internal_error(e))
        }
    }
}
