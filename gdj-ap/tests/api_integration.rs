//! Integration tests for the GDJ engine API
//!
//! Exercises the REST surface with `tower::ServiceExt::oneshot`: health,
//! prompt bank, generation config, playback control, and volume.

use axum::body::Body;
use axum::http::StatusCode;
use gdj_ap::api::{create_router, AppState};
use gdj_ap::playback::Command;
use gdj_ap::prompts::PromptBank;
use gdj_ap::state::SharedState;
use gdj_common::params::GenerationConfig;
use http::{Method, Request};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

/// Test server plus the receiving end of the controller command channel
struct TestApi {
    app: axum::Router,
    commands: mpsc::UnboundedReceiver<Command>,
    bank: Arc<Mutex<PromptBank>>,
}

fn setup_test_api() -> TestApi {
    let (tx, rx) = mpsc::unbounded_channel();
    let bank = Arc::new(Mutex::new(PromptBank::new()));

    let app_state = AppState {
        commands: tx,
        state: Arc::new(SharedState::new()),
        bank: Arc::clone(&bank),
        config: Arc::new(Mutex::new(GenerationConfig::default())),
        port: 5810,
    };

    TestApi {
        app: create_router(app_state),
        commands: rx,
        bank,
    }
}

async fn make_request(
    app: &axum::Router,
    method: Method,
    path: &str,
    body: Option<Value>,
) -> (StatusCode, Option<Value>) {
    let mut request = Request::builder().method(method).uri(path);
    if body.is_some() {
        request = request.header("content-type", "application/json");
    }
    let request = match body {
        Some(json_body) => request.body(Body::from(json_body.to_string())).unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&bytes).ok();
    (status, json)
}

#[tokio::test]
async fn test_health_check() {
    let api = setup_test_api();
    let (status, body) = make_request(&api.app, Method::GET, "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    let body = body.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "gdj-ap");
}

#[tokio::test]
async fn test_get_prompts_returns_the_default_bank() {
    let api = setup_test_api();
    let (status, body) = make_request(&api.app, Method::GET, "/api/v1/prompts", None).await;

    assert_eq!(status, StatusCode::OK);
    let prompts = body.unwrap()["prompts"].as_array().unwrap().clone();
    assert_eq!(prompts.len(), 16);
    // Every prompt carries knob visuals
    assert!(prompts.iter().all(|p| p["rotation_deg"].is_number()));
    assert!(prompts.iter().all(|p| p["halo_alpha"].is_number()));
}

#[tokio::test]
async fn test_set_prompt_weight_sends_command() {
    let mut api = setup_test_api();
    let prompt_id = api.bank.lock().unwrap().status(0.0)[0].prompt.prompt_id;

    let (status, _) = make_request(
        &api.app,
        Method::POST,
        &format!("/api/v1/prompts/{}/weight", prompt_id),
        Some(json!({ "weight": 1.5 })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    match api.commands.try_recv().unwrap() {
        Command::SetPromptWeight {
            prompt_id: id,
            weight,
        } => {
            assert_eq!(id, prompt_id);
            assert!((weight - 1.5).abs() < 1e-9);
        }
        other => panic!("unexpected command: {:?}", other),
    }
}

#[tokio::test]
async fn test_set_weight_for_unknown_prompt_is_404() {
    let mut api = setup_test_api();
    let (status, _) = make_request(
        &api.app,
        Method::POST,
        &format!("/api/v1/prompts/{}/weight", Uuid::new_v4()),
        Some(json!({ "weight": 1.0 })),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(api.commands.try_recv().is_err());
}

#[tokio::test]
async fn test_set_prompt_auto_sends_command() {
    let mut api = setup_test_api();
    let prompt_id = api.bank.lock().unwrap().status(0.0)[3].prompt.prompt_id;

    let (status, _) = make_request(
        &api.app,
        Method::POST,
        &format!("/api/v1/prompts/{}/auto", prompt_id),
        Some(json!({ "auto": true })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(matches!(
        api.commands.try_recv().unwrap(),
        Command::SetPromptAuto { auto: true, .. }
    ));
}

#[tokio::test]
async fn test_config_round_trip() {
    let mut api = setup_test_api();

    let (status, body) = make_request(&api.app, Method::GET, "/api/v1/config", None).await;
    assert_eq!(status, StatusCode::OK);
    let defaults = body.unwrap();
    assert!((defaults["temperature"].as_f64().unwrap() - 1.1).abs() < 1e-9);

    let mut updated = defaults.clone();
    updated["bpm"] = json!(128);
    let (status, _) = make_request(&api.app, Method::POST, "/api/v1/config", Some(updated)).await;
    assert_eq!(status, StatusCode::OK);

    assert!(matches!(
        api.commands.try_recv().unwrap(),
        Command::SetConfig(_)
    ));
}

#[tokio::test]
async fn test_playback_toggle_and_stop_send_commands() {
    let mut api = setup_test_api();

    let (status, _) =
        make_request(&api.app, Method::POST, "/api/v1/playback/toggle", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(matches!(
        api.commands.try_recv().unwrap(),
        Command::TogglePlayPause
    ));

    let (status, _) = make_request(&api.app, Method::POST, "/api/v1/playback/stop", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(matches!(api.commands.try_recv().unwrap(), Command::Stop));
}

#[tokio::test]
async fn test_playback_status_snapshot() {
    let api = setup_test_api();
    let (status, body) =
        make_request(&api.app, Method::GET, "/api/v1/playback/status", None).await;

    assert_eq!(status, StatusCode::OK);
    let body = body.unwrap();
    assert_eq!(body["state"], "stopped");
    assert!(body["volume"].is_number());
    // Default bank seeds a couple of non-zero weights
    assert!(body["active_prompts"].as_u64().unwrap() >= 1);
}

#[tokio::test]
async fn test_volume_validation_and_set() {
    let mut api = setup_test_api();

    let (status, _) = make_request(
        &api.app,
        Method::POST,
        "/api/v1/audio/volume",
        Some(json!({ "volume": 1.5 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(api.commands.try_recv().is_err());

    let (status, body) = make_request(
        &api.app,
        Method::POST,
        "/api/v1/audio/volume",
        Some(json!({ "volume": 0.6 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!((body.unwrap()["volume"].as_f64().unwrap() - 0.6).abs() < 1e-9);
    assert!(matches!(
        api.commands.try_recv().unwrap(),
        Command::SetVolume(v) if (v - 0.6).abs() < 1e-9
    ));
}

#[tokio::test]
async fn test_command_channel_closed_is_500() {
    let api = setup_test_api();
    drop(api.commands);

    let (status, _) =
        make_request(&api.app, Method::POST, "/api/v1/playback/toggle", None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}
