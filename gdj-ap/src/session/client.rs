//! HTTP transport for the remote generation service
//!
//! Control-plane calls are plain JSON POSTs; the inbound stream is a
//! long-lived chunked response carrying newline-delimited JSON
//! [`ServerMessage`]s. A background task pumps the stream into the
//! session event channel and reports transport errors / stream end as
//! distinct events.

use crate::error::{Error, Result};
use crate::session::{ConnectParams, ServerMessage, SessionEvent, SessionHandle, SessionTransport};
use futures::StreamExt;
use gdj_common::params::{GenerationConfig, WeightedPrompt};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Session-create response
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateSessionResponse {
    session_id: String,
}

/// HTTP transport for the generation service
pub struct HttpTransport {
    /// Control-plane client (bounded timeouts)
    control: Client,
    /// Streaming client (no total timeout; the stream is long-lived)
    stream: Client,
    base_url: String,
    api_key: String,
}

impl HttpTransport {
    /// Create a transport for the given service endpoint
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self> {
        let control = Client::builder()
            .timeout(Duration::from_secs(15))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| Error::Session(format!("Failed to build HTTP client: {}", e)))?;

        let stream = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| Error::Session(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            control,
            stream,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    /// Pump the chunked NDJSON stream into the session event channel
    async fn pump_stream(
        response: reqwest::Response,
        tx: mpsc::UnboundedSender<SessionEvent>,
    ) {
        let mut body = response.bytes_stream();
        let mut buffer: Vec<u8> = Vec::new();

        while let Some(chunk) = body.next().await {
            let chunk = match chunk {
                Ok(c) => c,
                Err(e) => {
                    let _ = tx.send(SessionEvent::TransportError(e.to_string()));
                    return;
                }
            };

            buffer.extend_from_slice(&chunk);

            // Messages are newline-delimited; keep the trailing partial line
            while let Some(pos) = buffer.iter().position(|&b| b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=pos).collect();
                let line = &line[..line.len() - 1];
                if line.is_empty() {
                    continue;
                }

                match serde_json::from_slice::<ServerMessage>(line) {
                    Ok(msg) => {
                        if tx.send(SessionEvent::Message(msg)).is_err() {
                            // Receiver dropped: session was replaced or stopped
                            return;
                        }
                    }
                    Err(e) => {
                        warn!("Discarding unparseable server message: {}", e);
                    }
                }
            }
        }

        debug!("Session stream ended");
        let _ = tx.send(SessionEvent::Closed);
    }
}

impl SessionTransport for HttpTransport {
    type Handle = HttpSessionHandle;

    async fn connect(
        &self,
        params: &ConnectParams,
    ) -> Result<(Self::Handle, mpsc::UnboundedReceiver<SessionEvent>)> {
        let url = format!("{}/v1/sessions", self.base_url);
        let response = self
            .control
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&json!({ "model": params.model }))
            .send()
            .await
            .map_err(|e| Error::Session(format!("Connect failed: {}", e)))?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(Error::Auth("API key rejected by service".to_string()));
            }
            status if !status.is_success() => {
                return Err(Error::Session(format!(
                    "Session create failed with status {}",
                    status
                )));
            }
            _ => {}
        }

        let created: CreateSessionResponse = response
            .json()
            .await
            .map_err(|e| Error::Session(format!("Malformed session response: {}", e)))?;

        debug!("Session {} created", created.session_id);

        let stream_url = format!(
            "{}/v1/sessions/{}/stream",
            self.base_url, created.session_id
        );
        let stream_response = self
            .stream
            .get(&stream_url)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| Error::Session(format!("Stream open failed: {}", e)))?;

        if !stream_response.status().is_success() {
            return Err(Error::Session(format!(
                "Stream open failed with status {}",
                stream_response.status()
            )));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(Self::pump_stream(stream_response, tx));

        let handle = HttpSessionHandle {
            client: self.control.clone(),
            base_url: self.base_url.clone(),
            api_key: self.api_key.clone(),
            session_id: created.session_id,
        };

        Ok((handle, rx))
    }
}

/// Control handle for an HTTP session
pub struct HttpSessionHandle {
    client: Client,
    base_url: String,
    api_key: String,
    session_id: String,
}

impl HttpSessionHandle {
    async fn post(&self, path: &str, body: serde_json::Value) -> Result<()> {
        let url = format!(
            "{}/v1/sessions/{}/{}",
            self.base_url, self.session_id, path
        );
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Session(format!("{} failed: {}", path, e)))?;

        if !response.status().is_success() {
            return Err(Error::Session(format!(
                "{} failed with status {}",
                path,
                response.status()
            )));
        }
        Ok(())
    }
}

impl SessionHandle for HttpSessionHandle {
    async fn set_weighted_prompts(&mut self, prompts: &[WeightedPrompt]) -> Result<()> {
        self.post("prompts", json!({ "weightedPrompts": prompts }))
            .await
    }

    async fn set_config(&mut self, config: &GenerationConfig) -> Result<()> {
        self.post("config", json!({ "musicGenerationConfig": config }))
            .await
    }

    async fn play(&mut self) -> Result<()> {
        self.post("play", json!({})).await
    }

    async fn pause(&mut self) -> Result<()> {
        self.post("pause", json!({})).await
    }

    async fn stop(&mut self) -> Result<()> {
        let url = format!("{}/v1/sessions/{}", self.base_url, self.session_id);
        let response = self
            .client
            .delete(&url)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| Error::Session(format!("Session release failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::Session(format!(
                "Session release failed with status {}",
                response.status()
            )));
        }
        Ok(())
    }
}
