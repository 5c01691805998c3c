//! Remote generation session
//!
//! The engine holds at most one live bidirectional session with the remote
//! generative-music service. The session surface is split into two traits so
//! the playback controller is testable with a scripted transport:
//!
//! - [`SessionTransport`]: establishes sessions (`connect`)
//! - [`SessionHandle`]: control-plane calls on a live session
//!
//! Inbound traffic (setup confirmation, filtered-prompt notices, audio
//! chunks) arrives as [`SessionEvent`]s on an mpsc channel returned by
//! `connect`. The transport delivers events serially; error and close are
//! distinct events and may both fire for one underlying failure, which the
//! controller deduplicates.

pub mod client;

pub use client::HttpTransport;

use crate::error::Result;
use gdj_common::params::{GenerationConfig, WeightedPrompt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// One audio chunk from the stream: base64-encoded interleaved PCM16
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioChunkData {
    /// Base64-encoded little-endian PCM16 samples, interleaved
    pub data: String,
    /// Sample rate of the encoded audio
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    /// Channel count of the encoded audio
    #[serde(default = "default_channels")]
    pub channels: u16,
}

fn default_sample_rate() -> u32 {
    48_000
}

fn default_channels() -> u16 {
    2
}

/// Messages delivered by the remote service on an established session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ServerMessage {
    /// Session setup confirmed; resets the reconnect counter
    SetupComplete {},

    /// A prompt's text was rejected by the service
    #[serde(rename_all = "camelCase")]
    FilteredPrompt {
        text: String,
        filtered_reason: String,
    },

    /// One or more audio chunks to schedule
    AudioChunks { chunks: Vec<AudioChunkData> },
}

/// Inbound session events (message, error, close)
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// A decoded server message
    Message(ServerMessage),
    /// Transport-level error; the session may be unusable
    TransportError(String),
    /// The transport closed the session
    Closed,
}

/// Connection parameters for session setup
#[derive(Debug, Clone)]
pub struct ConnectParams {
    /// Model identifier requested at setup
    pub model: String,
}

/// Control-plane calls on a live session
///
/// All calls are fallible; a failed control call is reported as a
/// session error by the caller, not retried here.
pub trait SessionHandle: Send + 'static {
    /// Replace the session's weighted prompt set
    fn set_weighted_prompts(
        &mut self,
        prompts: &[WeightedPrompt],
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Replace the session's generation config
    fn set_config(
        &mut self,
        config: &GenerationConfig,
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Start or resume audio generation
    fn play(&mut self) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Pause audio generation, keeping the session alive
    fn pause(&mut self) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Stop generation and release the session
    fn stop(&mut self) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// Session factory
pub trait SessionTransport: Send + Sync + 'static {
    type Handle: SessionHandle;

    /// Establish a new session
    ///
    /// Returns the control handle and the inbound event channel.
    /// Authentication failures surface as [`crate::error::Error::Auth`];
    /// anything else as [`crate::error::Error::Session`].
    fn connect(
        &self,
        params: &ConnectParams,
    ) -> impl std::future::Future<Output = Result<(Self::Handle, mpsc::UnboundedReceiver<SessionEvent>)>>
           + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setup_complete_wire_format() {
        let msg: ServerMessage = serde_json::from_str(r#"{"setupComplete":{}}"#).unwrap();
        assert!(matches!(msg, ServerMessage::SetupComplete {}));
    }

    #[test]
    fn test_filtered_prompt_wire_format() {
        let msg: ServerMessage = serde_json::from_str(
            r#"{"filteredPrompt":{"text":"Thrash","filteredReason":"unsupported"}}"#,
        )
        .unwrap();
        match msg {
            ServerMessage::FilteredPrompt {
                text,
                filtered_reason,
            } => {
                assert_eq!(text, "Thrash");
                assert_eq!(filtered_reason, "unsupported");
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_audio_chunk_defaults() {
        let msg: ServerMessage =
            serde_json::from_str(r#"{"audioChunks":{"chunks":[{"data":"AAAA"}]}}"#).unwrap();
        match msg {
            ServerMessage::AudioChunks { chunks } => {
                assert_eq!(chunks.len(), 1);
                assert_eq!(chunks[0].sample_rate, 48_000);
                assert_eq!(chunks[0].channels, 2);
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }
}
