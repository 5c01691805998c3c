//! Error types for gdj-ap
//!
//! Defines module-specific error types using thiserror for clear error
//! propagation. The `Auth`/`Session` split matters: authentication failures
//! are fatal to the current user action and never auto-retried, while
//! session transport failures feed the bounded reconnection protocol.

use thiserror::Error;

/// Main error type for the gdj-ap engine
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration loading or validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Authentication/setup failure on initial connect (not retried)
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Session transport failure (recoverable via bounded retry)
    #[error("Session error: {0}")]
    Session(String),

    /// Audio chunk decode errors
    #[error("Audio decode error: {0}")]
    Decode(String),

    /// Audio output device errors
    #[error("Audio output error: {0}")]
    AudioOutput(String),

    /// Playback controller errors
    #[error("Playback error: {0}")]
    Playback(String),

    /// MIDI input errors
    #[error("MIDI error: {0}")]
    Midi(String),

    /// HTTP server errors
    #[error("HTTP server error: {0}")]
    Http(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid state for operation
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Invalid request
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Other errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<gdj_common::Error> for Error {
    fn from(e: gdj_common::Error) -> Self {
        Error::Config(e.to_string())
    }
}

/// Convenience Result type using the gdj-ap Error
pub type Result<T> = std::result::Result<T, Error>;
