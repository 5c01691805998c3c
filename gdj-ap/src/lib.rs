//! # GDJ Engine Library (gdj-ap)
//!
//! Streaming playback engine for a remote generative-music service.
//!
//! **Purpose:** Maintain a live generation session, buffer and schedule the
//! incoming audio stream against the output clock, animate the weighted
//! prompt knobs, and provide an HTTP/SSE control interface.
//!
//! **Architecture:** Single controller task over a session transport,
//! cpal + ringbuf + rubato audio output, axum control surface

pub mod api;
pub mod error;
pub mod knob;
pub mod midi;
pub mod playback;
pub mod prompts;
pub mod session;
pub mod state;

pub use error::{Error, Result};
pub use state::SharedState;
