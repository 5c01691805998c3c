//! # GDJ Common Library
//!
//! Shared code for the GDJ generative-music engine:
//! - Event types (`GdjEvent` enum) and the broadcast `EventBus`
//! - Generation parameter model (weighted prompts, music config)
//! - Configuration loading
//! - Common error type

pub mod config;
pub mod error;
pub mod events;
pub mod params;

pub use error::{Error, Result};
pub use events::{EventBus, GdjEvent, PlaybackState};
pub use params::{GenerationConfig, MusicScale, WeightedPrompt};
