//! Playback engine
//!
//! - [`controller`]: the playback state machine (session lifecycle, chunk
//!   scheduling, bounded reconnection, coalesced parameter commits)
//! - [`scheduler`]: the look-ahead scheduling clock
//! - [`reconnect`]: the bounded retry policy
//! - [`output`]: the audio sink (cpal + ring buffer)
//! - [`decode`]: chunk decode and resampling

pub mod controller;
pub mod decode;
pub mod output;
pub mod reconnect;
pub mod scheduler;

pub use controller::{Command, PlaybackController};
pub use output::{AudioSink, CpalSink};
pub use scheduler::{Schedule, StreamScheduler, BUFFER_TIME};
