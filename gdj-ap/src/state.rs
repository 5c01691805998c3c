//! Shared engine state
//!
//! Thread-safe shared state for coordination between the playback
//! controller, the HTTP API, and the SSE broadcaster. Uses RwLock for
//! concurrent read access with rare writes.

use chrono::Utc;
use gdj_common::events::{EventBus, GdjEvent, PlaybackState};
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::sync::{broadcast, RwLock};

/// Shared state accessible by all components
pub struct SharedState {
    /// Current playback state
    playback_state: RwLock<PlaybackState>,

    /// Master volume (0.0-1.0)
    volume: RwLock<f64>,

    /// Live output RMS level (f32 bit pattern), updated by the playback
    /// controller and read by the knob halo rendering
    audio_level: AtomicU32,

    /// Event broadcaster for SSE and internal listeners
    pub events: EventBus,
}

impl SharedState {
    /// Create new shared state with default values
    pub fn new() -> Self {
        Self {
            playback_state: RwLock::new(PlaybackState::Stopped),
            volume: RwLock::new(0.75),
            audio_level: AtomicU32::new(0.0f32.to_bits()),
            events: EventBus::new(100),
        }
    }

    /// Live output level (RMS, 0.0-1.0)
    pub fn audio_level(&self) -> f32 {
        f32::from_bits(self.audio_level.load(Ordering::Relaxed))
    }

    /// Publish the current output level
    pub fn set_audio_level(&self, level: f32) {
        self.audio_level.store(level.to_bits(), Ordering::Relaxed);
    }

    /// Get current playback state
    pub async fn playback_state(&self) -> PlaybackState {
        *self.playback_state.read().await
    }

    /// Set playback state and broadcast the change
    ///
    /// Broadcasts only on an actual transition.
    pub async fn set_playback_state(&self, state: PlaybackState) {
        let mut current = self.playback_state.write().await;
        if *current != state {
            *current = state;
            self.events.emit(GdjEvent::PlaybackStateChanged {
                state,
                timestamp: Utc::now(),
            });
        }
    }

    /// Get master volume (0.0-1.0)
    pub async fn volume(&self) -> f64 {
        *self.volume.read().await
    }

    /// Set master volume, clamped to [0.0, 1.0]
    pub async fn set_volume(&self, volume: f64) {
        let clamped = volume.clamp(0.0, 1.0);
        *self.volume.write().await = clamped;
        self.events.emit(GdjEvent::VolumeChanged {
            volume: clamped,
            timestamp: Utc::now(),
        });
    }

    /// Subscribe to the event stream
    pub fn subscribe_events(&self) -> broadcast::Receiver<GdjEvent> {
        self.events.subscribe()
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_playback_state_default_and_set() {
        let state = SharedState::new();
        assert_eq!(state.playback_state().await, PlaybackState::Stopped);

        state.set_playback_state(PlaybackState::Loading).await;
        assert_eq!(state.playback_state().await, PlaybackState::Loading);
    }

    #[tokio::test]
    async fn test_state_change_broadcasts_once() {
        let state = SharedState::new();
        let mut rx = state.subscribe_events();

        state.set_playback_state(PlaybackState::Playing).await;
        // Setting the same state again must not re-broadcast
        state.set_playback_state(PlaybackState::Playing).await;
        state.set_playback_state(PlaybackState::Paused).await;

        match rx.recv().await.unwrap() {
            GdjEvent::PlaybackStateChanged { state, .. } => {
                assert_eq!(state, PlaybackState::Playing)
            }
            other => panic!("unexpected event: {:?}", other),
        }
        match rx.recv().await.unwrap() {
            GdjEvent::PlaybackStateChanged { state, .. } => {
                assert_eq!(state, PlaybackState::Paused)
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_volume_clamped() {
        let state = SharedState::new();
        assert_eq!(state.volume().await, 0.75);

        state.set_volume(1.5).await;
        assert_eq!(state.volume().await, 1.0);

        state.set_volume(-0.5).await;
        assert_eq!(state.volume().await, 0.0);
    }
}
