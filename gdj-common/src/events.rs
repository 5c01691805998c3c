//! Event types for the GDJ event system
//!
//! GDJ uses hybrid communication:
//! - **EventBus** (tokio::broadcast): one-to-many event broadcasting,
//!   consumed by SSE clients and internal listeners
//! - **Command channels** (tokio::mpsc): request -> single handler
//! - **Shared state** (Arc<RwLock<T>>): read-heavy access

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Playback state of the engine
///
/// Exactly one state is current at any time. Transitions are owned by the
/// playback controller; everything else observes via events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    /// Initial/terminal rest state, no live session audio
    Stopped,
    /// Connecting, reconnecting, or re-buffering after an underrun
    Loading,
    /// Audio flowing
    Playing,
    /// Intentionally halted, session retained for resume
    Paused,
}

/// GDJ event types, broadcast on the EventBus and serialized for SSE
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum GdjEvent {
    /// Playback state changed
    PlaybackStateChanged {
        state: PlaybackState,
        timestamp: DateTime<Utc>,
    },

    /// A prompt's committed weight changed (knob, CC, or API)
    PromptWeightChanged {
        prompt_id: Uuid,
        weight: f64,
        timestamp: DateTime<Utc>,
    },

    /// The remote service rejected a prompt's text; playback continues
    /// with the remaining prompts
    PromptFiltered {
        text: String,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// Generation parameters changed
    GenerationConfigChanged {
        config: crate::params::GenerationConfig,
        timestamp: DateTime<Utc>,
    },

    /// Reconnection attempt in progress after a transport failure
    Reconnecting {
        attempt: u32,
        max_attempts: u32,
        timestamp: DateTime<Utc>,
    },

    /// Reconnection retries exhausted; playback stopped
    ConnectionFailed {
        message: String,
        timestamp: DateTime<Utc>,
    },

    /// Master volume changed
    VolumeChanged {
        volume: f64,
        timestamp: DateTime<Utc>,
    },

    /// User-correctable warning (e.g. no active prompts to play)
    EngineWarning {
        message: String,
        timestamp: DateTime<Utc>,
    },
}

impl GdjEvent {
    /// Event type string used as the SSE `event:` field
    pub fn event_type(&self) -> &'static str {
        match self {
            GdjEvent::PlaybackStateChanged { .. } => "PlaybackStateChanged",
            GdjEvent::PromptWeightChanged { .. } => "PromptWeightChanged",
            GdjEvent::PromptFiltered { .. } => "PromptFiltered",
            GdjEvent::GenerationConfigChanged { .. } => "GenerationConfigChanged",
            GdjEvent::Reconnecting { .. } => "Reconnecting",
            GdjEvent::ConnectionFailed { .. } => "ConnectionFailed",
            GdjEvent::VolumeChanged { .. } => "VolumeChanged",
            GdjEvent::EngineWarning { .. } => "EngineWarning",
        }
    }
}

/// Broadcast event bus
///
/// Wraps `tokio::sync::broadcast` so emitters never block and slow
/// subscribers lag rather than stall the engine.
pub struct EventBus {
    tx: broadcast::Sender<GdjEvent>,
    capacity: usize,
}

impl EventBus {
    /// Create a new EventBus with the given channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<GdjEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Send errors (no subscribers) are ignored.
    pub fn emit(&self, event: GdjEvent) {
        let _ = self.tx.send(event);
    }

    /// Configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eventbus_new() {
        let bus = EventBus::new(100);
        assert_eq!(bus.capacity(), 100);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_eventbus_emit_and_receive() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.emit(GdjEvent::PlaybackStateChanged {
            state: PlaybackState::Loading,
            timestamp: Utc::now(),
        });

        let event = rx.recv().await.unwrap();
        match event {
            GdjEvent::PlaybackStateChanged { state, .. } => {
                assert_eq!(state, PlaybackState::Loading);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_emit_without_subscribers_is_ok() {
        let bus = EventBus::new(16);
        // Must not panic or error
        bus.emit(GdjEvent::EngineWarning {
            message: "no subscribers".into(),
            timestamp: Utc::now(),
        });
    }

    #[test]
    fn test_playback_state_serialization() {
        let json = serde_json::to_string(&PlaybackState::Loading).unwrap();
        assert_eq!(json, "\"loading\"");

        let state: PlaybackState = serde_json::from_str("\"paused\"").unwrap();
        assert_eq!(state, PlaybackState::Paused);
    }

    #[test]
    fn test_event_tagged_serialization() {
        let event = GdjEvent::Reconnecting {
            attempt: 2,
            max_attempts: 3,
            timestamp: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "Reconnecting");
        assert_eq!(json["attempt"], 2);
    }
}
