//! MIDI CC input
//!
//! Thin midir wrapper that forwards control-change messages into the
//! engine's command channel. Device selection UI is out of scope; this is
//! only the event source the controller listens to.

use crate::error::{Error, Result};
use midir::{MidiInput, MidiInputConnection};
use tokio::sync::mpsc;
use tracing::{debug, info};

/// A control-change message from a connected device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CcMessage {
    pub channel: u8,
    pub cc: u8,
    pub value: u8,
}

/// Parse a raw MIDI message, keeping only control changes
fn parse_cc(raw: &[u8]) -> Option<CcMessage> {
    if raw.len() < 3 {
        return None;
    }
    let status = raw[0];
    if status & 0xF0 != 0xB0 {
        return None;
    }
    Some(CcMessage {
        channel: status & 0x0F,
        cc: raw[1] & 0x7F,
        value: raw[2] & 0x7F,
    })
}

/// Open MIDI input feeding CC messages into a channel
pub struct MidiListener {
    /// Held to keep the connection alive; dropped on disconnect
    _connection: MidiInputConnection<()>,
    port_name: String,
}

impl MidiListener {
    /// Names of available input ports
    pub fn list_ports() -> Result<Vec<String>> {
        let midi_in = MidiInput::new("gdj-ap")
            .map_err(|e| Error::Midi(format!("Failed to open MIDI input: {}", e)))?;
        let ports = midi_in.ports();
        Ok(ports
            .iter()
            .filter_map(|p| midi_in.port_name(p).ok())
            .collect())
    }

    /// Connect to the input port at `index` and forward CC messages
    pub fn connect(index: usize, tx: mpsc::UnboundedSender<CcMessage>) -> Result<Self> {
        let midi_in = MidiInput::new("gdj-ap")
            .map_err(|e| Error::Midi(format!("Failed to open MIDI input: {}", e)))?;

        let ports = midi_in.ports();
        let port = ports
            .get(index)
            .ok_or_else(|| Error::Midi(format!("No MIDI input port at index {}", index)))?;
        let port_name = midi_in
            .port_name(port)
            .unwrap_or_else(|_| format!("port {}", index));

        let connection = midi_in
            .connect(
                port,
                "gdj-cc",
                move |_timestamp, raw, _| {
                    if let Some(msg) = parse_cc(raw) {
                        debug!("CC ch={} cc={} value={}", msg.channel, msg.cc, msg.value);
                        // Receiver dropped means the engine is shutting down
                        let _ = tx.send(msg);
                    }
                },
                (),
            )
            .map_err(|e| Error::Midi(format!("Failed to connect MIDI input: {}", e)))?;

        info!("Listening for CC messages on MIDI port '{}'", port_name);
        Ok(Self {
            _connection: connection,
            port_name,
        })
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }
}
