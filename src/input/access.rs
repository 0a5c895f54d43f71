use serde::{Deserialize, Serialize};

use crate::error::MidiError;

/// An input port as reported by the platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MidiDevice {
    /// Stable identifier for the port.
    pub id: String,
    pub name: String,
}

impl MidiDevice {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Receives the raw bytes of every message arriving on one port.
pub type MessageHandler = Box<dyn FnMut(&[u8]) + Send + 'static>;

/// A live subscription to a port. Dropping it stops delivery.
pub trait PortListener {}

/// Platform MIDI input access.
pub trait MidiAccess: Send + Sync {
    /// Whether the platform exposes MIDI input at all.
    fn is_supported(&self) -> bool;

    /// Currently available input ports.
    fn input_ports(&self) -> Result<Vec<MidiDevice>, MidiError>;

    /// Starts delivering messages from `port` to `handler`.
    fn listen(
        &self,
        port: &MidiDevice,
        handler: MessageHandler,
    ) -> Result<Box<dyn PortListener>, MidiError>;
}
