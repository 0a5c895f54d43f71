use crate::error::MidiError;
use crate::input::access::{MessageHandler, MidiAccess, MidiDevice, PortListener};
use midir::{Ignore, MidiInput, MidiInputConnection};

const UNKNOWN_DEVICE_NAME: &str = "Unknown MIDI Device";

/// Hardware and virtual MIDI inputs through `midir`.
pub struct MidirAccess {
    client_name: String,
}

impl MidirAccess {
    pub fn new(client_name: impl Into<String>) -> Self {
        Self {
            client_name: client_name.into(),
        }
    }

    fn client(&self) -> Result<MidiInput, MidiError> {
        let mut midi_in =
            MidiInput::new(&self.client_name).map_err(|e| MidiError::Unavailable(e.to_string()))?;
        // Note routing never needs sysex, clock or active sensing
        midi_in.ignore(Ignore::All);
        Ok(midi_in)
    }
}

impl Default for MidirAccess {
    fn default() -> Self {
        Self::new("chromasynth")
    }
}

struct MidirListener {
    _connection: MidiInputConnection<()>,
}

impl PortListener for MidirListener {}

impl MidiAccess for MidirAccess {
    fn is_supported(&self) -> bool {
        self.client().is_ok()
    }

    fn input_ports(&self) -> Result<Vec<MidiDevice>, MidiError> {
        let midi_in = self.client()?;
        let devices = midi_in
            .ports()
            .iter()
            .map(|port| {
                let name = midi_in
                    .port_name(port)
                    .unwrap_or_else(|_| UNKNOWN_DEVICE_NAME.to_string());
                MidiDevice::new(port.id(), name)
            })
            .collect();
        Ok(devices)
    }

    fn listen(
        &self,
        port: &MidiDevice,
        mut handler: MessageHandler,
    ) -> Result<Box<dyn PortListener>, MidiError> {
        let midi_in = self.client()?;
        let input_port = midi_in
            .find_port_by_id(port.id.clone())
            .ok_or_else(|| MidiError::PortNotFound(port.id.clone()))?;

        let connection = midi_in
            .connect(
                &input_port,
                &format!("{}-{}", self.client_name, port.name),
                move |_, message, _| handler(message),
                (),
            )
            .map_err(|e| MidiError::Connection {
                port: port.name.clone(),
                reason: e.to_string(),
            })?;

        Ok(Box::new(MidirListener {
            _connection: connection,
        }))
    }
}
