mod access;
#[cfg(feature = "native")]
mod midir_access;
mod router;

pub use self::access::{MessageHandler, MidiAccess, MidiDevice, PortListener};
#[cfg(feature = "native")]
pub use self::midir_access::MidirAccess;
pub use self::router::{accepts, MidiCallback, MidiRouter, MidiSession, RouterOptions};

/// Whether the platform exposes MIDI input.
#[cfg(feature = "native")]
pub fn is_supported() -> bool {
    MidirAccess::default().is_supported()
}
