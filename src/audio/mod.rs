#[cfg(feature = "native")]
mod cpal_backend;
#[cfg(feature = "native")]
pub use self::cpal_backend::CpalBackend;

use std::sync::{Arc, Mutex};

use crate::error::AudioError;
use crate::synth::Synth;

/// The engine model shared between the control side and the audio callback.
pub type SharedSynth = Arc<Mutex<Synth>>;

/// An output device that pulls audio from a `Synth`.
///
/// `start` opens the device and begins rendering. A backend may come up
/// suspended (the device exists but is not playing); `resume` gets it going.
pub trait AudioBackend {
    fn start(&mut self, synth: SharedSynth) -> Result<(), AudioError>;
    fn suspend(&mut self) -> Result<(), AudioError>;
    fn resume(&mut self) -> Result<(), AudioError>;
    fn is_suspended(&self) -> bool;
    fn stop(&mut self);
}
