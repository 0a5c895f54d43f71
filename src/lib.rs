//! chromasynth - polyphonic chord synth, MIDI input routing and chord export.
//!
//! The `synth` module is the device-free engine model; `runtime::SynthEngine`
//! puts it on an output device. `input::MidiRouter` feeds raw MIDI from any
//! input port to a callback, and `export` writes chords as Standard MIDI Files.

pub mod audio;
pub mod error;
pub mod export;
pub mod input;
pub mod logging;
pub mod runtime;
pub mod synth;

pub use error::{AudioError, ConfigError, ExportError, MidiError};
pub use export::{encode_chord, export_chord, ChordExportSpec};
pub use input::{MidiDevice, MidiRouter, MidiSession};
pub use runtime::{ChordHandle, SynthEngine};
pub use synth::{EngineSettings, EnvelopePatch, Synth, Waveform};
