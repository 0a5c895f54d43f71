//! Device-free engine model: waveforms, envelopes, voices and the `Synth` itself.

pub mod config;
pub mod core;
pub mod envelope;
pub mod note;
pub mod voice;
pub mod waveform;

pub use self::config::{EngineConfig, EngineSettings};
pub use self::core::Synth;
pub use self::envelope::{EnvelopePatch, EnvelopeSettings, ParamTimeline};
pub use self::note::{midi_to_frequency, NoteEvent, DEFAULT_CHORD_DURATION, DEFAULT_VELOCITY};
pub use self::voice::Voice;
pub use self::waveform::Waveform;
