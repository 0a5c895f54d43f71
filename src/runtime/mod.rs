mod chord;
mod engine;

pub use self::chord::ChordHandle;
pub use self::engine::{EngineState, SynthEngine};
pub use crate::synth::note::{DEFAULT_CHORD_DURATION, DEFAULT_VELOCITY};
