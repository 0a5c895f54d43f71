//! Chord export to Standard MIDI Files.

mod smf;

pub use self::smf::{
    encode_chord, encode_vlq, export_chord, resolve_pitches, tempo_micros, write_vlq,
    ChordExportSpec, CHORD_DURATION_TICKS, NOTE_VELOCITY, TICKS_PER_QUARTER,
};
