//! Standard MIDI File (SMF) encoding for a single chord.
//!
//! Output is Format 0 with one track at 480 ticks per quarter note: a tempo
//! event, every chord tone starting together, all of them ending together
//! one 4/4 bar later, and the end-of-track marker.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::info;

use crate::error::ExportError;

pub const TICKS_PER_QUARTER: u16 = 480;
/// One bar of 4/4.
pub const CHORD_DURATION_TICKS: u32 = TICKS_PER_QUARTER as u32 * 4;
pub const NOTE_VELOCITY: u8 = 100;

const HEADER_MAGIC: &[u8; 4] = b"MThd";
const TRACK_MAGIC: &[u8; 4] = b"MTrk";
const MAX_TEMPO_MICROS: u32 = 0x00FF_FFFF;

/// What to export: a chord as pitch classes, placed relative to its root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChordExportSpec {
    /// Root pitch class, 0-11 (C = 0).
    pub root_pitch_class: u8,
    /// Chord tones as pitch classes, 0-11. Order is kept; duplicates are ignored.
    pub pitch_classes: Vec<u8>,
    /// Octave of the root in scientific numbering (C4 = MIDI 60).
    pub octave: i8,
    pub tempo_bpm: f64,
}

impl ChordExportSpec {
    pub fn new(root_pitch_class: u8, pitch_classes: Vec<u8>, octave: i8, tempo_bpm: f64) -> Self {
        Self {
            root_pitch_class,
            pitch_classes,
            octave,
            tempo_bpm,
        }
    }
}

/// Places each chord tone in the root's octave, raising any tone that would
/// fall below the root by an octave so the chord sounds at or above it.
pub fn resolve_pitches(spec: &ChordExportSpec) -> Result<Vec<u8>, ExportError> {
    if spec.root_pitch_class > 11 {
        return Err(ExportError::InvalidPitchClass(spec.root_pitch_class));
    }
    if spec.pitch_classes.is_empty() {
        return Err(ExportError::EmptyChord);
    }

    let octave_base = (spec.octave as i32 + 1) * 12;
    let root = spec.root_pitch_class as i32 + octave_base;

    let mut seen = [false; 12];
    let mut pitches = Vec::with_capacity(spec.pitch_classes.len());
    for &pitch_class in &spec.pitch_classes {
        if pitch_class > 11 {
            return Err(ExportError::InvalidPitchClass(pitch_class));
        }
        if std::mem::replace(&mut seen[pitch_class as usize], true) {
            continue;
        }
        let mut pitch = pitch_class as i32 + octave_base;
        if pitch < root {
            pitch += 12;
        }
        let pitch = u8::try_from(pitch)
            .ok()
            .filter(|p| *p <= 127)
            .ok_or(ExportError::PitchOutOfRange(pitch))?;
        pitches.push(pitch);
    }
    Ok(pitches)
}

/// Microseconds per quarter note for `bpm`, rounded to the nearest integer.
pub fn tempo_micros(bpm: f64) -> Result<u32, ExportError> {
    if !bpm.is_finite() || bpm <= 0.0 {
        return Err(ExportError::InvalidTempo(bpm));
    }
    let micros = (60_000_000.0 / bpm).round();
    if micros < 1.0 || micros > MAX_TEMPO_MICROS as f64 {
        return Err(ExportError::InvalidTempo(bpm));
    }
    Ok(micros as u32)
}

/// Appends `value` as a variable-length quantity: seven bits per byte, most
/// significant group first, continuation bit set on every byte but the last.
///
/// SMF limits delta times to 0x0FFF_FFFF (four bytes); larger values encode
/// to five bytes.
pub fn write_vlq(value: u32, buffer: &mut Vec<u8>) {
    let mut groups = [0u8; 5];
    let mut count = 0;
    let mut rest = value;
    loop {
        groups[count] = (rest & 0x7F) as u8;
        count += 1;
        rest >>= 7;
        if rest == 0 {
            break;
        }
    }
    for i in (0..count).rev() {
        let continuation = if i > 0 { 0x80 } else { 0x00 };
        buffer.push(groups[i] | continuation);
    }
}

pub fn encode_vlq(value: u32) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(5);
    write_vlq(value, &mut bytes);
    bytes
}

enum TrackEvent {
    SetTempo { micros_per_quarter: u32 },
    NoteOn { pitch: u8, velocity: u8 },
    NoteOff { pitch: u8 },
    EndOfTrack,
}

impl TrackEvent {
    fn write(&self, buffer: &mut Vec<u8>) {
        match *self {
            TrackEvent::SetTempo { micros_per_quarter } => {
                buffer.extend_from_slice(&[0xFF, 0x51, 0x03]);
                buffer.extend_from_slice(&micros_per_quarter.to_be_bytes()[1..]);
            }
            // Channel 1
            TrackEvent::NoteOn { pitch, velocity } => {
                buffer.extend_from_slice(&[0x90, pitch, velocity])
            }
            TrackEvent::NoteOff { pitch } => buffer.extend_from_slice(&[0x80, pitch, 0]),
            TrackEvent::EndOfTrack => buffer.extend_from_slice(&[0xFF, 0x2F, 0x00]),
        }
    }
}

fn chord_events(pitches: &[u8], micros_per_quarter: u32) -> Vec<(u32, TrackEvent)> {
    let mut events = Vec::with_capacity(pitches.len() * 2 + 2);
    events.push((0, TrackEvent::SetTempo { micros_per_quarter }));
    for &pitch in pitches {
        events.push((
            0,
            TrackEvent::NoteOn {
                pitch,
                velocity: NOTE_VELOCITY,
            },
        ));
    }
    for (i, &pitch) in pitches.iter().enumerate() {
        let delta = if i == 0 { CHORD_DURATION_TICKS } else { 0 };
        events.push((delta, TrackEvent::NoteOff { pitch }));
    }
    events.push((0, TrackEvent::EndOfTrack));
    events
}

fn write_chunk(magic: &[u8; 4], body: &[u8], buffer: &mut Vec<u8>) {
    buffer.extend_from_slice(magic);
    buffer.extend_from_slice(&(body.len() as u32).to_be_bytes());
    buffer.extend_from_slice(body);
}

/// Serializes the chord into a complete SMF byte buffer.
pub fn encode_chord(spec: &ChordExportSpec) -> Result<Vec<u8>, ExportError> {
    let pitches = resolve_pitches(spec)?;
    let micros = tempo_micros(spec.tempo_bpm)?;

    let mut track = Vec::new();
    for (delta, event) in chord_events(&pitches, micros) {
        write_vlq(delta, &mut track);
        event.write(&mut track);
    }

    let mut header = Vec::with_capacity(6);
    header.extend_from_slice(&0u16.to_be_bytes()); // format 0
    header.extend_from_slice(&1u16.to_be_bytes()); // one track
    header.extend_from_slice(&TICKS_PER_QUARTER.to_be_bytes());

    let mut file = Vec::with_capacity(14 + 8 + track.len());
    write_chunk(HEADER_MAGIC, &header, &mut file);
    write_chunk(TRACK_MAGIC, &track, &mut file);
    Ok(file)
}

/// Encodes the chord and writes it to `<file_name>.mid`, returning the path.
pub fn export_chord(spec: &ChordExportSpec, file_name: &str) -> Result<PathBuf, ExportError> {
    let bytes = encode_chord(spec)?;
    let path = PathBuf::from(format!("{}.mid", file_name));
    std::fs::write(&path, &bytes).map_err(|source| ExportError::Io {
        path: path.clone(),
        source,
    })?;
    info!("Exported chord to {} ({} bytes)", path.display(), bytes.len());
    Ok(path)
}
