//! Error types for each subsystem.
//!
//! Engine and router entry points swallow these after logging them; they are
//! surfaced directly only by the lower-level building blocks and the exporter.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("no audio output device available")]
    NoOutputDevice,
    #[error("unsupported sample format: {0}")]
    UnsupportedSampleFormat(String),
    #[error("audio device error: {0}")]
    Device(String),
    #[error("audio stream error: {0}")]
    Stream(String),
    #[error("audio backend has not been started")]
    NotStarted,
}

#[derive(Debug, Error)]
pub enum MidiError {
    #[error("MIDI access unavailable: {0}")]
    Unavailable(String),
    #[error("MIDI port {0} not found")]
    PortNotFound(String),
    #[error("failed to connect to MIDI port {port}: {reason}")]
    Connection { port: String, reason: String },
    #[error("note number {0} is outside the MIDI range 0-127")]
    NoteOutOfRange(u8),
    #[error("velocity {0} is outside the MIDI range 0-127")]
    VelocityOutOfRange(u8),
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("chord has no pitch classes")]
    EmptyChord,
    #[error("pitch class {0} is outside 0-11")]
    InvalidPitchClass(u8),
    #[error("resolved pitch {0} is outside the MIDI range 0-127")]
    PitchOutOfRange(i32),
    #[error("tempo {0} BPM cannot be encoded")]
    InvalidTempo(f64),
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown waveform: {0}")]
    UnknownWaveform(String),
    #[error("invalid settings: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
