use std::time::Duration;

use crate::error::MidiError;

/// MIDI status nibble for a note-on message.
pub const NOTE_ON_STATUS: u8 = 0x90;
/// MIDI status nibble for a note-off message.
pub const NOTE_OFF_STATUS: u8 = 0x80;
/// Velocity used when a caller does not specify one.
pub const DEFAULT_VELOCITY: u8 = 100;
/// How long a chord is held when a caller does not specify a duration.
pub const DEFAULT_CHORD_DURATION: Duration = Duration::from_secs(1);

/// Equal-tempered frequency for a MIDI note number, with A4 (69) at 440 Hz.
pub fn midi_to_frequency(note: u8) -> f32 {
    440.0 * 2f32.powf((note as f32 - 69.0) / 12.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoteEvent {
    pub note_number: u8,
    pub velocity: u8,
    pub is_on: bool,
}

impl NoteEvent {
    pub fn new(note_number: u8, velocity: u8, is_on: bool) -> Result<Self, MidiError> {
        if note_number > 127 {
            return Err(MidiError::NoteOutOfRange(note_number));
        }
        if velocity > 127 {
            return Err(MidiError::VelocityOutOfRange(velocity));
        }
        Ok(Self {
            note_number,
            velocity,
            is_on,
        })
    }

    /// Interprets a raw `(status, note, velocity)` triplet as forwarded by the MIDI router.
    ///
    /// Note-on with velocity 0 is a note-off. Any channel is accepted. Messages that
    /// are not note messages yield `None`.
    pub fn from_midi(status: u8, note: u8, velocity: u8) -> Option<Self> {
        let kind = status & 0xF0;
        if kind == NOTE_ON_STATUS && velocity > 0 {
            Self::new(note, velocity, true).ok()
        } else if kind == NOTE_OFF_STATUS || kind == NOTE_ON_STATUS {
            Self::new(note, 0, false).ok()
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concert_pitch_references() {
        assert_eq!(midi_to_frequency(69), 440.0);
        assert!((midi_to_frequency(81) - 880.0).abs() < 1e-3);
        assert!((midi_to_frequency(57) - 220.0).abs() < 1e-3);
        assert!((midi_to_frequency(60) - 261.6256).abs() < 1e-3);
    }

    #[test]
    fn frequency_matches_formula_across_range() {
        for note in 0..=127u8 {
            let expected = 440.0 * 2f64.powf((note as f64 - 69.0) / 12.0);
            let actual = midi_to_frequency(note) as f64;
            assert!((actual - expected).abs() / expected < 1e-5, "note {note}");
        }
    }

    #[test]
    fn interprets_note_messages() {
        let on = NoteEvent::from_midi(0x90, 60, 100).unwrap();
        assert!(on.is_on);
        assert_eq!(on.velocity, 100);

        let off = NoteEvent::from_midi(0x80, 60, 64).unwrap();
        assert!(!off.is_on);

        let silent_on = NoteEvent::from_midi(0x93, 61, 0).unwrap();
        assert!(!silent_on.is_on);
        assert_eq!(silent_on.note_number, 61);

        assert!(NoteEvent::from_midi(0xB0, 1, 64).is_none());
        assert!(NoteEvent::from_midi(0x90, 200, 64).is_none());
    }

    #[test]
    fn rejects_values_outside_midi_range() {
        assert!(matches!(
            NoteEvent::new(128, 100, true),
            Err(MidiError::NoteOutOfRange(128))
        ));
        assert!(matches!(
            NoteEvent::new(60, 200, true),
            Err(MidiError::VelocityOutOfRange(200))
        ));
        assert_eq!(
            NoteEvent::new(127, 127, false).unwrap(),
            NoteEvent {
                note_number: 127,
                velocity: 127,
                is_on: false,
            }
        );
    }
}
