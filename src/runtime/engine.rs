use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tracing::{debug, info, warn};

use super::chord::ChordHandle;
use crate::audio::{AudioBackend, SharedSynth};
use crate::synth::{
    EngineConfig, EngineSettings, EnvelopePatch, EnvelopeSettings, NoteEvent, Synth, Waveform,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// The output device has not been opened yet.
    Uninitialized,
    Running,
    /// Opening the output device failed; every operation is a no-op.
    Failed,
    /// `shutdown` was called.
    Closed,
}

/// The synthesis engine as seen by UI wiring.
///
/// The output device is opened lazily by the first `initialize`, `note_on` or
/// `play_chord`. If that fails, the engine stays silent and every call is a
/// no-op; callers never need to check its health.
pub struct SynthEngine {
    synth: SharedSynth,
    backend: Box<dyn AudioBackend>,
    state: EngineState,
}

impl SynthEngine {
    pub fn new(backend: impl AudioBackend + 'static) -> Self {
        Self::with_settings(backend, EngineSettings::default())
    }

    pub fn with_settings(backend: impl AudioBackend + 'static, settings: EngineSettings) -> Self {
        Self {
            synth: Arc::new(Mutex::new(Synth::with_settings(settings))),
            backend: Box::new(backend),
            state: EngineState::Uninitialized,
        }
    }

    /// Engine on the default output device.
    #[cfg(feature = "native")]
    pub fn native(settings: EngineSettings) -> Self {
        Self::with_settings(crate::audio::CpalBackend::new(), settings)
    }

    /// Opens the output device if needed. Returns whether the engine can play.
    pub fn initialize(&mut self) -> bool {
        match self.state {
            EngineState::Running => true,
            EngineState::Failed | EngineState::Closed => false,
            EngineState::Uninitialized => match self.backend.start(Arc::clone(&self.synth)) {
                Ok(()) => {
                    info!("Audio engine started");
                    self.state = EngineState::Running;
                    true
                }
                Err(e) => {
                    warn!("Audio output is not available, engine disabled: {}", e);
                    self.state = EngineState::Failed;
                    false
                }
            },
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn is_initialized(&self) -> bool {
        self.state == EngineState::Running
    }

    pub fn is_suspended(&self) -> bool {
        self.is_initialized() && self.backend.is_suspended()
    }

    pub fn note_on(&mut self, pitch: u8, velocity: u8) {
        if !self.initialize() {
            return;
        }
        self.lock().note_on(pitch, velocity);
    }

    pub fn note_off(&mut self, pitch: u8) {
        if !self.is_initialized() {
            return;
        }
        self.lock().note_off(pitch);
    }

    /// Dispatches a note event to `note_on` or `note_off`.
    pub fn handle_event(&mut self, event: &NoteEvent) {
        if event.is_on {
            self.note_on(event.note_number, event.velocity);
        } else {
            self.note_off(event.note_number);
        }
    }

    /// Starts every pitch now at `DEFAULT_VELOCITY` and releases them all after
    /// `duration` of wall-clock time (`DEFAULT_CHORD_DURATION` is the usual choice).
    ///
    /// The release is not tied to the returned handle's lifetime; drop it for
    /// fire-and-forget playback or keep it to cancel the release.
    pub fn play_chord(&mut self, pitches: &[u8], duration: Duration) -> ChordHandle {
        if !self.initialize() {
            return ChordHandle::inert(pitches.to_vec());
        }
        self.lock().play_notes(pitches);
        debug!("Chord {:?} held for {:?}", pitches, duration);
        ChordHandle::schedule(Arc::clone(&self.synth), pitches.to_vec(), duration)
    }

    /// Ramps the master gain to `volume` (clamped to [0, 1]) over a short window.
    pub fn set_volume(&mut self, volume: f32) {
        if self.is_unavailable() {
            return;
        }
        self.lock().set_volume(volume);
    }

    /// Applies to voices started after this call.
    pub fn set_waveform(&mut self, waveform: Waveform) {
        if self.is_unavailable() {
            return;
        }
        self.lock().set_waveform(waveform);
    }

    /// Applies to voices started after this call.
    pub fn set_adsr(&mut self, patch: EnvelopePatch) {
        if self.is_unavailable() {
            return;
        }
        self.lock().set_envelope(patch);
    }

    /// Gets a suspended output device playing again. Idempotent.
    pub fn resume(&mut self) {
        if !self.is_initialized() || !self.backend.is_suspended() {
            return;
        }
        match self.backend.resume() {
            Ok(()) => info!("Audio output resumed"),
            Err(e) => warn!("Failed to resume audio output: {}", e),
        }
    }

    pub fn suspend(&mut self) {
        if !self.is_initialized() || self.backend.is_suspended() {
            return;
        }
        if let Err(e) = self.backend.suspend() {
            warn!("Failed to suspend audio output: {}", e);
        }
    }

    /// Stops the output device and drops every voice. Later calls are no-ops.
    pub fn shutdown(&mut self) {
        if self.state == EngineState::Closed {
            return;
        }
        self.backend.stop();
        self.lock().silence_all();
        self.state = EngineState::Closed;
        info!("Audio engine shut down");
    }

    pub fn config(&self) -> EngineConfig {
        self.lock().config()
    }

    pub fn envelope(&self) -> EnvelopeSettings {
        self.lock().envelope()
    }

    /// Pitches that currently hold a voice.
    pub fn active_pitches(&self) -> Vec<u8> {
        self.lock().active_pitches()
    }

    /// The shared engine model, as rendered by the backend.
    pub fn synth(&self) -> SharedSynth {
        Arc::clone(&self.synth)
    }

    fn is_unavailable(&self) -> bool {
        matches!(self.state, EngineState::Failed | EngineState::Closed)
    }

    fn lock(&self) -> MutexGuard<'_, Synth> {
        self.synth.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for SynthEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}
