use std::collections::HashMap;

use tracing::{debug, trace};

use super::config::{clamp_volume, EngineConfig, EngineSettings};
use super::envelope::{EnvelopePatch, EnvelopeSettings, ParamTimeline};
use super::note::DEFAULT_VELOCITY;
use super::voice::Voice;
use super::waveform::Waveform;

/// Smoothing window for master volume changes, in seconds.
pub const VOLUME_RAMP_SECONDS: f64 = 0.05;

const DEFAULT_SAMPLE_RATE: f32 = 44_100.0;

/// The polyphonic engine: master gain, shared config and the voice map.
///
/// Time is the audio clock, advanced only by `process`. All scheduling
/// (envelopes, releases, volume ramps) is anchored at `current_time()`.
pub struct Synth {
    /// Assignable voices, at most one per pitch.
    voices: HashMap<u8, Voice>,
    /// Released voices still fading out until their stop time.
    tails: Vec<Voice>,
    config: EngineConfig,
    envelope: EnvelopeSettings,
    master_gain: ParamTimeline,
    frames_rendered: u64,
    sample_rate: f32,
    scratch: Vec<f32>,
}

impl Synth {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settings(settings: EngineSettings) -> Self {
        let config = EngineConfig {
            volume: clamp_volume(settings.engine.volume),
            ..settings.engine
        };
        let mut master_gain = ParamTimeline::new(config.volume);
        master_gain.set_value_at_time(config.volume, 0.0);
        Self {
            voices: HashMap::new(),
            tails: Vec::new(),
            config,
            envelope: settings.envelope.sanitized(),
            master_gain,
            frames_rendered: 0,
            sample_rate: DEFAULT_SAMPLE_RATE,
            scratch: Vec::new(),
        }
    }

    /// Current audio clock time in seconds.
    pub fn current_time(&self) -> f64 {
        self.frames_rendered as f64 / self.sample_rate as f64
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Changes the rate used to convert frames to seconds. The clock position is kept.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        if sample_rate <= 0.0 || sample_rate == self.sample_rate {
            return;
        }
        let now = self.current_time();
        self.sample_rate = sample_rate;
        self.frames_rendered = (now * sample_rate as f64).round() as u64;
        debug!("Sample rate set to {}", sample_rate);
    }

    /// Starts a voice for `pitch`. An existing voice for the same pitch is cut first.
    pub fn note_on(&mut self, pitch: u8, velocity: u8) {
        if pitch > 127 {
            return;
        }
        let now = self.current_time();
        if let Some(previous) = self.voices.remove(&pitch) {
            debug!("Retrigger: cutting voice for note {}", previous.pitch);
            drop(previous);
        }
        let voice = Voice::start(pitch, velocity, self.config.waveform, &self.envelope, now);
        debug!(
            "Voice started: note {} ({:.2} Hz, {}) at {:.3}s",
            pitch,
            voice.frequency(),
            voice.waveform(),
            now
        );
        self.voices.insert(pitch, voice);
    }

    /// Releases the voice for `pitch`. The pitch becomes assignable immediately;
    /// the audio fades out over the release time.
    pub fn note_off(&mut self, pitch: u8) {
        let Some(mut voice) = self.voices.remove(&pitch) else {
            return;
        };
        let now = self.current_time();
        let stop = voice.release(now, self.envelope.release);
        debug!("Voice released: note {} fading until {:.3}s", pitch, stop);
        self.tails.push(voice);
    }

    pub fn play_notes(&mut self, pitches: &[u8]) {
        for &pitch in pitches {
            self.note_on(pitch, DEFAULT_VELOCITY);
        }
    }

    pub fn release_notes(&mut self, pitches: &[u8]) {
        for &pitch in pitches {
            self.note_off(pitch);
        }
    }

    /// Ramps the master gain to `volume` over `VOLUME_RAMP_SECONDS`.
    pub fn set_volume(&mut self, volume: f32) {
        let volume = clamp_volume(volume);
        self.config.volume = volume;
        let now = self.current_time();
        let current = self.master_gain.value_at(now);
        self.master_gain.cancel_scheduled_values(now);
        self.master_gain.set_value_at_time(current, now);
        self.master_gain
            .linear_ramp_to_value_at_time(volume, now + VOLUME_RAMP_SECONDS);
        debug!("Master volume ramping {:.2} -> {:.2}", current, volume);
    }

    pub fn set_waveform(&mut self, waveform: Waveform) {
        self.config.waveform = waveform;
        debug!("Waveform set to {}", waveform);
    }

    pub fn set_envelope(&mut self, patch: EnvelopePatch) {
        self.envelope.apply(patch);
        debug!("Envelope set to {:?}", self.envelope);
    }

    pub fn config(&self) -> EngineConfig {
        self.config
    }

    pub fn envelope(&self) -> EnvelopeSettings {
        self.envelope
    }

    /// Master gain value at the current clock time.
    pub fn master_gain(&self) -> f32 {
        self.master_gain.value_at(self.current_time())
    }

    pub fn master_gain_at(&self, time: f64) -> f32 {
        self.master_gain.value_at(time)
    }

    pub fn has_voice(&self, pitch: u8) -> bool {
        self.voices.contains_key(&pitch)
    }

    pub fn voice(&self, pitch: u8) -> Option<&Voice> {
        self.voices.get(&pitch)
    }

    /// Pitches that currently hold an assignable voice, in ascending order.
    pub fn active_pitches(&self) -> Vec<u8> {
        let mut pitches: Vec<u8> = self.voices.keys().copied().collect();
        pitches.sort_unstable();
        pitches
    }

    pub fn voice_count(&self) -> usize {
        self.voices.len()
    }

    /// Number of released voices still fading out.
    pub fn tail_count(&self) -> usize {
        self.tails.len()
    }

    /// Immediately silences and drops every voice, including fading tails.
    pub fn silence_all(&mut self) {
        let dropped = self.voices.len() + self.tails.len();
        self.voices.clear();
        self.tails.clear();
        if dropped > 0 {
            debug!("Silenced {} voices", dropped);
        }
    }

    /// Renders a mono block at `sample_rate`, advancing the audio clock.
    pub fn process(&mut self, output: &mut [f32], sample_rate: f32) {
        self.set_sample_rate(sample_rate);
        let start = self.current_time();
        let frame = 1.0 / self.sample_rate as f64;

        self.scratch.clear();
        self.scratch.resize(output.len(), 0.0);
        for voice in self.voices.values_mut().chain(self.tails.iter_mut()) {
            voice.render(&mut self.scratch, start, self.sample_rate);
        }

        for (i, (out, mixed)) in output.iter_mut().zip(self.scratch.iter()).enumerate() {
            let gain = self.master_gain.value_at(start + i as f64 * frame);
            // Clip the way an output destination would
            *out = (mixed * gain).clamp(-1.0, 1.0);
        }

        self.frames_rendered += output.len() as u64;
        let now = self.current_time();
        self.master_gain.prune_before(start);

        let before = self.tails.len();
        self.tails.retain(|voice| !voice.is_finished(now));
        if self.tails.len() != before {
            trace!("{} voice tails finished", before - self.tails.len());
        }
    }
}

impl Default for Synth {
    fn default() -> Self {
        Self::with_settings(EngineSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATE: f32 = 1000.0;

    fn advance(synth: &mut Synth, seconds: f32) {
        let mut buffer = vec![0.0; (seconds * RATE) as usize];
        synth.process(&mut buffer, RATE);
    }

    #[test]
    fn clock_advances_with_rendered_frames() {
        let mut synth = Synth::new();
        advance(&mut synth, 0.0);
        assert_eq!(synth.current_time(), 0.0);
        advance(&mut synth, 0.5);
        assert!((synth.current_time() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn note_on_uses_waveform_at_creation() {
        let mut synth = Synth::new();
        synth.set_waveform(Waveform::Sawtooth);
        synth.note_on(60, 100);
        synth.set_waveform(Waveform::Sine);
        synth.note_on(64, 100);

        assert_eq!(synth.voice(60).unwrap().waveform(), Waveform::Sawtooth);
        assert_eq!(synth.voice(64).unwrap().waveform(), Waveform::Sine);
    }

    #[test]
    fn released_tail_is_dropped_after_stop_time() {
        let mut synth = Synth::new();
        synth.set_envelope(EnvelopePatch::default().release(0.2));
        synth.note_on(60, 100);
        advance(&mut synth, 0.1);
        synth.note_off(60);

        assert!(!synth.has_voice(60));
        assert_eq!(synth.tail_count(), 1);
        advance(&mut synth, 0.1);
        assert_eq!(synth.tail_count(), 1);
        advance(&mut synth, 0.15);
        assert_eq!(synth.tail_count(), 0);
    }

    #[test]
    fn volume_ramps_over_smoothing_window() {
        let mut synth = Synth::new();
        advance(&mut synth, 1.0);
        synth.set_volume(0.0);

        let now = synth.current_time();
        assert!((synth.master_gain() - 0.8).abs() < 1e-6);
        assert!((synth.master_gain_at(now + 0.025) - 0.4).abs() < 1e-3);
        assert_eq!(synth.master_gain_at(now + VOLUME_RAMP_SECONDS), 0.0);
        assert_eq!(synth.config().volume, 0.0);
    }

    #[test]
    fn volume_is_clamped() {
        let mut synth = Synth::new();
        synth.set_volume(4.0);
        assert_eq!(synth.config().volume, 1.0);
        synth.set_volume(-1.0);
        assert_eq!(synth.config().volume, 0.0);
    }

    #[test]
    fn output_is_audible_and_bounded() {
        let mut synth = Synth::new();
        synth.set_volume(1.0);
        synth.play_notes(&[60, 64, 67, 72, 76]);
        let mut buffer = vec![0.0; 2000];
        synth.process(&mut buffer, RATE * 10.0);

        assert!(buffer.iter().any(|s| s.abs() > 0.01));
        assert!(buffer.iter().all(|s| (-1.0..=1.0).contains(s)));
    }

    #[test]
    fn silence_all_clears_everything() {
        let mut synth = Synth::new();
        synth.play_notes(&[60, 62]);
        synth.note_off(62);
        synth.silence_all();
        assert_eq!(synth.voice_count(), 0);
        assert_eq!(synth.tail_count(), 0);
    }
}
