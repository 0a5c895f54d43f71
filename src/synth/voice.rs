use super::envelope::{EnvelopeSettings, ParamTimeline};
use super::note::midi_to_frequency;
use super::waveform::{Waveform, WaveformGenerator};

/// One sounding pitch: an oscillator feeding its own gain envelope.
///
/// The oscillator and gain are owned exclusively by the voice and go away
/// with it. Once a release is scheduled the voice keeps rendering until its
/// stop time, then reports itself finished.
pub struct Voice {
    pub pitch: u8,
    oscillator: WaveformGenerator,
    gain: ParamTimeline,
    start_time: f64,
    stop_time: Option<f64>,
}

impl Voice {
    /// Starts a voice at `now`, scheduling attack and decay against the audio clock.
    ///
    /// The gain ramps linearly from 0 to `velocity / 127` over `attack`, then to
    /// `velocity / 127 * sustain` over `decay`, and holds there until released.
    pub fn start(
        pitch: u8,
        velocity: u8,
        waveform: Waveform,
        envelope: &EnvelopeSettings,
        now: f64,
    ) -> Self {
        let peak = velocity.min(127) as f32 / 127.0;
        let attack_end = now + envelope.attack as f64;
        let decay_end = attack_end + envelope.decay as f64;

        let mut gain = ParamTimeline::new(0.0);
        gain.set_value_at_time(0.0, now);
        gain.linear_ramp_to_value_at_time(peak, attack_end);
        gain.linear_ramp_to_value_at_time(peak * envelope.sustain, decay_end);

        Self {
            pitch,
            oscillator: WaveformGenerator::new(waveform, midi_to_frequency(pitch)),
            gain,
            start_time: now,
            stop_time: None,
        }
    }

    /// Replaces any pending ramps with a linear fade from the current level to
    /// silence over `release` seconds, and stops the oscillator when it ends.
    /// Returns the stop time.
    pub fn release(&mut self, now: f64, release: f32) -> f64 {
        let current = self.gain.value_at(now);
        let end = now + release.max(0.0) as f64;
        self.gain.cancel_scheduled_values(now);
        self.gain.set_value_at_time(current, now);
        self.gain.linear_ramp_to_value_at_time(0.0, end);
        self.stop_time = Some(end);
        end
    }

    /// Renders `output.len()` frames starting at clock time `start`, adding into `output`.
    pub fn render(&mut self, output: &mut [f32], start: f64, sample_rate: f32) {
        let frame = 1.0 / sample_rate as f64;
        for (i, sample) in output.iter_mut().enumerate() {
            let t = start + i as f64 * frame;
            if t < self.start_time {
                continue;
            }
            if self.stop_time.is_some_and(|stop| t >= stop) {
                break;
            }
            let wave = self.oscillator.next_sample(sample_rate);
            *sample += wave * self.gain.value_at(t);
        }
        self.gain.prune_before(start);
    }

    pub fn gain_at(&self, time: f64) -> f32 {
        self.gain.value_at(time)
    }

    pub fn waveform(&self) -> Waveform {
        self.oscillator.waveform()
    }

    pub fn frequency(&self) -> f32 {
        self.oscillator.frequency()
    }

    pub fn stop_time(&self) -> Option<f64> {
        self.stop_time
    }

    /// True once the oscillator has passed its scheduled stop time.
    pub fn is_finished(&self, now: f64) -> bool {
        self.stop_time.is_some_and(|stop| now >= stop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    #[test]
    fn envelope_shape_follows_settings() {
        let adsr = EnvelopeSettings::new(0.1, 0.2, 0.5, 0.3);
        let voice = Voice::start(69, 127, Waveform::Sine, &adsr, 1.0);

        assert!(approx(voice.gain_at(1.0), 0.0));
        assert!(approx(voice.gain_at(1.05), 0.5));
        assert!(approx(voice.gain_at(1.1), 1.0));
        assert!(approx(voice.gain_at(1.2), 0.75));
        assert!(approx(voice.gain_at(1.3), 0.5));
        assert!(approx(voice.gain_at(9.0), 0.5));
        assert!(approx(voice.frequency(), 440.0));
    }

    #[test]
    fn velocity_scales_peak_linearly() {
        let adsr = EnvelopeSettings::new(0.0, 0.0, 1.0, 0.0);
        let voice = Voice::start(60, 100, Waveform::Square, &adsr, 0.0);
        assert!(approx(voice.gain_at(0.5), 100.0 / 127.0));
    }

    #[test]
    fn release_mid_attack_starts_from_current_level() {
        let adsr = EnvelopeSettings::new(1.0, 0.0, 1.0, 0.5);
        let mut voice = Voice::start(60, 127, Waveform::Sine, &adsr, 0.0);

        let stop = voice.release(0.5, adsr.release);
        assert_eq!(stop, 1.0);
        assert!(approx(voice.gain_at(0.5), 0.5));
        assert!(approx(voice.gain_at(0.75), 0.25));
        assert!(approx(voice.gain_at(1.0), 0.0));
        assert!(!voice.is_finished(0.99));
        assert!(voice.is_finished(1.0));
    }

    #[test]
    fn render_is_silent_after_stop() {
        let adsr = EnvelopeSettings::new(0.0, 0.0, 1.0, 0.0);
        let mut voice = Voice::start(69, 127, Waveform::Square, &adsr, 0.0);
        voice.release(0.0, 0.0);

        let mut buffer = vec![0.0; 64];
        voice.render(&mut buffer, 0.0, 1000.0);
        assert!(buffer.iter().all(|s| *s == 0.0));
    }
}
