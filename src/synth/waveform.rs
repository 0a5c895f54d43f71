use serde::{Deserialize, Serialize};
use std::f32::consts::{PI, TAU};
use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

/// Oscillator shapes available to new voices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Waveform {
    Sine,
    Square,
    Sawtooth,
    #[default]
    Triangle,
}

impl Waveform {
    pub const ALL: [Waveform; 4] = [
        Waveform::Sine,
        Waveform::Square,
        Waveform::Sawtooth,
        Waveform::Triangle,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Waveform::Sine => "sine",
            Waveform::Square => "square",
            Waveform::Sawtooth => "sawtooth",
            Waveform::Triangle => "triangle",
        }
    }

    /// Evaluates the waveform at `phase` radians. Output is in [-1, 1].
    pub fn evaluate(&self, phase: f32) -> f32 {
        match self {
            Waveform::Sine => phase.sin(),
            Waveform::Square => {
                if phase.sin() >= 0.0 {
                    1.0
                } else {
                    -1.0
                }
            }
            Waveform::Sawtooth => {
                let cycles = phase / TAU;
                2.0 * (cycles - (cycles + 0.5).floor())
            }
            Waveform::Triangle => ((2.0 / PI) * phase.sin().asin()).clamp(-1.0, 1.0),
        }
    }
}

impl fmt::Display for Waveform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Waveform {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Waveform::ALL
            .iter()
            .copied()
            .find(|w| w.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ConfigError::UnknownWaveform(s.to_string()))
    }
}

/// Phase-accumulating generator for a single voice.
#[derive(Debug, Clone)]
pub struct WaveformGenerator {
    waveform: Waveform,
    frequency: f32,
    phase: f32,
}

impl WaveformGenerator {
    pub fn new(waveform: Waveform, frequency: f32) -> Self {
        Self {
            waveform,
            frequency,
            phase: 0.0,
        }
    }

    pub fn waveform(&self) -> Waveform {
        self.waveform
    }

    pub fn frequency(&self) -> f32 {
        self.frequency
    }

    /// Produces the next sample and advances the phase by one frame.
    pub fn next_sample(&mut self, sample_rate: f32) -> f32 {
        let sample = self.waveform.evaluate(self.phase);
        self.phase += TAU * self.frequency / sample_rate;
        // Keep phase bounded so f32 precision does not degrade on long notes
        if self.phase >= TAU {
            self.phase %= TAU;
        }
        sample
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_names_case_insensitively() {
        assert_eq!("Sine".parse::<Waveform>().unwrap(), Waveform::Sine);
        assert_eq!(" sawtooth ".parse::<Waveform>().unwrap(), Waveform::Sawtooth);
        assert!("noise".parse::<Waveform>().is_err());
    }

    #[test]
    fn shapes_stay_in_unit_range() {
        for waveform in Waveform::ALL {
            let mut gen = WaveformGenerator::new(waveform, 441.0);
            for _ in 0..2000 {
                let s = gen.next_sample(44_100.0);
                assert!((-1.0..=1.0).contains(&s), "{waveform} produced {s}");
            }
        }
    }

    #[test]
    fn square_and_sine_agree_on_sign() {
        for i in 1..16 {
            let phase = i as f32 * 0.37;
            let sine = Waveform::Sine.evaluate(phase);
            let square = Waveform::Square.evaluate(phase);
            assert_eq!(sine >= 0.0, square > 0.0);
        }
    }

    #[test]
    fn serialises_lowercase() {
        let json = serde_json::to_string(&Waveform::Triangle).unwrap();
        assert_eq!(json, "\"triangle\"");
    }
}
