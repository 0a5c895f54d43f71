use serde::{Deserialize, Serialize};

/// Attack/decay/release durations in seconds and sustain as a fraction of peak.
///
/// Read by every new voice at creation; changing it never touches voices
/// that are already sounding.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvelopeSettings {
    pub attack: f32,
    pub decay: f32,
    pub sustain: f32,
    pub release: f32,
}

impl EnvelopeSettings {
    pub fn new(attack: f32, decay: f32, sustain: f32, release: f32) -> Self {
        Self {
            attack,
            decay,
            sustain,
            release,
        }
        .sanitized()
    }

    /// Applies the fields that are set in `patch`, leaving the others unchanged.
    pub fn apply(&mut self, patch: EnvelopePatch) {
        if let Some(attack) = patch.attack {
            self.attack = attack;
        }
        if let Some(decay) = patch.decay {
            self.decay = decay;
        }
        if let Some(sustain) = patch.sustain {
            self.sustain = sustain;
        }
        if let Some(release) = patch.release {
            self.release = release;
        }
        *self = self.sanitized();
    }

    /// Durations are clamped to >= 0 and sustain to [0, 1]; NaN falls back to 0.
    pub fn sanitized(self) -> Self {
        fn non_negative(v: f32) -> f32 {
            if v.is_finite() {
                v.max(0.0)
            } else {
                0.0
            }
        }
        Self {
            attack: non_negative(self.attack),
            decay: non_negative(self.decay),
            sustain: non_negative(self.sustain).min(1.0),
            release: non_negative(self.release),
        }
    }
}

impl Default for EnvelopeSettings {
    fn default() -> Self {
        Self {
            attack: 0.02,
            decay: 0.1,
            sustain: 0.8,
            release: 0.5,
        }
    }
}

/// Partial ADSR update. Unset fields keep their current value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvelopePatch {
    pub attack: Option<f32>,
    pub decay: Option<f32>,
    pub sustain: Option<f32>,
    pub release: Option<f32>,
}

impl EnvelopePatch {
    pub fn attack(mut self, seconds: f32) -> Self {
        self.attack = Some(seconds);
        self
    }

    pub fn decay(mut self, seconds: f32) -> Self {
        self.decay = Some(seconds);
        self
    }

    pub fn sustain(mut self, level: f32) -> Self {
        self.sustain = Some(level);
        self
    }

    pub fn release(mut self, seconds: f32) -> Self {
        self.release = Some(seconds);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ParamEvent {
    SetValue { time: f64, value: f32 },
    LinearRamp { time: f64, value: f32 },
}

impl ParamEvent {
    fn time(&self) -> f64 {
        match *self {
            ParamEvent::SetValue { time, .. } | ParamEvent::LinearRamp { time, .. } => time,
        }
    }

    fn value(&self) -> f32 {
        match *self {
            ParamEvent::SetValue { value, .. } | ParamEvent::LinearRamp { value, .. } => value,
        }
    }
}

/// A parameter whose value is driven by events scheduled against the audio clock.
///
/// Events are kept sorted by time. Scheduling is append-only apart from
/// `cancel_scheduled_values`, which is how a release replaces a pending
/// attack or decay.
#[derive(Debug, Clone)]
pub struct ParamTimeline {
    default_value: f32,
    events: Vec<ParamEvent>,
}

impl ParamTimeline {
    pub fn new(default_value: f32) -> Self {
        Self {
            default_value,
            events: Vec::new(),
        }
    }

    pub fn set_value_at_time(&mut self, value: f32, time: f64) {
        self.insert(ParamEvent::SetValue { time, value });
    }

    pub fn linear_ramp_to_value_at_time(&mut self, value: f32, time: f64) {
        self.insert(ParamEvent::LinearRamp { time, value });
    }

    /// Drops every event scheduled at or after `time`.
    pub fn cancel_scheduled_values(&mut self, time: f64) {
        self.events.retain(|e| e.time() < time);
    }

    pub fn value_at(&self, time: f64) -> f32 {
        let next_index = self.events.partition_point(|e| e.time() <= time);
        let previous = next_index.checked_sub(1).map(|i| self.events[i]);
        let (start_time, start_value) = match previous {
            Some(event) => (event.time(), event.value()),
            None => (f64::NEG_INFINITY, self.default_value),
        };

        match self.events.get(next_index) {
            Some(&ParamEvent::LinearRamp {
                time: end_time,
                value: end_value,
            }) if start_time.is_finite() => {
                let span = end_time - start_time;
                if span <= 0.0 {
                    return end_value;
                }
                let progress = ((time - start_time) / span) as f32;
                start_value + (end_value - start_value) * progress
            }
            _ => start_value,
        }
    }

    /// Time of the last scheduled event, if any.
    pub fn end_time(&self) -> Option<f64> {
        self.events.last().map(ParamEvent::time)
    }

    /// Collapses events that lie entirely before `time` into a single
    /// set-value event so long-lived parameters do not grow without bound.
    pub fn prune_before(&mut self, time: f64) {
        let settled = self.events.partition_point(|e| e.time() <= time);
        if settled < 2 {
            return;
        }
        let last = self.events[settled - 1];
        self.events.drain(..settled);
        self.events.insert(
            0,
            ParamEvent::SetValue {
                time: last.time(),
                value: last.value(),
            },
        );
    }

    pub fn scheduled_len(&self) -> usize {
        self.events.len()
    }

    fn insert(&mut self, event: ParamEvent) {
        // Events at the same time keep insertion order
        let index = self.events.partition_point(|e| e.time() <= event.time());
        self.events.insert(index, event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-5
    }

    #[test]
    fn default_value_before_any_event() {
        let param = ParamTimeline::new(0.25);
        assert_eq!(param.value_at(10.0), 0.25);
    }

    #[test]
    fn attack_and_decay_ramps() {
        let mut gain = ParamTimeline::new(0.0);
        gain.set_value_at_time(0.0, 1.0);
        gain.linear_ramp_to_value_at_time(1.0, 1.5);
        gain.linear_ramp_to_value_at_time(0.5, 2.5);

        assert!(approx(gain.value_at(1.0), 0.0));
        assert!(approx(gain.value_at(1.25), 0.5));
        assert!(approx(gain.value_at(1.5), 1.0));
        assert!(approx(gain.value_at(2.0), 0.75));
        assert!(approx(gain.value_at(2.5), 0.5));
        assert!(approx(gain.value_at(30.0), 0.5));
    }

    #[test]
    fn cancel_then_release_from_snapshot() {
        let mut gain = ParamTimeline::new(0.0);
        gain.set_value_at_time(0.0, 0.0);
        gain.linear_ramp_to_value_at_time(1.0, 1.0);

        let now = 0.5;
        let snapshot = gain.value_at(now);
        gain.cancel_scheduled_values(now);
        gain.set_value_at_time(snapshot, now);
        gain.linear_ramp_to_value_at_time(0.0, now + 0.5);

        assert!(approx(gain.value_at(0.5), 0.5));
        assert!(approx(gain.value_at(0.75), 0.25));
        assert!(approx(gain.value_at(1.0), 0.0));
        assert_eq!(gain.end_time(), Some(1.0));
    }

    #[test]
    fn zero_length_ramp_jumps_to_target() {
        let mut gain = ParamTimeline::new(0.0);
        gain.set_value_at_time(0.0, 2.0);
        gain.linear_ramp_to_value_at_time(0.8, 2.0);
        assert!(approx(gain.value_at(2.0), 0.8));
    }

    #[test]
    fn prune_keeps_current_value() {
        let mut gain = ParamTimeline::new(0.0);
        gain.set_value_at_time(0.0, 0.0);
        gain.linear_ramp_to_value_at_time(1.0, 0.1);
        gain.linear_ramp_to_value_at_time(0.6, 0.2);
        gain.linear_ramp_to_value_at_time(0.0, 5.0);

        let before = gain.value_at(3.0);
        gain.prune_before(3.0);
        assert_eq!(gain.scheduled_len(), 2);
        assert!(approx(gain.value_at(3.0), before));
    }

    #[test]
    fn patch_only_touches_set_fields() {
        let mut adsr = EnvelopeSettings::default();
        adsr.apply(EnvelopePatch::default().attack(0.3).sustain(1.7));
        assert_eq!(adsr.attack, 0.3);
        assert_eq!(adsr.sustain, 1.0);
        assert_eq!(adsr.decay, EnvelopeSettings::default().decay);
        assert_eq!(adsr.release, EnvelopeSettings::default().release);
    }

    #[test]
    fn negative_durations_clamp_to_zero() {
        let adsr = EnvelopeSettings::new(-1.0, f32::NAN, 0.5, 0.2);
        assert_eq!(adsr.attack, 0.0);
        assert_eq!(adsr.decay, 0.0);
    }
}
