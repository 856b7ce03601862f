//! Tone parameters and their clamping rules.
//!
//! `ToneParameters` is a small `Copy` value. The only ways to obtain one are
//! the clamping constructor and the `with_*` updaters, so an out-of-range
//! frequency or delay can't be represented.

use crate::dsp::m_round;

/// Lowest playable tone (Hz).
pub const MIN_FREQUENCY_HZ: f64 = 100.0;
/// Highest playable tone (Hz).
pub const MAX_FREQUENCY_HZ: f64 = 4000.0;
/// Tone the generator starts at (Hz).
pub const DEFAULT_FREQUENCY_HZ: f64 = 500.0;

/// Shortest echo delay, in samples.
pub const MIN_DELAY_SAMPLES: u32 = 0;
/// Longest echo delay, in samples.
pub const MAX_DELAY_SAMPLES: u32 = 441;

/// Delay deltas are scaled down by this factor before being applied, so a
/// large gesture maps onto a coarse sample step.
pub const DELAY_DELTA_DIVISOR: f64 = 10.0;

/// Frequency, echo delay and play flag as one consistent unit.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ToneParameters {
    frequency_hz: f64,
    delay_samples: u32,
    playing: bool,
}

impl Default for ToneParameters {
    fn default() -> Self {
        Self::new(DEFAULT_FREQUENCY_HZ, MIN_DELAY_SAMPLES)
    }
}

impl ToneParameters {
    /// Paused parameters with `frequency_hz` and `delay_samples` clamped into range.
    /// A non-finite frequency falls back to the default tone.
    #[must_use]
    pub fn new(frequency_hz: f64, delay_samples: u32) -> Self {
        let frequency_hz = if frequency_hz.is_finite() { frequency_hz } else { DEFAULT_FREQUENCY_HZ };
        Self {
            frequency_hz: clamp_frequency(frequency_hz),
            delay_samples: delay_samples.clamp(MIN_DELAY_SAMPLES, MAX_DELAY_SAMPLES),
            playing: false,
        }
    }

    #[inline] #[must_use] pub fn frequency_hz(&self) -> f64 { self.frequency_hz }
    #[inline] #[must_use] pub fn delay_samples(&self) -> u32 { self.delay_samples }
    #[inline] #[must_use] pub fn is_playing(&self) -> bool { self.playing }

    /// Add `delta` Hz, then clamp. Non-finite deltas leave the value unchanged.
    #[must_use]
    pub fn with_frequency_delta(self, delta: f64) -> Self {
        if !delta.is_finite() {
            return self;
        }
        Self { frequency_hz: clamp_frequency(self.frequency_hz + delta), ..self }
    }

    /// Add `round(delta / 10)` samples, then clamp. Non-finite deltas leave the
    /// value unchanged.
    ///
    /// Halves round away from zero (`-15` steps by `-2`, `15` by `+2`), so
    /// equal gestures in either direction move the delay by the same amount.
    /// Truncating integer division would step `-15` by only `-1`.
    #[must_use]
    pub fn with_delay_delta(self, delta: f64) -> Self {
        if !delta.is_finite() {
            return self;
        }
        let stepped = f64::from(self.delay_samples) + m_round(delta / DELAY_DELTA_DIVISOR);
        let clamped = stepped.clamp(f64::from(MIN_DELAY_SAMPLES), f64::from(MAX_DELAY_SAMPLES));
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let delay_samples = clamped as u32;
        Self { delay_samples, ..self }
    }

    #[inline]
    #[must_use]
    pub fn with_playing(self, playing: bool) -> Self {
        Self { playing, ..self }
    }
}

#[inline]
fn clamp_frequency(hz: f64) -> f64 {
    hz.clamp(MIN_FREQUENCY_HZ, MAX_FREQUENCY_HZ)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn defaults_match_the_power_on_state() {
        let p = ToneParameters::default();
        assert_eq!(p.frequency_hz(), 500.0);
        assert_eq!(p.delay_samples(), 0);
        assert!(!p.is_playing());
    }

    #[test]
    fn constructor_clamps() {
        let p = ToneParameters::new(10.0, 9000);
        assert_eq!(p.frequency_hz(), MIN_FREQUENCY_HZ);
        assert_eq!(p.delay_samples(), MAX_DELAY_SAMPLES);
        assert_eq!(ToneParameters::new(f64::NAN, 0).frequency_hz(), DEFAULT_FREQUENCY_HZ);
    }

    #[test]
    fn large_delay_gesture_saturates() {
        let p = ToneParameters::default().with_delay_delta(4410.0);
        assert_eq!(p.delay_samples(), 441);
        let p = p.with_delay_delta(4410.0);
        assert_eq!(p.delay_samples(), 441);
    }

    #[test]
    fn delay_delta_rounds_to_nearest_step() {
        let p = ToneParameters::default();
        assert_eq!(p.with_delay_delta(14.0).delay_samples(), 1);
        assert_eq!(p.with_delay_delta(15.0).delay_samples(), 2);
        assert_eq!(p.with_delay_delta(4.9).delay_samples(), 0);
        let p = p.with_delay_delta(100.0);
        assert_eq!(p.with_delay_delta(-25.0).delay_samples(), 7);
    }

    #[test]
    fn delay_halves_round_away_from_zero() {
        let p = ToneParameters::new(500.0, 10);
        assert_eq!(p.with_delay_delta(-15.0).delay_samples(), 8);
        assert_eq!(p.with_delay_delta(15.0).delay_samples(), 12);
        assert_eq!(p.with_delay_delta(-14.9).delay_samples(), 9);
    }

    #[test]
    fn non_finite_deltas_are_ignored() {
        let p = ToneParameters::new(700.0, 12);
        assert_eq!(p.with_frequency_delta(f64::NAN), p);
        assert_eq!(p.with_delay_delta(f64::INFINITY), p);
    }

    proptest! {
        #[test]
        fn frequency_always_in_range(start in -1.0e6f64..1.0e6, deltas in prop::collection::vec(-1.0e5f64..1.0e5, 0..50)) {
            let mut p = ToneParameters::new(start, 0);
            for d in deltas {
                p = p.with_frequency_delta(d);
                prop_assert!(p.frequency_hz() >= MIN_FREQUENCY_HZ);
                prop_assert!(p.frequency_hz() <= MAX_FREQUENCY_HZ);
            }
        }

        #[test]
        fn delay_follows_clamped_rounded_step(prev in 0u32..=441, d in -1.0e5f64..1.0e5) {
            let p = ToneParameters::new(500.0, prev).with_delay_delta(d);
            let expected = (f64::from(prev) + (d / 10.0).round()).clamp(0.0, 441.0);
            prop_assert_eq!(f64::from(p.delay_samples()), expected);
            prop_assert!(p.delay_samples() <= MAX_DELAY_SAMPLES);
        }
    }
}
