//! Math helpers, PCM quantization and sample-rate arithmetic.
//!
//! Design goals:
//! - `no_std` ready (guarded by the crate feature `no-std`)
//! - Math backend selection that works in both `std` and `no_std` contexts
//! - Optional `fast-math` sine for hot paths
//! - Side-effect free helpers that are easy to test
//!
//! Conventions:
//! - Synthesis runs in `f64`; only the final PCM step narrows to `i16`.
//! - Frame/duration conversions use integer nanoseconds so they are exact.

#![allow(clippy::excessive_precision)]

use core::f64::consts::PI;
use core::time::Duration;

use cfg_if::cfg_if;

// ----------------------------- Math backend selection -----------------------------

cfg_if! {
    // libm (C math) in no_std
    if #[cfg(all(feature = "no-std", not(feature = "std")))] {
        #[inline] fn m_sin(x: f64) -> f64 { libm::sin(x) }
        #[inline] fn m_trunc(x: f64) -> f64 { libm::trunc(x) }
        #[inline] pub(crate) fn m_round(x: f64) -> f64 { libm::round(x) }
    // std backend
    } else {
        #[inline] fn m_sin(x: f64) -> f64 { x.sin() }
        #[inline] fn m_trunc(x: f64) -> f64 { x.trunc() }
        #[inline] pub(crate) fn m_round(x: f64) -> f64 { x.round() }
    }
}

// --------------------------------- Constants -------------------------------------

/// 2π
pub const TAU: f64 = 2.0 * PI;

/// Full-scale multiplier for 16-bit PCM.
pub const PCM_FULL_SCALE: f64 = 32767.0;

const NANOS_PER_SEC: u128 = 1_000_000_000;

// --------------------------------- Sine ------------------------------------------

/// Sine through the selected backend.
///
/// With `fast-math` this is a range-reduced 7th-order odd polynomial
/// (max abs error around 2e-4 on [-π, π]); otherwise it is exact.
#[inline]
pub fn sine(x: f64) -> f64 {
    cfg_if! {
        if #[cfg(feature = "fast-math")] {
            let k = m_round(x / TAU);
            let xr = x - k * TAU;
            let x2 = xr * xr;
            let x3 = x2 * xr;
            xr + (-1.0 / 6.0) * x3 + (1.0 / 120.0) * x3 * x2 + (-1.0 / 5040.0) * x3 * x2 * x2
        } else {
            m_sin(x)
        }
    }
}

// --------------------------------- PCM -------------------------------------------

/// Scale a normalized sample by 32767, truncate toward zero, clamp to the
/// `i16` range. NaN maps to silence.
///
/// Mixed signals can exceed ±1.0, so the clamp is load-bearing.
#[inline]
#[allow(clippy::cast_possible_truncation)]
pub fn quantize_i16(x: f64) -> i16 {
    let v = m_trunc(x * PCM_FULL_SCALE);
    if v.is_nan() {
        return 0;
    }
    v.clamp(f64::from(i16::MIN), f64::from(i16::MAX)) as i16
}

// --------------------------------- Sample-rate arithmetic ------------------------

/// Number of whole frames covering `duration` at `sample_rate` (rounded down).
#[inline]
#[must_use]
pub fn frames_for_duration(duration: Duration, sample_rate: u32) -> usize {
    let frames = duration.as_nanos() * u128::from(sample_rate) / NANOS_PER_SEC;
    usize::try_from(frames).unwrap_or(usize::MAX)
}

/// Playback time of `frames` frames at `sample_rate`. Zero for a zero rate.
#[inline]
#[must_use]
pub fn duration_of_frames(frames: usize, sample_rate: u32) -> Duration {
    if sample_rate == 0 {
        return Duration::ZERO;
    }
    let nanos = (frames as u128) * NANOS_PER_SEC / u128::from(sample_rate);
    Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
}

// --------------------------------- Tests (std only) ------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantize_scales_and_truncates() {
        assert_eq!(quantize_i16(0.0), 0);
        assert_eq!(quantize_i16(1.0), 32767);
        assert_eq!(quantize_i16(-1.0), -32767);
        // 0.5 * 32767 = 16383.5, truncated toward zero
        assert_eq!(quantize_i16(0.5), 16383);
        assert_eq!(quantize_i16(-0.5), -16383);
    }

    #[test]
    fn quantize_clamps_out_of_range_mixes() {
        assert_eq!(quantize_i16(2.0), i16::MAX);
        assert_eq!(quantize_i16(-2.0), i16::MIN);
        assert_eq!(quantize_i16(f64::NAN), 0);
        assert_eq!(quantize_i16(f64::INFINITY), i16::MAX);
    }

    #[test]
    fn one_second_at_8k_is_8000_frames() {
        assert_eq!(frames_for_duration(Duration::from_secs(1), 8000), 8000);
        assert_eq!(frames_for_duration(Duration::from_millis(250), 8000), 2000);
        assert_eq!(frames_for_duration(Duration::from_millis(1), 44_100), 44);
    }

    #[test]
    fn frames_back_to_duration() {
        assert_eq!(duration_of_frames(8000, 8000), Duration::from_secs(1));
        assert_eq!(duration_of_frames(4000, 8000), Duration::from_millis(500));
        assert_eq!(duration_of_frames(100, 0), Duration::ZERO);
    }

    #[test]
    fn sine_matches_at_landmarks() {
        assert!(sine(0.0).abs() < 1e-12);
        assert!((sine(PI / 2.0) - 1.0).abs() < 1e-3);
        assert!((sine(-PI / 2.0) + 1.0).abs() < 1e-3);
    }
}
