//! Waveform synthesizer: tone parameters in, 16-bit little-endian PCM out.
//!
//! The primary tone is `s[i] = sin(2π · i / (sr / f))`. What gets emitted is the
//! secondary waveform: the tone at double the frequency, plus the primary tone
//! read `delay` samples ahead when `delay > 0` and the tap still lands inside
//! the buffer. A zero delay emits the doubled tone alone.
//!
//! Every call starts at phase zero and allocates a fresh buffer.

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;
use core::fmt;

use crate::dsp::{quantize_i16, sine, TAU};
use crate::tone::ToneParameters;

/// Bytes per mono 16-bit sample.
pub const BYTES_PER_SAMPLE: usize = 2;

/// Inputs that can't produce a waveform.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum SynthesisFault {
    ZeroSampleRate,
    InvalidFrequency(f64),
}

impl fmt::Display for SynthesisFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroSampleRate => f.write_str("sample rate must be non-zero"),
            Self::InvalidFrequency(hz) => write!(f, "frequency {hz} Hz is not a positive finite value"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for SynthesisFault {}

/// One buffer of mono 16-bit PCM, stored as little-endian bytes ready for a sink.
#[derive(Clone, PartialEq, Eq)]
pub struct SampleBuffer {
    bytes: Vec<u8>,
}

impl fmt::Debug for SampleBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SampleBuffer")
            .field("samples", &self.len())
            .finish()
    }
}

impl SampleBuffer {
    /// Wrap already-encoded bytes. A trailing odd byte is dropped.
    #[must_use]
    pub fn from_le_bytes(mut bytes: Vec<u8>) -> Self {
        bytes.truncate(bytes.len() - bytes.len() % BYTES_PER_SAMPLE);
        Self { bytes }
    }

    /// Number of samples (frames; the buffer is mono).
    #[inline] #[must_use] pub fn len(&self) -> usize { self.bytes.len() / BYTES_PER_SAMPLE }
    #[inline] #[must_use] pub fn is_empty(&self) -> bool { self.bytes.is_empty() }
    #[inline] #[must_use] pub fn byte_len(&self) -> usize { self.bytes.len() }
    #[inline] #[must_use] pub fn as_bytes(&self) -> &[u8] { &self.bytes }

    /// Decode sample `i`, if in range.
    #[must_use]
    pub fn sample(&self, i: usize) -> Option<i16> {
        let at = i.checked_mul(BYTES_PER_SAMPLE)?;
        let pair = self.bytes.get(at..at + BYTES_PER_SAMPLE)?;
        Some(i16::from_le_bytes([pair[0], pair[1]]))
    }

    /// Decode every sample in order.
    pub fn samples(&self) -> impl Iterator<Item = i16> + '_ {
        self.bytes
            .chunks_exact(BYTES_PER_SAMPLE)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
    }
}

/// Primary tone at sample index `i`.
#[inline]
#[allow(clippy::cast_precision_loss)]
fn primary(i: usize, sample_rate: f64, freq_hz: f64) -> f64 {
    sine(TAU * i as f64 / (sample_rate / freq_hz))
}

/// Render `length` samples of the tone described by `freq_hz` and `delay_samples`.
///
/// # Errors
/// `SynthesisFault` for a zero sample rate or a frequency that is not a
/// positive finite number. Clamped `ToneParameters` never hit either.
pub fn synthesize(
    freq_hz: f64,
    delay_samples: u32,
    sample_rate: u32,
    length: usize,
) -> Result<SampleBuffer, SynthesisFault> {
    if sample_rate == 0 {
        return Err(SynthesisFault::ZeroSampleRate);
    }
    if !freq_hz.is_finite() || freq_hz <= 0.0 {
        return Err(SynthesisFault::InvalidFrequency(freq_hz));
    }

    let sr = f64::from(sample_rate);
    let doubled = freq_hz * 2.0;
    let delay = delay_samples as usize;

    let mut bytes = Vec::with_capacity(length * BYTES_PER_SAMPLE);
    for i in 0..length {
        let mut x = primary(i, sr, doubled);
        if delay > 0 && i + delay < length {
            x += primary(i + delay, sr, freq_hz);
        }
        bytes.extend_from_slice(&quantize_i16(x).to_le_bytes());
    }

    Ok(SampleBuffer { bytes })
}

/// [`synthesize`] driven by a parameter snapshot.
///
/// # Errors
/// See [`synthesize`].
pub fn synthesize_from(
    params: &ToneParameters,
    sample_rate: u32,
    length: usize,
) -> Result<SampleBuffer, SynthesisFault> {
    synthesize(params.frequency_hz(), params.delay_samples(), sample_rate, length)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expected(x: f64) -> i16 {
        quantize_i16(x)
    }

    #[test]
    fn one_second_at_8k_is_16000_bytes_starting_at_zero() {
        for f in [100.0, 440.0, 500.0, 1000.0, 4000.0] {
            let buf = synthesize(f, 0, 8000, 8000).unwrap();
            assert_eq!(buf.byte_len(), 16_000);
            assert_eq!(buf.len(), 8000);
            assert_eq!(buf.sample(0), Some(0));
        }
    }

    #[test]
    fn zero_delay_is_the_doubled_tone_only() {
        let buf = synthesize(1000.0, 0, 8000, 64).unwrap();
        // 2000 Hz at 8 kHz: four samples per period, peaks at i = 1 and i = 3.
        assert_eq!(buf.sample(1), Some(expected(1.0)));
        assert_eq!(buf.sample(3), Some(expected(-1.0)));
        for i in 0..60 {
            assert_eq!(buf.sample(i), buf.sample(i + 4), "i={i}");
        }
    }

    #[test]
    fn echo_tap_reads_the_primary_ahead() {
        let (sr, f, delay, len) = (8000u32, 500.0, 3u32, 32usize);
        let buf = synthesize(f, delay, sr, len).unwrap();
        for i in 0..len {
            let mut x = sine(TAU * i as f64 / (8000.0 / 1000.0));
            if i + 3 < len {
                x += sine(TAU * (i + 3) as f64 / (8000.0 / 500.0));
            }
            assert_eq!(buf.sample(i), Some(expected(x)), "i={i}");
        }
    }

    #[test]
    fn tap_past_the_end_is_dropped() {
        let len = 16;
        let with_tap = synthesize(700.0, 10, 8000, len).unwrap();
        let plain = synthesize(700.0, 0, 8000, len).unwrap();
        // i + 10 >= 16 for the last six samples: no tap there.
        for i in 6..len {
            assert_eq!(with_tap.sample(i), plain.sample(i), "i={i}");
        }
        assert_ne!(with_tap.samples().collect::<Vec<_>>(), plain.samples().collect::<Vec<_>>());
    }

    #[test]
    fn constructive_peaks_are_clamped_not_wrapped() {
        // 1000 Hz at 8 kHz with delay 2: i=1 mixes sin(π/2)=1 with sin(3π/4)≈0.707,
        // i=3 mixes sin(3π/2)=-1 with sin(5π/4)≈-0.707.
        let buf = synthesize(1000.0, 2, 8000, 16).unwrap();
        assert_eq!(buf.sample(1), Some(i16::MAX));
        assert_eq!(buf.sample(3), Some(i16::MIN));
    }

    #[test]
    fn period_at_1000hz_is_eight_samples() {
        let buf = synthesize(1000.0, 0, 8000, 8000).unwrap();
        let s: Vec<i16> = buf.samples().collect();
        for i in 0..(s.len() - 8) {
            assert_eq!(s[i], s[i + 8]);
        }
    }

    #[test]
    fn rejects_unusable_inputs() {
        assert_eq!(synthesize(500.0, 0, 0, 10), Err(SynthesisFault::ZeroSampleRate));
        assert!(matches!(synthesize(0.0, 0, 8000, 10), Err(SynthesisFault::InvalidFrequency(_))));
        assert!(matches!(synthesize(f64::NAN, 0, 8000, 10), Err(SynthesisFault::InvalidFrequency(_))));
    }

    #[test]
    fn empty_length_is_an_empty_buffer() {
        let buf = synthesize(500.0, 5, 8000, 0).unwrap();
        assert!(buf.is_empty());
        assert_eq!(buf.sample(0), None);
    }

    #[test]
    fn from_snapshot_matches_direct_call() {
        let p = ToneParameters::new(1234.0, 17);
        assert_eq!(synthesize_from(&p, 8000, 256), synthesize(1234.0, 17, 8000, 256));
    }

    #[test]
    fn from_le_bytes_drops_odd_tail() {
        let b = SampleBuffer::from_le_bytes(vec![1, 0, 2]);
        assert_eq!(b.len(), 1);
        assert_eq!(b.sample(0), Some(1));
    }
}
