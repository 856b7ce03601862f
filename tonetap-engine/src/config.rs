//! Engine configuration.
//!
//! Defaults reproduce the classic setup: 8 kHz mono 16-bit, one-second
//! buffers, a 500 Hz tone with no echo, starting paused.

use std::time::Duration;

use tonetap_core::dsp::frames_for_duration;
use tonetap_core::tone::{ToneParameters, DEFAULT_FREQUENCY_HZ};

use crate::error::{EngineError, Result};
use crate::sink::StreamSpec;
use crate::status::StatusStyle;

/// Tuning knobs for a [`ToneEngine`](crate::ToneEngine).
#[derive(Clone, Debug, PartialEq)]
pub struct EngineConfig {
    /// Engine sample rate in Hz. The synthesizer renders at this rate.
    pub sample_rate: u32,
    /// Length of one synthesized buffer.
    pub buffer_duration: Duration,
    pub initial_frequency_hz: f64,
    pub initial_delay_samples: u32,
    /// How many times a failing sink call is attempted before the engine gives up.
    pub max_sink_attempts: u32,
    /// Backoff before the first retry; doubles on each further attempt.
    pub retry_backoff: Duration,
    /// Wake this long before a queue-reporting sink would run dry. Capped at
    /// half a buffer.
    pub refill_margin: Duration,
    /// Status messages buffered for the reporter before new ones are dropped.
    pub status_queue_depth: usize,
    pub status_style: StatusStyle,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 8000,
            buffer_duration: Duration::from_secs(1),
            initial_frequency_hz: DEFAULT_FREQUENCY_HZ,
            initial_delay_samples: 0,
            max_sink_attempts: 4,
            retry_backoff: Duration::from_millis(25),
            refill_margin: Duration::from_millis(250),
            status_queue_depth: 32,
            status_style: StatusStyle::Line,
        }
    }
}

impl EngineConfig {
    #[must_use]
    pub fn with_sample_rate(mut self, hz: u32) -> Self { self.sample_rate = hz; self }
    #[must_use]
    pub fn with_buffer_duration(mut self, d: Duration) -> Self { self.buffer_duration = d; self }
    #[must_use]
    pub fn with_initial_frequency(mut self, hz: f64) -> Self { self.initial_frequency_hz = hz; self }
    #[must_use]
    pub fn with_initial_delay(mut self, samples: u32) -> Self { self.initial_delay_samples = samples; self }
    #[must_use]
    pub fn with_max_sink_attempts(mut self, n: u32) -> Self { self.max_sink_attempts = n; self }
    #[must_use]
    pub fn with_retry_backoff(mut self, d: Duration) -> Self { self.retry_backoff = d; self }
    #[must_use]
    pub fn with_refill_margin(mut self, d: Duration) -> Self { self.refill_margin = d; self }
    #[must_use]
    pub fn with_status_queue_depth(mut self, n: usize) -> Self { self.status_queue_depth = n; self }
    #[must_use]
    pub fn with_status_style(mut self, style: StatusStyle) -> Self { self.status_style = style; self }

    /// Frames in one synthesized buffer.
    #[must_use]
    pub fn buffer_frames(&self) -> usize {
        frames_for_duration(self.buffer_duration, self.sample_rate)
    }

    /// What the sink is asked to open.
    #[must_use]
    pub fn stream_spec(&self) -> StreamSpec {
        StreamSpec::mono_i16(self.sample_rate, self.buffer_frames())
    }

    /// Starting parameters (clamped, paused).
    #[must_use]
    pub fn initial_parameters(&self) -> ToneParameters {
        ToneParameters::new(self.initial_frequency_hz, self.initial_delay_samples)
    }

    /// Reject configurations the scheduler can't run.
    ///
    /// # Errors
    /// `EngineError::InvalidConfig` naming the offending field.
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(EngineError::InvalidConfig("sample_rate must be non-zero".into()));
        }
        if self.buffer_frames() == 0 {
            return Err(EngineError::InvalidConfig(
                format!("buffer_duration {:?} holds no frames at {} Hz", self.buffer_duration, self.sample_rate).into(),
            ));
        }
        if self.max_sink_attempts == 0 {
            return Err(EngineError::InvalidConfig("max_sink_attempts must be at least 1".into()));
        }
        if self.status_queue_depth == 0 {
            return Err(EngineError::InvalidConfig("status_queue_depth must be at least 1".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_buffer_is_one_second_at_8k() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.buffer_frames(), 8000);
        let spec = cfg.stream_spec();
        assert_eq!(spec.sample_rate, 8000);
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.bit_depth, 16);
        assert_eq!(spec.buffer_frames, 8000);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn initial_parameters_are_clamped_and_paused() {
        let p = EngineConfig::default().with_initial_frequency(9000.0).with_initial_delay(1000).initial_parameters();
        assert_eq!(p.frequency_hz(), 4000.0);
        assert_eq!(p.delay_samples(), 441);
        assert!(!p.is_playing());
    }

    #[test]
    fn rejects_degenerate_configs() {
        assert!(EngineConfig::default().with_sample_rate(0).validate().is_err());
        assert!(EngineConfig::default().with_buffer_duration(Duration::ZERO).validate().is_err());
        assert!(EngineConfig::default().with_max_sink_attempts(0).validate().is_err());
        assert!(EngineConfig::default().with_status_queue_depth(0).validate().is_err());
    }
}
