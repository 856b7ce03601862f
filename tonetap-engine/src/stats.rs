//! Playback counters shared between the scheduler and its observers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tonetap_core::dsp::duration_of_frames;

#[derive(Debug, Default)]
pub(crate) struct PlaybackCounters {
    buffers: AtomicU64,
    frames: AtomicU64,
    sink_retries: AtomicU64,
    underruns: AtomicU64,
}

impl PlaybackCounters {
    pub(crate) fn buffer_submitted(&self, frames: usize) {
        self.buffers.fetch_add(1, Ordering::Relaxed);
        self.frames.fetch_add(frames as u64, Ordering::Relaxed);
    }

    pub(crate) fn sink_retried(&self) {
        self.sink_retries.fetch_add(1, Ordering::Relaxed);
    }

    /// Record the sink's running underrun total; returns how many are new.
    pub(crate) fn observe_underruns(&self, total: u64) -> u64 {
        let previous = self.underruns.swap(total, Ordering::Relaxed);
        total.saturating_sub(previous)
    }

    pub(crate) fn snapshot(&self, sample_rate: u32) -> PlaybackStats {
        let frames = self.frames.load(Ordering::Relaxed);
        PlaybackStats {
            buffers_submitted: self.buffers.load(Ordering::Relaxed),
            frames_submitted: frames,
            sink_retries: self.sink_retries.load(Ordering::Relaxed),
            underruns: self.underruns.load(Ordering::Relaxed),
            elapsed: duration_of_frames(usize::try_from(frames).unwrap_or(usize::MAX), sample_rate),
        }
    }
}

/// Point-in-time copy of the engine's playback counters.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct PlaybackStats {
    pub buffers_submitted: u64,
    pub frames_submitted: u64,
    pub sink_retries: u64,
    pub underruns: u64,
    /// Audio handed to the sink, as playback time.
    pub elapsed: Duration,
}

impl PlaybackStats {
    /// Elapsed playback as `m:ss`.
    #[must_use]
    pub fn elapsed_display(&self) -> String {
        format_elapsed(self.elapsed)
    }
}

/// Minutes and zero-padded seconds within the hour, e.g. `3:07`.
#[must_use]
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs() % 3600;
    format!("{}:{:02}", secs / 60, secs % 60)
}
