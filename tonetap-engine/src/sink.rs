//! Audio sink abstraction.
//!
//! An [`AudioBackend`] is moved onto the scheduler thread and asked to
//! [`open`](AudioBackend::open) exactly once; the [`AudioSink`] it returns
//! never leaves that thread, so device handles need not be `Send`.
//!
//! Sinks run in streaming mode: each `write` appends PCM to whatever the
//! device is already playing.

use crate::error::SinkError;

/// Format and sizing requested from a backend.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct StreamSpec {
    pub sample_rate: u32,
    pub channels: u16,
    pub bit_depth: u16,
    /// Frames in one engine buffer; backends size their queues from this.
    pub buffer_frames: usize,
}

impl StreamSpec {
    /// Mono signed 16-bit little-endian, the only format the synthesizer emits.
    #[must_use]
    pub fn mono_i16(sample_rate: u32, buffer_frames: usize) -> Self {
        Self { sample_rate, channels: 1, bit_depth: 16, buffer_frames }
    }

    /// Bytes per interleaved frame.
    #[must_use]
    pub fn frame_bytes(&self) -> usize {
        usize::from(self.channels) * usize::from(self.bit_depth / 8)
    }
}

/// Device transport status, tracked separately from the engine's own state.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TransportState {
    Stopped,
    Paused,
    Playing,
}

/// An opened output stream.
pub trait AudioSink {
    /// Start or resume draining queued audio.
    fn play(&mut self) -> Result<(), SinkError>;

    /// Stop draining; queued audio stays queued.
    fn pause(&mut self) -> Result<(), SinkError>;

    /// Queue little-endian PCM and return how many whole frames were accepted.
    /// Accepting fewer than offered is allowed; the caller resubmits the rest.
    fn write(&mut self, bytes: &[u8]) -> Result<usize, SinkError>;

    fn transport_state(&self) -> TransportState;

    /// Frames queued but not yet played, if the device can tell.
    /// `None` makes the scheduler fall back to the nominal buffer cadence.
    fn pending_frames(&self) -> Option<usize> {
        None
    }

    /// Total times the device ran out of queued audio.
    fn underruns(&self) -> u64 {
        0
    }

    /// Tear the stream down. Called once, on the scheduler thread.
    fn release(&mut self);
}

/// Something that can open a sink for a [`StreamSpec`].
pub trait AudioBackend: Send + 'static {
    type Sink: AudioSink;

    /// # Errors
    /// `SinkError` when the device can't be opened with `spec`.
    fn open(&mut self, spec: &StreamSpec) -> Result<Self::Sink, SinkError>;
}

impl<F, S> AudioBackend for F
where
    F: FnMut(&StreamSpec) -> Result<S, SinkError> + Send + 'static,
    S: AudioSink,
{
    type Sink = S;

    fn open(&mut self, spec: &StreamSpec) -> Result<S, SinkError> {
        self(spec)
    }
}
