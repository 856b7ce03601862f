//! In-process audio device.
//!
//! `MemoryDevice` is an [`AudioBackend`] whose sinks record every transport
//! call and written buffer into a shared journal instead of producing sound.
//! Failures can be scripted for opens and writes, and the sink can be made to
//! report a fixed queue depth. It backs the CLI's `--null-device` mode and the
//! engine's tests.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::error::SinkError;
use crate::sink::{AudioBackend, AudioSink, StreamSpec, TransportState};

/// One observable call on a memory sink.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SinkEvent {
    Opened(StreamSpec),
    Play,
    Pause,
    /// Bytes accepted by a successful write.
    Write(usize),
    WriteFailed,
    Released,
}

#[derive(Debug, Default)]
struct Journal {
    events: Vec<SinkEvent>,
    buffers: Vec<Vec<u8>>,
    frames_written: usize,
    keep_data: bool,
    failing_opens: u32,
    failing_writes: u32,
    writes_broken: bool,
    /// Accept at most this many frames per write.
    write_limit: Option<usize>,
    /// Queue depth sinks report through `pending_frames`.
    pending: Option<usize>,
}

#[derive(Debug, Default)]
struct Shared {
    journal: Mutex<Journal>,
    changed: Condvar,
}

/// Recording backend. Clones share one journal.
#[derive(Clone, Debug)]
pub struct MemoryDevice {
    shared: Arc<Shared>,
}

impl Default for MemoryDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDevice {
    /// A device that keeps every written buffer.
    #[must_use]
    pub fn new() -> Self {
        let device = Self { shared: Arc::default() };
        device.journal().keep_data = true;
        device
    }

    /// A device that only counts what it is given, for long unattended runs.
    /// Successful writes are not journaled either, so memory stays flat.
    #[must_use]
    pub fn discarding() -> Self {
        let device = Self::new();
        device.journal().keep_data = false;
        device
    }

    fn journal(&self) -> MutexGuard<'_, Journal> {
        self.shared.journal.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The next `n` opens fail with `Unavailable`.
    pub fn fail_next_opens(&self, n: u32) {
        self.journal().failing_opens = n;
    }

    /// The next `n` writes fail with `Busy`.
    pub fn fail_next_writes(&self, n: u32) {
        self.journal().failing_writes = n;
    }

    /// Every write from now on fails with `Unavailable`.
    pub fn break_writes(&self) {
        self.journal().writes_broken = true;
    }

    /// Accept at most `frames` frames per write call.
    pub fn limit_write_frames(&self, frames: usize) {
        self.journal().write_limit = Some(frames);
    }

    /// Sinks report `frames` as queued from now on (`None`: no queue info).
    pub fn report_pending(&self, frames: Option<usize>) {
        self.journal().pending = frames;
    }

    pub fn events(&self) -> Vec<SinkEvent> {
        self.journal().events.clone()
    }

    /// Buffers as written, one entry per successful write call.
    pub fn buffers(&self) -> Vec<Vec<u8>> {
        self.journal().buffers.clone()
    }

    pub fn frames_written(&self) -> usize {
        self.journal().frames_written
    }

    pub fn count(&self, event: &SinkEvent) -> usize {
        self.journal().events.iter().filter(|e| *e == event).count()
    }

    /// Block until `pred` holds for the event log or `timeout` passes.
    /// Returns whether the predicate held.
    pub fn wait_until(&self, timeout: Duration, pred: impl Fn(&[SinkEvent]) -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        let mut journal = self.journal();
        loop {
            if pred(&journal.events) {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            journal = self
                .shared
                .changed
                .wait_timeout(journal, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    /// Block until at least `n` successful writes were recorded.
    pub fn wait_for_writes(&self, n: usize, timeout: Duration) -> bool {
        self.wait_until(timeout, |events| {
            events.iter().filter(|e| matches!(e, SinkEvent::Write(_))).count() >= n
        })
    }

    fn record(&self, journal: &mut Journal, event: SinkEvent) {
        journal.events.push(event);
        self.shared.changed.notify_all();
    }
}

impl AudioBackend for MemoryDevice {
    type Sink = MemorySink;

    fn open(&mut self, spec: &StreamSpec) -> Result<MemorySink, SinkError> {
        let mut journal = self.journal();
        if journal.failing_opens > 0 {
            journal.failing_opens -= 1;
            return Err(SinkError::unavailable("scripted open failure"));
        }
        self.record(&mut journal, SinkEvent::Opened(*spec));
        drop(journal);
        Ok(MemorySink {
            device: self.clone(),
            frame_bytes: spec.frame_bytes().max(1),
            state: TransportState::Stopped,
        })
    }
}

/// Sink half of [`MemoryDevice`].
#[derive(Debug)]
pub struct MemorySink {
    device: MemoryDevice,
    frame_bytes: usize,
    state: TransportState,
}

impl AudioSink for MemorySink {
    fn play(&mut self) -> Result<(), SinkError> {
        let mut journal = self.device.journal();
        self.device.record(&mut journal, SinkEvent::Play);
        self.state = TransportState::Playing;
        Ok(())
    }

    fn pause(&mut self) -> Result<(), SinkError> {
        let mut journal = self.device.journal();
        self.device.record(&mut journal, SinkEvent::Pause);
        self.state = TransportState::Paused;
        Ok(())
    }

    fn write(&mut self, bytes: &[u8]) -> Result<usize, SinkError> {
        let mut journal = self.device.journal();
        if journal.writes_broken {
            self.device.record(&mut journal, SinkEvent::WriteFailed);
            return Err(SinkError::unavailable("scripted device loss"));
        }
        if journal.failing_writes > 0 {
            journal.failing_writes -= 1;
            self.device.record(&mut journal, SinkEvent::WriteFailed);
            return Err(SinkError::busy("scripted busy device"));
        }

        let offered = bytes.len() / self.frame_bytes;
        let frames = journal.write_limit.map_or(offered, |limit| offered.min(limit));
        let accepted = &bytes[..frames * self.frame_bytes];
        journal.frames_written += frames;
        if journal.keep_data {
            journal.buffers.push(accepted.to_vec());
            self.device.record(&mut journal, SinkEvent::Write(accepted.len()));
        } else {
            self.device.shared.changed.notify_all();
        }
        Ok(frames)
    }

    fn transport_state(&self) -> TransportState {
        self.state
    }

    fn pending_frames(&self) -> Option<usize> {
        self.device.journal().pending
    }

    fn release(&mut self) {
        let mut journal = self.device.journal();
        self.device.record(&mut journal, SinkEvent::Released);
        self.state = TransportState::Stopped;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_transport_and_data() {
        let mut device = MemoryDevice::new();
        let spec = StreamSpec::mono_i16(8000, 4);
        let mut sink = device.open(&spec).unwrap();
        assert_eq!(sink.transport_state(), TransportState::Stopped);
        assert_eq!(sink.write(&[1, 0, 2, 0, 3]).unwrap(), 2);
        sink.play().unwrap();
        sink.pause().unwrap();
        sink.release();

        assert_eq!(
            device.events(),
            vec![
                SinkEvent::Opened(spec),
                SinkEvent::Write(4),
                SinkEvent::Play,
                SinkEvent::Pause,
                SinkEvent::Released,
            ]
        );
        assert_eq!(device.buffers(), vec![vec![1, 0, 2, 0]]);
        assert_eq!(device.frames_written(), 2);
    }

    #[test]
    fn scripted_failures_run_out() {
        let mut device = MemoryDevice::new();
        device.fail_next_opens(1);
        assert!(device.open(&StreamSpec::mono_i16(8000, 4)).is_err());
        let mut sink = device.open(&StreamSpec::mono_i16(8000, 4)).unwrap();

        device.fail_next_writes(2);
        assert!(matches!(sink.write(&[0, 0]), Err(SinkError::Busy(_))));
        assert!(matches!(sink.write(&[0, 0]), Err(SinkError::Busy(_))));
        assert_eq!(sink.write(&[0, 0]).unwrap(), 1);

        device.break_writes();
        assert!(matches!(sink.write(&[0, 0]), Err(SinkError::Unavailable(_))));
    }

    #[test]
    fn discarding_device_only_counts() {
        let mut device = MemoryDevice::discarding();
        let mut sink = device.open(&StreamSpec::mono_i16(8000, 4)).unwrap();
        for _ in 0..1000 {
            sink.write(&[0; 8]).unwrap();
        }
        sink.play().unwrap();
        assert!(device.buffers().is_empty());
        assert_eq!(device.frames_written(), 4000);
        assert_eq!(device.events(), vec![SinkEvent::Opened(StreamSpec::mono_i16(8000, 4)), SinkEvent::Play]);
    }

    #[test]
    fn reports_scripted_queue_depth() {
        let mut device = MemoryDevice::new();
        let sink = device.open(&StreamSpec::mono_i16(8000, 4)).unwrap();
        assert_eq!(sink.pending_frames(), None);
        device.report_pending(Some(3));
        assert_eq!(sink.pending_frames(), Some(3));
    }

    #[test]
    fn write_limit_short_writes() {
        let mut device = MemoryDevice::new();
        device.limit_write_frames(3);
        let mut sink = device.open(&StreamSpec::mono_i16(8000, 4)).unwrap();
        assert_eq!(sink.write(&[0; 10]).unwrap(), 3);
        assert_eq!(device.events().last(), Some(&SinkEvent::Write(6)));
    }
}
