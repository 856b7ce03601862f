//! cpal output: the real sound card.
//!
//! The engine writes mono i16 at its own rate into a lock-free ring; the cpal
//! data callback drains the ring, interpolates up (or down) to the device rate,
//! applies gain and duplicates the sample into every device channel. The ring
//! holds three engine buffers, and its fill level is what the scheduler reads
//! back through [`AudioSink::pending_frames`]. Pausing empties the ring, so a
//! resume never replays audio rendered before the pause.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam::queue::ArrayQueue;

use crate::error::SinkError;
use crate::sink::{AudioBackend, AudioSink, StreamSpec, TransportState};

/// Engine buffers the ring can hold.
const RING_BUFFERS: usize = 3;

/// Names of every output device on the default host.
///
/// # Errors
/// `SinkError::Unavailable` if the host can't enumerate devices.
pub fn output_device_names() -> Result<Vec<String>, SinkError> {
    let host = cpal::default_host();
    let devices = host
        .output_devices()
        .map_err(|e| SinkError::unavailable(format!("cannot enumerate output devices: {e}")))?;
    Ok(devices.filter_map(|d| d.name().ok()).collect())
}

/// Opens cpal output streams on a named or the default device.
#[derive(Clone, Debug)]
pub struct CpalBackend {
    device_name: Option<String>,
    gain: f32,
}

impl Default for CpalBackend {
    fn default() -> Self {
        Self { device_name: None, gain: 1.0 }
    }
}

impl CpalBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use the output device with exactly this name instead of the default.
    #[must_use]
    pub fn with_device(mut self, name: impl Into<String>) -> Self {
        self.device_name = Some(name.into());
        self
    }

    /// Linear output gain, applied after resampling. Clamped to `0.0..=1.0`.
    #[must_use]
    pub fn with_gain(mut self, gain: f32) -> Self {
        self.gain = if gain.is_finite() { gain.clamp(0.0, 1.0) } else { 1.0 };
        self
    }

    fn pick_device(&self) -> Result<cpal::Device, SinkError> {
        let host = cpal::default_host();
        if let Some(name) = &self.device_name {
            let devices = host
                .output_devices()
                .map_err(|e| SinkError::unavailable(format!("cannot enumerate output devices: {e}")))?;
            for d in devices {
                if d.name().is_ok_and(|n| n == *name) {
                    return Ok(d);
                }
            }
            return Err(SinkError::unavailable(format!("requested device not found: {name}")));
        }
        host.default_output_device()
            .ok_or_else(|| SinkError::unavailable("no default output device"))
    }
}

/// Supported config closest to `spec`: sample rate first, then channel count.
fn choose_config(device: &cpal::Device, spec: &StreamSpec) -> Result<cpal::SupportedStreamConfig, SinkError> {
    let ranges = device
        .supported_output_configs()
        .map_err(|e| SinkError::unavailable(format!("cannot query output configs: {e}")))?;

    let want_sr = spec.sample_rate;
    let mut best: Option<(u64, cpal::SupportedStreamConfigRange)> = None;
    for range in ranges {
        let sr_min = range.min_sample_rate().0;
        let sr_max = range.max_sample_rate().0;
        let sr_pen = if (sr_min..=sr_max).contains(&want_sr) {
            0
        } else {
            u64::from(sr_min.abs_diff(want_sr).min(sr_max.abs_diff(want_sr)))
        };
        let ch_pen = u64::from(range.channels().abs_diff(spec.channels));

        let score = sr_pen.saturating_mul(1000) + ch_pen;
        if best.as_ref().map_or(true, |(s, _)| score < *s) {
            best = Some((score, range));
        }
    }

    let (_, range) = best.ok_or_else(|| SinkError::unavailable("no supported output configs"))?;
    let sr = want_sr.clamp(range.min_sample_rate().0, range.max_sample_rate().0);
    Ok(range.with_sample_rate(cpal::SampleRate(sr)))
}

impl AudioBackend for CpalBackend {
    type Sink = CpalSink;

    fn open(&mut self, spec: &StreamSpec) -> Result<CpalSink, SinkError> {
        let device = self.pick_device()?;
        let supported = choose_config(&device, spec)?;
        let format = supported.sample_format();
        let config = supported.config();

        let feed = Arc::new(Feed::new(spec.buffer_frames.max(1) * RING_BUFFERS));
        let stream = match format {
            cpal::SampleFormat::F32 => build_stream::<f32>(&device, &config, spec, self.gain, &feed)?,
            cpal::SampleFormat::I16 => build_stream::<i16>(&device, &config, spec, self.gain, &feed)?,
            cpal::SampleFormat::U16 => build_stream::<u16>(&device, &config, spec, self.gain, &feed)?,
            other => return Err(SinkError::unavailable(format!("unsupported device sample format: {other:?}"))),
        };

        log::info!(
            "cpal device {:?}: {} Hz, {} ch, {format:?} (engine {} Hz mono)",
            device.name().unwrap_or_else(|_| "<unnamed>".into()),
            config.sample_rate.0,
            config.channels,
            spec.sample_rate
        );
        Ok(CpalSink { stream, feed, state: TransportState::Paused })
    }
}

/// State shared between the sink and the cpal callback.
#[derive(Debug)]
struct Feed {
    ring: ArrayQueue<i16>,
    running: AtomicBool,
    underruns: AtomicU64,
    lost: AtomicBool,
}

impl Feed {
    fn new(capacity: usize) -> Self {
        Self {
            ring: ArrayQueue::new(capacity),
            running: AtomicBool::new(false),
            underruns: AtomicU64::new(0),
            lost: AtomicBool::new(false),
        }
    }

    /// Drop everything queued. Returns the number of frames discarded.
    fn clear(&self) -> usize {
        let mut dropped = 0;
        while self.ring.pop().is_some() {
            dropped += 1;
        }
        dropped
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    spec: &StreamSpec,
    gain: f32,
    feed: &Arc<Feed>,
) -> Result<cpal::Stream, SinkError>
where
    T: cpal::Sample + cpal::FromSample<f32> + cpal::SizedSample + Send + 'static,
{
    let channels = usize::from(config.channels).max(1);
    let mut resampler = Resampler::new(spec.sample_rate, config.sample_rate.0);
    let mut starving = false;

    let data_feed = Arc::clone(feed);
    let err_feed = Arc::clone(feed);
    device
        .build_output_stream(
            config,
            move |output: &mut [T], _| {
                if !data_feed.running.load(Ordering::Acquire) {
                    output.fill(T::EQUILIBRIUM);
                    return;
                }
                let mut starved = false;
                for frame in output.chunks_mut(channels) {
                    let (s, dry) = resampler.next(|| data_feed.ring.pop());
                    starved |= dry;
                    let v = T::from_sample((s * gain).clamp(-1.0, 1.0));
                    frame.fill(v);
                }
                if starved && !starving {
                    data_feed.underruns.fetch_add(1, Ordering::Relaxed);
                }
                starving = starved;
            },
            move |e: cpal::StreamError| {
                log::error!("cpal stream error: {e}");
                if matches!(e, cpal::StreamError::DeviceNotAvailable) {
                    err_feed.lost.store(true, Ordering::Release);
                }
            },
            None,
        )
        .map_err(|e| SinkError::unavailable(format!("cannot build output stream: {e}")))
}

/// Live cpal stream fed from a ring. Lives on the scheduler thread.
pub struct CpalSink {
    stream: cpal::Stream,
    feed: Arc<Feed>,
    state: TransportState,
}

impl CpalSink {
    fn check_device(&self) -> Result<(), SinkError> {
        if self.feed.lost.load(Ordering::Acquire) {
            return Err(SinkError::unavailable("output device lost"));
        }
        Ok(())
    }
}

impl AudioSink for CpalSink {
    fn play(&mut self) -> Result<(), SinkError> {
        self.check_device()?;
        self.stream
            .play()
            .map_err(|e| SinkError::busy(format!("cannot start stream: {e}")))?;
        self.feed.running.store(true, Ordering::Release);
        self.state = TransportState::Playing;
        Ok(())
    }

    fn pause(&mut self) -> Result<(), SinkError> {
        self.check_device()?;
        // The callback goes silent on its own; not every host can pause.
        self.feed.running.store(false, Ordering::Release);
        if let Err(e) = self.stream.pause() {
            log::debug!("stream pause unsupported, outputting silence instead: {e}");
        }
        let dropped = self.feed.clear();
        log::debug!("discarded {dropped} queued frames on pause");
        self.state = TransportState::Paused;
        Ok(())
    }

    fn write(&mut self, bytes: &[u8]) -> Result<usize, SinkError> {
        self.check_device()?;
        let mut frames = 0;
        for pair in bytes.chunks_exact(2) {
            if self.feed.ring.push(i16::from_le_bytes([pair[0], pair[1]])).is_err() {
                break;
            }
            frames += 1;
        }
        Ok(frames)
    }

    fn transport_state(&self) -> TransportState {
        self.state
    }

    fn pending_frames(&self) -> Option<usize> {
        Some(self.feed.ring.len())
    }

    fn underruns(&self) -> u64 {
        self.feed.underruns.load(Ordering::Relaxed)
    }

    fn release(&mut self) {
        self.feed.running.store(false, Ordering::Release);
        let _ = self.stream.pause();
        self.feed.clear();
        self.state = TransportState::Stopped;
    }
}

/// Linear interpolation from the engine rate to the device rate.
#[derive(Debug)]
struct Resampler {
    step: f64,
    phase: f64,
    prev: f32,
    next: f32,
}

impl Resampler {
    fn new(source_rate: u32, device_rate: u32) -> Self {
        Self {
            step: f64::from(source_rate) / f64::from(device_rate.max(1)),
            phase: 1.0,
            prev: 0.0,
            next: 0.0,
        }
    }

    /// Next device-rate sample in `-1.0..1.0`, pulling source samples from
    /// `pull` as needed. The flag is set when `pull` came up empty; missing
    /// samples read as silence.
    fn next(&mut self, mut pull: impl FnMut() -> Option<i16>) -> (f32, bool) {
        let mut starved = false;
        while self.phase >= 1.0 {
            self.prev = self.next;
            self.next = match pull() {
                Some(s) => f32::from(s) / 32768.0,
                None => {
                    starved = true;
                    0.0
                }
            };
            self.phase -= 1.0;
        }
        #[allow(clippy::cast_possible_truncation)]
        let out = self.prev + (self.next - self.prev) * self.phase as f32;
        self.phase += self.step;
        (out, starved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(resampler: &mut Resampler, source: &[i16], n: usize) -> Vec<f32> {
        let mut it = source.iter().copied();
        (0..n).map(|_| resampler.next(|| it.next()).0).collect()
    }

    #[test]
    fn equal_rates_pass_samples_through_one_late() {
        let mut r = Resampler::new(8000, 8000);
        let out = run(&mut r, &[16384, -16384, 8192], 4);
        assert_eq!(out, vec![0.0, 0.5, -0.5, 0.25]);
    }

    #[test]
    fn doubling_rate_interpolates_midpoints() {
        let mut r = Resampler::new(8000, 16000);
        let out = run(&mut r, &[16384, -16384], 4);
        assert_eq!(out, vec![0.0, 0.25, 0.5, 0.0]);
    }

    #[test]
    fn empty_source_is_silence_and_flagged() {
        let mut r = Resampler::new(8000, 48000);
        let (s, starved) = r.next(|| None);
        assert_eq!(s, 0.0);
        assert!(starved);
    }

    #[test]
    fn feed_ring_holds_three_buffers() {
        let feed = Feed::new(4 * RING_BUFFERS);
        for i in 0..12 {
            assert!(feed.ring.push(i).is_ok());
        }
        assert!(feed.ring.push(0).is_err());
    }

    #[test]
    fn clearing_the_feed_drops_queued_audio() {
        let feed = Feed::new(16);
        for i in 0..10 {
            feed.ring.push(i).unwrap();
        }
        assert_eq!(feed.clear(), 10);
        assert!(feed.ring.is_empty());
        assert_eq!(feed.clear(), 0);
    }
}
