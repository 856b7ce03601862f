//! Playback scheduler: the worker that keeps the sink fed.
//!
//! The worker owns the sink for its whole life. While playing it repeats one
//! buffer cycle:
//!
//! 1. snapshot the parameter store
//! 2. synthesize one buffer, or only the frames that top the sink's queue
//!    back up to one buffer when the sink reports its queue depth
//! 3. write it to the sink (short writes are resubmitted)
//! 4. make sure the sink's transport is playing
//! 5. post a status line
//! 6. wait until the sink needs more audio
//!
//! Control arrives as [`Command`]s on a channel, and every wait is a
//! `recv_deadline` on that channel, so a pause or stop cuts the wait short
//! instead of landing at the next buffer boundary. Parameter changes are picked
//! up by the next snapshot.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use crossbeam::channel::{self as chan, RecvTimeoutError};
use tonetap_core::dsp::{duration_of_frames, frames_for_duration};
use tonetap_core::synth::synthesize_from;

use crate::config::EngineConfig;
use crate::error::{EngineError, SinkError};
use crate::params::SharedParameters;
use crate::sink::{AudioBackend, AudioSink, StreamSpec, TransportState};
use crate::stats::PlaybackCounters;
use crate::status::{Status, StatusChannel};

/// Lifecycle of an engine. `Stopped` is terminal.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum EngineState {
    Paused = 0,
    Playing = 1,
    Stopped = 2,
}

impl EngineState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Paused,
            1 => Self::Playing,
            _ => Self::Stopped,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Command {
    Play,
    Pause,
    Stop,
}

/// State the worker publishes for the control surface.
#[derive(Debug)]
pub(crate) struct Shared {
    state: AtomicU8,
    pub(crate) counters: PlaybackCounters,
    last_error: Mutex<Option<String>>,
}

impl Shared {
    pub(crate) fn new() -> Self {
        Self {
            state: AtomicU8::new(EngineState::Paused as u8),
            counters: PlaybackCounters::default(),
            last_error: Mutex::new(None),
        }
    }

    pub(crate) fn state(&self) -> EngineState {
        EngineState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: EngineState) {
        self.state.store(state as u8, Ordering::Release);
    }

    pub(crate) fn last_error(&self) -> Option<String> {
        self.last_error.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn set_error(&self, err: &EngineError) {
        *self.last_error.lock().unwrap_or_else(PoisonError::into_inner) = Some(err.to_string());
    }
}

/// Why a cycle or a sink call didn't run to completion.
enum Abort {
    /// A command that changes state arrived mid-wait.
    Interrupted(Command),
    Fatal(EngineError),
}

pub(crate) struct Scheduler {
    config: EngineConfig,
    spec: StreamSpec,
    /// Wake once the sink's queue drops to this many frames. At most half a
    /// buffer, so every wake-up has frames to render.
    refill_frames: usize,
    params: SharedParameters,
    commands: chan::Receiver<Command>,
    status: StatusChannel,
    shared: Arc<Shared>,
}

impl Scheduler {
    pub(crate) fn new(
        config: EngineConfig,
        params: SharedParameters,
        commands: chan::Receiver<Command>,
        status: StatusChannel,
        shared: Arc<Shared>,
    ) -> Self {
        let spec = config.stream_spec();
        let refill_frames = frames_for_duration(config.refill_margin, config.sample_rate).min(spec.buffer_frames / 2);
        Self { config, spec, refill_frames, params, commands, status, shared }
    }

    /// Worker entry point. Reports the open result through `ready`, then
    /// drives playback until stopped.
    pub(crate) fn run<B: AudioBackend>(self, mut backend: B, ready: chan::Sender<Result<(), EngineError>>) {
        let spec = self.spec;
        let opened = self.attempt("open", || backend.open(&spec));
        let mut sink = match opened {
            Ok(sink) => sink,
            Err(abort) => {
                let err = match abort {
                    Abort::Fatal(err) => err,
                    Abort::Interrupted(_) => EngineError::Stopped,
                };
                self.finish(Some(&err));
                let _ = ready.send(Err(err));
                return;
            }
        };

        log::info!(
            "audio sink open: {} Hz, {} ch, {}-bit, {} frames per buffer",
            spec.sample_rate, spec.channels, spec.bit_depth, spec.buffer_frames
        );
        let _ = ready.send(Ok(()));
        self.status.post(&Status::Paused(self.params.snapshot()));

        let outcome = self.drive(&mut sink);
        sink.release();
        self.finish(outcome.as_ref().err());
    }

    fn finish(&self, err: Option<&EngineError>) {
        self.shared.set_state(EngineState::Stopped);
        self.params.set_playing(false);
        match err {
            None => {
                log::info!("playback stopped");
                self.status.post(&Status::Stopped);
            }
            Some(err) => {
                log::error!("playback stopped: {err}");
                self.shared.set_error(err);
                self.status.post(&Status::Failed(err.to_string()));
            }
        }
    }

    fn drive<S: AudioSink>(&self, sink: &mut S) -> Result<(), EngineError> {
        let mut pending: Option<Command> = None;
        loop {
            let command = match pending.take() {
                Some(command) => command,
                None => match self.shared.state() {
                    EngineState::Paused => self.commands.recv().unwrap_or(Command::Stop),
                    EngineState::Playing => match self.cycle(sink) {
                        Ok(()) => continue,
                        Err(Abort::Interrupted(command)) => command,
                        Err(Abort::Fatal(err)) => return Err(err),
                    },
                    EngineState::Stopped => return Ok(()),
                },
            };

            match (command, self.shared.state()) {
                (Command::Stop, _) => return Ok(()),
                (Command::Play, EngineState::Paused) => {
                    log::info!("playing");
                    self.shared.set_state(EngineState::Playing);
                }
                (Command::Pause, EngineState::Playing) => {
                    log::info!("paused");
                    self.shared.set_state(EngineState::Paused);
                    match self.attempt("pause", || sink.pause()) {
                        Ok(()) => {}
                        Err(Abort::Interrupted(command)) => pending = Some(command),
                        Err(Abort::Fatal(err)) => return Err(err),
                    }
                    self.status.post(&Status::Paused(self.params.snapshot()));
                }
                _ => {}
            }
        }
    }

    /// One synthesize, submit, wait round.
    fn cycle<S: AudioSink>(&self, sink: &mut S) -> Result<(), Abort> {
        let params = self.params.snapshot();
        let frames = self.frames_to_render(sink);
        if frames > 0 {
            let buffer = synthesize_from(&params, self.spec.sample_rate, frames)
                .map_err(|fault| Abort::Fatal(fault.into()))?;
            self.submit(sink, buffer.as_bytes())?;
            self.shared.counters.buffer_submitted(buffer.len());
        }

        if sink.transport_state() != TransportState::Playing {
            self.attempt("play", || sink.play())?;
        }

        let starved = self.shared.counters.observe_underruns(sink.underruns());
        if starved > 0 {
            log::warn!("audio device ran dry {starved} time(s) since the last buffer");
        }

        self.status.post(&Status::Playing(params));
        let wait = self.next_wait(sink);
        log::debug!(
            "queued {frames} frames at {:.0} Hz, delay {}; next buffer in {wait:?}",
            params.frequency_hz(), params.delay_samples()
        );
        self.wait_until(Instant::now() + wait)
    }

    /// Write all of `bytes`, resubmitting after short writes.
    fn submit<S: AudioSink>(&self, sink: &mut S, bytes: &[u8]) -> Result<(), Abort> {
        let frame_bytes = self.spec.frame_bytes();
        let mut offset = 0;
        while offset < bytes.len() {
            let frames = self.attempt("write", || match sink.write(&bytes[offset..]) {
                Ok(0) => Err(SinkError::busy("no frames accepted")),
                other => other,
            })?;
            offset = (offset + frames * frame_bytes).min(bytes.len());
        }
        Ok(())
    }

    /// Frames that keep at most one buffer queued ahead of the device.
    fn frames_to_render<S: AudioSink>(&self, sink: &S) -> usize {
        match sink.pending_frames() {
            Some(queued) => self.spec.buffer_frames.saturating_sub(queued),
            None => self.spec.buffer_frames,
        }
    }

    fn next_wait<S: AudioSink>(&self, sink: &S) -> Duration {
        match sink.pending_frames() {
            Some(queued) => duration_of_frames(queued.saturating_sub(self.refill_frames), self.spec.sample_rate),
            None => self.config.buffer_duration,
        }
    }

    /// Run `op` until it succeeds or the attempt budget is spent. Backoff
    /// starts at `retry_backoff` and doubles; a state change cuts it short.
    fn attempt<T>(&self, what: &str, mut op: impl FnMut() -> Result<T, SinkError>) -> Result<T, Abort> {
        let max = self.config.max_sink_attempts;
        let mut backoff = self.config.retry_backoff;
        let mut attempt = 1;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(err) if attempt < max => {
                    log::warn!("sink {what} failed (attempt {attempt}/{max}): {err}; retrying in {backoff:?}");
                    self.shared.counters.sink_retried();
                    self.wait_until(Instant::now() + backoff)?;
                    backoff = backoff.saturating_mul(2);
                    attempt += 1;
                }
                Err(err) => return Err(Abort::Fatal(EngineError::SinkUnavailable(err))),
            }
        }
    }

    /// Sleep until `deadline`, returning early when a command would change state.
    fn wait_until(&self, deadline: Instant) -> Result<(), Abort> {
        loop {
            match self.commands.recv_deadline(deadline) {
                Ok(command) if self.is_noop(command) => continue,
                Ok(command) => return Err(Abort::Interrupted(command)),
                Err(RecvTimeoutError::Timeout) => return Ok(()),
                Err(RecvTimeoutError::Disconnected) => return Err(Abort::Interrupted(Command::Stop)),
            }
        }
    }

    fn is_noop(&self, command: Command) -> bool {
        matches!(
            (command, self.shared.state()),
            (Command::Play, EngineState::Playing) | (Command::Pause, EngineState::Paused)
        )
    }
}
