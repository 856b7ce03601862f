//! `ToneEngine`: the control surface.
//!
//! Owns the parameter store and the scheduler thread. Every method takes
//! `&self` and may be called from any thread; only the scheduler touches the
//! sink.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use crossbeam::channel as chan;
use tonetap_core::tone::ToneParameters;

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::params::{ParameterStore, SharedParameters};
use crate::scheduler::{Command, EngineState, Scheduler, Shared};
use crate::sink::AudioBackend;
use crate::stats::PlaybackStats;
use crate::status::{Status, StatusChannel, StatusReporter};

/// A running tone generator.
///
/// Created paused with its sink already open. Dropping the engine stops it.
pub struct ToneEngine {
    params: SharedParameters,
    commands: chan::Sender<Command>,
    status: StatusChannel,
    shared: Arc<Shared>,
    /// Held while flipping the play flag and sending the matching command, so
    /// commands reach the scheduler in the order the flag changed.
    transport: Mutex<()>,
    worker: Mutex<Option<JoinHandle<()>>>,
    sample_rate: u32,
}

impl core::fmt::Debug for ToneEngine {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ToneEngine")
            .field("state", &self.engine_state())
            .field("params", &self.params.snapshot())
            .finish()
    }
}

impl ToneEngine {
    /// Open a sink from `backend` on a fresh scheduler thread and return once
    /// it is ready, paused.
    ///
    /// # Errors
    /// - `InvalidConfig` if `config` fails validation
    /// - `SinkUnavailable` if the sink could not be opened within the retry budget
    /// - `Spawn` if a thread could not be started
    pub fn start<B: AudioBackend>(
        config: EngineConfig,
        backend: B,
        reporter: impl StatusReporter,
    ) -> Result<Self> {
        config.validate()?;

        let sample_rate = config.sample_rate;
        let params: SharedParameters = Arc::new(ParameterStore::new(config.initial_parameters()));
        let status = StatusChannel::spawn(reporter, config.status_queue_depth, config.status_style)?;
        let shared = Arc::new(Shared::new());
        let (commands, command_rx) = chan::unbounded();
        let (ready_tx, ready_rx) = chan::bounded(1);

        let scheduler = Scheduler::new(config, Arc::clone(&params), command_rx, status.clone(), Arc::clone(&shared));
        let worker = thread::Builder::new()
            .name("tonetap-scheduler".into())
            .spawn(move || scheduler.run(backend, ready_tx))
            .map_err(EngineError::Spawn)?;

        match ready_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                let _ = worker.join();
                return Err(err);
            }
            // The worker died before reporting in.
            Err(_) => {
                let _ = worker.join();
                return Err(EngineError::Stopped);
            }
        }

        Ok(Self {
            params,
            commands,
            status,
            shared,
            transport: Mutex::new(()),
            worker: Mutex::new(Some(worker)),
            sample_rate,
        })
    }

    /// Shift the tone by `delta` Hz (clamped to 100..=4000). Takes effect at
    /// the next buffer.
    pub fn adjust_frequency(&self, delta: f64) -> ToneParameters {
        let params = self.params.adjust_frequency(delta);
        self.report_change(params);
        params
    }

    /// Shift the echo delay by `round(delta / 10)` samples (clamped to 0..=441).
    /// Takes effect at the next buffer.
    pub fn adjust_delay(&self, delta: f64) -> ToneParameters {
        let params = self.params.adjust_delay(delta);
        self.report_change(params);
        params
    }

    /// Flip between playing and paused. Returns `true` if now playing.
    ///
    /// # Errors
    /// `EngineError::Stopped` once the engine has stopped.
    pub fn toggle_play_pause(&self) -> Result<bool> {
        self.ensure_running()?;
        let _transport = self.lock_transport();
        let playing = self.params.toggle_playing();
        self.send(if playing { Command::Play } else { Command::Pause })?;
        Ok(playing)
    }

    /// Start playing; a no-op if already playing.
    ///
    /// # Errors
    /// `EngineError::Stopped` once the engine has stopped.
    pub fn play(&self) -> Result<()> {
        self.ensure_running()?;
        let _transport = self.lock_transport();
        if self.params.set_playing(true) {
            self.send(Command::Play)?;
        }
        Ok(())
    }

    /// Pause; a no-op if already paused.
    ///
    /// # Errors
    /// `EngineError::Stopped` once the engine has stopped.
    pub fn pause(&self) -> Result<()> {
        self.ensure_running()?;
        let _transport = self.lock_transport();
        if self.params.set_playing(false) {
            self.send(Command::Pause)?;
        }
        Ok(())
    }

    /// Stop for good and wait for the scheduler to release the sink.
    /// Safe to call more than once.
    pub fn stop(&self) {
        let _ = self.commands.send(Command::Stop);
        let worker = self.worker.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(worker) = worker {
            if worker.join().is_err() {
                log::error!("scheduler thread panicked");
            }
        }
    }

    /// Current parameters, as the next buffer would use them.
    pub fn query_state(&self) -> ToneParameters {
        self.params.snapshot()
    }

    pub fn engine_state(&self) -> EngineState {
        self.shared.state()
    }

    pub fn stats(&self) -> PlaybackStats {
        self.shared.counters.snapshot(self.sample_rate)
    }

    /// The error that stopped the engine, if one did.
    pub fn last_error(&self) -> Option<String> {
        self.shared.last_error()
    }

    fn lock_transport(&self) -> MutexGuard<'_, ()> {
        self.transport.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ensure_running(&self) -> Result<()> {
        if self.shared.state() == EngineState::Stopped {
            return Err(EngineError::Stopped);
        }
        Ok(())
    }

    fn send(&self, command: Command) -> Result<()> {
        self.commands.send(command).map_err(|_| EngineError::Stopped)
    }

    fn report_change(&self, params: ToneParameters) {
        if self.shared.state() != EngineState::Stopped {
            self.status.post(&Status::of(params, params.is_playing()));
        }
    }
}

impl Drop for ToneEngine {
    fn drop(&mut self) {
        self.stop();
    }
}
