//! Status reporting.
//!
//! The engine describes itself with a [`Status`] and hands the rendered text
//! to a [`StatusReporter`]. Delivery is fire-and-forget: messages go through a
//! bounded queue to a dedicated thread, a full queue drops the message, and a
//! reporter that panics is logged and kept. Nothing a reporter does can stall
//! or stop playback.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::thread;

use crossbeam::channel::{self as chan, TrySendError};
use tonetap_core::tone::ToneParameters;

use crate::error::{EngineError, Result};

/// Receives human-readable status text.
pub trait StatusReporter: Send + 'static {
    fn report(&mut self, text: &str);
}

impl<F> StatusReporter for F
where
    F: FnMut(&str) + Send + 'static,
{
    fn report(&mut self, text: &str) {
        self(text);
    }
}

/// Reporter that writes status lines to the `log` facade at info level.
#[derive(Copy, Clone, Debug, Default)]
pub struct LogReporter;

impl StatusReporter for LogReporter {
    fn report(&mut self, text: &str) {
        log::info!(target: "tonetap::status", "{text}");
    }
}

/// How a [`Status`] is rendered.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum StatusStyle {
    /// `Playing, 1000Hz, delay 0`
    #[default]
    Line,
    /// Three-line card: `|> Playing` / `frequency: 1000 Hz` / `delay: 0 sample(s)`
    Card,
}

/// What the engine is doing, with the parameters it is doing it with.
#[derive(Clone, Debug, PartialEq)]
pub enum Status {
    Playing(ToneParameters),
    Paused(ToneParameters),
    Stopped,
    /// Terminal stop caused by an error.
    Failed(String),
}

impl Status {
    /// Status for `params` under the given play flag.
    #[must_use]
    pub fn of(params: ToneParameters, playing: bool) -> Self {
        if playing { Self::Playing(params) } else { Self::Paused(params) }
    }

    #[must_use]
    pub fn render(&self, style: StatusStyle) -> String {
        match style {
            StatusStyle::Line => self.to_string(),
            StatusStyle::Card => self.card(),
        }
    }

    fn card(&self) -> String {
        match self {
            Self::Playing(p) => format!("|> Playing\n{}", card_body(p)),
            Self::Paused(p) => format!("|| Paused\n{}", card_body(p)),
            Self::Stopped => "[] Stopped".to_owned(),
            Self::Failed(err) => format!("[] Stopped\n{err}"),
        }
    }
}

fn card_body(p: &ToneParameters) -> String {
    format!("frequency: {:.0} Hz\ndelay: {} sample(s)", p.frequency_hz(), p.delay_samples())
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Playing(p) => write!(f, "Playing, {:.0}Hz, delay {}", p.frequency_hz(), p.delay_samples()),
            Self::Paused(p) => write!(f, "Paused, {:.0}Hz, delay {}", p.frequency_hz(), p.delay_samples()),
            Self::Stopped => f.write_str("Stopped"),
            Self::Failed(err) => write!(f, "Stopped: {err}"),
        }
    }
}

/// Sending half of the reporter thread. Cheap to clone.
#[derive(Clone, Debug)]
pub(crate) struct StatusChannel {
    tx: chan::Sender<String>,
    style: StatusStyle,
}

impl StatusChannel {
    /// Spawn the delivery thread for `reporter`. The thread exits once every
    /// `StatusChannel` clone is dropped and the queue is drained.
    pub(crate) fn spawn(
        mut reporter: impl StatusReporter,
        depth: usize,
        style: StatusStyle,
    ) -> Result<Self> {
        let (tx, rx) = chan::bounded::<String>(depth);
        thread::Builder::new()
            .name("tonetap-status".into())
            .spawn(move || {
                for text in rx {
                    if catch_unwind(AssertUnwindSafe(|| reporter.report(&text))).is_err() {
                        log::warn!("status reporter panicked; continuing without that update");
                    }
                }
            })
            .map_err(EngineError::Spawn)?;
        Ok(Self { tx, style })
    }

    /// Queue `status` for delivery; never blocks.
    pub(crate) fn post(&self, status: &Status) {
        match self.tx.try_send(status.render(self.style)) {
            Ok(()) => {}
            Err(TrySendError::Full(text)) => {
                log::debug!("status reporter is behind; dropped {text:?}");
            }
            Err(TrySendError::Disconnected(_)) => {}
        }
    }
}
