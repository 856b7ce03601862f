//! Engine error types.
//!
//! Out-of-range parameters are not an error anywhere in this crate: the
//! parameter store clamps them on the way in.

use std::borrow::Cow;

use tonetap_core::synth::SynthesisFault;

/// Failure reported by an audio sink or its backend.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SinkError {
    /// The device exists but can't take the request right now (queue full, busy).
    #[error("audio device busy: {0}")]
    Busy(Cow<'static, str>),

    /// The device could not be opened or has gone away.
    #[error("audio device unavailable: {0}")]
    Unavailable(Cow<'static, str>),
}

impl SinkError {
    pub fn busy(msg: impl Into<Cow<'static, str>>) -> Self {
        Self::Busy(msg.into())
    }

    pub fn unavailable(msg: impl Into<Cow<'static, str>>) -> Self {
        Self::Unavailable(msg.into())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The sink kept failing after every retry.
    #[error("audio output unavailable: {0}")]
    SinkUnavailable(#[source] SinkError),

    /// The synthesizer refused its inputs. Clamped parameters can't cause this.
    #[error("synthesis fault: {0}")]
    SynthesisFault(#[from] SynthesisFault),

    #[error("invalid engine configuration: {0}")]
    InvalidConfig(Cow<'static, str>),

    /// The engine has reached its terminal state.
    #[error("engine is stopped")]
    Stopped,

    #[error("failed to spawn the scheduler thread: {0}")]
    Spawn(#[source] std::io::Error),
}

pub type Result<T, E = EngineError> = std::result::Result<T, E>;
