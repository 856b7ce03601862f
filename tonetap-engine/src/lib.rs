//! tonetap engine — parameter store, playback scheduler, sinks and status.
//!
//! Crate layout:
//! - [`params`]    : lock-free `ParameterStore` shared by control and playback
//! - [`sink`]      : `AudioBackend` / `AudioSink` traits and `StreamSpec`
//! - [`memory`]    : recording in-process sink (tests, `--null-device`)
//! - [`cpal_sink`] : cpal output stream fed from a ring (feature `realtime`)
//! - [`status`]    : `StatusReporter`, status text, best-effort delivery thread
//! - [`scheduler`] : the worker thread running the buffer cycle
//! - [`engine`]    : `ToneEngine`, the control surface
//! - [`config`], [`error`], [`stats`]
//!
//! The only state shared between the control surface and the scheduler is the
//! parameter store (plus atomics for state and counters). The sink lives and
//! dies on the scheduler thread.

pub mod config;
#[cfg(feature = "realtime")]
pub mod cpal_sink;
pub mod engine;
pub mod error;
pub mod memory;
pub mod params;
pub mod scheduler;
pub mod sink;
pub mod stats;
pub mod status;

// Re-export some commonly used items to make downstream imports ergonomic.
pub use config::EngineConfig;
pub use engine::ToneEngine;
pub use error::{EngineError, Result, SinkError};
pub use memory::{MemoryDevice, MemorySink, SinkEvent};
pub use params::ParameterStore;
pub use scheduler::EngineState;
pub use sink::{AudioBackend, AudioSink, StreamSpec, TransportState};
pub use stats::PlaybackStats;
pub use status::{LogReporter, Status, StatusReporter, StatusStyle};
pub use tonetap_core::tone::ToneParameters;

#[cfg(feature = "realtime")]
pub use cpal_sink::{CpalBackend, CpalSink};
