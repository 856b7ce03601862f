//! C ABI wrapper for the tonetap engine.
//!
//! Exposes a handle to a running [`ToneEngine`] plus the control surface:
//! start/destroy, frequency and delay nudges, play/pause, stop and a state
//! query. Audio is produced by the engine's own scheduler thread; the host only
//! steers it.
//!
//! ABI notes
//! - All functions are `extern "C"` and `#[no_mangle]`.
//! - Opaque handle type: `TonetapEngine` (heap-allocated; free it with
//!   `tonetap_engine_destroy`).
//! - Every function tolerates a null handle.
//!
//! Threading
//! - The handle may be used from any thread, but `destroy` must not race with
//!   other calls on the same handle.
//! - The status callback runs on a dedicated engine thread. The string it gets
//!   is only valid for the duration of the call.

use std::ffi::{c_char, c_void, CString};

use tonetap_engine::{EngineConfig, EngineError, LogReporter, MemoryDevice, StatusReporter, ToneEngine, ToneParameters};

/// Receives one NUL-terminated status line plus the caller's `user_data`.
pub type TonetapStatusCallback = Option<extern "C" fn(text: *const c_char, user_data: *mut c_void)>;

/// Snapshot of the tone parameters.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct TonetapParameters {
    pub frequency_hz: f64,
    pub delay_samples: u32,
    pub playing: bool,
}

impl From<ToneParameters> for TonetapParameters {
    fn from(p: ToneParameters) -> Self {
        Self { frequency_hz: p.frequency_hz(), delay_samples: p.delay_samples(), playing: p.is_playing() }
    }
}

/// Opaque engine wrapper we hand to C.
pub struct TonetapEngine {
    inner: ToneEngine,
}

/// Forwards status text to a C callback.
struct CallbackReporter {
    callback: extern "C" fn(*const c_char, *mut c_void),
    user_data: *mut c_void,
}

// SAFETY: the host promises `user_data` may be used from the engine's status
// thread; that is the documented contract of `tonetap_engine_start`.
unsafe impl Send for CallbackReporter {}

impl StatusReporter for CallbackReporter {
    fn report(&mut self, text: &str) {
        if let Ok(text) = CString::new(text) {
            (self.callback)(text.as_ptr(), self.user_data);
        }
    }
}

fn start_with(config: EngineConfig, null_device: bool, reporter: impl StatusReporter) -> Result<ToneEngine, EngineError> {
    if null_device {
        return ToneEngine::start(config, MemoryDevice::discarding(), reporter);
    }
    start_device(config, reporter)
}

#[cfg(feature = "realtime")]
fn start_device(config: EngineConfig, reporter: impl StatusReporter) -> Result<ToneEngine, EngineError> {
    ToneEngine::start(config, tonetap_engine::CpalBackend::new(), reporter)
}

#[cfg(not(feature = "realtime"))]
fn start_device(_config: EngineConfig, _reporter: impl StatusReporter) -> Result<ToneEngine, EngineError> {
    Err(EngineError::InvalidConfig("built without audio output; pass null_device".into()))
}

fn with_engine<T>(engine: *const TonetapEngine, f: impl FnOnce(&ToneEngine) -> T) -> Option<T> {
    // SAFETY: non-null handles come from `tonetap_engine_start` and stay valid
    // until `tonetap_engine_destroy`.
    unsafe { engine.as_ref() }.map(|e| f(&e.inner))
}

fn write_out(out: *mut TonetapParameters, params: ToneParameters) {
    // SAFETY: the caller passes either null or a valid, writable pointer.
    if let Some(out) = unsafe { out.as_mut() } {
        *out = params.into();
    }
}

// --- Creation / destruction -------------------------------------------------------

/// Start an engine at `sample_rate` Hz (0 picks the default 8000), paused.
///
/// With `null_device` audio is generated and discarded. `status_cb` may be
/// null, in which case status goes to the Rust log. Returns null if the output
/// device could not be opened.
#[no_mangle]
pub extern "C" fn tonetap_engine_start(
    sample_rate: u32,
    null_device: bool,
    status_cb: TonetapStatusCallback,
    user_data: *mut c_void,
) -> *mut TonetapEngine {
    let mut config = EngineConfig::default();
    if sample_rate != 0 {
        config.sample_rate = sample_rate;
    }

    let started = match status_cb {
        Some(callback) => start_with(config, null_device, CallbackReporter { callback, user_data }),
        None => start_with(config, null_device, LogReporter),
    };
    match started {
        Ok(inner) => Box::into_raw(Box::new(TonetapEngine { inner })),
        Err(e) => {
            log::error!("tonetap_engine_start: {e}");
            std::ptr::null_mut()
        }
    }
}

/// Stop (if needed) and free an engine returned by `tonetap_engine_start`.
#[no_mangle]
pub extern "C" fn tonetap_engine_destroy(engine: *mut TonetapEngine) {
    if !engine.is_null() {
        // SAFETY: handle came from `Box::into_raw` in `tonetap_engine_start`.
        unsafe { drop(Box::from_raw(engine)) };
    }
}

// --- Control surface -------------------------------------------------------------

/// Shift frequency by `delta_hz` (clamped to 100..=4000). Writes the new
/// parameters to `out` if it is non-null. Returns false for a null handle.
#[no_mangle]
pub extern "C" fn tonetap_adjust_frequency(engine: *const TonetapEngine, delta_hz: f64, out: *mut TonetapParameters) -> bool {
    with_engine(engine, |e| write_out(out, e.adjust_frequency(delta_hz))).is_some()
}

/// Shift echo delay by `round(delta / 10)` samples (clamped to 0..=441).
#[no_mangle]
pub extern "C" fn tonetap_adjust_delay(engine: *const TonetapEngine, delta: f64, out: *mut TonetapParameters) -> bool {
    with_engine(engine, |e| write_out(out, e.adjust_delay(delta))).is_some()
}

/// Returns 1 if now playing, 0 if now paused, -1 if stopped or null.
#[no_mangle]
pub extern "C" fn tonetap_toggle_play_pause(engine: *const TonetapEngine) -> i32 {
    match with_engine(engine, ToneEngine::toggle_play_pause) {
        Some(Ok(true)) => 1,
        Some(Ok(false)) => 0,
        Some(Err(_)) | None => -1,
    }
}

/// Stop playback for good. The handle stays valid for queries until destroyed.
#[no_mangle]
pub extern "C" fn tonetap_stop(engine: *const TonetapEngine) {
    with_engine(engine, ToneEngine::stop);
}

/// Copy the current parameters into `out`. Returns false for a null handle
/// or null `out`.
#[no_mangle]
pub extern "C" fn tonetap_query_state(engine: *const TonetapEngine, out: *mut TonetapParameters) -> bool {
    if out.is_null() {
        return false;
    }
    with_engine(engine, |e| write_out(out, e.query_state())).is_some()
}
