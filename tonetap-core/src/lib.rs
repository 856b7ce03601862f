#![cfg_attr(not(feature = "std"), no_std)]
//! tonetap core — no_std-ready tone synthesis with optional fast-math.
//!
//! Features
//! - `std`      : (default) use the Rust standard library
//! - `no-std`   : build with `#![no_std]` (plus `alloc`) and use `libm` for math
//! - `fast-math`: polynomial sine instead of the backend's exact one
//!
//! Modules
//! - [`dsp`]   : math backend, PCM quantization, sample-rate arithmetic
//! - [`tone`]  : `ToneParameters` and its clamping rules
//! - [`synth`] : the waveform synthesizer producing 16-bit PCM buffers
//!
//! Design
//! - Synthesis is a pure function of its inputs; nothing is cached between buffers
//! - Every parameter value is clamped on construction, so consumers never see
//!   an out-of-range frequency or delay

#[cfg(not(feature = "std"))]
extern crate alloc;

pub mod dsp;
pub mod synth;
pub mod tone;

/// Commonly used types/functions for convenience:
pub mod prelude {
    pub use crate::dsp::{duration_of_frames, frames_for_duration, quantize_i16, TAU};
    pub use crate::synth::{synthesize, SampleBuffer, SynthesisFault, BYTES_PER_SAMPLE};
    pub use crate::tone::{
        ToneParameters, DEFAULT_FREQUENCY_HZ, MAX_DELAY_SAMPLES, MAX_FREQUENCY_HZ,
        MIN_DELAY_SAMPLES, MIN_FREQUENCY_HZ,
    };
}
