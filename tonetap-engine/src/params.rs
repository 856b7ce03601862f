//! Parameter store shared by the control surface and the scheduler.
//!
//! Backed by an `ArcSwap`: readers take a whole `ToneParameters` snapshot
//! without locking, writers publish a new value with a compare-and-swap loop.
//! A reader sees either the value before a write or after it, never a mix.

use std::sync::Arc;

use arc_swap::ArcSwap;
use tonetap_core::tone::ToneParameters;

#[derive(Debug)]
pub struct ParameterStore {
    current: ArcSwap<ToneParameters>,
}

impl Default for ParameterStore {
    fn default() -> Self {
        Self::new(ToneParameters::default())
    }
}

impl ParameterStore {
    pub fn new(initial: ToneParameters) -> Self {
        Self { current: ArcSwap::from_pointee(initial) }
    }

    /// Consistent copy of all parameters.
    pub fn snapshot(&self) -> ToneParameters {
        **self.current.load()
    }

    /// Apply `update` atomically and return the value it produced.
    fn update(&self, update: impl Fn(ToneParameters) -> ToneParameters) -> ToneParameters {
        // `rcu` hands back the value it replaced; `update` is pure, so
        // re-applying it reproduces what was stored.
        let previous = self.current.rcu(|p| update(**p));
        update(*previous)
    }

    /// Add `delta` Hz (clamped to 100..=4000).
    pub fn adjust_frequency(&self, delta: f64) -> ToneParameters {
        self.update(|p| p.with_frequency_delta(delta))
    }

    /// Add `round(delta / 10)` samples of delay (clamped to 0..=441).
    pub fn adjust_delay(&self, delta: f64) -> ToneParameters {
        self.update(|p| p.with_delay_delta(delta))
    }

    /// Set the play flag. Returns whether it changed.
    pub fn set_playing(&self, playing: bool) -> bool {
        let previous = self.current.rcu(|p| p.with_playing(playing));
        previous.is_playing() != playing
    }

    /// Flip the play flag and return the new value.
    pub fn toggle_playing(&self) -> bool {
        let previous = self.current.rcu(|p| p.with_playing(!p.is_playing()));
        !previous.is_playing()
    }
}

impl From<ToneParameters> for ParameterStore {
    fn from(p: ToneParameters) -> Self {
        Self::new(p)
    }
}

/// Shared handle, as held by the engine and its worker.
pub type SharedParameters = Arc<ParameterStore>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use tonetap_core::tone::{MAX_DELAY_SAMPLES, MAX_FREQUENCY_HZ, MIN_FREQUENCY_HZ};

    #[test]
    fn adjustments_clamp() {
        let store = ParameterStore::default();
        assert_eq!(store.adjust_frequency(500.0).frequency_hz(), 1000.0);
        assert_eq!(store.adjust_frequency(1.0e9).frequency_hz(), MAX_FREQUENCY_HZ);
        assert_eq!(store.adjust_frequency(-1.0e9).frequency_hz(), MIN_FREQUENCY_HZ);
        assert_eq!(store.adjust_delay(4410.0).delay_samples(), MAX_DELAY_SAMPLES);
        assert_eq!(store.adjust_delay(-10_000.0).delay_samples(), 0);
        assert_eq!(store.snapshot().frequency_hz(), MIN_FREQUENCY_HZ);
    }

    #[test]
    fn set_playing_is_idempotent() {
        let store = ParameterStore::default();
        assert!(!store.set_playing(false));
        assert!(store.set_playing(true));
        assert!(!store.set_playing(true));
        assert!(store.snapshot().is_playing());
        assert!(store.set_playing(false));
    }

    #[test]
    fn toggle_twice_restores() {
        let store = ParameterStore::default();
        assert!(store.toggle_playing());
        assert!(!store.toggle_playing());
        assert!(!store.snapshot().is_playing());
    }

    #[test]
    fn concurrent_writers_never_escape_bounds() {
        let store = Arc::new(ParameterStore::default());
        let writers: Vec<_> = (0..4)
            .map(|w| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for i in 0..2000 {
                        let sign = if (i + w) % 2 == 0 { 1.0 } else { -1.0 };
                        store.adjust_frequency(sign * 731.0);
                        store.adjust_delay(sign * 997.0);
                        store.toggle_playing();
                    }
                })
            })
            .collect();

        for _ in 0..10_000 {
            let p = store.snapshot();
            assert!((MIN_FREQUENCY_HZ..=MAX_FREQUENCY_HZ).contains(&p.frequency_hz()));
            assert!(p.delay_samples() <= MAX_DELAY_SAMPLES);
        }
        for w in writers {
            w.join().unwrap();
        }
    }

    #[test]
    fn concurrent_deltas_are_not_lost() {
        let store = Arc::new(ParameterStore::new(ToneParameters::new(100.0, 0)));
        let writers: Vec<_> = (0..4)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for _ in 0..100 {
                        store.adjust_frequency(1.0);
                    }
                })
            })
            .collect();
        for w in writers {
            w.join().unwrap();
        }
        assert_eq!(store.snapshot().frequency_hz(), 500.0);
    }
}
