//! Seeded pseudo-random number stream.
//!
//! Every piece of synthetic data in this server is derived from one of these
//! streams, so the whole dataset for a given seed string is reproducible.
//! The state is a single 32-bit word: the seed string is folded with FNV-1a,
//! and each output applies an avalanche mix before normalizing to `[0, 1)`.
//!
//! # Draw stability
//!
//! Each helper consumes a documented number of draws (one each). Callers rely
//! on this: reordering draws, or drawing conditionally where the original
//! drew unconditionally, silently changes every downstream value for a seed.

use std::fmt;

/// Error raised when a uniform choice is requested from an empty slice.
///
/// This is a programming-error class failure in the generator, not a runtime
/// condition to recover from. It is propagated as a typed error and never
/// caught inside the generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmptyInputError;

impl fmt::Display for EmptyInputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pick() requires a non-empty slice")
    }
}

impl std::error::Error for EmptyInputError {}

/// Deterministic PRNG seeded from a string.
///
/// Two instances constructed with the same seed produce identical infinite
/// sequences. Not cryptographic; the only requirement is reproducibility and
/// a visually plausible distribution.
#[derive(Debug, Clone)]
pub struct SeededRng {
    state: u32,
}

/// FNV-1a fold of the seed bytes into a 32-bit word.
fn fnv1a32(input: &str) -> u32 {
    let mut hash: u32 = 0x811c_9dc5;
    for byte in input.bytes() {
        hash ^= u32::from(byte);
        hash = hash.wrapping_mul(0x0100_0193);
    }
    hash
}

impl SeededRng {
    /// Create a new stream from a seed string.
    ///
    /// A zero hash is mapped to 1 so the state never gets stuck.
    #[must_use]
    pub fn new(seed: &str) -> Self {
        let hash = fnv1a32(seed);
        Self {
            state: if hash == 0 { 1 } else { hash },
        }
    }

    /// Next value in `[0, 1)`. Consumes exactly one draw.
    pub fn next_f64(&mut self) -> f64 {
        self.state = self.state.wrapping_add(0x6d2b_79f5);
        let mut t = self.state;
        t = (t ^ (t >> 15)).wrapping_mul(t | 1);
        t ^= t.wrapping_add((t ^ (t >> 7)).wrapping_mul(t | 61));
        f64::from(t ^ (t >> 14)) / 4_294_967_296.0
    }

    /// Uniform integer in `[min, max]` inclusive. One draw.
    #[allow(clippy::cast_possible_truncation)]
    pub fn random_int(&mut self, min: i64, max: i64) -> i64 {
        let span = (max - min + 1) as f64;
        min + (self.next_f64() * span).floor() as i64
    }

    /// Uniform float in `[min, max]`. One draw.
    pub fn random_float(&mut self, min: f64, max: f64) -> f64 {
        self.next_f64().mul_add(max - min, min)
    }

    /// Uniform choice from a slice. One draw.
    ///
    /// # Errors
    ///
    /// Returns [`EmptyInputError`] on an empty slice, before consuming a draw.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn pick<'a, T>(&mut self, items: &'a [T]) -> Result<&'a T, EmptyInputError> {
        if items.is_empty() {
            return Err(EmptyInputError);
        }
        let idx = (self.next_f64() * items.len() as f64).floor() as usize;
        Ok(&items[idx.min(items.len() - 1)])
    }

    /// Bernoulli draw with probability `p`. One draw.
    pub fn chance(&mut self, p: f64) -> bool {
        self.next_f64() < p
    }
}

/// Clamp `value` into `[min, max]`.
#[must_use]
pub fn clamp(value: f64, min: f64, max: f64) -> f64 {
    value.max(min).min(max)
}
