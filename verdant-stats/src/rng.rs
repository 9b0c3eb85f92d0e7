//! The random source consumed by trees, operators and the driver.

use rand::{Rng as _, RngCore, SeedableRng};
use rand_pcg::Pcg64;
use serde::{Deserialize, Serialize};

/// Seeded pseudo-random generator.
///
/// There is no ambient global generator: a single `Rng` is owned by the
/// chain's state and passed by `&mut` wherever entropy is needed, so a run is
/// reproducible from its seed and a checkpoint resumes the exact stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rng {
    inner: Pcg64,
}

impl Rng {
    /// Create a generator from a 64-bit seed.
    pub fn seeded(seed: u64) -> Self {
        Self {
            inner: Pcg64::seed_from_u64(seed),
        }
    }

    /// Uniform real in `[0, 1)`.
    pub fn uniform(&mut self) -> f64 {
        self.inner.random::<f64>()
    }

    /// Uniform real in `[low, high)`.
    pub fn uniform_in(&mut self, low: f64, high: f64) -> f64 {
        low + (high - low) * self.uniform()
    }

    /// Uniform integer in `[0, n)`. `n` must be nonzero.
    pub fn int(&mut self, n: usize) -> usize {
        debug_assert!(n > 0, "Rng::int called with an empty range");
        self.inner.random_range(0..n)
    }

    /// Fair coin flip.
    pub fn bool(&mut self) -> bool {
        self.inner.random_bool(0.5)
    }
}

impl RngCore for Rng {
    fn next_u32(&mut self) -> u32 {
        self.inner.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.inner.next_u64()
    }

    fn fill_bytes(&mut self, dst: &mut [u8]) {
        self.inner.fill_bytes(dst)
    }
}
