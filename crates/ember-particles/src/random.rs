//! Seedable per-system random source (ChaCha8)

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Random source owned by one particle system.
///
/// Each system seeds its own stream, so two runs with the same seed and the
/// same Δt sequence produce identical particles, and systems never share
/// mutable state when updated in parallel.
#[derive(Debug, Clone)]
pub struct ParticleRng {
    inner: ChaCha8Rng,
    seed: u64,
}

impl ParticleRng {
    pub fn new(seed: u64) -> Self {
        Self {
            inner: ChaCha8Rng::seed_from_u64(seed),
            seed,
        }
    }

    /// The seed this stream was created (or last reset) with
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Restart the stream from `seed`
    pub fn reseed(&mut self, seed: u64) {
        *self = Self::new(seed);
    }

    /// Returns a float in [0, 1)
    pub fn next_f32(&mut self) -> f32 {
        self.inner.gen::<f32>()
    }

    /// Returns a float in [min, max)
    pub fn range(&mut self, min: f32, max: f32) -> f32 {
        min + self.next_f32() * (max - min)
    }

    /// Returns an index in [0, len). `len` must be non-zero.
    pub fn index(&mut self, len: usize) -> usize {
        self.inner.gen_range(0..len)
    }
}
