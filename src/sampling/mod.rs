//! Randomness capability consumed by key generation and encryption.
//!
//! The core never picks its own entropy source: every routine that needs
//! randomness takes a `&mut impl Sampler`. [`ChaChaSampler`] is the
//! implementation used in practice; tests substitute scripted samplers.

pub mod gaussian;
pub mod uniform;

use std::sync::{Arc, Mutex};

use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

pub use gaussian::{sample_noise_coeffs, tail_bound, GaussianCdt};
pub use uniform::{sample_ternary_coeffs, sample_uniform_poly};

/// Source of the three kinds of draws the scheme needs.
pub trait Sampler {
    /// Uniform integer in [0, modulus).
    fn uniform(&mut self, modulus: u64) -> u64;

    /// Small error term, bounded in magnitude by the parameter set's noise tail.
    fn small_noise(&mut self) -> i64;

    /// Uniform draw from {-1, 0, 1}.
    fn ternary(&mut self) -> i64 {
        self.uniform(3) as i64 - 1
    }
}

impl<S: Sampler + ?Sized> Sampler for &mut S {
    fn uniform(&mut self, modulus: u64) -> u64 {
        (**self).uniform(modulus)
    }

    fn small_noise(&mut self) -> i64 {
        (**self).small_noise()
    }

    fn ternary(&mut self) -> i64 {
        (**self).ternary()
    }
}

/// ChaCha20 stream with a constant-time discrete Gaussian for noise.
pub struct ChaChaSampler {
    rng: ChaCha20Rng,
    gaussian: GaussianCdt,
}

impl ChaChaSampler {
    /// Seeded from the operating system's entropy source.
    pub fn from_os_rng(sigma: f64) -> Self {
        Self::from_rng(ChaCha20Rng::from_os_rng(), sigma)
    }

    /// Deterministic stream, for reproducible tests and benchmarks.
    pub fn from_seed(seed: u64, sigma: f64) -> Self {
        Self::from_rng(ChaCha20Rng::seed_from_u64(seed), sigma)
    }

    pub fn from_rng(rng: ChaCha20Rng, sigma: f64) -> Self {
        Self {
            rng,
            gaussian: GaussianCdt::new(sigma),
        }
    }

    pub fn noise_tail(&self) -> u64 {
        self.gaussian.tail()
    }
}

impl Sampler for ChaChaSampler {
    fn uniform(&mut self, modulus: u64) -> u64 {
        uniform::uniform_below(modulus, &mut self.rng)
    }

    fn small_noise(&mut self) -> i64 {
        self.gaussian.sample(&mut self.rng)
    }

    fn ternary(&mut self) -> i64 {
        uniform::ternary(&mut self.rng)
    }
}

/// Cloneable handle that serializes access to one underlying sampler, so
/// concurrent key-generation requests draw from a single stream.
pub struct SharedSampler<S> {
    inner: Arc<Mutex<S>>,
}

impl<S> SharedSampler<S> {
    pub fn new(sampler: S) -> Self {
        Self {
            inner: Arc::new(Mutex::new(sampler)),
        }
    }

    fn with<T>(&self, f: impl FnOnce(&mut S) -> T) -> T {
        // Sampler state has no cross-call invariant a panic could break.
        let mut guard = self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut guard)
    }
}

impl<S> Clone for SharedSampler<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<S: Sampler> Sampler for SharedSampler<S> {
    fn uniform(&mut self, modulus: u64) -> u64 {
        self.with(|s| s.uniform(modulus))
    }

    fn small_noise(&mut self) -> i64 {
        self.with(|s| s.small_noise())
    }

    fn ternary(&mut self) -> i64 {
        self.with(|s| s.ternary())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_sampler_is_reproducible() {
        let mut a = ChaChaSampler::from_seed(7, 3.2);
        let mut b = ChaChaSampler::from_seed(7, 3.2);
        for _ in 0..64 {
            assert_eq!(a.uniform(1153), b.uniform(1153));
            assert_eq!(a.small_noise(), b.small_noise());
            assert_eq!(a.ternary(), b.ternary());
        }
    }

    #[test]
    fn test_noise_respects_tail() {
        let mut s = ChaChaSampler::from_seed(1, 3.2);
        assert_eq!(s.noise_tail(), 20);
        assert!((0..5000).all(|_| s.small_noise().abs() <= 20));
    }

    #[test]
    fn test_shared_sampler_clones_share_stream() {
        let shared = SharedSampler::new(ChaChaSampler::from_seed(9, 3.2));
        let mut h1 = shared.clone();
        let mut h2 = shared.clone();
        let mut reference = ChaChaSampler::from_seed(9, 3.2);
        let expected: Vec<u64> = (0..4).map(|_| reference.uniform(1 << 40)).collect();
        let got = vec![
            h1.uniform(1 << 40),
            h2.uniform(1 << 40),
            h1.uniform(1 << 40),
            h2.uniform(1 << 40),
        ];
        assert_eq!(got, expected);
    }

    struct Counting(u64);

    impl Sampler for Counting {
        fn uniform(&mut self, modulus: u64) -> u64 {
            self.0 += 1;
            self.0 % modulus
        }

        fn small_noise(&mut self) -> i64 {
            0
        }
    }

    #[test]
    fn test_default_ternary_uses_uniform() {
        let mut s = Counting(0);
        assert_eq!((0..3).map(|_| s.ternary()).collect::<Vec<_>>(), vec![0, 1, -1]);
    }
}
