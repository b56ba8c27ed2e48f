use rand::Rng;

use crate::sampling::Sampler;

/// Discrete Gaussian over Z centered at 0, sampled from a cumulative
/// distribution table truncated at ⌈6σ⌉.
///
/// The table is built once; every draw scans all of it so the running time
/// does not depend on the value returned.
#[derive(Clone, Debug)]
pub struct GaussianCdt {
    sigma: f64,
    tail: i64,
    cdf: Vec<f64>,
    total: f64,
}

impl GaussianCdt {
    pub fn new(sigma: f64) -> Self {
        let tail = tail_bound(sigma) as i64;
        let two_sigma_sq = 2.0 * sigma * sigma;
        let mut cdf = Vec::with_capacity((2 * tail + 1) as usize);
        let mut cumulative = 0.0f64;
        for x in -tail..=tail {
            cumulative += (-((x * x) as f64) / two_sigma_sq).exp();
            cdf.push(cumulative);
        }
        Self { sigma, tail, cdf, total: cumulative }
    }

    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    /// Largest magnitude this sampler can return.
    pub fn tail(&self) -> u64 {
        self.tail as u64
    }

    pub fn sample<R: Rng>(&self, rng: &mut R) -> i64 {
        let u: f64 = rng.random::<f64>() * self.total;

        // Branchless scan: visit every entry, keep the lowest index with u < cdf[i].
        let mut result = self.tail;
        for i in (0..self.cdf.len()).rev() {
            let mask = ((u < self.cdf[i]) as i64).wrapping_neg();
            let candidate = -self.tail + i as i64;
            result = (candidate & mask) | (result & !mask);
        }
        result
    }
}

/// ⌈6σ⌉, the bound every noise coefficient respects.
pub fn tail_bound(sigma: f64) -> u64 {
    (6.0 * sigma).ceil() as u64
}

/// Draw n small-noise coefficients.
pub fn sample_noise_coeffs<S: Sampler + ?Sized>(n: usize, sampler: &mut S) -> Vec<i64> {
    (0..n).map(|_| sampler.small_noise()).collect()
}
