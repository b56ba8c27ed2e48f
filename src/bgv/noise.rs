//! Pessimistic tracking of the invariant noise.
//!
//! A ciphertext at level i satisfies c0 + c1·s (+ c2·s²) = Δ_i·m + v mod q_i.
//! Decryption is correct while |v| + r_i < q_i / (2t), where r_i = q_i mod t
//! accounts for Δ_i·t falling short of q_i. [`NoiseEstimate`] carries an upper
//! bound on |v| + r_i and every homomorphic operation updates it with the
//! worst-case growth of that operation. Bounds are kept in f64: they only
//! feed diagnostics and never gate an operation.

use tracing::warn;

use crate::error::Result;
use crate::params::BgvParams;

/// Upper bound on |v| + (q_level mod t) for one ciphertext.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NoiseEstimate {
    bound: f64,
}

impl NoiseEstimate {
    pub fn from_bound(bound: f64) -> Self {
        Self { bound }
    }

    pub fn bound(&self) -> f64 {
        self.bound
    }

    /// Public-key encryption: e0 + e·u + e1·s with ternary u, s contributes
    /// at most B(2n + 1).
    pub fn fresh_public(params: &BgvParams) -> Self {
        let n = params.ring_degree as f64;
        let b = params.noise_bound() as f64;
        Self::from_bound(b * (2.0 * n + 1.0) + params.chain.fresh().plain_residue as f64)
    }

    /// Symmetric encryption carries only the single error e.
    pub fn fresh_symmetric(params: &BgvParams) -> Self {
        let b = params.noise_bound() as f64;
        Self::from_bound(b + params.chain.fresh().plain_residue as f64)
    }

    /// Bound sitting exactly at the decryption threshold of `level`, i.e. zero
    /// remaining budget. Used for ciphertexts whose history is unknown.
    pub fn saturated(params: &BgvParams, level: usize) -> Result<Self> {
        Ok(Self::from_bound(threshold(params, level)?))
    }

    /// Remaining bits before the bound reaches q_level / (2t), floored at zero.
    pub fn budget_bits(&self, params: &BgvParams, level: usize) -> Result<f64> {
        let limit = threshold(params, level)?;
        Ok((limit.log2() - self.bound.max(1.0).log2()).max(0.0))
    }

    pub fn is_exhausted(&self, params: &BgvParams, level: usize) -> Result<bool> {
        Ok(self.bound >= threshold(params, level)?)
    }

    pub(crate) fn add(self, other: Self) -> Self {
        Self::from_bound(self.bound + other.bound)
    }

    /// Negation and plaintext addition each add one rounding bias r.
    pub(crate) fn shift(self, params: &BgvParams, level: usize) -> Result<Self> {
        Ok(Self::from_bound(self.bound + residue(params, level)?))
    }

    /// Product with a plaintext of centered ℓ1 norm `l1`.
    pub(crate) fn mul_plain(self, l1: f64, params: &BgvParams, level: usize) -> Result<Self> {
        Ok(Self::from_bound(l1.max(1.0) * self.bound + residue(params, level)?))
    }

    /// Tensor product followed by the t/q rounding.
    ///
    /// The rounding error of each of the three output components is at most
    /// 1/2, weighted by ‖1‖, ‖s‖ and ‖s²‖ in the decryption.
    pub(crate) fn multiply(self, other: Self, params: &BgvParams, level: usize) -> Result<Self> {
        let chain_level = params.level(level)?;
        let n = params.ring_degree as f64;
        let t = params.plain_modulus as f64;
        let q = chain_level.modulus as f64;
        let r = chain_level.plain_residue as f64;
        let k = (n + 4.0) / 2.0;
        let (v1, v2) = (self.bound, other.bound);

        let v = r
            + 2.0 * r * n * t
            + n * t * (v1 + v2)
            + 2.0 * r * n * t * k
            + t * n * v1 * v2 / q
            + t * n * k * (v1 + v2)
            + (1.0 + n + n * n) / 2.0;
        Ok(Self::from_bound(v + r))
    }

    /// Digit-times-key-error terms of relinearization: ℓ digits, each bounded
    /// by w/2 + 1, times errors bounded by B, over n coefficients.
    pub(crate) fn relinearize(self, params: &BgvParams, level: usize) -> Result<Self> {
        let digits = params.level(level)?.digits as f64;
        let n = params.ring_degree as f64;
        let w = params.decomposition_base as f64;
        let b = params.noise_bound() as f64;
        Ok(Self::from_bound(self.bound + digits * n * (w / 2.0 + 1.0) * b))
    }

    /// Rescale from level `from` to level `to` for a ciphertext of the given
    /// degree.
    pub(crate) fn switch(
        self,
        params: &BgvParams,
        from: usize,
        to: usize,
        degree: usize,
    ) -> Result<Self> {
        let src = params.level(from)?;
        let dst = params.level(to)?;
        let n = params.ring_degree as f64;
        let ratio = dst.modulus as f64 / src.modulus as f64;
        let s_squared = if degree >= 2 { n * n } else { 0.0 };
        let rounding = (1.0 + n + s_squared) / 2.0;
        let bias = src.plain_residue.max(dst.plain_residue) as f64 + dst.plain_residue as f64;
        Ok(Self::from_bound(ratio * self.bound + rounding + bias))
    }

    /// Log once a bound crosses the threshold. Operations still go ahead.
    pub(crate) fn warn_if_exhausted(&self, params: &BgvParams, level: usize, op: &str) {
        if let Ok(true) = self.is_exhausted(params, level) {
            warn!(
                op,
                level,
                bound = self.bound,
                "noise estimate exceeds the decryption threshold; results may not decrypt"
            );
        }
    }
}

/// q_level / (2t).
fn threshold(params: &BgvParams, level: usize) -> Result<f64> {
    let q = params.level(level)?.modulus as f64;
    Ok(q / (2.0 * params.plain_modulus as f64))
}

fn residue(params: &BgvParams, level: usize) -> Result<f64> {
    Ok(params.level(level)?.plain_residue as f64)
}
