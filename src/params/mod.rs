pub mod chain;
pub mod presets;
pub mod security;

use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::{BgvError, Result};
use crate::ring::context::MAX_MODULUS_BITS;
use crate::ring::RingContext;
use crate::sampling::tail_bound;

pub use chain::{ChainLevel, ModulusChain, ScaleFactor};

/// Setup parameters shared by every key and ciphertext of one deployment.
#[derive(Debug)]
pub struct BgvParams {
    /// Ring degree n (power of two).
    pub ring_degree: usize,
    /// Plaintext modulus t.
    pub plain_modulus: u64,
    /// Gaussian noise standard deviation.
    pub sigma: f64,
    /// Relinearization digit base w.
    pub decomposition_base: u64,
    /// q_0 > ... > q_L.
    pub chain: ModulusChain,
    /// Ring Z_t[X]/(X^n + 1) that plaintexts live in.
    pub plain_context: Arc<RingContext>,
}

impl BgvParams {
    /// L: the terminal level, equal to the supported multiplicative depth.
    pub fn max_level(&self) -> usize {
        self.chain.max_level()
    }

    /// ⌈6σ⌉, the magnitude bound on every sampled noise coefficient.
    pub fn noise_bound(&self) -> u64 {
        tail_bound(self.sigma)
    }

    pub fn level(&self, i: usize) -> Result<&ChainLevel> {
        self.chain.level(i)
    }

    /// Fresh-level ring context.
    pub fn base_context(&self) -> &Arc<RingContext> {
        &self.chain.fresh().context
    }
}

/// Builder for BgvParams.
pub struct BgvParamsBuilder {
    ring_degree: usize,
    plain_modulus: u64,
    moduli: Vec<u64>,
    sigma: f64,
    decomposition_base: u64,
}

impl Default for BgvParamsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl BgvParamsBuilder {
    pub fn new() -> Self {
        Self {
            ring_degree: 1024,
            plain_modulus: 257,
            moduli: Vec::new(),
            sigma: 3.2,
            decomposition_base: 1 << 16,
        }
    }

    pub fn ring_degree(mut self, n: usize) -> Self {
        self.ring_degree = n;
        self
    }

    pub fn plain_modulus(mut self, t: u64) -> Self {
        self.plain_modulus = t;
        self
    }

    /// Ciphertext moduli from the fresh level q_0 down to the terminal level q_L.
    pub fn moduli(mut self, moduli: Vec<u64>) -> Self {
        self.moduli = moduli;
        self
    }

    pub fn sigma(mut self, sigma: f64) -> Self {
        self.sigma = sigma;
        self
    }

    pub fn decomposition_base(mut self, w: u64) -> Self {
        self.decomposition_base = w;
        self
    }

    pub fn build(self) -> Result<Arc<BgvParams>> {
        if !self.ring_degree.is_power_of_two() || self.ring_degree < 2 {
            return Err(BgvError::InvalidSetupParameters(format!(
                "ring degree must be a power of two >= 2, got {}",
                self.ring_degree
            )));
        }
        if self.plain_modulus < 2 {
            return Err(BgvError::InvalidSetupParameters(
                "plaintext modulus must be >= 2".into(),
            ));
        }
        if self.plain_modulus >= 1u64 << MAX_MODULUS_BITS {
            return Err(BgvError::InvalidSetupParameters(format!(
                "plaintext modulus {} must be below 2^{MAX_MODULUS_BITS}",
                self.plain_modulus
            )));
        }
        if !(self.sigma.is_finite() && self.sigma > 0.0) {
            return Err(BgvError::InvalidSetupParameters(format!(
                "noise standard deviation must be positive, got {}",
                self.sigma
            )));
        }

        let chain = ModulusChain::new(
            self.ring_degree,
            self.plain_modulus,
            &self.moduli,
            self.decomposition_base,
        )?;
        let plain_context = RingContext::new(self.ring_degree, self.plain_modulus)?;

        // the noise tail has to stay well inside the smallest modulus
        let terminal = chain.level(chain.max_level())?.modulus;
        let tail = (6.0 * self.sigma).ceil();
        if tail >= (terminal / 2) as f64 {
            return Err(BgvError::InvalidSetupParameters(format!(
                "noise tail bound {tail} for sigma {} must be below q_L/2 = {}",
                self.sigma,
                terminal / 2
            )));
        }

        let log2_q = (self.moduli[0] as f64).log2();
        let security = security::estimate_security_bits(self.ring_degree, log2_q, self.sigma);
        if security < security::TARGET_SECURITY_BITS {
            warn!(
                ring_degree = self.ring_degree,
                log2_q,
                security_bits = security,
                suggested_degree = security::min_ring_degree(log2_q, self.sigma, security::TARGET_SECURITY_BITS),
                "parameter set is below the 128-bit security target"
            );
        }
        debug!(
            ring_degree = self.ring_degree,
            plain_modulus = self.plain_modulus,
            levels = chain.len(),
            decomposition_base = self.decomposition_base,
            security_bits = security,
            "built BGV parameters"
        );

        Ok(Arc::new(BgvParams {
            ring_degree: self.ring_degree,
            plain_modulus: self.plain_modulus,
            sigma: self.sigma,
            decomposition_base: self.decomposition_base,
            chain,
            plain_context,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults_need_moduli() {
        assert!(matches!(
            BgvParamsBuilder::new().build(),
            Err(BgvError::InvalidSetupParameters(_))
        ));
    }

    #[test]
    fn test_builder_validates_degree_and_t() {
        let base = || BgvParamsBuilder::new().moduli(vec![1153, 97]).decomposition_base(16);
        assert!(matches!(
            base().ring_degree(12).plain_modulus(17).build(),
            Err(BgvError::InvalidSetupParameters(_))
        ));
        assert!(matches!(
            base().ring_degree(8).plain_modulus(1).build(),
            Err(BgvError::InvalidSetupParameters(_))
        ));
        assert!(matches!(
            base().ring_degree(8).plain_modulus(17).sigma(0.0).build(),
            Err(BgvError::InvalidSetupParameters(_))
        ));
    }

    #[test]
    fn test_builder_rejects_huge_plain_modulus() {
        let built = BgvParamsBuilder::new()
            .ring_degree(8)
            .plain_modulus(1 << 63)
            .moduli(vec![1153, 97])
            .decomposition_base(16)
            .build();
        assert!(matches!(built, Err(BgvError::InvalidSetupParameters(_))));
    }

    #[test]
    fn test_builder_rejects_noise_wider_than_modulus() {
        let base = || {
            BgvParamsBuilder::new()
                .ring_degree(8)
                .plain_modulus(17)
                .moduli(vec![1153, 97])
                .decomposition_base(16)
        };
        assert!(matches!(base().sigma(1e18).build(), Err(BgvError::InvalidSetupParameters(_))));
        // tail 48 reaches q_L/2 = 48
        assert!(matches!(base().sigma(8.0).build(), Err(BgvError::InvalidSetupParameters(_))));
        assert!(base().sigma(7.5).build().is_ok());
    }

    #[test]
    fn test_builder_toy() {
        let params = BgvParamsBuilder::new()
            .ring_degree(8)
            .plain_modulus(17)
            .moduli(vec![1153, 97])
            .decomposition_base(16)
            .build()
            .unwrap();
        assert_eq!(params.max_level(), 1);
        assert_eq!(params.noise_bound(), 20);
        assert_eq!(params.base_context().modulus(), 1153);
        assert_eq!(params.plain_context.modulus(), 17);
    }
}
