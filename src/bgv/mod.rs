pub mod encoding;
pub mod encrypt;
pub mod eval;
pub mod keygen;
pub mod keyswitch;
pub mod modswitch;
pub mod noise;

pub use encoding::Plaintext;
pub use encrypt::{decrypt, encrypt, encrypt_symmetric, invariant_noise_budget, Decryptor, Encryptor};
pub use eval::Evaluator;
pub use keygen::{KeyManager, PublicKey, RelinearizationKey, SecretKey};
pub use keyswitch::{gadget_decompose, relinearize};
pub use modswitch::switch_modulus;
pub use noise::NoiseEstimate;

use std::sync::Arc;

use crate::error::{BgvError, Result};
use crate::params::BgvParams;
use crate::ring::RingElement;

/// A BGV ciphertext: (c0, c1) at some level, or (c0, c1, c2) straight out of
/// a multiplication.
#[derive(Clone, Debug)]
pub struct Ciphertext {
    components: Vec<RingElement>,
    level: usize,
    pending_rescale: bool,
    noise: NoiseEstimate,
    params: Arc<BgvParams>,
}

impl Ciphertext {
    pub(crate) fn new(
        components: Vec<RingElement>,
        level: usize,
        pending_rescale: bool,
        noise: NoiseEstimate,
        params: &Arc<BgvParams>,
    ) -> Self {
        Self {
            components,
            level,
            pending_rescale,
            noise,
            params: params.clone(),
        }
    }

    pub fn components(&self) -> &[RingElement] {
        &self.components
    }

    /// Index into the modulus chain; 0 is fresh.
    pub fn level(&self) -> usize {
        self.level
    }

    /// Number of components minus one: 1 normally, 2 before relinearization.
    pub fn degree(&self) -> usize {
        self.components.len() - 1
    }

    /// Set by `multiply`, cleared by `switch_modulus`.
    pub fn is_pending_rescale(&self) -> bool {
        self.pending_rescale
    }

    pub fn noise(&self) -> NoiseEstimate {
        self.noise
    }

    /// Estimated remaining invariant noise budget in bits.
    pub fn estimated_budget_bits(&self) -> Result<f64> {
        self.noise.budget_bits(&self.params, self.level)
    }

    pub fn params(&self) -> &Arc<BgvParams> {
        &self.params
    }

    pub fn plain_modulus(&self) -> u64 {
        self.params.plain_modulus
    }

    pub fn modulus(&self) -> u64 {
        self.components[0].modulus()
    }

    /// Replace the noise estimate, e.g. after decoding a ciphertext whose
    /// history is known to the caller.
    pub fn with_noise_estimate(mut self, noise: NoiseEstimate) -> Self {
        self.noise = noise;
        self
    }

    /// Reject degrees outside `allowed`.
    pub(crate) fn expect_degree(&self, allowed: &[usize]) -> Result<()> {
        if allowed.contains(&self.degree()) {
            Ok(())
        } else {
            Err(BgvError::CiphertextDegree {
                expected: allowed[0],
                got: self.degree(),
            })
        }
    }
}
