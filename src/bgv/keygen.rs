use std::sync::Arc;

use tracing::debug;
use zeroize::{Zeroize, Zeroizing};

use crate::error::{BgvError, Result};
use crate::params::BgvParams;
use crate::ring::RingElement;
use crate::sampling::{
    sample_noise_coeffs, sample_ternary_coeffs, sample_uniform_poly, ChaChaSampler, Sampler,
};

/// BGV secret key: ternary s ∈ R_{q_0}.
///
/// Not `Clone`. The coefficients are wiped on drop, and per-level copies
/// handed out by [`SecretKey::at_level`] are wiped when they go out of scope.
pub struct SecretKey {
    poly: RingElement,
    params: Arc<BgvParams>,
}

impl SecretKey {
    pub(crate) fn from_poly(poly: RingElement, params: &Arc<BgvParams>) -> Self {
        Self {
            poly,
            params: params.clone(),
        }
    }

    pub fn params(&self) -> &Arc<BgvParams> {
        &self.params
    }

    /// s at level 0.
    pub fn poly(&self) -> &RingElement {
        &self.poly
    }

    /// s reduced into R_{q_level}.
    pub fn at_level(&self, level: usize) -> Result<Zeroizing<RingElement>> {
        let ctx = self.params.chain.context(level)?;
        Ok(Zeroizing::new(self.poly.lift_to(ctx)?))
    }
}

impl Drop for SecretKey {
    fn drop(&mut self) {
        self.poly.zeroize();
    }
}

impl std::fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretKey")
            .field("ring_degree", &self.params.ring_degree)
            .finish_non_exhaustive()
    }
}

/// BGV public key (b, a) with b = -(a·s) + e at level 0.
#[derive(Clone, Debug)]
pub struct PublicKey {
    pub b: RingElement,
    pub a: RingElement,
    pub params: Arc<BgvParams>,
}

/// Encryptions of w^j·s² under s, one set per level of the chain.
///
/// Entry j of level i is (rlk0_j, rlk1_j) at q_i with
/// rlk0_j + rlk1_j·s = w^j·s² + e_j.
#[derive(Clone, Debug)]
pub struct RelinearizationKey {
    levels: Vec<Vec<(RingElement, RingElement)>>,
    params: Arc<BgvParams>,
}

impl RelinearizationKey {
    pub(crate) fn from_levels(
        levels: Vec<Vec<(RingElement, RingElement)>>,
        params: &Arc<BgvParams>,
    ) -> Self {
        Self {
            levels,
            params: params.clone(),
        }
    }

    pub fn params(&self) -> &Arc<BgvParams> {
        &self.params
    }

    pub fn level_keys(&self, level: usize) -> Result<&[(RingElement, RingElement)]> {
        self.levels
            .get(level)
            .map(Vec::as_slice)
            .ok_or(BgvError::InvalidLevel {
                level,
                max: self.levels.len().saturating_sub(1),
            })
    }

    pub fn levels(&self) -> &[Vec<(RingElement, RingElement)>] {
        &self.levels
    }
}

/// Generate a secret key with n ternary draws.
pub fn gen_secret_key<S: Sampler + ?Sized>(
    params: &Arc<BgvParams>,
    sampler: &mut S,
) -> Result<SecretKey> {
    let coeffs = Zeroizing::new(sample_ternary_coeffs(params.ring_degree, sampler));
    let poly = RingElement::from_signed(&coeffs, params.base_context())?;
    debug!(ring_degree = params.ring_degree, "generated secret key");
    Ok(SecretKey::from_poly(poly, params))
}

/// Generate the public key for `sk`: uniform a, then error e.
pub fn gen_public_key<S: Sampler + ?Sized>(sk: &SecretKey, sampler: &mut S) -> Result<PublicKey> {
    let params = &sk.params;
    let ctx = params.base_context();

    let a = sample_uniform_poly(ctx, sampler)?;
    let e = RingElement::from_signed(&sample_noise_coeffs(params.ring_degree, sampler), ctx)?;

    // b = -(a·s) + e
    let b = a.mul(&sk.poly)?.neg().add(&e)?;
    debug!(modulus = ctx.modulus(), "generated public key");

    Ok(PublicKey {
        b,
        a,
        params: params.clone(),
    })
}

/// Generate the relinearization key for every level of the chain.
pub fn gen_relin_key<S: Sampler + ?Sized>(
    sk: &SecretKey,
    sampler: &mut S,
) -> Result<RelinearizationKey> {
    let params = &sk.params;
    let base = params.decomposition_base;
    let mut levels = Vec::with_capacity(params.chain.len());

    for (i, level) in params.chain.iter().enumerate() {
        let ctx = &level.context;
        let s = sk.at_level(i)?;
        let s_sq = Zeroizing::new(s.mul(&s)?);

        let mut keys = Vec::with_capacity(level.digits);
        // w^j · s²
        let mut gadget_s_sq = Zeroizing::new((*s_sq).clone());
        for j in 0..level.digits {
            let a = sample_uniform_poly(ctx, sampler)?;
            let e = RingElement::from_signed(&sample_noise_coeffs(params.ring_degree, sampler), ctx)?;

            let rlk0 = a.mul(&s)?.neg().add(&e)?.add(&gadget_s_sq)?;
            keys.push((rlk0, a));

            if j + 1 < level.digits {
                gadget_s_sq = Zeroizing::new(gadget_s_sq.scalar_mul(base));
            }
        }
        debug!(level = i, digits = level.digits, "generated relinearization keys");
        levels.push(keys);
    }

    Ok(RelinearizationKey::from_levels(levels, params))
}

/// Key generation bound to one parameter set and one randomness source.
///
/// Every call draws fresh randomness from the owned sampler. Concurrent
/// managers can share a stream through [`crate::sampling::SharedSampler`].
pub struct KeyManager<S = ChaChaSampler> {
    params: Arc<BgvParams>,
    sampler: S,
}

impl KeyManager<ChaChaSampler> {
    /// Manager drawing from a ChaCha20 stream seeded by the operating system.
    pub fn from_os_rng(params: &Arc<BgvParams>) -> Self {
        Self::new(params, ChaChaSampler::from_os_rng(params.sigma))
    }
}

impl<S: Sampler> KeyManager<S> {
    pub fn new(params: &Arc<BgvParams>, sampler: S) -> Self {
        Self {
            params: params.clone(),
            sampler,
        }
    }

    pub fn params(&self) -> &Arc<BgvParams> {
        &self.params
    }

    pub fn generate_secret_key(&mut self) -> Result<SecretKey> {
        gen_secret_key(&self.params, &mut self.sampler)
    }

    pub fn generate_public_key(&mut self, sk: &SecretKey) -> Result<PublicKey> {
        self.check_key_params(sk)?;
        gen_public_key(sk, &mut self.sampler)
    }

    pub fn generate_relin_key(&mut self, sk: &SecretKey) -> Result<RelinearizationKey> {
        self.check_key_params(sk)?;
        gen_relin_key(sk, &mut self.sampler)
    }

    /// Secret, public and relinearization key, drawn in that order.
    pub fn generate_keys(&mut self) -> Result<(SecretKey, PublicKey, RelinearizationKey)> {
        let sk = self.generate_secret_key()?;
        let pk = self.generate_public_key(&sk)?;
        let rlk = self.generate_relin_key(&sk)?;
        Ok((sk, pk, rlk))
    }

    fn check_key_params(&self, sk: &SecretKey) -> Result<()> {
        if sk.params.ring_degree != self.params.ring_degree {
            return Err(BgvError::DimensionMismatch {
                expected: self.params.ring_degree,
                got: sk.params.ring_degree,
            });
        }
        let (ours, theirs) = (self.params.chain.fresh().modulus, sk.params.chain.fresh().modulus);
        if ours != theirs {
            return Err(BgvError::ModulusMismatch {
                expected: ours,
                got: theirs,
            });
        }
        Ok(())
    }
}
