use std::sync::Arc;

use tracing::debug;
use zeroize::Zeroizing;

use crate::bgv::keygen::{PublicKey, SecretKey};
use crate::bgv::{Ciphertext, NoiseEstimate, Plaintext};
use crate::error::{BgvError, Result};
use crate::params::BgvParams;
use crate::ring::modular::center;
use crate::ring::RingElement;
use crate::sampling::{
    sample_noise_coeffs, sample_ternary_coeffs, sample_uniform_poly, ChaChaSampler, Sampler,
};

/// Δ_0·m lifted into R_{q_0}.
fn scale_plaintext(pt: &Plaintext, params: &BgvParams) -> Result<RingElement> {
    let fresh = params.chain.fresh();
    check_plaintext(pt, params)?;
    // m ∈ [0, t) ⊂ [0, q_0), so the coefficients carry over unchanged.
    let m = RingElement::from_coeffs(pt.coeffs().to_vec(), &fresh.context)?;
    Ok(m.scalar_mul(fresh.delta))
}

fn check_plaintext(pt: &Plaintext, params: &BgvParams) -> Result<()> {
    let poly = pt.poly();
    if poly.degree() != params.ring_degree {
        return Err(BgvError::DimensionMismatch {
            expected: params.ring_degree,
            got: poly.degree(),
        });
    }
    if poly.modulus() != params.plain_modulus {
        return Err(BgvError::ModulusMismatch {
            expected: params.plain_modulus,
            got: poly.modulus(),
        });
    }
    Ok(())
}

/// Public-key encryption at level 0.
///
/// ct = (b·u + e0 + Δ·m, a·u + e1) with ternary u and small e0, e1, drawn in
/// that order.
pub fn encrypt<S: Sampler + ?Sized>(
    pt: &Plaintext,
    pk: &PublicKey,
    sampler: &mut S,
) -> Result<Ciphertext> {
    let params = &pk.params;
    let ctx = params.base_context();
    let n = params.ring_degree;

    let delta_m = scale_plaintext(pt, params)?;

    let u = Zeroizing::new(RingElement::from_signed(&sample_ternary_coeffs(n, sampler), ctx)?);
    let e0 = RingElement::from_signed(&sample_noise_coeffs(n, sampler), ctx)?;
    let e1 = RingElement::from_signed(&sample_noise_coeffs(n, sampler), ctx)?;

    let c0 = pk.b.mul(&u)?.add(&e0)?.add(&delta_m)?;
    let c1 = pk.a.mul(&u)?.add(&e1)?;

    Ok(Ciphertext::new(
        vec![c0, c1],
        0,
        false,
        NoiseEstimate::fresh_public(params),
        params,
    ))
}

/// Secret-key encryption at level 0: ct = (-(a·s) + e + Δ·m, a).
pub fn encrypt_symmetric<S: Sampler + ?Sized>(
    pt: &Plaintext,
    sk: &SecretKey,
    sampler: &mut S,
) -> Result<Ciphertext> {
    let params = sk.params();
    let ctx = params.base_context();

    let delta_m = scale_plaintext(pt, params)?;

    let a = sample_uniform_poly(ctx, sampler)?;
    let e = RingElement::from_signed(&sample_noise_coeffs(params.ring_degree, sampler), ctx)?;

    let c0 = a.mul(sk.poly())?.neg().add(&e)?.add(&delta_m)?;

    Ok(Ciphertext::new(
        vec![c0, a],
        0,
        false,
        NoiseEstimate::fresh_symmetric(params),
        params,
    ))
}

/// c0 + c1·s (+ c2·s²) mod q_level.
fn phase(ct: &Ciphertext, sk: &SecretKey) -> Result<RingElement> {
    ct.expect_degree(&[1, 2])?;
    let s = sk.at_level(ct.level())?;
    let comps = ct.components();

    let mut acc = comps[0].add(&comps[1].mul(&s)?)?;
    if let Some(c2) = comps.get(2) {
        let s_sq = Zeroizing::new(s.mul(&s)?);
        acc = acc.add(&c2.mul(&s_sq)?)?;
    }
    Ok(acc)
}

/// Recover the plaintext: m = round(t·x / q) mod t for each phase
/// coefficient x ∈ [0, q).
///
/// Noise beyond the threshold is not detected; the result is then simply
/// wrong. Keep [`Ciphertext::estimated_budget_bits`] positive.
pub fn decrypt(ct: &Ciphertext, sk: &SecretKey) -> Result<Plaintext> {
    let params = ct.params();
    let x = phase(ct, sk)?;
    let q = x.modulus() as u128;
    let t = params.plain_modulus as u128;

    let coeffs = x
        .coeffs()
        .iter()
        .map(|&c| (((t * c as u128 + q / 2) / q) % t) as u64)
        .collect();
    Plaintext::from_poly(RingElement::from_coeffs(coeffs, &params.plain_context)?, params)
}

/// Measured remaining invariant noise budget in bits,
/// log2(q/2) - log2(max |t·x mod q|) with the residue centered.
///
/// Zero means decryption is no longer guaranteed.
pub fn invariant_noise_budget(ct: &Ciphertext, sk: &SecretKey) -> Result<f64> {
    let x = phase(ct, sk)?;
    let q = x.modulus();
    let t = ct.plain_modulus() as u128;

    let worst = x
        .coeffs()
        .iter()
        .map(|&c| {
            let scaled = ((t * c as u128) % q as u128) as u64;
            center(scaled, q).unsigned_abs()
        })
        .max()
        .unwrap_or(0)
        .max(1);

    let budget = ((q / 2) as f64).log2() - (worst as f64).log2();
    Ok(budget.max(0.0))
}

/// Public-key encryptor owning its randomness source.
pub struct Encryptor<S = ChaChaSampler> {
    pk: PublicKey,
    sampler: S,
}

impl Encryptor<ChaChaSampler> {
    pub fn from_os_rng(pk: &PublicKey) -> Self {
        Self::new(pk, ChaChaSampler::from_os_rng(pk.params.sigma))
    }
}

impl<S: Sampler> Encryptor<S> {
    pub fn new(pk: &PublicKey, sampler: S) -> Self {
        Self {
            pk: pk.clone(),
            sampler,
        }
    }

    pub fn params(&self) -> &Arc<BgvParams> {
        &self.pk.params
    }

    pub fn encrypt(&mut self, pt: &Plaintext) -> Result<Ciphertext> {
        let ct = encrypt(pt, &self.pk, &mut self.sampler)?;
        debug!(
            budget_bits = ct.estimated_budget_bits().unwrap_or(0.0),
            "encrypted plaintext"
        );
        Ok(ct)
    }

    /// Encrypt the constant m.
    pub fn encrypt_scalar(&mut self, m: u64) -> Result<Ciphertext> {
        let pt = Plaintext::from_scalar(m, &self.pk.params)?;
        self.encrypt(&pt)
    }
}

/// Holds the secret key by reference for decryption and diagnostics.
pub struct Decryptor<'a> {
    sk: &'a SecretKey,
}

impl<'a> Decryptor<'a> {
    pub fn new(sk: &'a SecretKey) -> Self {
        Self { sk }
    }

    pub fn decrypt(&self, ct: &Ciphertext) -> Result<Plaintext> {
        decrypt(ct, self.sk)
    }

    pub fn decrypt_scalar(&self, ct: &Ciphertext) -> Result<u64> {
        Ok(self.decrypt(ct)?.scalar())
    }

    pub fn invariant_noise_budget(&self, ct: &Ciphertext) -> Result<f64> {
        invariant_noise_budget(ct, self.sk)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bgv::test_support::ScriptedSampler;
    use crate::bgv::KeyManager;
    use crate::params::presets::{compact, toy};

    #[test]
    fn test_scripted_toy_encryption() {
        let params = toy().unwrap();
        let mut sampler = ScriptedSampler::new();
        let mut km = KeyManager::new(&params, &mut sampler);
        let (sk, pk, _) = km.generate_keys().unwrap();
        drop(km);

        let p1 = Plaintext::from_scalar(3, &params).unwrap();
        let ct = encrypt(&p1, &pk, &mut sampler).unwrap();
        assert_eq!(ct.components()[0].coeffs(), &[199, 1152, 1150, 2, 1, 3, 0, 0]);
        assert_eq!(ct.components()[1].coeffs(), &[2, 1, 3, 0, 0, 0, 0, 0]);
        assert_eq!(ct.level(), 0);
        assert_eq!(ct.degree(), 1);
        assert_eq!(decrypt(&ct, &sk).unwrap().scalar(), 3);
    }

    #[test]
    fn test_round_trip_compact() {
        let params = compact().unwrap();
        let mut sampler = ChaChaSampler::from_seed(11, params.sigma);
        let mut km = KeyManager::new(&params, &mut sampler);
        let (sk, pk, _) = km.generate_keys().unwrap();
        drop(km);

        let values: Vec<u64> = (0..1024).map(|i| (i * 37 + 5) % 257).collect();
        let pt = Plaintext::from_values(&values, &params).unwrap();
        let ct = encrypt(&pt, &pk, &mut sampler).unwrap();
        assert_eq!(decrypt(&ct, &sk).unwrap(), pt);
    }

    #[test]
    fn test_symmetric_round_trip() {
        let params = compact().unwrap();
        let mut sampler = ChaChaSampler::from_seed(12, params.sigma);
        let sk = KeyManager::new(&params, &mut sampler).generate_secret_key().unwrap();
        let pt = Plaintext::from_values(&[256, 0, 1, 128], &params).unwrap();
        let ct = encrypt_symmetric(&pt, &sk, &mut sampler).unwrap();
        assert_eq!(Decryptor::new(&sk).decrypt(&ct).unwrap(), pt);
    }

    #[test]
    fn test_estimate_never_exceeds_measured_budget() {
        let params = compact().unwrap();
        let mut sampler = ChaChaSampler::from_seed(13, params.sigma);
        let mut km = KeyManager::new(&params, &mut sampler);
        let (sk, pk, _) = km.generate_keys().unwrap();
        drop(km);

        let ct = encrypt(&Plaintext::from_scalar(200, &params).unwrap(), &pk, &mut sampler).unwrap();
        let measured = invariant_noise_budget(&ct, &sk).unwrap();
        let estimated = ct.estimated_budget_bits().unwrap();
        assert!(estimated <= measured, "estimated {estimated} > measured {measured}");
        assert!(measured > 35.0);
    }

    #[test]
    fn test_encryptor_decryptor_wrappers() {
        let params = compact().unwrap();
        let mut km = KeyManager::new(&params, ChaChaSampler::from_seed(5, params.sigma));
        let sk = km.generate_secret_key().unwrap();
        let pk = km.generate_public_key(&sk).unwrap();
        let mut enc = Encryptor::new(&pk, ChaChaSampler::from_seed(6, params.sigma));
        let dec = Decryptor::new(&sk);
        let ct = enc.encrypt_scalar(9).unwrap();
        assert_eq!(dec.decrypt_scalar(&ct).unwrap(), 9);
        assert!(dec.invariant_noise_budget(&ct).unwrap() > 0.0);
        assert!(matches!(
            enc.encrypt_scalar(257),
            Err(BgvError::PlaintextOutOfRange { value: 257, modulus: 257 })
        ));
    }

    #[test]
    fn test_plaintext_from_other_parameters_rejected() {
        let toy_params = toy().unwrap();
        let compact_params = compact().unwrap();
        let mut sampler = ChaChaSampler::from_seed(1, 3.2);
        let mut km = KeyManager::new(&toy_params, &mut sampler);
        let (_, pk, _) = km.generate_keys().unwrap();
        drop(km);
        let pt = Plaintext::from_scalar(1, &compact_params).unwrap();
        assert!(matches!(
            encrypt(&pt, &pk, &mut sampler),
            Err(BgvError::DimensionMismatch { .. })
        ));
    }
}
