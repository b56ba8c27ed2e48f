//! Homomorphic evaluation.
//!
//! Every operation takes its operands by reference and returns a new
//! ciphertext. Level discipline: additive operations keep the level,
//! `multiply` produces a degree-2 ciphertext flagged as awaiting a rescale,
//! and `switch_modulus` moves it down the chain. The canonical step
//! consuming one unit of depth is [`Evaluator::multiply_and_rescale`].

use std::sync::Arc;

use num_bigint::BigInt;
use rayon::prelude::*;
use tracing::debug;

use crate::bgv::keygen::RelinearizationKey;
use crate::bgv::{keyswitch, modswitch, Ciphertext, Plaintext};
use crate::error::{BgvError, Result};
use crate::params::BgvParams;
use crate::ring::modular::{center, reduce_signed};
use crate::ring::wide::{negacyclic_mul_bigint, negacyclic_mul_i128, scale_round, scale_round_bigint};
use crate::ring::{RingContext, RingElement};

/// Stateless evaluator bound to one parameter set.
#[derive(Clone, Debug)]
pub struct Evaluator {
    params: Arc<BgvParams>,
}

impl Evaluator {
    pub fn new(params: &Arc<BgvParams>) -> Self {
        Self {
            params: params.clone(),
        }
    }

    pub fn params(&self) -> &Arc<BgvParams> {
        &self.params
    }

    /// Component-wise sum. Degrees may differ; the result has the larger one.
    pub fn add(&self, a: &Ciphertext, b: &Ciphertext) -> Result<Ciphertext> {
        self.check_binary(a, b)?;
        let components = zip_components(a, b, |x, y| x.add(y), |y| Ok(y.clone()))?;
        let noise = a.noise().add(b.noise());
        noise.warn_if_exhausted(&self.params, a.level(), "add");
        Ok(Ciphertext::new(
            components,
            a.level(),
            a.is_pending_rescale() || b.is_pending_rescale(),
            noise,
            &self.params,
        ))
    }

    pub fn sub(&self, a: &Ciphertext, b: &Ciphertext) -> Result<Ciphertext> {
        self.check_binary(a, b)?;
        let components = zip_components(a, b, |x, y| x.sub(y), |y| Ok(y.neg()))?;
        let noise = a.noise().add(b.noise());
        noise.warn_if_exhausted(&self.params, a.level(), "sub");
        Ok(Ciphertext::new(
            components,
            a.level(),
            a.is_pending_rescale() || b.is_pending_rescale(),
            noise,
            &self.params,
        ))
    }

    pub fn negate(&self, ct: &Ciphertext) -> Result<Ciphertext> {
        self.check_params(ct)?;
        let components = ct.components().iter().map(RingElement::neg).collect();
        let noise = ct.noise().shift(&self.params, ct.level())?;
        Ok(Ciphertext::new(
            components,
            ct.level(),
            ct.is_pending_rescale(),
            noise,
            &self.params,
        ))
    }

    /// Add Δ_level·m to c0.
    pub fn add_plain(&self, ct: &Ciphertext, pt: &Plaintext) -> Result<Ciphertext> {
        self.check_params(ct)?;
        let level = self.params.level(ct.level())?;
        let m = self.lift_plain(pt, &level.context, false)?;
        let mut components = ct.components().to_vec();
        components[0] = components[0].add(&m.scalar_mul(level.delta))?;
        let noise = ct.noise().shift(&self.params, ct.level())?;
        Ok(Ciphertext::new(
            components,
            ct.level(),
            ct.is_pending_rescale(),
            noise,
            &self.params,
        ))
    }

    /// Multiply every component by the centered lift of a plaintext.
    pub fn mul_plain(&self, ct: &Ciphertext, pt: &Plaintext) -> Result<Ciphertext> {
        self.check_params(ct)?;
        let ctx = self.params.chain.context(ct.level())?;
        let p = self.lift_plain(pt, ctx, true)?;
        let components = ct
            .components()
            .iter()
            .map(|c| c.mul(&p))
            .collect::<Result<Vec<_>>>()?;
        let l1 = pt.poly().l1_norm() as f64;
        let noise = ct.noise().mul_plain(l1, &self.params, ct.level())?;
        noise.warn_if_exhausted(&self.params, ct.level(), "mul_plain");
        Ok(Ciphertext::new(
            components,
            ct.level(),
            ct.is_pending_rescale(),
            noise,
            &self.params,
        ))
    }

    /// Multiply by the constant k mod t.
    pub fn mul_scalar(&self, ct: &Ciphertext, k: u64) -> Result<Ciphertext> {
        self.check_params(ct)?;
        let t = self.params.plain_modulus;
        let k_centered = center(k % t, t);
        let q = ct.modulus();
        let factor = reduce_signed(k_centered as i128, q);
        let components = ct.components().iter().map(|c| c.scalar_mul(factor)).collect();
        let noise = ct
            .noise()
            .mul_plain(k_centered.unsigned_abs() as f64, &self.params, ct.level())?;
        noise.warn_if_exhausted(&self.params, ct.level(), "mul_scalar");
        Ok(Ciphertext::new(
            components,
            ct.level(),
            ct.is_pending_rescale(),
            noise,
            &self.params,
        ))
    }

    /// Tensor product of two degree-1 ciphertexts at the same level,
    /// scaled by t/q_level and rounded.
    ///
    /// The result is degree 2 and must be relinearized and switched down one
    /// level before it can be multiplied again.
    pub fn multiply(&self, a: &Ciphertext, b: &Ciphertext) -> Result<Ciphertext> {
        self.check_binary(a, b)?;
        a.expect_degree(&[1])?;
        b.expect_degree(&[1])?;
        let level = a.level();
        if a.is_pending_rescale() || b.is_pending_rescale() {
            return Err(BgvError::RescaleRequired { level });
        }
        if level >= self.params.max_level() {
            return Err(BgvError::DepthExhausted { level });
        }

        let chain_level = self.params.level(level)?;
        let t = self.params.plain_modulus;
        let q = chain_level.modulus;
        let ctx = &chain_level.context;

        let lhs: Vec<Vec<i64>> = a.components().iter().map(RingElement::centered_coeffs).collect();
        let rhs: Vec<Vec<i64>> = b.components().iter().map(RingElement::centered_coeffs).collect();

        let components = if chain_level.tensor_fits_i128 {
            tensor_i128(&lhs, &rhs, t, q, ctx)?
        } else {
            tensor_bigint(&lhs, &rhs, t, q, ctx)?
        };

        let noise = a.noise().multiply(b.noise(), &self.params, level)?;
        noise.warn_if_exhausted(&self.params, level, "multiply");
        debug!(
            level,
            wide = !chain_level.tensor_fits_i128,
            budget_bits = noise.budget_bits(&self.params, level).unwrap_or(0.0),
            "multiplied ciphertexts"
        );

        Ok(Ciphertext::new(components, level, true, noise, &self.params))
    }

    pub fn relinearize(&self, ct: &Ciphertext, rlk: &RelinearizationKey) -> Result<Ciphertext> {
        self.check_params(ct)?;
        keyswitch::relinearize(ct, rlk)
    }

    pub fn switch_modulus(&self, ct: &Ciphertext, target: usize) -> Result<Ciphertext> {
        self.check_params(ct)?;
        modswitch::switch_modulus(ct, target)
    }

    /// multiply, relinearize, then switch down one level.
    pub fn multiply_and_rescale(
        &self,
        a: &Ciphertext,
        b: &Ciphertext,
        rlk: &RelinearizationKey,
    ) -> Result<Ciphertext> {
        let product = self.multiply(a, b)?;
        let relinearized = keyswitch::relinearize(&product, rlk)?;
        modswitch::switch_modulus(&relinearized, product.level() + 1)
    }

    /// [`Evaluator::multiply_and_rescale`] over independent pairs on the
    /// rayon pool. Fails if any pair fails.
    pub fn par_multiply_and_rescale(
        &self,
        pairs: &[(Ciphertext, Ciphertext)],
        rlk: &RelinearizationKey,
    ) -> Result<Vec<Ciphertext>> {
        pairs
            .par_iter()
            .map(|(a, b)| self.multiply_and_rescale(a, b, rlk))
            .collect()
    }

    /// Sum of a batch at one level, reduced as a tree on the rayon pool.
    pub fn sum(&self, cts: &[Ciphertext]) -> Result<Ciphertext> {
        cts.par_iter()
            .map(|ct| Ok::<_, BgvError>(ct.clone()))
            .try_reduce_with(|a, b| self.add(&a, &b))
            .ok_or(BgvError::EmptyBatch)?
    }

    /// Plaintext lifted into the ring of `ctx`, centered or as [0, t).
    fn lift_plain(&self, pt: &Plaintext, ctx: &Arc<RingContext>, centered: bool) -> Result<RingElement> {
        let poly = pt.poly();
        if poly.degree() != self.params.ring_degree {
            return Err(BgvError::DimensionMismatch {
                expected: self.params.ring_degree,
                got: poly.degree(),
            });
        }
        if poly.modulus() != self.params.plain_modulus {
            return Err(BgvError::ModulusMismatch {
                expected: self.params.plain_modulus,
                got: poly.modulus(),
            });
        }
        if centered {
            poly.lift_to(ctx)
        } else {
            RingElement::from_coeffs(poly.coeffs().to_vec(), ctx)
        }
    }

    fn check_params(&self, ct: &Ciphertext) -> Result<()> {
        let theirs = ct.params();
        if Arc::ptr_eq(theirs, &self.params) {
            return Ok(());
        }
        if theirs.ring_degree != self.params.ring_degree {
            return Err(BgvError::DimensionMismatch {
                expected: self.params.ring_degree,
                got: theirs.ring_degree,
            });
        }
        if theirs.plain_modulus != self.params.plain_modulus {
            return Err(BgvError::ModulusMismatch {
                expected: self.params.plain_modulus,
                got: theirs.plain_modulus,
            });
        }
        let ours = self.params.chain.modulus(ct.level())?;
        if ct.modulus() != ours {
            return Err(BgvError::ModulusMismatch {
                expected: ours,
                got: ct.modulus(),
            });
        }
        Ok(())
    }

    fn check_binary(&self, a: &Ciphertext, b: &Ciphertext) -> Result<()> {
        self.check_params(a)?;
        self.check_params(b)?;
        if a.level() != b.level() {
            return Err(BgvError::LevelMismatch {
                left: a.level(),
                right: b.level(),
            });
        }
        Ok(())
    }
}

/// Combine matching components with `both`; components only `b` has go
/// through `only_b`, components only `a` has are copied.
fn zip_components(
    a: &Ciphertext,
    b: &Ciphertext,
    both: impl Fn(&RingElement, &RingElement) -> Result<RingElement>,
    only_b: impl Fn(&RingElement) -> Result<RingElement>,
) -> Result<Vec<RingElement>> {
    let (ca, cb) = (a.components(), b.components());
    (0..ca.len().max(cb.len()))
        .map(|i| match (ca.get(i), cb.get(i)) {
            (Some(x), Some(y)) => both(x, y),
            (Some(x), None) => Ok(x.clone()),
            (None, Some(y)) => only_b(y),
            (None, None) => unreachable!("index below the longer length"),
        })
        .collect()
}

/// (a0 + a1·s)(b0 + b1·s) = a0b0 + (a0b1 + a1b0)·s + a1b1·s², exact in i128.
fn tensor_i128(
    lhs: &[Vec<i64>],
    rhs: &[Vec<i64>],
    t: u64,
    q: u64,
    ctx: &Arc<RingContext>,
) -> Result<Vec<RingElement>> {
    let ((d0, d2), (cross_a, cross_b)) = rayon::join(
        || {
            rayon::join(
                || negacyclic_mul_i128(&lhs[0], &rhs[0]),
                || negacyclic_mul_i128(&lhs[1], &rhs[1]),
            )
        },
        || {
            rayon::join(
                || negacyclic_mul_i128(&lhs[0], &rhs[1]),
                || negacyclic_mul_i128(&lhs[1], &rhs[0]),
            )
        },
    );
    let d1: Vec<i128> = cross_a.iter().zip(&cross_b).map(|(x, y)| x + y).collect();

    [d0, d1, d2]
        .iter()
        .map(|d| {
            let coeffs = d.iter().map(|&x| reduce_signed(scale_round(x, t, q), q)).collect();
            RingElement::from_coeffs(coeffs, ctx)
        })
        .collect()
}

/// Same product in arbitrary precision, for moduli where n·q² overflows i128.
fn tensor_bigint(
    lhs: &[Vec<i64>],
    rhs: &[Vec<i64>],
    t: u64,
    q: u64,
    ctx: &Arc<RingContext>,
) -> Result<Vec<RingElement>> {
    let ((d0, d2), (cross_a, cross_b)) = rayon::join(
        || {
            rayon::join(
                || negacyclic_mul_bigint(&lhs[0], &rhs[0]),
                || negacyclic_mul_bigint(&lhs[1], &rhs[1]),
            )
        },
        || {
            rayon::join(
                || negacyclic_mul_bigint(&lhs[0], &rhs[1]),
                || negacyclic_mul_bigint(&lhs[1], &rhs[0]),
            )
        },
    );
    let d1: Vec<BigInt> = cross_a.into_iter().zip(cross_b).map(|(x, y)| x + y).collect();

    [d0, d1, d2]
        .iter()
        .map(|d| {
            let coeffs = d
                .iter()
                .map(|x| scale_round_bigint(x, t, q, q))
                .collect::<Result<Vec<_>>>()?;
            RingElement::from_coeffs(coeffs, ctx)
        })
        .collect()
}
