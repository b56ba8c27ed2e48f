use std::sync::Arc;

use zeroize::Zeroize;

use crate::error::{BgvError, Result};
use crate::ring::context::RingContext;
use crate::ring::modular::{center, mod_add, mod_mul, mod_neg, mod_sub, reduce_signed};
use crate::ring::wide::scale_round;

/// Element of Z_q[X]/(X^n + 1) in coefficient representation.
///
/// Always holds exactly n coefficients, each in [0, q).
#[derive(Clone, Debug)]
pub struct RingElement {
    coeffs: Vec<u64>,
    ctx: Arc<RingContext>,
}

impl RingElement {
    pub fn zero(ctx: &Arc<RingContext>) -> Self {
        Self {
            coeffs: vec![0u64; ctx.degree()],
            ctx: ctx.clone(),
        }
    }

    /// Build from coefficients, reducing each modulo q.
    pub fn from_coeffs(mut coeffs: Vec<u64>, ctx: &Arc<RingContext>) -> Result<Self> {
        if coeffs.len() != ctx.degree() {
            return Err(BgvError::DimensionMismatch {
                expected: ctx.degree(),
                got: coeffs.len(),
            });
        }
        let q = ctx.modulus();
        for c in coeffs.iter_mut() {
            *c %= q;
        }
        Ok(Self { coeffs, ctx: ctx.clone() })
    }

    /// Build from coefficients the caller has already checked to lie in
    /// [0, q). No reduction is performed, so no division touches the values.
    pub(crate) fn from_canonical(coeffs: Vec<u64>, ctx: &Arc<RingContext>) -> Result<Self> {
        if coeffs.len() != ctx.degree() {
            return Err(BgvError::DimensionMismatch {
                expected: ctx.degree(),
                got: coeffs.len(),
            });
        }
        Ok(Self { coeffs, ctx: ctx.clone() })
    }

    /// Build from signed integers, mapping each into [0, q).
    pub fn from_signed(values: &[i64], ctx: &Arc<RingContext>) -> Result<Self> {
        if values.len() != ctx.degree() {
            return Err(BgvError::DimensionMismatch {
                expected: ctx.degree(),
                got: values.len(),
            });
        }
        let q = ctx.modulus();
        let coeffs = values.iter().map(|&v| reduce_signed(v as i128, q)).collect();
        Ok(Self { coeffs, ctx: ctx.clone() })
    }

    /// The constant polynomial `value`.
    pub fn constant(value: u64, ctx: &Arc<RingContext>) -> Self {
        let mut coeffs = vec![0u64; ctx.degree()];
        coeffs[0] = value % ctx.modulus();
        Self { coeffs, ctx: ctx.clone() }
    }

    pub fn coeffs(&self) -> &[u64] {
        &self.coeffs
    }

    pub fn context(&self) -> &Arc<RingContext> {
        &self.ctx
    }

    pub fn degree(&self) -> usize {
        self.coeffs.len()
    }

    pub fn modulus(&self) -> u64 {
        self.ctx.modulus()
    }

    fn check_compatible(&self, other: &Self) -> Result<()> {
        if self.degree() != other.degree() {
            return Err(BgvError::DimensionMismatch {
                expected: self.degree(),
                got: other.degree(),
            });
        }
        if self.modulus() != other.modulus() {
            return Err(BgvError::ModulusMismatch {
                expected: self.modulus(),
                got: other.modulus(),
            });
        }
        Ok(())
    }

    pub fn add(&self, other: &Self) -> Result<Self> {
        self.check_compatible(other)?;
        let q = self.modulus();
        let coeffs = self.coeffs.iter()
            .zip(other.coeffs.iter())
            .map(|(&a, &b)| mod_add(a, b, q))
            .collect();
        Ok(Self { coeffs, ctx: self.ctx.clone() })
    }

    pub fn sub(&self, other: &Self) -> Result<Self> {
        self.check_compatible(other)?;
        let q = self.modulus();
        let coeffs = self.coeffs.iter()
            .zip(other.coeffs.iter())
            .map(|(&a, &b)| mod_sub(a, b, q))
            .collect();
        Ok(Self { coeffs, ctx: self.ctx.clone() })
    }

    pub fn neg(&self) -> Self {
        let q = self.modulus();
        let coeffs = self.coeffs.iter().map(|&a| mod_neg(a, q)).collect();
        Self { coeffs, ctx: self.ctx.clone() }
    }

    /// Negacyclic product through the context's multiplier.
    pub fn mul(&self, other: &Self) -> Result<Self> {
        self.check_compatible(other)?;
        let coeffs = self.ctx.multiplier().negacyclic_mul(&self.coeffs, &other.coeffs);
        Ok(Self { coeffs, ctx: self.ctx.clone() })
    }

    pub fn scalar_mul(&self, scalar: u64) -> Self {
        let q = self.modulus();
        let bk = self.ctx.barrett_k();
        let s = scalar % q;
        let coeffs = self.coeffs.iter().map(|&c| mod_mul(c, s, q, bk)).collect();
        Self { coeffs, ctx: self.ctx.clone() }
    }

    pub fn is_zero(&self) -> bool {
        self.coeffs.iter().all(|&c| c == 0)
    }

    /// Centered representatives in (-q/2, q/2].
    pub fn centered_coeffs(&self) -> Vec<i64> {
        let q = self.modulus();
        self.coeffs.iter().map(|&c| center(c, q)).collect()
    }

    /// Largest centered coefficient magnitude.
    pub fn infinity_norm(&self) -> u64 {
        self.centered_coeffs().iter().map(|c| c.unsigned_abs()).max().unwrap_or(0)
    }

    /// Sum of centered coefficient magnitudes.
    pub fn l1_norm(&self) -> u128 {
        self.centered_coeffs().iter().map(|c| c.unsigned_abs() as u128).sum()
    }

    /// Map each coefficient c to round(center(c) · q' / q) mod q'.
    pub fn rescale(&self, target: &Arc<RingContext>) -> Result<Self> {
        if target.degree() != self.degree() {
            return Err(BgvError::DimensionMismatch {
                expected: self.degree(),
                got: target.degree(),
            });
        }
        let (q, q_new) = (self.modulus(), target.modulus());
        let coeffs = self.coeffs.iter()
            .map(|&c| reduce_signed(scale_round(center(c, q) as i128, q_new, q), q_new))
            .collect();
        Ok(Self { coeffs, ctx: target.clone() })
    }

    /// Reinterpret the centered coefficients in another modulus without scaling.
    ///
    /// Only meaningful for elements whose coefficients are small relative to
    /// both moduli (secret keys, plaintexts, decomposition digits).
    pub fn lift_to(&self, target: &Arc<RingContext>) -> Result<Self> {
        if target.degree() != self.degree() {
            return Err(BgvError::DimensionMismatch {
                expected: self.degree(),
                got: target.degree(),
            });
        }
        let q = self.modulus();
        let q_new = target.modulus();
        let coeffs = self.coeffs.iter()
            .map(|&c| reduce_signed(center(c, q) as i128, q_new))
            .collect();
        Ok(Self { coeffs, ctx: target.clone() })
    }
}

impl PartialEq for RingElement {
    fn eq(&self, other: &Self) -> bool {
        self.ctx.same_ring(&other.ctx) && self.coeffs == other.coeffs
    }
}

impl Eq for RingElement {}

impl Zeroize for RingElement {
    fn zeroize(&mut self) {
        self.coeffs.zeroize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(n: usize, q: u64) -> Arc<RingContext> {
        RingContext::new(n, q).unwrap()
    }

    #[test]
    fn test_zero() {
        let p = RingElement::zero(&ctx(4, 17));
        assert!(p.is_zero());
        assert_eq!(p.degree(), 4);
    }

    #[test]
    fn test_add_sub_neg() {
        let c = ctx(4, 17);
        let a = RingElement::from_coeffs(vec![1, 2, 3, 4], &c).unwrap();
        let b = RingElement::from_coeffs(vec![5, 6, 7, 20], &c).unwrap();
        assert_eq!(b.coeffs(), &[5, 6, 7, 3]);
        let s = a.add(&b).unwrap();
        assert_eq!(s.coeffs(), &[6, 8, 10, 7]);
        assert_eq!(s.sub(&b).unwrap(), a);
        assert!(a.add(&a.neg()).unwrap().is_zero());
    }

    #[test]
    fn test_mul_wraps_negacyclically() {
        let c = ctx(4, 17);
        let x3 = RingElement::from_coeffs(vec![0, 0, 0, 1], &c).unwrap();
        assert_eq!(x3.mul(&x3).unwrap().coeffs(), &[0, 0, 16, 0]);
    }

    #[test]
    fn test_ntt_and_schoolbook_contexts_agree() {
        let q = 65537u64;
        let fast = ctx(32, q);
        let slow = RingContext::schoolbook(32, q).unwrap();
        let a_vals: Vec<u64> = (0..32).map(|i| (i * 7919 + 3) % q).collect();
        let b_vals: Vec<u64> = (0..32).map(|i| (i * i * 31 + 11) % q).collect();
        let fa = RingElement::from_coeffs(a_vals.clone(), &fast).unwrap();
        let fb = RingElement::from_coeffs(b_vals.clone(), &fast).unwrap();
        let sa = RingElement::from_coeffs(a_vals, &slow).unwrap();
        let sb = RingElement::from_coeffs(b_vals, &slow).unwrap();
        assert_eq!(fa.mul(&fb).unwrap(), sa.mul(&sb).unwrap());
    }

    #[test]
    fn test_from_canonical_keeps_values() {
        let c = ctx(4, 17);
        let p = RingElement::from_canonical(vec![0, 1, 16, 5], &c).unwrap();
        assert_eq!(p, RingElement::from_coeffs(vec![0, 1, 16, 5], &c).unwrap());
        assert_eq!(p.centered_coeffs(), vec![0, 1, -1, 5]);
        assert!(matches!(
            RingElement::from_canonical(vec![0, 1], &c),
            Err(BgvError::DimensionMismatch { expected: 4, got: 2 })
        ));
    }

    #[test]
    fn test_mismatch_errors() {
        let a = RingElement::zero(&ctx(4, 17));
        let b = RingElement::zero(&ctx(8, 17));
        let c = RingElement::zero(&ctx(4, 97));
        assert_eq!(a.add(&b), Err(BgvError::DimensionMismatch { expected: 4, got: 8 }));
        assert_eq!(a.mul(&c), Err(BgvError::ModulusMismatch { expected: 17, got: 97 }));
        assert!(a.sub(&b).unwrap_err().is_dimension_mismatch());
        assert!(a.sub(&c).unwrap_err().is_dimension_mismatch());
        assert!(RingElement::from_coeffs(vec![1, 2, 3], &ctx(4, 17)).is_err());
    }

    #[test]
    fn test_centered_and_norms() {
        let a = RingElement::from_coeffs(vec![0, 1, 16, 9], &ctx(4, 17)).unwrap();
        assert_eq!(a.centered_coeffs(), vec![0, 1, -1, -8]);
        assert_eq!(a.infinity_norm(), 8);
        assert_eq!(a.l1_norm(), 10);
    }

    #[test]
    fn test_rescale_rounds() {
        // 1153 -> 97: 993 is centered -160, -160·97/1153 = -13.46 -> -13 -> 84
        let src = ctx(8, 1153);
        let dst = ctx(8, 97);
        let a = RingElement::from_coeffs(vec![993, 0, 1152, 100, 0, 0, 0, 0], &src).unwrap();
        let r = a.rescale(&dst).unwrap();
        assert_eq!(r.coeffs(), &[84, 0, 0, 8, 0, 0, 0, 0]);
    }

    #[test]
    fn test_lift_preserves_small_values() {
        let s = RingElement::from_signed(&[1, 0, 0, -1], &ctx(4, 1153)).unwrap();
        let lifted = s.lift_to(&ctx(4, 97)).unwrap();
        assert_eq!(lifted.coeffs(), &[1, 0, 0, 96]);
        assert_eq!(lifted.centered_coeffs(), vec![1, 0, 0, -1]);
    }
}
