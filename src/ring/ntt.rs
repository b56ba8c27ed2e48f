use concrete_ntt::prime64::Plan;

use crate::ring::modular::{barrett_constant, is_prime, mod_mul};
use crate::ring::multiply::{MultiplierKind, PolyMultiplier};

/// Smallest ring degree the `concrete-ntt` backend plans for.
pub const MIN_NTT_DEGREE: usize = 16;

/// Negacyclic product through a forward/inverse NTT.
///
/// Uses `concrete-ntt` for hardware-accelerated NTT (AVX2/AVX-512/NEON).
#[derive(Debug)]
pub struct NttMultiplier {
    plan: Plan,
    modulus: u64,
    barrett_k: u64,
}

impl NttMultiplier {
    /// Build a plan for (n, q), or `None` if q is not a prime ≡ 1 (mod 2n)
    /// or the backend rejects the degree.
    pub fn try_new(degree: usize, modulus: u64) -> Option<Self> {
        if degree < MIN_NTT_DEGREE || !degree.is_power_of_two() {
            return None;
        }
        if modulus % (2 * degree as u64) != 1 || !is_prime(modulus) {
            return None;
        }
        let plan = Plan::try_new(degree, modulus)?;
        Some(Self {
            plan,
            modulus,
            barrett_k: barrett_constant(modulus),
        })
    }

    pub fn forward(&self, coeffs: &[u64]) -> Vec<u64> {
        let mut evals = coeffs.to_vec();
        self.plan.fwd(&mut evals);
        evals
    }

    /// Inverse transform including the 1/n normalization.
    pub fn inverse(&self, evals: &[u64]) -> Vec<u64> {
        let mut coeffs = evals.to_vec();
        self.plan.inv(&mut coeffs);
        self.plan.normalize(&mut coeffs);
        coeffs
    }
}

impl PolyMultiplier for NttMultiplier {
    fn negacyclic_mul(&self, a: &[u64], b: &[u64]) -> Vec<u64> {
        let mut lhs = a.to_vec();
        let mut rhs = b.to_vec();
        self.plan.fwd(&mut lhs);
        self.plan.fwd(&mut rhs);
        for (x, &y) in lhs.iter_mut().zip(rhs.iter()) {
            *x = mod_mul(*x, y, self.modulus, self.barrett_k);
        }
        self.plan.inv(&mut lhs);
        self.plan.normalize(&mut lhs);
        lhs
    }

    fn kind(&self) -> MultiplierKind {
        MultiplierKind::Ntt
    }
}
