use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::ring::modular::{barrett_constant, mod_add, mod_mul, mod_sub};
use crate::ring::ntt::{NttMultiplier, MIN_NTT_DEGREE};

/// Which negacyclic product algorithm a ring context was built with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MultiplierKind {
    Schoolbook,
    Ntt,
}

/// Negacyclic polynomial product in Z_q[X]/(X^n + 1).
///
/// Implementations receive two coefficient vectors of length n, already
/// reduced modulo q, and must return the reduced product.
pub trait PolyMultiplier: Send + Sync + fmt::Debug {
    fn negacyclic_mul(&self, a: &[u64], b: &[u64]) -> Vec<u64>;

    fn kind(&self) -> MultiplierKind;
}

/// O(n²) product. Works for any modulus and ring degree.
#[derive(Clone, Debug)]
pub struct SchoolbookMultiplier {
    modulus: u64,
    barrett_k: u64,
}

impl SchoolbookMultiplier {
    pub fn new(modulus: u64) -> Self {
        Self {
            modulus,
            barrett_k: barrett_constant(modulus),
        }
    }
}

impl PolyMultiplier for SchoolbookMultiplier {
    fn negacyclic_mul(&self, a: &[u64], b: &[u64]) -> Vec<u64> {
        let n = a.len();
        let q = self.modulus;
        let mut result = vec![0u64; n];

        for i in 0..n {
            if a[i] == 0 {
                continue;
            }
            for j in 0..n {
                if b[j] == 0 {
                    continue;
                }
                let prod = mod_mul(a[i], b[j], q, self.barrett_k);
                let idx = i + j;
                if idx < n {
                    result[idx] = mod_add(result[idx], prod, q);
                } else {
                    // X^n ≡ -1
                    result[idx - n] = mod_sub(result[idx - n], prod, q);
                }
            }
        }
        result
    }

    fn kind(&self) -> MultiplierKind {
        MultiplierKind::Schoolbook
    }
}

/// Pick the multiplier for (n, q) once, at context construction.
///
/// The NTT path is taken when q is a prime congruent to 1 mod 2n and the
/// degree is at least [`MIN_NTT_DEGREE`]. The degree floor is a limit of the
/// `concrete-ntt` backend, not of the modulus: q = 1153 is NTT-friendly for
/// n = 8 but still multiplies with the schoolbook loop there.
pub fn select_multiplier(degree: usize, modulus: u64) -> Arc<dyn PolyMultiplier> {
    match NttMultiplier::try_new(degree, modulus) {
        Some(ntt) => {
            debug!(degree, modulus, "using NTT multiplier");
            Arc::new(ntt)
        }
        None if degree < MIN_NTT_DEGREE => {
            debug!(degree, modulus, "degree below NTT backend minimum, using schoolbook multiplier");
            Arc::new(SchoolbookMultiplier::new(modulus))
        }
        None => {
            debug!(degree, modulus, "modulus not NTT-friendly, using schoolbook multiplier");
            Arc::new(SchoolbookMultiplier::new(modulus))
        }
    }
}
