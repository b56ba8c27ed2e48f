use crate::error::{BgvError, Result};
use crate::params::BgvParams;
use crate::ring::RingElement;

/// Element of Z_t[X]/(X^n + 1).
///
/// Coefficient packing: value i goes to the coefficient of X^i. Products of
/// plaintexts are negacyclic, so a scalar lives in coefficient 0.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Plaintext {
    poly: RingElement,
}

impl Plaintext {
    /// Constant polynomial m, for 0 ≤ m < t.
    pub fn from_scalar(m: u64, params: &BgvParams) -> Result<Self> {
        Self::from_values(&[m], params)
    }

    /// Coefficients `values[0..]`, zero-padded to n. Every value must be
    /// below t and at most n values are accepted.
    pub fn from_values(values: &[u64], params: &BgvParams) -> Result<Self> {
        if values.len() > params.ring_degree {
            return Err(BgvError::DimensionMismatch {
                expected: params.ring_degree,
                got: values.len(),
            });
        }
        if let Some(&v) = values.iter().find(|&&v| v >= params.plain_modulus) {
            return Err(BgvError::PlaintextOutOfRange {
                value: v,
                modulus: params.plain_modulus,
            });
        }
        let mut coeffs = vec![0u64; params.ring_degree];
        coeffs[..values.len()].copy_from_slice(values);
        Ok(Self {
            poly: RingElement::from_coeffs(coeffs, &params.plain_context)?,
        })
    }

    /// Signed values, reduced into [0, t).
    pub fn from_signed(values: &[i64], params: &BgvParams) -> Result<Self> {
        if values.len() > params.ring_degree {
            return Err(BgvError::DimensionMismatch {
                expected: params.ring_degree,
                got: values.len(),
            });
        }
        let mut padded = vec![0i64; params.ring_degree];
        padded[..values.len()].copy_from_slice(values);
        Ok(Self {
            poly: RingElement::from_signed(&padded, &params.plain_context)?,
        })
    }

    /// Wrap an element of the plaintext ring.
    pub fn from_poly(poly: RingElement, params: &BgvParams) -> Result<Self> {
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
        Ok(Self { poly })
    }

    /// Coefficient 0.
    pub fn scalar(&self) -> u64 {
        self.poly.coeffs()[0]
    }

    /// The first `count` coefficients.
    pub fn values(&self, count: usize) -> Vec<u64> {
        self.poly.coeffs()[..count.min(self.poly.degree())].to_vec()
    }

    pub fn coeffs(&self) -> &[u64] {
        self.poly.coeffs()
    }

    /// Coefficients centered in (-t/2, t/2].
    pub fn centered(&self) -> Vec<i64> {
        self.poly.centered_coeffs()
    }

    pub fn poly(&self) -> &RingElement {
        &self.poly
    }

    /// Sum in Z_t[X]/(X^n + 1). The reference result for homomorphic addition.
    pub fn add(&self, other: &Self) -> Result<Self> {
        Ok(Self { poly: self.poly.add(&other.poly)? })
    }

    /// Product in Z_t[X]/(X^n + 1).
    pub fn mul(&self, other: &Self) -> Result<Self> {
        Ok(Self { poly: self.poly.mul(&other.poly)? })
    }
}
