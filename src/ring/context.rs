use std::sync::Arc;

use crate::error::{BgvError, Result};
use crate::ring::modular::barrett_constant;
use crate::ring::multiply::{select_multiplier, MultiplierKind, PolyMultiplier, SchoolbookMultiplier};

/// Coefficient moduli must leave headroom for the u128/i128 arithmetic in
/// rescaling and tensoring.
pub const MAX_MODULUS_BITS: u32 = 62;

/// Everything a ring element needs to know about Z_q[X]/(X^n + 1):
/// the degree, the modulus and the product algorithm chosen for them.
#[derive(Debug)]
pub struct RingContext {
    degree: usize,
    modulus: u64,
    barrett_k: u64,
    multiplier: Arc<dyn PolyMultiplier>,
}

impl RingContext {
    pub fn new(degree: usize, modulus: u64) -> Result<Arc<Self>> {
        validate(degree, modulus)?;
        Ok(Arc::new(Self {
            degree,
            modulus,
            barrett_k: barrett_constant(modulus),
            multiplier: select_multiplier(degree, modulus),
        }))
    }

    /// Context that always multiplies with the O(n²) loop.
    pub fn schoolbook(degree: usize, modulus: u64) -> Result<Arc<Self>> {
        validate(degree, modulus)?;
        Ok(Arc::new(Self {
            degree,
            modulus,
            barrett_k: barrett_constant(modulus),
            multiplier: Arc::new(SchoolbookMultiplier::new(modulus)),
        }))
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    pub fn modulus(&self) -> u64 {
        self.modulus
    }

    pub fn barrett_k(&self) -> u64 {
        self.barrett_k
    }

    pub fn multiplier(&self) -> &dyn PolyMultiplier {
        self.multiplier.as_ref()
    }

    pub fn multiplier_kind(&self) -> MultiplierKind {
        self.multiplier.kind()
    }

    /// Two contexts describe the same ring when degree and modulus agree.
    pub fn same_ring(&self, other: &RingContext) -> bool {
        self.degree == other.degree && self.modulus == other.modulus
    }
}

fn validate(degree: usize, modulus: u64) -> Result<()> {
    if degree < 2 || !degree.is_power_of_two() {
        return Err(BgvError::InvalidSetupParameters(format!(
            "ring degree must be a power of two >= 2, got {degree}"
        )));
    }
    if modulus < 2 || modulus >= (1u64 << MAX_MODULUS_BITS) {
        return Err(BgvError::InvalidSetupParameters(format!(
            "modulus {modulus} outside [2, 2^{MAX_MODULUS_BITS})"
        )));
    }
    Ok(())
}
