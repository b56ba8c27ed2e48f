use std::sync::Arc;

use rand::Rng;

use crate::error::Result;
use crate::ring::{RingContext, RingElement};
use crate::sampling::Sampler;

/// Uniform integer in [0, modulus) by masked rejection sampling.
pub fn uniform_below<R: Rng>(modulus: u64, rng: &mut R) -> u64 {
    if modulus <= 1 {
        return 0;
    }
    let mask = if modulus.is_power_of_two() {
        modulus - 1
    } else {
        u64::MAX >> modulus.leading_zeros()
    };
    loop {
        let val = rng.random::<u64>() & mask;
        if val < modulus {
            break val;
        }
    }
}

/// Uniform draw from {-1, 0, 1} by rejection on two bits.
pub fn ternary<R: Rng>(rng: &mut R) -> i64 {
    let val = loop {
        let r = rng.random::<u8>() & 0x03;
        if r < 3 {
            break r;
        }
    };
    val as i64 - 1
}

/// Ring element with coefficients uniform in [0, q).
pub fn sample_uniform_poly<S: Sampler + ?Sized>(
    ctx: &Arc<RingContext>,
    sampler: &mut S,
) -> Result<RingElement> {
    let q = ctx.modulus();
    let coeffs: Vec<u64> = (0..ctx.degree()).map(|_| sampler.uniform(q)).collect();
    RingElement::from_coeffs(coeffs, ctx)
}

/// n independent ternary coefficients.
pub fn sample_ternary_coeffs<S: Sampler + ?Sized>(n: usize, sampler: &mut S) -> Vec<i64> {
    (0..n).map(|_| sampler.ternary()).collect()
}
