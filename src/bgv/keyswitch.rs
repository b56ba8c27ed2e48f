use tracing::debug;

use crate::bgv::keygen::RelinearizationKey;
use crate::bgv::Ciphertext;
use crate::error::{BgvError, Result};
use crate::ring::modular::{center, reduce_signed};
use crate::ring::RingElement;

/// Balanced base-w decomposition of every coefficient.
///
/// For the centered value c, returns digits d_0..d_{ℓ-1} (as ring elements
/// mod q) with c = Σ d_j·w^j. All digits but the last lie in [-w/2, w/2); the
/// last one absorbs whatever remains, which is at most w/2 + 1 in magnitude
/// when w^ℓ ≥ q.
pub fn gadget_decompose(poly: &RingElement, base: u64, num_digits: usize) -> Result<Vec<RingElement>> {
    let q = poly.modulus();
    check_gadget(q, base, num_digits)?;

    let w = base as i128;
    let half = w / 2;
    let mut digits = vec![vec![0u64; poly.degree()]; num_digits];

    for (pos, &c) in poly.coeffs().iter().enumerate() {
        let mut remaining = center(c, q) as i128;
        for (d, digit) in digits.iter_mut().enumerate() {
            let value = if d + 1 == num_digits {
                remaining
            } else {
                // truncated remainder, then balanced
                let mut r = remaining % w;
                if r < -half {
                    r += w;
                } else if r >= half {
                    r -= w;
                }
                r
            };
            digit[pos] = reduce_signed(value, q);
            remaining = (remaining - value) / w;
        }
    }

    digits
        .into_iter()
        .map(|coeffs| RingElement::from_coeffs(coeffs, poly.context()))
        .collect()
}

fn check_gadget(q: u64, base: u64, num_digits: usize) -> Result<()> {
    if base < 2 || base >= q {
        return Err(BgvError::DecompositionOverflow(format!(
            "base {base} must lie in [2, {q})"
        )));
    }
    let covered = (base as u128).checked_pow(num_digits as u32).unwrap_or(u128::MAX);
    if num_digits == 0 || covered < q as u128 {
        return Err(BgvError::DecompositionOverflow(format!(
            "{num_digits} digits of base {base} do not cover modulus {q}"
        )));
    }
    Ok(())
}

/// Collapse (d0, d1, d2) to (d0', d1') with the key set for the
/// ciphertext's level:
///
/// d0' = d0 + Σ_j digit_j(d2)·rlk0_j,  d1' = d1 + Σ_j digit_j(d2)·rlk1_j.
///
/// A degree-1 ciphertext is returned unchanged. The pending-rescale flag
/// is carried over.
pub fn relinearize(ct: &Ciphertext, rlk: &RelinearizationKey) -> Result<Ciphertext> {
    if ct.degree() == 1 {
        return Ok(ct.clone());
    }
    ct.expect_degree(&[2])?;

    let params = ct.params();
    let level = ct.level();
    let keys = rlk.level_keys(level)?;
    let comps = ct.components();

    let digits = gadget_decompose(&comps[2], params.decomposition_base, keys.len())?;

    let mut c0 = comps[0].clone();
    let mut c1 = comps[1].clone();
    for (digit, (rlk0, rlk1)) in digits.iter().zip(keys) {
        c0 = c0.add(&digit.mul(rlk0)?)?;
        c1 = c1.add(&digit.mul(rlk1)?)?;
    }

    let noise = ct.noise().relinearize(params, level)?;
    noise.warn_if_exhausted(params, level, "relinearize");
    debug!(level, digits = keys.len(), "relinearized ciphertext");

    Ok(Ciphertext::new(
        vec![c0, c1],
        level,
        ct.is_pending_rescale(),
        noise,
        params,
    ))
}
