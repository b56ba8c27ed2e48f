//! Exact arithmetic over Z[X]/(X^n + 1) on centered lifts.
//!
//! The ciphertext tensor product has to be computed over the integers before
//! it is scaled by t/q, so these helpers never reduce modulo anything. The
//! i128 variants are used whenever n·q² fits; the `BigInt` variants cover
//! the rest of the admissible moduli.

use num_bigint::BigInt;
use num_traits::{Signed, ToPrimitive, Zero};
use rayon::prelude::*;

use crate::error::{BgvError, Result};

/// Degrees below this are multiplied on the calling thread.
const PAR_MIN_DEGREE: usize = 256;

/// True when a tensor product of centered mod-q values of degree n cannot
/// overflow i128 (sum of two convolutions, each bounded by n·q²/4).
pub fn tensor_fits_i128(degree: usize, modulus: u64) -> bool {
    (modulus as u128)
        .checked_mul(modulus as u128)
        .and_then(|sq| sq.checked_mul(degree as u128))
        .is_some_and(|bound| bound < (1u128 << 126))
}

/// round(x · num / den) with ties rounded up, exact for any i128 x.
///
/// Splits x = quo·den + rem so that the intermediate products stay small.
#[inline]
pub fn scale_round(x: i128, num: u64, den: u64) -> i128 {
    let den = den as i128;
    let num = num as i128;
    let quo = x.div_euclid(den);
    let rem = x.rem_euclid(den);
    num * quo + (2 * num * rem + den).div_euclid(2 * den)
}

/// Negacyclic convolution of two signed coefficient vectors in i128.
pub fn negacyclic_mul_i128(a: &[i64], b: &[i64]) -> Vec<i128> {
    let n = a.len();
    let coeff = |k: usize| -> i128 {
        let mut acc = 0i128;
        for i in 0..n {
            let ai = a[i];
            if ai == 0 {
                continue;
            }
            if i <= k {
                acc += ai as i128 * b[k - i] as i128;
            } else {
                // X^n ≡ -1
                acc -= ai as i128 * b[n + k - i] as i128;
            }
        }
        acc
    };

    if n >= PAR_MIN_DEGREE {
        (0..n).into_par_iter().map(coeff).collect()
    } else {
        (0..n).map(coeff).collect()
    }
}

/// Negacyclic convolution in arbitrary precision.
pub fn negacyclic_mul_bigint(a: &[i64], b: &[i64]) -> Vec<BigInt> {
    let n = a.len();
    let coeff = |k: usize| -> BigInt {
        let mut acc = BigInt::zero();
        for i in 0..n {
            let ai = a[i];
            if ai == 0 {
                continue;
            }
            if i <= k {
                acc += BigInt::from(ai) * BigInt::from(b[k - i]);
            } else {
                acc -= BigInt::from(ai) * BigInt::from(b[n + k - i]);
            }
        }
        acc
    };

    if n >= PAR_MIN_DEGREE {
        (0..n).into_par_iter().map(coeff).collect()
    } else {
        (0..n).map(coeff).collect()
    }
}

/// round(x · num / den) reduced into [0, modulus).
pub fn scale_round_bigint(x: &BigInt, num: u64, den: u64, modulus: u64) -> Result<u64> {
    let two_den: BigInt = BigInt::from(den) * 2u32;
    let numer: BigInt = x * BigInt::from(num) * 2u32 + BigInt::from(den);
    // floor division for a positive divisor
    let mut quo: BigInt = &numer / &two_den;
    if (&numer % &two_den).is_negative() {
        quo -= 1u32;
    }
    let m = BigInt::from(modulus);
    let mut r = quo % &m;
    if r.is_negative() {
        r += &m;
    }
    r.to_u64().ok_or_else(|| {
        BgvError::InvalidSetupParameters("rounded coefficient does not fit in u64".into())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scale_round_ties_and_signs() {
        // 7 · 1/2 = 3.5 -> 4, -7 · 1/2 = -3.5 -> -3
        assert_eq!(scale_round(7, 1, 2), 4);
        assert_eq!(scale_round(-7, 1, 2), -3);
        assert_eq!(scale_round(10, 3, 7), 4); // 4.285..
        assert_eq!(scale_round(-10, 3, 7), -4);
        assert_eq!(scale_round(0, 97, 1153), 0);
    }

    #[test]
    fn test_scale_round_large() {
        let q = 288230376150876161u64;
        let x: i128 = 1024 * (q as i128 / 2) * (q as i128 / 2);
        let expected = scale_round_bigint(&BigInt::from(x), 257, q, q).unwrap();
        assert_eq!(scale_round(x, 257, q).rem_euclid(q as i128) as u64, expected);
        assert_eq!(scale_round(-x, 257, q), -scale_round(x, 257, q));
    }

    #[test]
    fn test_bigint_matches_i128_rounding() {
        for x in [-1_000_003i128, -577, -576, 0, 576, 577, 999_999] {
            let m = 97u64;
            let via_i128 = scale_round(x, 97, 1153).rem_euclid(m as i128) as u64;
            let via_big = scale_round_bigint(&BigInt::from(x), 97, 1153, m).unwrap();
            assert_eq!(via_i128, via_big, "x = {x}");
        }
    }

    #[test]
    fn test_negacyclic_exact() {
        // (1 + X)(1 - X^3) over Z[X]/(X^4+1) = 1 + X - X^3 - X^4 = 2 + X - X^3
        let a = [1, 1, 0, 0];
        let b = [1, 0, 0, -1];
        assert_eq!(negacyclic_mul_i128(&a, &b), vec![2, 1, 0, -1]);
        let big: Vec<BigInt> = negacyclic_mul_bigint(&a, &b);
        assert_eq!(big, vec![2, 1, 0, -1].into_iter().map(BigInt::from).collect::<Vec<_>>());
    }

    #[test]
    fn test_parallel_path_matches_serial_shape() {
        let n = 512;
        let mut a = vec![0i64; n];
        let mut b = vec![0i64; n];
        a[n - 1] = 3;
        b[2] = -5;
        // 3X^{n-1} · -5X^2 = -15 X^{n+1} = 15 X
        let c = negacyclic_mul_i128(&a, &b);
        assert_eq!(c[1], 15);
        assert_eq!(c.iter().filter(|&&v| v != 0).count(), 1);
    }

    #[test]
    fn test_fits_bound() {
        assert!(tensor_fits_i128(1024, 288230376150876161));
        assert!(!tensor_fits_i128(1024, (1u64 << 61) - 1));
        assert!(tensor_fits_i128(8, 1153));
    }
}
