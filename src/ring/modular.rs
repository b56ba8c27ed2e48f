/// Barrett reduction: compute a mod m using precomputed Barrett constant.
///
/// Barrett constant k = floor(2^64 / m). For moduli ≤ 2^32, the single-word
/// Barrett trick is exact for inputs a < m^2. For larger moduli, we fall back
/// to u128 division.
#[inline(always)]
pub fn barrett_reduce(a: u128, m: u64, barrett_k: u64) -> u64 {
    if m > (1u64 << 32) {
        (a % m as u128) as u64
    } else {
        // q_hat = (a * k) >> 64
        let q_hat = ((a * barrett_k as u128) >> 64) as u64;
        let r = (a as u64).wrapping_sub(q_hat.wrapping_mul(m));
        if r >= m { r.wrapping_sub(m) } else { r }
    }
}

/// Compute Barrett constant for modulus m: floor(2^64 / m)
#[inline]
pub fn barrett_constant(m: u64) -> u64 {
    debug_assert!(m > 1, "modulus must be > 1");
    ((1u128 << 64) / m as u128) as u64
}

/// Modular addition: (a + b) mod m, assumes a, b < m
#[inline(always)]
pub fn mod_add(a: u64, b: u64, m: u64) -> u64 {
    let sum = a as u128 + b as u128;
    let r = sum as u64;
    if sum >= m as u128 { r.wrapping_sub(m) } else { r }
}

/// Modular subtraction: (a - b) mod m, assumes a, b < m
#[inline(always)]
pub fn mod_sub(a: u64, b: u64, m: u64) -> u64 {
    if a >= b {
        a - b
    } else {
        m - b + a
    }
}

/// Modular negation: (-a) mod m, assumes a < m
#[inline(always)]
pub fn mod_neg(a: u64, m: u64) -> u64 {
    if a == 0 { 0 } else { m - a }
}

/// Modular multiplication: (a * b) mod m using Barrett reduction
#[inline(always)]
pub fn mod_mul(a: u64, b: u64, m: u64, barrett_k: u64) -> u64 {
    let product = a as u128 * b as u128;
    barrett_reduce(product, m, barrett_k)
}

/// Modular exponentiation: a^exp mod m
pub fn mod_pow(mut base: u64, mut exp: u64, m: u64) -> u64 {
    let bk = barrett_constant(m);
    let mut result = 1u64 % m;
    base %= m;
    while exp > 0 {
        if exp & 1 == 1 {
            result = mod_mul(result, base, m, bk);
        }
        exp >>= 1;
        base = mod_mul(base, base, m, bk);
    }
    result
}

pub fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        let r = a % b;
        a = b;
        b = r;
    }
    a
}

/// Deterministic Miller-Rabin for 64-bit integers.
///
/// The first twelve prime bases are sufficient for every n < 3.3·10^24.
pub fn is_prime(n: u64) -> bool {
    const BASES: [u64; 12] = [2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37];
    if n < 2 {
        return false;
    }
    for &p in &BASES {
        if n % p == 0 {
            return n == p;
        }
    }

    let mut d = n - 1;
    let mut s = 0u32;
    while d % 2 == 0 {
        d /= 2;
        s += 1;
    }

    let bk = barrett_constant(n);
    'witness: for &a in &BASES {
        let mut x = mod_pow(a, d, n);
        if x == 1 || x == n - 1 {
            continue;
        }
        for _ in 1..s {
            x = mod_mul(x, x, n, bk);
            if x == n - 1 {
                continue 'witness;
            }
        }
        return false;
    }
    true
}

/// Map a residue in [0, m) to its centered representative in (-m/2, m/2].
#[inline(always)]
pub fn center(c: u64, m: u64) -> i64 {
    if c > m / 2 {
        c as i64 - m as i64
    } else {
        c as i64
    }
}

/// Reduce a signed integer into [0, m).
#[inline(always)]
pub fn reduce_signed(x: i128, m: u64) -> u64 {
    x.rem_euclid(m as i128) as u64
}
