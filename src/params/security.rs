//! Rough RLWE security estimate.
//!
//! Interpolates the HomomorphicEncryption.org standard table for ternary
//! secrets at σ ≈ 3.2 (n = 1024 → log2 q ≤ 27, 2048 → 54, 4096 → 109,
//! 8192 → 218 at 128 bits), where security scales as n / log2 q. This is a
//! coarse heuristic for flagging weak parameter sets, not a replacement for
//! the lattice estimator.

/// Level below which `BgvParamsBuilder::build` logs a warning.
pub const TARGET_SECURITY_BITS: f64 = 128.0;

/// Estimated security in bits for ring degree n, modulus q and noise σ.
pub fn estimate_security_bits(ring_degree: usize, log2_q: f64, sigma: f64) -> f64 {
    // 128 bits at n / log2 q ≈ 37.9; wider noise buys back a little modulus.
    const BITS_PER_DEGREE_OVER_LOG_Q: f64 = 128.0 / 37.9;
    let effective_log2_q = log2_q - (sigma / 3.2).log2();
    if effective_log2_q <= 0.0 {
        return f64::INFINITY;
    }
    BITS_PER_DEGREE_OVER_LOG_Q * ring_degree as f64 / effective_log2_q
}

/// Check if parameters meet a minimum security level.
pub fn check_security(ring_degree: usize, log2_q: f64, sigma: f64, min_bits: f64) -> bool {
    estimate_security_bits(ring_degree, log2_q, sigma) >= min_bits
}

/// Smallest power-of-two ring degree reaching `target_bits` for this modulus size.
pub fn min_ring_degree(log2_q: f64, sigma: f64, target_bits: f64) -> usize {
    let mut n = 1024;
    while n < (1 << 17) {
        if check_security(n, log2_q, sigma, target_bits) {
            return n;
        }
        n *= 2;
    }
    n
}
