use std::sync::Arc;

use crate::error::Result;
use crate::params::{BgvParams, BgvParamsBuilder};

/// NTT-friendly primes q ≡ 1 (mod 16384), so they serve every ring degree
/// up to 8192.
pub const PRIME_62: u64 = 4611686018427322369;
pub const PRIME_58: u64 = 288230376150876161;
pub const PRIME_57: u64 = 144115188075593729;
pub const PRIME_49: u64 = 562949952847873;
pub const PRIME_43: u64 = 8796092858369;

/// Eight-coefficient parameters with a two-level chain. Insecure; for
/// hand-checkable examples and tests.
///
/// The worst-case fresh noise already exceeds q_0/(2t), so results only
/// decrypt reliably with a noiseless scripted sampler. Drawing from
/// [`crate::sampling::ChaChaSampler`] makes additions fail occasionally and
/// products fail most of the time.
///
/// n=8, t=17, chain [1153, 97], w=16.
pub fn toy() -> Result<Arc<BgvParams>> {
    BgvParamsBuilder::new()
        .ring_degree(8)
        .plain_modulus(17)
        .moduli(vec![1153, 97])
        .decomposition_base(16)
        .sigma(3.2)
        .build()
}

/// Compact parameters for fast tests and examples, supporting depth 2.
///
/// n=1024, t=257, chain of 58/49/43-bit NTT primes, w=2^16. Each
/// multiplication consumes roughly 17-18 bits of invariant noise budget out
/// of about 40 available after encryption. Below the 128-bit security target.
pub fn compact() -> Result<Arc<BgvParams>> {
    BgvParamsBuilder::new()
        .ring_degree(1024)
        .plain_modulus(257)
        .moduli(vec![PRIME_58, PRIME_49, PRIME_43])
        .decomposition_base(1 << 16)
        .sigma(3.2)
        .build()
}

/// n=4096 parameters at roughly 128-bit security, supporting depth 1.
///
/// t=257, chain [57-bit, 49-bit], w=2^16.
pub fn standard() -> Result<Arc<BgvParams>> {
    BgvParamsBuilder::new()
        .ring_degree(4096)
        .plain_modulus(257)
        .moduli(vec![PRIME_57, PRIME_49])
        .decomposition_base(1 << 16)
        .sigma(3.2)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ring::modular::is_prime;
    use crate::bgv::NoiseEstimate;
    use crate::ring::MultiplierKind;

    #[test]
    fn test_preset_primes_are_ntt_friendly() {
        for q in [PRIME_62, PRIME_58, PRIME_57, PRIME_49, PRIME_43] {
            assert!(is_prime(q), "{q}");
            assert_eq!(q % 16384, 1, "{q}");
        }
    }

    #[test]
    fn test_presets_build() {
        let toy = toy().unwrap();
        assert_eq!(toy.max_level(), 1);
        assert_eq!(toy.base_context().multiplier_kind(), MultiplierKind::Schoolbook);

        let compact = compact().unwrap();
        assert_eq!(compact.max_level(), 2);
        for level in compact.chain.iter() {
            assert_eq!(level.context.multiplier_kind(), MultiplierKind::Ntt);
            assert!(level.tensor_fits_i128);
        }

        // no budget for real noise
        assert!(NoiseEstimate::fresh_public(&toy).is_exhausted(&toy, 0).unwrap());
        assert!(!NoiseEstimate::fresh_public(&compact).is_exhausted(&compact, 0).unwrap());

        let standard = standard().unwrap();
        assert_eq!(standard.max_level(), 1);
        assert_eq!(standard.ring_degree, 4096);
    }
}
