use std::sync::Arc;

use tracing::debug;

use crate::error::{BgvError, Result};
use crate::ring::modular::gcd;
use crate::ring::wide::tensor_fits_i128;
use crate::ring::RingContext;

/// Precomputed data for one level of the chain.
#[derive(Clone, Debug)]
pub struct ChainLevel {
    /// q_i.
    pub modulus: u64,
    /// Ring Z_{q_i}[X]/(X^n + 1), with its multiplier already chosen.
    pub context: Arc<RingContext>,
    /// Δ_i = ⌊q_i / t⌋.
    pub delta: u64,
    /// q_i mod t, the rounding bias of Δ_i-scaled plaintexts.
    pub plain_residue: u64,
    /// Base-w digits needed to cover q_i.
    pub digits: usize,
    /// Whether the exact tensor product at this level fits in i128.
    pub tensor_fits_i128: bool,
}

/// Ratio q_{i+1}/q_i applied when leaving level i.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScaleFactor {
    pub numerator: u64,
    pub denominator: u64,
}

impl ScaleFactor {
    pub fn ratio(&self) -> f64 {
        self.numerator as f64 / self.denominator as f64
    }
}

/// Decreasing moduli q_0 > q_1 > ... > q_L, one per level.
///
/// Validation happens here and only here; a constructed chain is always
/// usable by every level-aware operation.
#[derive(Clone, Debug)]
pub struct ModulusChain {
    levels: Vec<ChainLevel>,
}

impl ModulusChain {
    pub fn new(
        ring_degree: usize,
        plain_modulus: u64,
        moduli: &[u64],
        decomposition_base: u64,
    ) -> Result<Self> {
        if moduli.is_empty() {
            return Err(BgvError::InvalidSetupParameters(
                "modulus chain must contain at least one modulus".into(),
            ));
        }
        if let Some(pair) = moduli.windows(2).find(|w| w[1] >= w[0]) {
            return Err(BgvError::InvalidSetupParameters(format!(
                "modulus chain must be strictly decreasing, found {} followed by {}",
                pair[0], pair[1]
            )));
        }

        let terminal = moduli[moduli.len() - 1];
        if decomposition_base < 2 || decomposition_base >= terminal {
            return Err(BgvError::DecompositionOverflow(format!(
                "decomposition base {decomposition_base} must lie in [2, q_L = {terminal})"
            )));
        }

        let mut levels = Vec::with_capacity(moduli.len());
        for (i, &q) in moduli.iter().enumerate() {
            if q as u128 <= 2 * plain_modulus as u128 {
                return Err(BgvError::InvalidSetupParameters(format!(
                    "q_{i} = {q} must exceed 2t = {}",
                    2 * plain_modulus as u128
                )));
            }
            if gcd(q, plain_modulus) != 1 {
                return Err(BgvError::InvalidSetupParameters(format!(
                    "q_{i} = {q} is not coprime to the plaintext modulus {plain_modulus}"
                )));
            }
            let context = RingContext::new(ring_degree, q)?;
            let level = ChainLevel {
                modulus: q,
                delta: q / plain_modulus,
                plain_residue: q % plain_modulus,
                digits: digit_count(q, decomposition_base),
                tensor_fits_i128: tensor_fits_i128(ring_degree, q),
                context,
            };
            debug!(
                level = i,
                modulus = q,
                digits = level.digits,
                multiplier = ?level.context.multiplier_kind(),
                wide_tensor = !level.tensor_fits_i128,
                "modulus chain level ready"
            );
            levels.push(level);
        }

        Ok(Self { levels })
    }

    /// L, the index of the terminal level and the maximum multiplicative depth.
    pub fn max_level(&self) -> usize {
        self.levels.len() - 1
    }

    /// Level 0. A constructed chain is never empty.
    pub fn fresh(&self) -> &ChainLevel {
        &self.levels[0]
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn level(&self, i: usize) -> Result<&ChainLevel> {
        self.levels.get(i).ok_or(BgvError::InvalidLevel {
            level: i,
            max: self.max_level(),
        })
    }

    pub fn modulus(&self, i: usize) -> Result<u64> {
        Ok(self.level(i)?.modulus)
    }

    pub fn context(&self, i: usize) -> Result<&Arc<RingContext>> {
        Ok(&self.level(i)?.context)
    }

    /// Scaling from level i to level i+1. Fails at the terminal level.
    pub fn scale_factor(&self, i: usize) -> Result<ScaleFactor> {
        let from = self.level(i)?;
        let to = self.level(i + 1)?;
        Ok(ScaleFactor {
            numerator: to.modulus,
            denominator: from.modulus,
        })
    }

    pub fn moduli(&self) -> Vec<u64> {
        self.levels.iter().map(|l| l.modulus).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChainLevel> {
        self.levels.iter()
    }
}

/// Smallest ℓ ≥ 1 with w^ℓ ≥ q.
pub fn digit_count(modulus: u64, base: u64) -> usize {
    let mut power = base as u128;
    let mut digits = 1usize;
    while power < modulus as u128 {
        power *= base as u128;
        digits += 1;
    }
    digits
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toy_chain() {
        let chain = ModulusChain::new(8, 17, &[1153, 97], 16).unwrap();
        assert_eq!(chain.max_level(), 1);
        let l0 = chain.level(0).unwrap();
        assert_eq!(l0.delta, 67);
        assert_eq!(l0.plain_residue, 14);
        assert_eq!(l0.digits, 3);
        assert_eq!(chain.level(1).unwrap().digits, 2);
        assert_eq!(
            chain.scale_factor(0).unwrap(),
            ScaleFactor { numerator: 97, denominator: 1153 }
        );
        assert!((chain.scale_factor(0).unwrap().ratio() - 97.0 / 1153.0).abs() < 1e-12);
    }

    #[test]
    fn test_terminal_level_has_no_scale_factor() {
        let chain = ModulusChain::new(8, 17, &[1153, 97], 16).unwrap();
        assert_eq!(chain.scale_factor(1), Err(BgvError::InvalidLevel { level: 2, max: 1 }));
        assert_eq!(chain.modulus(5), Err(BgvError::InvalidLevel { level: 5, max: 1 }));
    }

    #[test]
    fn test_rejects_non_decreasing_chain() {
        assert!(matches!(
            ModulusChain::new(8, 17, &[97, 1153], 16),
            Err(BgvError::InvalidSetupParameters(_))
        ));
        assert!(matches!(
            ModulusChain::new(8, 17, &[1153, 1153], 16),
            Err(BgvError::InvalidSetupParameters(_))
        ));
        assert!(matches!(
            ModulusChain::new(8, 17, &[], 16),
            Err(BgvError::InvalidSetupParameters(_))
        ));
    }

    #[test]
    fn test_rejects_modulus_sharing_factor_with_t() {
        // 1156 = 4 · 17²
        assert!(matches!(
            ModulusChain::new(8, 17, &[1156, 97], 16),
            Err(BgvError::InvalidSetupParameters(_))
        ));
        // q must leave room for Δ ≥ 2
        assert!(matches!(
            ModulusChain::new(8, 17, &[1153, 31], 16),
            Err(BgvError::InvalidSetupParameters(_))
        ));
        // 2t does not fit in u64
        assert!(matches!(
            ModulusChain::new(8, 1 << 63, &[1153, 97], 16),
            Err(BgvError::InvalidSetupParameters(_))
        ));
    }

    #[test]
    fn test_rejects_bad_decomposition_base() {
        assert!(matches!(
            ModulusChain::new(8, 17, &[1153, 97], 1),
            Err(BgvError::DecompositionOverflow(_))
        ));
        assert!(matches!(
            ModulusChain::new(8, 17, &[1153, 97], 97),
            Err(BgvError::DecompositionOverflow(_))
        ));
    }

    #[test]
    fn test_digit_count() {
        assert_eq!(digit_count(65537, 16), 5);
        assert_eq!(digit_count(65536, 16), 4);
        assert_eq!(digit_count(97, 100), 1);
        assert_eq!(digit_count(288230376150876161, 1 << 16), 4);
    }
}
