use thiserror::Error;

/// Errors reported by every fallible operation.
///
/// Operands from different rings surface as `DimensionMismatch` when the
/// ring degree differs and as `ModulusMismatch` when only the modulus does.
/// Both are one incompatible-operands category; match it with
/// [`BgvError::is_dimension_mismatch`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BgvError {
    #[error("dimension mismatch: expected ring degree {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("modulus mismatch: expected {expected}, got {got}")]
    ModulusMismatch { expected: u64, got: u64 },

    #[error("level mismatch: {left} vs {right}; switch both operands to a common level first")]
    LevelMismatch { left: usize, right: usize },

    #[error("multiplicative depth exhausted at terminal level {level}")]
    DepthExhausted { level: usize },

    #[error("invalid setup parameters: {0}")]
    InvalidSetupParameters(String),

    #[error("decomposition overflow: {0}")]
    DecompositionOverflow(String),

    #[error("invalid level {level}: chain has levels 0..={max}")]
    InvalidLevel { level: usize, max: usize },

    #[error("ciphertext degree {got} not accepted here (expected {expected})")]
    CiphertextDegree { expected: usize, got: usize },

    #[error("ciphertext at level {level} holds an unrescaled product; switch modulus before multiplying again")]
    RescaleRequired { level: usize },

    #[error("plaintext value {value} out of range for plaintext modulus {modulus}")]
    PlaintextOutOfRange { value: u64, modulus: u64 },

    #[error("cannot reduce an empty batch of ciphertexts")]
    EmptyBatch,

    #[error("invalid encoding: {0}")]
    InvalidEncoding(String),
}

impl BgvError {
    /// True when the operands do not live in the same ring, whether the
    /// degree or the modulus differs.
    pub fn is_dimension_mismatch(&self) -> bool {
        matches!(self, Self::DimensionMismatch { .. } | Self::ModulusMismatch { .. })
    }
}

pub type Result<T> = std::result::Result<T, BgvError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ring_mismatch_category() {
        assert!(BgvError::DimensionMismatch { expected: 8, got: 16 }.is_dimension_mismatch());
        assert!(BgvError::ModulusMismatch { expected: 17, got: 97 }.is_dimension_mismatch());
        assert!(!BgvError::LevelMismatch { left: 0, right: 1 }.is_dimension_mismatch());
        assert!(!BgvError::InvalidEncoding("x".into()).is_dimension_mismatch());
    }
}
