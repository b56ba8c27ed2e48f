//! # bgv-core: leveled BGV homomorphic encryption
//!
//! Plaintexts are polynomials in Z_t[X]/(X^n + 1). Ciphertexts live at a
//! level of a decreasing modulus chain q_0 > q_1 > ... > q_L and step down
//! one level per multiplication, so a chain of length L + 1 supports
//! multiplicative depth L without bootstrapping.
//!
//! ## Quick Start
//!
//! ```no_run
//! use bgv_core::prelude::*;
//!
//! let params = bgv_core::params::presets::compact().unwrap();
//! let (sk, pk, rlk) = KeyManager::from_os_rng(&params).generate_keys().unwrap();
//!
//! let mut enc = Encryptor::from_os_rng(&pk);
//! let a = enc.encrypt_scalar(7).unwrap();
//! let b = enc.encrypt_scalar(11).unwrap();
//!
//! let eval = Evaluator::new(&params);
//! let product = eval.multiply_and_rescale(&a, &b, &rlk).unwrap();
//! assert_eq!(product.level(), 1);
//!
//! let dec = Decryptor::new(&sk);
//! assert_eq!(dec.decrypt_scalar(&product).unwrap(), 77);
//! ```

pub mod bgv;
pub mod codec;
pub mod error;
pub mod params;
pub mod ring;
pub mod sampling;

/// Convenient re-exports for common types and functions.
pub mod prelude {
    pub use crate::bgv::{
        decrypt, encrypt, encrypt_symmetric, invariant_noise_budget, Ciphertext, Decryptor,
        Encryptor, Evaluator, KeyManager, NoiseEstimate, Plaintext, PublicKey,
        RelinearizationKey, SecretKey,
    };
    pub use crate::codec::{
        decode_ciphertext, decode_public_key, decode_relin_key, decode_secret_key,
        encode_ciphertext, encode_public_key, encode_relin_key, encode_secret_key,
    };
    pub use crate::error::{BgvError, Result};
    pub use crate::params::{BgvParams, BgvParamsBuilder, ModulusChain};
    pub use crate::ring::{RingContext, RingElement};
    pub use crate::sampling::{ChaChaSampler, Sampler};
}
