//! Canonical byte encodings.
//!
//! All integers are little-endian. A ring element is its n coefficients as
//! u64 in ring order. Layouts:
//!
//! - ciphertext: `u32 level | u8 component count | u8 flags | components at q_level`,
//!   flag bit 0 marking a product that still awaits its modulus switch
//! - public key: `b | a` at q_0
//! - relinearization key: per level, `u32 digit count | (rlk0 | rlk1)*`
//! - secret key: `s` at q_0
//!
//! Decoding rejects wrong lengths, out-of-range levels and non-canonical
//! coefficients. Secret keys are validated without data-dependent branches.

use std::sync::Arc;

use byteorder::{ByteOrder, LittleEndian};
use zeroize::Zeroizing;

use crate::bgv::{Ciphertext, NoiseEstimate, PublicKey, RelinearizationKey, SecretKey};
use crate::error::{BgvError, Result};
use crate::params::BgvParams;
use crate::ring::{RingContext, RingElement};

const COEFF_BYTES: usize = 8;
const CIPHERTEXT_HEADER_BYTES: usize = 6;
const FLAG_PENDING_RESCALE: u8 = 1;

/// Bounds-checked cursor over an input buffer.
struct ByteReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(len).filter(|&end| end <= self.bytes.len()).ok_or_else(|| {
            BgvError::InvalidEncoding(format!(
                "truncated input: need {len} bytes at offset {}, have {}",
                self.pos,
                self.bytes.len()
            ))
        })?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn u32(&mut self) -> Result<u32> {
        Ok(LittleEndian::read_u32(self.take(4)?))
    }

    fn element(&mut self, ctx: &Arc<RingContext>) -> Result<RingElement> {
        let n = ctx.degree();
        let raw = self.take(n * COEFF_BYTES)?;
        let mut coeffs = vec![0u64; n];
        LittleEndian::read_u64_into(raw, &mut coeffs);
        let q = ctx.modulus();
        if let Some(pos) = coeffs.iter().position(|&c| c >= q) {
            return Err(BgvError::InvalidEncoding(format!(
                "coefficient {pos} is not reduced modulo {q}"
            )));
        }
        RingElement::from_canonical(coeffs, ctx)
    }

    fn finish(self) -> Result<()> {
        if self.pos != self.bytes.len() {
            return Err(BgvError::InvalidEncoding(format!(
                "{} trailing bytes",
                self.bytes.len() - self.pos
            )));
        }
        Ok(())
    }
}

fn put_element(buf: &mut Vec<u8>, poly: &RingElement) {
    let start = buf.len();
    buf.resize(start + poly.degree() * COEFF_BYTES, 0);
    LittleEndian::write_u64_into(poly.coeffs(), &mut buf[start..]);
}

fn put_u32(buf: &mut Vec<u8>, v: u32) {
    let mut word = [0u8; 4];
    LittleEndian::write_u32(&mut word, v);
    buf.extend_from_slice(&word);
}

fn to_u32(v: usize, what: &str) -> Result<u32> {
    u32::try_from(v).map_err(|_| BgvError::InvalidEncoding(format!("{what} {v} exceeds u32")))
}

pub fn encode_ring_element(poly: &RingElement) -> Vec<u8> {
    let mut buf = Vec::with_capacity(poly.degree() * COEFF_BYTES);
    put_element(&mut buf, poly);
    buf
}

pub fn decode_ring_element(bytes: &[u8], ctx: &Arc<RingContext>) -> Result<RingElement> {
    let mut reader = ByteReader::new(bytes);
    let poly = reader.element(ctx)?;
    reader.finish()?;
    Ok(poly)
}

pub fn encode_ciphertext(ct: &Ciphertext) -> Result<Vec<u8>> {
    let n = ct.params().ring_degree;
    let mut buf = Vec::with_capacity(CIPHERTEXT_HEADER_BYTES + ct.components().len() * n * COEFF_BYTES);
    put_u32(&mut buf, to_u32(ct.level(), "level")?);
    buf.push(ct.components().len() as u8);
    buf.push(if ct.is_pending_rescale() { FLAG_PENDING_RESCALE } else { 0 });
    for c in ct.components() {
        put_element(&mut buf, c);
    }
    Ok(buf)
}

/// Decode a ciphertext for `params`.
///
/// The noise history is not part of the encoding, so the result carries a
/// zero-budget estimate. Callers that know better can replace it with
/// [`Ciphertext::with_noise_estimate`]. The pending-rescale flag travels
/// with the bytes, so a relinearized product that has not been switched
/// down still cannot be multiplied again.
pub fn decode_ciphertext(bytes: &[u8], params: &Arc<BgvParams>) -> Result<Ciphertext> {
    let mut reader = ByteReader::new(bytes);
    let level = reader.u32()? as usize;
    if level > params.max_level() {
        return Err(BgvError::InvalidEncoding(format!(
            "level {level} outside chain 0..={}",
            params.max_level()
        )));
    }
    let count = reader.u8()? as usize;
    if !(2..=3).contains(&count) {
        return Err(BgvError::InvalidEncoding(format!(
            "ciphertext must have 2 or 3 components, found {count}"
        )));
    }
    let flags = reader.u8()?;
    if flags & !FLAG_PENDING_RESCALE != 0 {
        return Err(BgvError::InvalidEncoding(format!("unknown ciphertext flags {flags:#04x}")));
    }
    let pending_rescale = flags & FLAG_PENDING_RESCALE != 0;
    if count == 3 && !pending_rescale {
        return Err(BgvError::InvalidEncoding(
            "three-component ciphertext must be marked pending rescale".into(),
        ));
    }
    let ctx = params.chain.context(level)?;
    let components = (0..count)
        .map(|_| reader.element(ctx))
        .collect::<Result<Vec<_>>>()?;
    reader.finish()?;

    let noise = NoiseEstimate::saturated(params, level)?;
    Ok(Ciphertext::new(components, level, pending_rescale, noise, params))
}

pub fn encode_public_key(pk: &PublicKey) -> Vec<u8> {
    let mut buf = Vec::with_capacity(2 * pk.b.degree() * COEFF_BYTES);
    put_element(&mut buf, &pk.b);
    put_element(&mut buf, &pk.a);
    buf
}

pub fn decode_public_key(bytes: &[u8], params: &Arc<BgvParams>) -> Result<PublicKey> {
    let mut reader = ByteReader::new(bytes);
    let ctx = params.base_context();
    let b = reader.element(ctx)?;
    let a = reader.element(ctx)?;
    reader.finish()?;
    Ok(PublicKey {
        b,
        a,
        params: params.clone(),
    })
}

pub fn encode_relin_key(rlk: &RelinearizationKey) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    for keys in rlk.levels() {
        put_u32(&mut buf, to_u32(keys.len(), "digit count")?);
        for (rlk0, rlk1) in keys {
            put_element(&mut buf, rlk0);
            put_element(&mut buf, rlk1);
        }
    }
    Ok(buf)
}

pub fn decode_relin_key(bytes: &[u8], params: &Arc<BgvParams>) -> Result<RelinearizationKey> {
    let mut reader = ByteReader::new(bytes);
    let mut levels = Vec::with_capacity(params.chain.len());
    for (i, level) in params.chain.iter().enumerate() {
        let digits = reader.u32()? as usize;
        if digits != level.digits {
            return Err(BgvError::InvalidEncoding(format!(
                "level {i} declares {digits} digits, parameters require {}",
                level.digits
            )));
        }
        let mut keys = Vec::with_capacity(digits);
        for _ in 0..digits {
            let rlk0 = reader.element(&level.context)?;
            let rlk1 = reader.element(&level.context)?;
            keys.push((rlk0, rlk1));
        }
        levels.push(keys);
    }
    reader.finish()?;
    Ok(RelinearizationKey::from_levels(levels, params))
}

/// Coefficients of s at q_0. The buffer is wiped when dropped.
pub fn encode_secret_key(sk: &SecretKey) -> Zeroizing<Vec<u8>> {
    let mut buf = Zeroizing::new(Vec::with_capacity(sk.poly().degree() * COEFF_BYTES));
    put_element(&mut buf, sk.poly());
    buf
}

/// 1 if a == b, else 0, without branching on the values.
#[inline]
fn ct_eq(a: u64, b: u64) -> u64 {
    let x = a ^ b;
    ((x | x.wrapping_neg()) >> 63) ^ 1
}

/// Decode a secret key, accepting only coefficients in {0, 1, q_0 - 1}.
///
/// Every coefficient is inspected regardless of earlier failures and the
/// decoded buffer is wiped on every path.
pub fn decode_secret_key(bytes: &[u8], params: &Arc<BgvParams>) -> Result<SecretKey> {
    let n = params.ring_degree;
    let ctx = params.base_context();
    let q = ctx.modulus();
    if bytes.len() != n * COEFF_BYTES {
        return Err(BgvError::InvalidEncoding(format!(
            "secret key must be {} bytes, got {}",
            n * COEFF_BYTES,
            bytes.len()
        )));
    }

    let mut coeffs = Zeroizing::new(vec![0u64; n]);
    LittleEndian::read_u64_into(bytes, &mut coeffs);

    let mut invalid = 0u64;
    for &c in coeffs.iter() {
        let ternary = ct_eq(c, 0) | ct_eq(c, 1) | ct_eq(c, q - 1);
        invalid |= ternary ^ 1;
    }
    if invalid != 0 {
        return Err(BgvError::InvalidEncoding("secret key coefficients are not ternary".into()));
    }

    let poly = RingElement::from_canonical(std::mem::take(&mut *coeffs), ctx)?;
    Ok(SecretKey::from_poly(poly, params))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bgv::{decrypt, encrypt, Evaluator, KeyManager, Plaintext};
    use crate::params::presets::{compact, toy};
    use crate::sampling::ChaChaSampler;

    #[test]
    fn test_ring_element_layout() {
        let params = toy().unwrap();
        let ctx = params.base_context();
        let poly = RingElement::from_coeffs(vec![1, 2, 3, 4, 5, 6, 7, 1152], ctx).unwrap();
        let bytes = encode_ring_element(&poly);
        assert_eq!(bytes.len(), 64);
        assert_eq!(&bytes[..8], &[1, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(&bytes[56..], &1152u64.to_le_bytes());
        assert_eq!(decode_ring_element(&bytes, ctx).unwrap(), poly);
    }

    #[test]
    fn test_rejects_non_canonical_coefficient() {
        let params = toy().unwrap();
        let ctx = params.base_context();
        let mut bytes = encode_ring_element(&RingElement::zero(ctx));
        bytes[..8].copy_from_slice(&1153u64.to_le_bytes());
        assert!(matches!(decode_ring_element(&bytes, ctx), Err(BgvError::InvalidEncoding(_))));
    }

    #[test]
    fn test_ciphertext_round_trip_and_use() {
        let params = compact().unwrap();
        let mut sampler = ChaChaSampler::from_seed(51, params.sigma);
        let (sk, pk, rlk) = KeyManager::new(&params, &mut sampler).generate_keys().unwrap();
        let eval = Evaluator::new(&params);

        let pt = Plaintext::from_values(&[4, 8, 15, 16], &params).unwrap();
        let ct = encrypt(&pt, &pk, &mut sampler).unwrap();
        let bytes = encode_ciphertext(&ct).unwrap();
        assert_eq!(bytes.len(), 6 + 2 * 1024 * 8);

        let decoded = decode_ciphertext(&bytes, &params).unwrap();
        assert_eq!(decoded.components(), ct.components());
        assert_eq!(decoded.level(), 0);
        assert!(!decoded.is_pending_rescale());
        assert_eq!(decoded.estimated_budget_bits().unwrap(), 0.0);
        assert_eq!(decrypt(&decoded, &sk).unwrap(), pt);

        let product = eval.multiply(&ct, &ct).unwrap();
        let decoded_product = decode_ciphertext(&encode_ciphertext(&product).unwrap(), &params).unwrap();
        assert_eq!(decoded_product.degree(), 2);
        assert!(decoded_product.is_pending_rescale());
        let relin = eval.relinearize(&decoded_product, &rlk).unwrap();
        assert_eq!(decrypt(&relin, &sk).unwrap(), pt.mul(&pt).unwrap());
    }

    #[test]
    fn test_pending_rescale_survives_encoding() {
        let params = compact().unwrap();
        let mut sampler = ChaChaSampler::from_seed(55, params.sigma);
        let (_, pk, rlk) = KeyManager::new(&params, &mut sampler).generate_keys().unwrap();
        let eval = Evaluator::new(&params);

        let ct = encrypt(&Plaintext::from_scalar(3, &params).unwrap(), &pk, &mut sampler).unwrap();
        let relin = eval.relinearize(&eval.multiply(&ct, &ct).unwrap(), &rlk).unwrap();
        assert_eq!(relin.degree(), 1);
        assert!(relin.is_pending_rescale());

        let bytes = encode_ciphertext(&relin).unwrap();
        assert_eq!(bytes[5], FLAG_PENDING_RESCALE);
        let decoded = decode_ciphertext(&bytes, &params).unwrap();
        assert!(decoded.is_pending_rescale());
        assert_eq!(
            eval.multiply(&decoded, &decoded).unwrap_err(),
            BgvError::RescaleRequired { level: 0 }
        );

        // the flag clears only through an actual switch
        let switched = eval.switch_modulus(&decoded, 1).unwrap();
        let again = decode_ciphertext(&encode_ciphertext(&switched).unwrap(), &params).unwrap();
        assert!(!again.is_pending_rescale());
        assert!(eval.multiply(&again, &again).is_ok());
    }

    #[test]
    fn test_unflagged_product_rejected() {
        let params = toy().unwrap();
        let mut sampler = ChaChaSampler::from_seed(56, params.sigma);
        let (_, pk, _) = KeyManager::new(&params, &mut sampler).generate_keys().unwrap();
        let ct = encrypt(&Plaintext::from_scalar(1, &params).unwrap(), &pk, &mut sampler).unwrap();
        let product = Evaluator::new(&params).multiply(&ct, &ct).unwrap();
        let mut bytes = encode_ciphertext(&product).unwrap();
        bytes[5] = 0;
        assert!(matches!(decode_ciphertext(&bytes, &params), Err(BgvError::InvalidEncoding(_))));
    }

    #[test]
    fn test_ciphertext_rejects_malformed_input() {
        let params = toy().unwrap();
        let mut sampler = ChaChaSampler::from_seed(52, params.sigma);
        let (_, pk, _) = KeyManager::new(&params, &mut sampler).generate_keys().unwrap();
        let ct = encrypt(&Plaintext::from_scalar(1, &params).unwrap(), &pk, &mut sampler).unwrap();
        let bytes = encode_ciphertext(&ct).unwrap();

        let invalid = |b: &[u8]| matches!(decode_ciphertext(b, &params), Err(BgvError::InvalidEncoding(_)));
        assert!(invalid(&bytes[..bytes.len() - 1]));

        let mut trailing = bytes.clone();
        trailing.push(0);
        assert!(invalid(&trailing));

        let mut bad_level = bytes.clone();
        bad_level[0] = 2;
        assert!(invalid(&bad_level));

        let mut bad_count = bytes.clone();
        bad_count[4] = 4;
        assert!(invalid(&bad_count));

        let mut bad_flags = bytes.clone();
        bad_flags[5] = 2;
        assert!(invalid(&bad_flags));

        assert!(invalid(&[]));
    }

    #[test]
    fn test_key_round_trips() {
        let params = toy().unwrap();
        let mut km = KeyManager::new(&params, ChaChaSampler::from_seed(53, params.sigma));
        let (sk, pk, rlk) = km.generate_keys().unwrap();

        let pk2 = decode_public_key(&encode_public_key(&pk), &params).unwrap();
        assert_eq!((pk2.b, pk2.a), (pk.b.clone(), pk.a.clone()));

        let rlk_bytes = encode_relin_key(&rlk).unwrap();
        // 3 + 2 digits, two elements each, plus one count per level
        assert_eq!(rlk_bytes.len(), 2 * 4 + (3 + 2) * 2 * 8 * 8);
        let rlk2 = decode_relin_key(&rlk_bytes, &params).unwrap();
        assert_eq!(rlk2.levels(), rlk.levels());

        let sk_bytes = encode_secret_key(&sk);
        let sk2 = decode_secret_key(&sk_bytes, &params).unwrap();
        assert_eq!(sk2.poly(), sk.poly());
    }

    #[test]
    fn test_secret_key_validation() {
        let params = toy().unwrap();
        let mut bytes = vec![0u8; 64];
        bytes[..8].copy_from_slice(&1152u64.to_le_bytes());
        bytes[8..16].copy_from_slice(&1u64.to_le_bytes());
        let sk = decode_secret_key(&bytes, &params).unwrap();
        assert_eq!(&sk.poly().centered_coeffs()[..2], &[-1, 1]);

        bytes[16..24].copy_from_slice(&2u64.to_le_bytes());
        assert!(matches!(decode_secret_key(&bytes, &params), Err(BgvError::InvalidEncoding(_))));
        assert!(matches!(decode_secret_key(&bytes[..63], &params), Err(BgvError::InvalidEncoding(_))));
    }

    #[test]
    fn test_relin_key_digit_count_checked() {
        let params = toy().unwrap();
        let mut km = KeyManager::new(&params, ChaChaSampler::from_seed(54, params.sigma));
        let sk = km.generate_secret_key().unwrap();
        let rlk = km.generate_relin_key(&sk).unwrap();
        let mut bytes = encode_relin_key(&rlk).unwrap();
        bytes[0] = 2;
        assert!(matches!(decode_relin_key(&bytes, &params), Err(BgvError::InvalidEncoding(_))));
    }

    #[test]
    fn test_ct_eq() {
        assert_eq!(ct_eq(0, 0), 1);
        assert_eq!(ct_eq(5, 6), 0);
        assert_eq!(ct_eq(u64::MAX, u64::MAX), 1);
        assert_eq!(ct_eq(u64::MAX, 0), 0);
    }
}
