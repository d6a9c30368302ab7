//! # Pairing Primitives
//!
//! Thin, typed wrappers around the BLS12-381 pairing library. Everything
//! here is a pure function: same input, same output, safely callable from
//! any number of threads.
//!
//! If you're tempted to optimize these functions, please reconsider. Then
//! go read about invalid-curve attacks and come back when you've lost the
//! urge.

use bls12_381_plus::elliptic_curve::hash2curve::ExpandMsgXmd;
use bls12_381_plus::{pairing, G1Affine, G1Projective, G2Affine, Gt};
use sha2::Sha256;

use crate::config::{G1_COMPRESSED_LENGTH, G2_COMPRESSED_LENGTH, HASH_TO_POINT_DST};
use crate::error::CryptoError;

/// Deterministically map an identity string to a point in G1.
///
/// Uses the RFC 9380 XMD:SHA-256 hash-to-curve suite with a VEIL-specific
/// domain separation tag. The same identity always yields the same point —
/// that determinism is what makes key reissuance possible without
/// re-registration.
pub fn hash_to_point(identity: &str) -> G1Projective {
    G1Projective::hash::<ExpandMsgXmd<Sha256>>(identity.as_bytes(), HASH_TO_POINT_DST)
}

/// Compute the pairing `e(p, q)`.
///
/// Bilinearity is the whole trick: `e(a·P, b·Q) = e(P, Q)^{ab}`, which lets
/// the encryptor (holding `r` and `Ppub = s·P`) and the decryptor (holding
/// `d_ID = s·Qid` and `U = r·P`) arrive at the same Gt element without ever
/// exchanging a key.
pub fn shared_secret(p: &G1Affine, q: &G2Affine) -> Gt {
    pairing(p, q)
}

/// Canonical byte serialization of a Gt element, fed to the KDF.
///
/// Must be bit-exact across implementations or ciphertexts stop
/// interoperating. We use the library's canonical encoding via bincode,
/// which emits the element's fixed-length representation.
pub fn secret_bytes(secret: &Gt) -> Result<Vec<u8>, CryptoError> {
    bincode::serialize(secret).map_err(|_| CryptoError::EncryptFailed)
}

/// Serialize a G1 point to its 48-byte compressed form.
pub fn compress_g1(point: &G1Affine) -> [u8; G1_COMPRESSED_LENGTH] {
    point.to_compressed()
}

/// Deserialize a compressed G1 point, rejecting anything that is not a
/// valid curve point in the correct subgroup.
pub fn decompress_g1(bytes: &[u8]) -> Result<G1Affine, CryptoError> {
    let arr: &[u8; G1_COMPRESSED_LENGTH] =
        bytes.try_into().map_err(|_| CryptoError::MalformedElement)?;
    Option::<G1Affine>::from(G1Affine::from_compressed(arr)).ok_or(CryptoError::MalformedElement)
}

/// Serialize a G2 point to its 96-byte compressed form.
pub fn compress_g2(point: &G2Affine) -> [u8; G2_COMPRESSED_LENGTH] {
    point.to_compressed()
}

/// Deserialize a compressed G2 point, rejecting anything that is not a
/// valid curve point in the correct subgroup.
pub fn decompress_g2(bytes: &[u8]) -> Result<G2Affine, CryptoError> {
    let arr: &[u8; G2_COMPRESSED_LENGTH] =
        bytes.try_into().map_err(|_| CryptoError::MalformedElement)?;
    Option::<G2Affine>::from(G2Affine::from_compressed(arr)).ok_or(CryptoError::MalformedElement)
}
