//! # The Hybrid Encryption Engine
//!
//! Boneh–Franklin BasicIdent glued to a symmetric cipher:
//!
//! 1. Sample an ephemeral scalar `r`; publish `U = r·P`.
//! 2. `Qid = H1(recipient_identity)`.
//! 3. `secret = e(Qid, Ppub)^r` — by bilinearity the recipient computes the
//!    same element as `e(d_ID, U)`.
//! 4. `key = KDF(secret_bytes, 32)` — iterated SHA-256, bit-exact on both
//!    sides.
//! 5. `V = AES-256-CBC(key, plaintext)` with PKCS#7 padding.
//!
//! ## Baseline cipher caveat (read this)
//!
//! The block cipher runs with an **all-zero IV and no authentication**.
//! This is the documented compatibility baseline: equal plaintexts to the
//! same identity under the same ephemeral secret produce equal `V`, and an
//! active attacker can malleate blocks undetected. The padding check is
//! what turns a wrong-key decryption into [`CryptoError::DecryptFailed`]
//! instead of plausible garbage. Hardening target: migrate `V` to an AEAD
//! mode like the one [`crate::channel`] already uses for session traffic.
//!
//! ## Wire forms
//!
//! Canonical: the JSON sidecar `{U, V, cipherExtra, originalName}` with
//! hex-encoded components; `cipherExtra` carries the group descriptor and
//! doubles as the suite-mismatch check. Legacy alternative: the binary
//! framing `[u32 BE uLen][U][V]`, kept for old attachments.

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use ff::Field;
use group::Curve;
use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use bls12_381_plus::{G2Affine, G2Projective, Scalar};

use crate::config::{
    CIPHER_BLOCK_LENGTH, G2_COMPRESSED_LENGTH, GROUP_DESCRIPTOR, SYMMETRIC_KEY_LENGTH,
};
use crate::error::{CryptoError, Result};
use crate::ibe::keys::{normalize_identity, IdentityPrivateKey};
use crate::ibe::pairing::{
    compress_g2, decompress_g2, hash_to_point, secret_bytes, shared_secret,
};
use crate::ibe::params::PublicParameters;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// The IV-less baseline: every message uses the zero IV. See the module
/// docs before "fixing" this.
const ZERO_IV: [u8; CIPHER_BLOCK_LENGTH] = [0u8; CIPHER_BLOCK_LENGTH];

/// An IBE ciphertext: the ephemeral point `U` and the symmetric payload
/// `V`, tagged with the group descriptor it was produced under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IbeCiphertext {
    u: G2Affine,
    v: Vec<u8>,
    descriptor: String,
    /// Original file name, carried when the ciphertext travels as a mail
    /// attachment sidecar. Not authenticated — display hint only.
    original_name: Option<String>,
}

impl IbeCiphertext {
    /// The ephemeral component `U = r·P`, fixed-length when serialized.
    pub fn u_bytes(&self) -> [u8; G2_COMPRESSED_LENGTH] {
        compress_g2(&self.u)
    }

    /// The symmetric payload `V`. Always a whole number of cipher blocks.
    pub fn v_bytes(&self) -> &[u8] {
        &self.v
    }

    /// Attach an original file name for the sidecar form.
    pub fn with_original_name(mut self, name: impl Into<String>) -> Self {
        self.original_name = Some(name.into());
        self
    }

    /// Canonical wire form: the JSON sidecar.
    pub fn to_sidecar_json(&self) -> String {
        let sidecar = CiphertextSidecar {
            u: hex::encode(self.u_bytes()),
            v: hex::encode(&self.v),
            cipher_extra: self.descriptor.clone(),
            original_name: self.original_name.clone(),
        };
        // Serializing a struct of strings cannot fail.
        serde_json::to_string(&sidecar).unwrap_or_default()
    }

    /// Parse the canonical JSON sidecar, rejecting a foreign suite before
    /// any point decompression.
    pub fn from_sidecar_json(json: &str) -> Result<Self, CryptoError> {
        let sidecar: CiphertextSidecar =
            serde_json::from_str(json).map_err(|_| CryptoError::MalformedFraming)?;
        if sidecar.cipher_extra != GROUP_DESCRIPTOR {
            return Err(CryptoError::GroupDescriptorMismatch {
                expected: GROUP_DESCRIPTOR.to_string(),
                found: sidecar.cipher_extra,
            });
        }
        let u_bytes = hex::decode(&sidecar.u).map_err(|_| CryptoError::MalformedFraming)?;
        let v = hex::decode(&sidecar.v).map_err(|_| CryptoError::MalformedFraming)?;
        Ok(Self {
            u: decompress_g2(&u_bytes)?,
            v,
            descriptor: sidecar.cipher_extra,
            original_name: sidecar.original_name,
        })
    }

    /// Legacy binary framing: `[u32 BE uLen][U][V]`.
    pub fn to_legacy_bytes(&self) -> Vec<u8> {
        let u = self.u_bytes();
        let mut out = Vec::with_capacity(4 + u.len() + self.v.len());
        out.extend_from_slice(&(u.len() as u32).to_be_bytes());
        out.extend_from_slice(&u);
        out.extend_from_slice(&self.v);
        out
    }

    /// Parse the legacy binary framing. The descriptor is implied — legacy
    /// payloads predate suite tagging.
    pub fn from_legacy_bytes(data: &[u8]) -> Result<Self, CryptoError> {
        if data.len() < 4 {
            return Err(CryptoError::MalformedFraming);
        }
        let (len_bytes, rest) = data.split_at(4);
        let u_len = u32::from_be_bytes([len_bytes[0], len_bytes[1], len_bytes[2], len_bytes[3]])
            as usize;
        if u_len != G2_COMPRESSED_LENGTH || rest.len() < u_len {
            return Err(CryptoError::MalformedFraming);
        }
        let (u_bytes, v) = rest.split_at(u_len);
        Ok(Self {
            u: decompress_g2(u_bytes)?,
            v: v.to_vec(),
            descriptor: GROUP_DESCRIPTOR.to_string(),
            original_name: None,
        })
    }
}

/// JSON sidecar shape. Field names are fixed for compatibility with
/// existing attachments.
#[derive(Debug, Serialize, Deserialize)]
struct CiphertextSidecar {
    #[serde(rename = "U")]
    u: String,
    #[serde(rename = "V")]
    v: String,
    #[serde(rename = "cipherExtra")]
    cipher_extra: String,
    #[serde(rename = "originalName", skip_serializing_if = "Option::is_none")]
    original_name: Option<String>,
}

/// Iterated-SHA-256 key derivation.
///
/// First block is `SHA-256(secret)`; every further block is the SHA-256 of
/// the previous block, concatenated until `key_len` bytes are filled. The
/// exact chaining matters for interoperability — do not swap in HKDF
/// without versioning the group descriptor.
fn kdf(secret: &[u8], key_len: usize) -> Vec<u8> {
    let mut key = Vec::with_capacity(key_len);
    let mut block: [u8; 32] = Sha256::digest(secret).into();
    while key.len() < key_len {
        let take = (key_len - key.len()).min(block.len());
        key.extend_from_slice(&block[..take]);
        block = Sha256::digest(block).into();
    }
    key
}

/// Encrypt `plaintext` to `recipient_identity` with a caller-supplied RNG.
///
/// Taking the RNG as a parameter keeps the function deterministic under a
/// seeded generator, which is how the failure-path tests pin down exact
/// ciphertexts.
pub fn encrypt_with_rng<R: RngCore + CryptoRng>(
    rng: &mut R,
    params: &PublicParameters,
    recipient_identity: &str,
    plaintext: &[u8],
) -> Result<IbeCiphertext> {
    let identity = normalize_identity(recipient_identity)?;
    let qid = hash_to_point(&identity);

    // Fresh ephemeral scalar per encryption. Zero would leak the plaintext
    // key to anyone (U would be the identity element), so reject it.
    let r = loop {
        let candidate = Scalar::random(&mut *rng);
        if !bool::from(candidate.is_zero()) {
            break candidate;
        }
    };

    let u = (G2Projective::from(params.generator()) * r).to_affine();

    // e(Qid, Ppub)^r computed as e(r·Qid, Ppub) — same element, one scalar
    // multiplication in G1 instead of a Gt exponentiation.
    let gt = shared_secret(&(qid * r).to_affine(), params.public_key());
    let key = kdf(&secret_bytes(&gt)?, SYMMETRIC_KEY_LENGTH);

    let v = Aes256CbcEnc::new_from_slices(&key, &ZERO_IV)
        .map_err(|_| CryptoError::EncryptFailed)?
        .encrypt_padded_vec_mut::<Pkcs7>(plaintext);

    Ok(IbeCiphertext {
        u,
        v,
        descriptor: params.descriptor().to_string(),
        original_name: None,
    })
}

/// Encrypt with the OS RNG. The common path.
pub fn encrypt(
    params: &PublicParameters,
    recipient_identity: &str,
    plaintext: &[u8],
) -> Result<IbeCiphertext> {
    encrypt_with_rng(&mut OsRng, params, recipient_identity, plaintext)
}

/// Decrypt a ciphertext with an identity private key.
///
/// `e(d_ID, U) = e(s·Qid, r·P) = e(Qid, Ppub)^r` — equal to the
/// encryptor's secret exactly when `d_ID` belongs to the recipient
/// identity. A non-matching key derives a different symmetric key and
/// fails the padding check; no plausible garbage is ever returned.
pub fn decrypt(key: &IdentityPrivateKey, ciphertext: &IbeCiphertext) -> Result<Vec<u8>> {
    if ciphertext.descriptor != GROUP_DESCRIPTOR {
        return Err(CryptoError::GroupDescriptorMismatch {
            expected: GROUP_DESCRIPTOR.to_string(),
            found: ciphertext.descriptor.clone(),
        }
        .into());
    }

    let gt = shared_secret(key.point(), &ciphertext.u);
    let symmetric_key = kdf(&secret_bytes(&gt)?, SYMMETRIC_KEY_LENGTH);

    let plaintext = Aes256CbcDec::new_from_slices(&symmetric_key, &ZERO_IV)
        .map_err(|_| CryptoError::DecryptFailed)?
        .decrypt_padded_vec_mut::<Pkcs7>(&ciphertext.v)
        .map_err(|_| CryptoError::DecryptFailed)?;

    Ok(plaintext)
}
