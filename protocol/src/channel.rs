//! # Secure Channel
//!
//! Ad-hoc symmetric sessions bootstrapped from the IBE primitive: the
//! initiator invents a random session key, wraps it in an IBE ciphertext
//! addressed to the peer's identity, and from then on both sides run
//! AES-256-GCM with a fresh nonce per message.
//!
//! Deliberately a *different* cipher than the baseline block cipher inside
//! the IBE engine: session traffic is authenticated, IV'd, and tamper-
//! evident. The wrapped key is consumed once; there is no rekeying here —
//! a new session means a new `initiate`.
//!
//! The envelope carries a `secured` flag so peers can exchange plaintext
//! gracefully before a session key exists (the first message of a
//! conversation is usually the key wrap itself).

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

use crate::config::{AEAD_NONCE_LENGTH, SESSION_KEY_LENGTH};
use crate::error::{CryptoError, Result};
use crate::ibe::cipher::{decrypt as ibe_decrypt, encrypt_with_rng, IbeCiphertext};
use crate::ibe::keys::IdentityPrivateKey;
use crate::ibe::params::PublicParameters;

/// A message envelope. `secured = false` means plaintext passthrough —
/// legal only before a session key is established.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Envelope {
    pub secured: bool,
    /// For secured envelopes: `nonce || ciphertext+tag`, hex-encoded.
    /// For plaintext passthrough: the raw bytes, hex-encoded.
    pub payload: String,
}

/// One side of a symmetric session. Holds at most one session key.
pub struct SecureChannel {
    key: Option<[u8; SESSION_KEY_LENGTH]>,
}

impl SecureChannel {
    /// A channel with no key yet: seals become plaintext passthrough.
    pub fn plaintext() -> Self {
        Self { key: None }
    }

    /// Initiate a session to `peer_identity`: generate a random session
    /// key and wrap it for the peer. Send the returned ciphertext (the
    /// key-exchange payload) before any secured envelope.
    pub fn initiate(
        params: &PublicParameters,
        peer_identity: &str,
    ) -> Result<(Self, IbeCiphertext)> {
        Self::initiate_with_rng(&mut OsRng, params, peer_identity)
    }

    /// [`Self::initiate`] with a caller-supplied RNG.
    pub fn initiate_with_rng<R: RngCore + CryptoRng>(
        rng: &mut R,
        params: &PublicParameters,
        peer_identity: &str,
    ) -> Result<(Self, IbeCiphertext)> {
        let mut key = [0u8; SESSION_KEY_LENGTH];
        rng.fill_bytes(&mut key);
        let wrapped = encrypt_with_rng(rng, params, peer_identity, &key)?;
        Ok((Self { key: Some(key) }, wrapped))
    }

    /// Accept a session: unwrap the key-exchange ciphertext with our own
    /// private key and adopt the session key.
    pub fn accept(private_key: &IdentityPrivateKey, wrapped: &IbeCiphertext) -> Result<Self> {
        let key_bytes = ibe_decrypt(private_key, wrapped)?;
        let key: [u8; SESSION_KEY_LENGTH] = key_bytes
            .try_into()
            .map_err(|_| CryptoError::DecryptFailed)?;
        Ok(Self { key: Some(key) })
    }

    /// Whether a session key has been established.
    pub fn is_secured(&self) -> bool {
        self.key.is_some()
    }

    /// Seal a message. With a key: AES-256-GCM under a fresh random nonce,
    /// packed as `nonce || ciphertext+tag`. Without: plaintext passthrough,
    /// honestly flagged.
    pub fn seal(&self, plaintext: &[u8]) -> Result<Envelope> {
        let Some(key) = &self.key else {
            return Ok(Envelope {
                secured: false,
                payload: hex::encode(plaintext),
            });
        };

        let cipher =
            Aes256Gcm::new_from_slice(key).map_err(|_| CryptoError::EncryptFailed)?;
        let mut nonce_bytes = [0u8; AEAD_NONCE_LENGTH];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, plaintext)
            .map_err(|_| CryptoError::EncryptFailed)?;

        let mut packed = Vec::with_capacity(AEAD_NONCE_LENGTH + ciphertext.len());
        packed.extend_from_slice(&nonce_bytes);
        packed.extend_from_slice(&ciphertext);

        Ok(Envelope {
            secured: true,
            payload: hex::encode(packed),
        })
    }

    /// Open an envelope. Tag verification failure yields
    /// [`CryptoError::DecryptFailed`] and no partial plaintext, ever.
    pub fn open(&self, envelope: &Envelope) -> Result<Vec<u8>> {
        let payload = hex::decode(&envelope.payload).map_err(|_| CryptoError::MalformedFraming)?;

        if !envelope.secured {
            return Ok(payload);
        }

        let Some(key) = &self.key else {
            // A secured envelope arrived before the key exchange. Refusing
            // is the only honest option.
            return Err(CryptoError::DecryptFailed.into());
        };
        if payload.len() < AEAD_NONCE_LENGTH {
            return Err(CryptoError::MalformedFraming.into());
        }

        let (nonce_bytes, ciphertext) = payload.split_at(AEAD_NONCE_LENGTH);
        let cipher =
            Aes256Gcm::new_from_slice(key).map_err(|_| CryptoError::DecryptFailed)?;
        let plaintext = cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| CryptoError::DecryptFailed)?;
        Ok(plaintext)
    }
}
