//! # Identity Key Derivation
//!
//! `d_ID = s · H1(identity)` — the heart of identity-based encryption.
//! Derivation is a pure function of the master secret and the identity
//! string, so keys can be reissued at any time without re-registration and
//! two derivations for the same identity always agree.
//!
//! The identity check here is advisory (catch typos early), not a security
//! boundary: an attacker who can request keys for arbitrary strings still
//! has to pass the TOTP gate in [`crate::registration`] first.

use group::Curve;

use bls12_381_plus::G1Affine;

use crate::config::G1_COMPRESSED_LENGTH;
use crate::error::{AuthorityError, CryptoError, Result};
use crate::ibe::pairing::{compress_g1, decompress_g1, hash_to_point};
use crate::ibe::params::AuthorityParameters;

/// A per-identity private key: a single G1 point.
///
/// Must never be transmitted without prior authorization, and never logged.
/// The `Debug` impl prints a short fingerprint instead of the key material.
#[derive(Clone, PartialEq, Eq)]
pub struct IdentityPrivateKey {
    point: G1Affine,
}

impl IdentityPrivateKey {
    /// Canonical serialization: 48-byte compressed G1.
    pub fn to_bytes(&self) -> [u8; G1_COMPRESSED_LENGTH] {
        compress_g1(&self.point)
    }

    /// Hex form used on the wire (`privateKey` field).
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    /// Reconstruct a key from its canonical serialization.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        Ok(Self {
            point: decompress_g1(bytes)?,
        })
    }

    /// Reconstruct from the hex wire form.
    pub fn from_hex(s: &str) -> Result<Self, CryptoError> {
        let bytes = hex::decode(s).map_err(|_| CryptoError::MalformedElement)?;
        Self::from_bytes(&bytes)
    }

    /// The underlying group element, for pairing operations.
    pub(crate) fn point(&self) -> &G1Affine {
        &self.point
    }
}

impl std::fmt::Debug for IdentityPrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // First 8 bytes of the compressed form — enough to tell keys apart
        // in a debug session, useless to an attacker reading logs.
        f.debug_tuple("IdentityPrivateKey")
            .field(&hex::encode(&self.to_bytes()[..8]))
            .finish()
    }
}

/// Normalize and sanity-check an identity string.
///
/// Identities are email addresses: trimmed, lower-cased (the registry key
/// is case-insensitive), and required to look like `local@domain.tld`.
pub fn normalize_identity(raw: &str) -> Result<String> {
    let identity = raw.trim().to_lowercase();
    if identity.is_empty() {
        return Err(AuthorityError::Validation("identity is empty".into()));
    }
    let Some((local, domain)) = identity.split_once('@') else {
        return Err(AuthorityError::Validation(
            "identity is not an email address".into(),
        ));
    };
    if local.is_empty() || domain.is_empty() || !domain.contains('.') || identity.contains(' ') {
        return Err(AuthorityError::Validation(
            "identity is not an email address".into(),
        ));
    }
    Ok(identity)
}

/// Derives per-identity private keys from the master secret.
///
/// Owns the [`AuthorityParameters`]; nothing else in the crate can reach
/// the master secret. The gated issuance path in
/// [`crate::registration::RegistrationProtocol::issue_private_key`] is the
/// only caller in the authority flow — direct use of [`derive`] is for the
/// authority process itself (tests, operator tooling).
///
/// [`derive`]: IdentityKeyService::derive
pub struct IdentityKeyService {
    params: AuthorityParameters,
}

impl IdentityKeyService {
    pub fn new(params: AuthorityParameters) -> Self {
        Self { params }
    }

    /// The public parameter view, for handing to clients.
    pub fn public_parameters(&self) -> crate::ibe::params::PublicParameters {
        self.params.public()
    }

    /// Derive `d_ID = s · H1(identity)`.
    ///
    /// Pure in `(s, identity)`: repeated calls yield equal keys, so a
    /// client that lost its key can simply be reissued one.
    pub fn derive(&self, identity: &str) -> Result<IdentityPrivateKey> {
        let identity = normalize_identity(identity)?;
        let qid = hash_to_point(&identity);
        let point = self.params.scale_by_master_secret(&qid).to_affine();
        Ok(IdentityPrivateKey { point })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn service() -> IdentityKeyService {
        let params = AuthorityParameters::generate(&mut StdRng::seed_from_u64(99));
        IdentityKeyService::new(params)
    }

    #[test]
    fn derivation_is_idempotent() {
        let svc = service();
        let a = svc.derive("alice@example.com").unwrap();
        let b = svc.derive("alice@example.com").unwrap();
        assert_eq!(a.to_bytes(), b.to_bytes());
    }

    #[test]
    fn derivation_normalizes_case_and_whitespace() {
        let svc = service();
        let a = svc.derive("Alice@Example.COM ").unwrap();
        let b = svc.derive("alice@example.com").unwrap();
        assert_eq!(a.to_bytes(), b.to_bytes());
    }

    #[test]
    fn distinct_identities_get_distinct_keys() {
        let svc = service();
        let a = svc.derive("alice@example.com").unwrap();
        let b = svc.derive("bob@example.com").unwrap();
        assert_ne!(a.to_bytes(), b.to_bytes());
    }

    #[test]
    fn malformed_identities_are_rejected() {
        let svc = service();
        for bad in ["", "   ", "no-at-sign", "@example.com", "a@", "a@nodot", "a b@x.com"] {
            assert!(
                svc.derive(bad).is_err(),
                "expected rejection for {:?}",
                bad
            );
        }
    }

    #[test]
    fn key_serialization_round_trips() {
        let svc = service();
        let key = svc.derive("carol@example.com").unwrap();
        let restored = IdentityPrivateKey::from_hex(&key.to_hex()).unwrap();
        assert_eq!(key, restored);
    }

    #[test]
    fn debug_output_is_a_fingerprint() {
        let key = service().derive("dave@example.com").unwrap();
        let out = format!("{:?}", key);
        // 8 bytes = 16 hex chars, not the full 96.
        assert!(out.len() < 60, "debug output too long: {}", out);
    }
}
