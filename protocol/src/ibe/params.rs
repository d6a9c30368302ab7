//! # System Parameters
//!
//! Two distinct types, on purpose:
//!
//! - [`AuthorityParameters`] carries the master secret `s`. It is created
//!   and held exclusively by the Trust Authority process and is never
//!   serialized. There is no getter for `s`.
//! - [`PublicParameters`] carries only the generator `P`, the public key
//!   `Ppub = s·P`, and the group descriptor. It has no master-secret field
//!   *at all* — handing a client the master key is a compile error here,
//!   not a runtime exception.
//!
//! The invariant `Ppub = s·P` holds by construction: both values come out
//! of [`AuthorityParameters::generate`] and neither is mutable afterwards.

use ff::Field;
use group::{Curve, Group};
use rand::{CryptoRng, RngCore};

use bls12_381_plus::{G2Affine, G2Projective, Scalar};
use serde::{Deserialize, Serialize};

use crate::config::GROUP_DESCRIPTOR;
use crate::error::CryptoError;
use crate::ibe::pairing::{compress_g2, decompress_g2};

/// The Trust Authority's full parameter set, including the master secret.
///
/// Never serialized, never logged. The `Debug` impl redacts the secret so
/// an accidental `{:?}` in a log line doesn't end the project.
pub struct AuthorityParameters {
    /// Generator of G2.
    generator: G2Affine,
    /// The master secret. Everything derives from this scalar; it must not
    /// leave this struct.
    master_secret: Scalar,
    /// `Ppub = s·P`.
    public_key: G2Affine,
}

impl AuthorityParameters {
    /// Generate a fresh parameter set: the standard G2 generator, a random
    /// nonzero master scalar, and the matching public key.
    pub fn generate<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let generator = G2Projective::generator();

        // A zero master secret would make every private key the identity
        // element. Astronomically unlikely, rejected anyway.
        let master_secret = loop {
            let s = Scalar::random(&mut *rng);
            if !bool::from(s.is_zero()) {
                break s;
            }
        };

        let public_key = (generator * master_secret).to_affine();

        Self {
            generator: generator.to_affine(),
            master_secret,
            public_key,
        }
    }

    /// The public subset of the parameters. This is the only thing that
    /// ever leaves the authority process.
    pub fn public(&self) -> PublicParameters {
        PublicParameters {
            generator: self.generator,
            public_key: self.public_key,
            descriptor: GROUP_DESCRIPTOR.to_string(),
        }
    }

    /// The generator `P`.
    pub fn generator(&self) -> &G2Affine {
        &self.generator
    }

    /// `Ppub = s·P`.
    pub fn public_key(&self) -> &G2Affine {
        &self.public_key
    }

    /// Multiply a G1 point by the master secret. Crate-private: key
    /// derivation in [`crate::ibe::keys`] is the only consumer.
    pub(crate) fn scale_by_master_secret(
        &self,
        point: &bls12_381_plus::G1Projective,
    ) -> bls12_381_plus::G1Projective {
        point * self.master_secret
    }
}

impl std::fmt::Debug for AuthorityParameters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorityParameters")
            .field("generator", &hex::encode(compress_g2(&self.generator)))
            .field("public_key", &hex::encode(compress_g2(&self.public_key)))
            .field("master_secret", &"<redacted>")
            .finish()
    }
}

/// The client-visible view: `P`, `Ppub`, and the group descriptor. Nothing
/// else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicParameters {
    generator: G2Affine,
    public_key: G2Affine,
    descriptor: String,
}

impl PublicParameters {
    /// The generator `P`.
    pub fn generator(&self) -> &G2Affine {
        &self.generator
    }

    /// `Ppub = s·P`.
    pub fn public_key(&self) -> &G2Affine {
        &self.public_key
    }

    /// The cryptographic suite these parameters belong to.
    pub fn descriptor(&self) -> &str {
        &self.descriptor
    }

    /// Serialize for the wire (hex-encoded compressed points).
    pub fn to_wire(&self) -> PublicParametersWire {
        PublicParametersWire {
            public_key: hex::encode(compress_g2(&self.public_key)),
            generator: hex::encode(compress_g2(&self.generator)),
            curve_descriptor: self.descriptor.clone(),
        }
    }

    /// Reconstruct from the wire form, rejecting a foreign group descriptor
    /// before touching any point arithmetic.
    pub fn from_wire(wire: &PublicParametersWire) -> Result<Self, CryptoError> {
        if wire.curve_descriptor != GROUP_DESCRIPTOR {
            return Err(CryptoError::GroupDescriptorMismatch {
                expected: GROUP_DESCRIPTOR.to_string(),
                found: wire.curve_descriptor.clone(),
            });
        }
        let generator = decompress_g2(
            &hex::decode(&wire.generator).map_err(|_| CryptoError::MalformedElement)?,
        )?;
        let public_key = decompress_g2(
            &hex::decode(&wire.public_key).map_err(|_| CryptoError::MalformedElement)?,
        )?;
        Ok(Self {
            generator,
            public_key,
            descriptor: wire.curve_descriptor.clone(),
        })
    }
}

/// Wire shape for `GET /params`. Field names are fixed for compatibility.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PublicParametersWire {
    /// Hex-encoded compressed `Ppub`.
    #[serde(rename = "publicKey")]
    pub public_key: String,
    /// Hex-encoded compressed `P`.
    pub generator: String,
    /// Group descriptor string.
    #[serde(rename = "curveDescriptor")]
    pub curve_descriptor: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn params() -> AuthorityParameters {
        AuthorityParameters::generate(&mut StdRng::seed_from_u64(7))
    }

    #[test]
    fn public_key_matches_master_scalar() {
        let auth = params();
        // Ppub must equal s·P — checked through the crate-private hook so
        // the secret itself stays put.
        let p1 = bls12_381_plus::G1Projective::generator();
        let scaled = auth.scale_by_master_secret(&p1);
        // e(s·G1, P) == e(G1, s·P) iff Ppub = s·P.
        let lhs = bls12_381_plus::pairing(&scaled.to_affine(), auth.generator());
        let rhs = bls12_381_plus::pairing(&p1.to_affine(), auth.public_key());
        assert_eq!(lhs, rhs);
    }

    #[test]
    fn debug_never_prints_the_secret() {
        let auth = params();
        let out = format!("{:?}", auth);
        assert!(out.contains("<redacted>"));
    }

    #[test]
    fn public_subset_round_trips_through_wire() {
        let public = params().public();
        let wire = public.to_wire();
        let restored = PublicParameters::from_wire(&wire).unwrap();
        assert_eq!(public, restored);
    }

    #[test]
    fn foreign_descriptor_is_rejected() {
        let mut wire = params().public().to_wire();
        wire.curve_descriptor = "BN254/LEGACY".to_string();
        let err = PublicParameters::from_wire(&wire).unwrap_err();
        assert!(matches!(err, CryptoError::GroupDescriptorMismatch { .. }));
    }

    #[test]
    fn public_parameters_are_stable_across_exports() {
        let auth = params();
        assert_eq!(auth.public(), auth.public());
    }
}
