//! # Identity-Based Encryption for VEIL
//!
//! This module is the foundation of everything security-related in the
//! protocol. Every key derivation, every encrypted message, every wrapped
//! session key flows through here.
//!
//! The construction is Boneh–Franklin BasicIdent over BLS12-381:
//!
//! - **G2** holds the generator `P` and the authority public key
//!   `Ppub = s·P`.
//! - **G1** holds hashed identity points `Qid = H1(identity)` and derived
//!   private keys `d_ID = s·Qid`.
//! - **Gt** holds the pairing-derived shared secret
//!   `e(Qid, Ppub)^r = e(d_ID, U)`.
//!
//! ## A note on "rolling your own crypto"
//!
//! The group arithmetic is not ours — it comes from an audited pairing
//! library. What lives here is the thin, type-safe layer that turns group
//! elements into a usable cryptosystem: parameter generation, key
//! derivation, and the hybrid cipher.
//!
//! ```text
//! pairing.rs — group element wrappers, hash-to-point, pairing
//! params.rs  — AuthorityParameters (has `s`) / PublicParameters (doesn't)
//! keys.rs    — identity normalization and d_ID = s·H1(id) derivation
//! cipher.rs  — the hybrid encrypt/decrypt engine and wire framing
//! ```

pub mod cipher;
pub mod keys;
pub mod pairing;
pub mod params;

pub use cipher::{decrypt, encrypt, encrypt_with_rng, IbeCiphertext};
pub use keys::{normalize_identity, IdentityKeyService, IdentityPrivateKey};
pub use params::{AuthorityParameters, PublicParameters};
