// Copyright (c) 2026 VEIL Contributors. MIT License.
// See LICENSE for details.

//! # VEIL Protocol — Core Library
//!
//! VEIL is a trust infrastructure for identity-based encrypted communication.
//! A Trust Authority holds a bilinear-pairing master secret, derives
//! per-identity private keys on demand, and gates every issuance behind a
//! two-factor registration protocol: an email-delivered one-time code for
//! initial verification, then a fresh TOTP code on every key request.
//!
//! The cryptosystem is Boneh–Franklin-style identity-based encryption over
//! BLS12-381: anyone holding the public parameters can encrypt to an email
//! address; only the holder of the authority-issued private key for that
//! address can decrypt.
//!
//! ## Architecture
//!
//! The library is split into modules that mirror the actual concerns of a
//! trust authority:
//!
//! - **ibe** — Pairing primitives, system parameters, key derivation, and
//!   the hybrid cipher. The math lives here and nowhere else.
//! - **registry** — Account records and the injectable storage interface.
//! - **otp** — One-time codes, HOTP/TOTP (RFC 4226/6238), provisioning URIs.
//! - **registration** — The authorization state machine. The *only* path to
//!   the master secret's delegated use.
//! - **mail** — The outbound delivery capability for one-time codes.
//! - **authority** — Orchestration: one owned struct, no global singletons.
//! - **channel** — Ad-hoc AEAD sessions bootstrapped from the IBE primitive.
//! - **config** — Protocol constants and parameter lengths.
//!
//! ## Design Philosophy
//!
//! 1. The master secret never leaves [`ibe::params::AuthorityParameters`].
//!    Clients get a [`ibe::params::PublicParameters`] that has no
//!    master-secret field at all — misuse is a compile error, not a 500.
//! 2. Authorization is a chokepoint: key issuance goes through
//!    [`registration::RegistrationProtocol::issue_private_key`] or it
//!    doesn't happen.
//! 3. Cryptographic failures are vague on purpose and never auto-retried.
//! 4. If it touches the master secret, it has tests. Plural.

pub mod authority;
pub mod channel;
pub mod config;
pub mod error;
pub mod ibe;
pub mod mail;
pub mod otp;
pub mod registration;
pub mod registry;

// Re-export the things people actually need so they don't have to memorize
// our module hierarchy.
pub use authority::TrustAuthority;
pub use error::{AuthorityError, CryptoError, StateError};
pub use ibe::cipher::{decrypt, encrypt, encrypt_with_rng, IbeCiphertext};
pub use ibe::keys::{IdentityKeyService, IdentityPrivateKey};
pub use ibe::params::{AuthorityParameters, PublicParameters};
