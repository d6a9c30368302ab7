//! # Protocol Configuration & Constants
//!
//! Every magic number in VEIL lives here. If you're hardcoding a constant
//! somewhere else, you're doing it wrong and you owe the team coffee.
//!
//! Most of these values are load-bearing for interoperability: the group
//! descriptor, the KDF, and the block-cipher parameters must match on both
//! ends of a ciphertext or decryption fails (loudly, which is the point).

use std::time::Duration;

// ---------------------------------------------------------------------------
// Protocol Version
// ---------------------------------------------------------------------------

/// The full version string, assembled at compile time so we don't allocate
/// for something this trivial at runtime.
pub const PROTOCOL_VERSION: &str = "0.1.0";

// ---------------------------------------------------------------------------
// Pairing Group
// ---------------------------------------------------------------------------

/// Canonical descriptor of the cryptographic suite. Carried in the public
/// parameters and in every ciphertext sidecar (`cipherExtra`). Two parties
/// with different descriptors must never "successfully" decrypt each other's
/// traffic — the descriptor check runs before any group arithmetic.
pub const GROUP_DESCRIPTOR: &str = "BLS12-381/BF-BASIC/XMD:SHA-256";

/// Domain separation tag for hashing identities into G1. Follows the
/// hash-to-curve suite naming from RFC 9380.
pub const HASH_TO_POINT_DST: &[u8] = b"VEIL-V01-CS01-with-BLS12381G1_XMD:SHA-256_SSWU_RO_";

/// Compressed G1 point length in bytes. Identity points and private keys.
pub const G1_COMPRESSED_LENGTH: usize = 48;

/// Compressed G2 point length in bytes. The generator, the authority public
/// key, and the ephemeral `U` component of every ciphertext.
pub const G2_COMPRESSED_LENGTH: usize = 96;

// ---------------------------------------------------------------------------
// Hybrid Cipher
// ---------------------------------------------------------------------------

/// Symmetric key length derived from the pairing secret. AES-256.
pub const SYMMETRIC_KEY_LENGTH: usize = 32;

/// AES block length. The `V` component of a ciphertext is always a multiple
/// of this (PKCS#7 padding).
pub const CIPHER_BLOCK_LENGTH: usize = 16;

// ---------------------------------------------------------------------------
// Secure Channel (AEAD)
// ---------------------------------------------------------------------------

/// AES-256-GCM session key length in bytes.
pub const SESSION_KEY_LENGTH: usize = 32;

/// AES-256-GCM nonce length in bytes. 96 bits is the standard and the only
/// length you should use. 12 bytes. Not 16. Not 8. Twelve.
pub const AEAD_NONCE_LENGTH: usize = 12;

/// AES-256-GCM authentication tag length in bytes.
pub const AEAD_TAG_LENGTH: usize = 16;

// ---------------------------------------------------------------------------
// Registration / OTP
// ---------------------------------------------------------------------------

/// Digits in the email-delivered one-time code.
pub const OTP_CODE_LENGTH: usize = 6;

/// How long a one-time code stays valid after issuance.
pub const OTP_CODE_TTL: Duration = Duration::from_secs(300);

/// TOTP secret length in bytes. 160 bits, the RFC 4226 recommendation for
/// HMAC-SHA1.
pub const TOTP_SECRET_LENGTH: usize = 20;

/// Digits in a TOTP code.
pub const TOTP_DIGITS: u32 = 6;

/// TOTP time step in seconds (RFC 6238 default).
pub const TOTP_PERIOD_SECS: u64 = 30;

/// Clock-skew tolerance in time steps, applied in both directions. One step
/// means a code stays acceptable for at most ~90 seconds total.
pub const TOTP_SKEW_STEPS: u64 = 1;

// ---------------------------------------------------------------------------
// Outbound I/O
// ---------------------------------------------------------------------------

/// Upper bound on one-time-code delivery. A mailer that hasn't answered by
/// then surfaces as a transport error; registration never hangs.
pub const MAIL_TIMEOUT: Duration = Duration::from_secs(30);
