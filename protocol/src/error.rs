//! # Error Taxonomy
//!
//! Five categories, each with different retry semantics:
//!
//! - [`AuthorityError::Validation`] — malformed input. Fix the request.
//! - [`AuthorityError::State`] — the registration state machine refused a
//!   transition (expired code, missing account, already verified).
//! - [`AuthorityError::Authorization`] — a bad one-time code or TOTP code.
//!   Terminal for the request; never auto-retried.
//! - [`AuthorityError::Crypto`] — group mismatch, padding failure, AEAD tag
//!   failure. Terminal. Intentionally vague: the difference between "wrong
//!   key" and "corrupted ciphertext" is none of an attacker's business.
//! - [`AuthorityError::Transport`] — outbound I/O failed. The caller may
//!   retry; re-registration is the idempotent resend path for codes.
//!
//! The master secret and issued private keys never appear in any error
//! message. Grep this file if you doubt it.

use thiserror::Error;

/// Cryptographic failures. Kept vague on purpose.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// The ciphertext or parameters were produced under a different
    /// cryptographic suite. Refusing up front beats a garbage decryption.
    #[error("group descriptor mismatch: expected {expected}, got {found}")]
    GroupDescriptorMismatch { expected: String, found: String },

    /// A serialized group element failed to deserialize. Wrong length,
    /// not on the curve, or not in the subgroup.
    #[error("malformed group element")]
    MalformedElement,

    /// Decryption failed — wrong key, wrong identity, or tampered data.
    /// We don't distinguish between these cases on purpose.
    #[error("decryption failed")]
    DecryptFailed,

    /// Encryption failed. Should be unreachable with valid parameters.
    #[error("encryption failed")]
    EncryptFailed,

    /// A framed ciphertext didn't parse (truncated, bad length prefix,
    /// invalid hex in the sidecar).
    #[error("malformed ciphertext framing")]
    MalformedFraming,
}

/// Registration state machine refusals. These describe where the account
/// *is*, not what the caller got wrong.
#[derive(Debug, Error)]
pub enum StateError {
    /// No account record exists for the identity.
    #[error("no account registered for this identity")]
    NotFound,

    /// The identity already completed verification; re-registering a
    /// verified identity is rejected, not silently reset.
    #[error("identity is already verified")]
    AlreadyVerified,

    /// The one-time code aged out. The pending code is cleared as a side
    /// effect — expiry consumes it, same as use.
    #[error("one-time code expired")]
    CodeExpired,

    /// No one-time code is pending (never issued, already consumed, or
    /// consumed by expiry).
    #[error("no one-time code pending")]
    NoCodePending,

    /// The account exists but has not completed one-time-code verification.
    #[error("identity is not verified")]
    NotVerified,
}

/// Top-level error type for every trust-authority operation.
#[derive(Debug, Error)]
pub enum AuthorityError {
    /// Malformed identity or input. Advisory checks, not a security
    /// boundary.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The registration state machine refused the transition.
    #[error(transparent)]
    State(#[from] StateError),

    /// Bad one-time code, bad TOTP code, or an unauthenticated key request.
    /// Deliberately carries no detail.
    #[error("authorization failed")]
    Authorization,

    /// A cryptographic operation failed.
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// Outbound I/O (code delivery) failed or timed out.
    #[error("transport failure: {0}")]
    Transport(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T, E = AuthorityError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authorization_error_carries_no_detail() {
        // The Display output must not leak which factor failed.
        let msg = AuthorityError::Authorization.to_string();
        assert_eq!(msg, "authorization failed");
        assert!(!msg.contains("totp"));
        assert!(!msg.contains("code"));
    }

    #[test]
    fn state_errors_convert() {
        let err: AuthorityError = StateError::CodeExpired.into();
        assert!(matches!(err, AuthorityError::State(StateError::CodeExpired)));
    }
}
