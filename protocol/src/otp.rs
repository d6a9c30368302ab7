//! # One-Time Codes & TOTP
//!
//! Two different "one-time" mechanisms live here, and conflating them is a
//! classic bug:
//!
//! - **One-time codes** — fixed-length numeric codes delivered by email
//!   during registration. Random, stored server-side with an expiry, and
//!   consumed exactly once.
//! - **TOTP** — RFC 4226/6238 time-stepped codes computed from a shared
//!   secret. Nothing is stored per code; validity is a property of the
//!   clock. HMAC-SHA1, 6 digits, 30-second period — the parameters every
//!   authenticator app ships with.
//!
//! Code comparison is constant-time. It probably doesn't matter for
//! 6-digit codes behind a network round-trip, but `subtle` costs nothing
//! and removes the conversation entirely.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use hmac::{Hmac, Mac};
use rand::{CryptoRng, Rng, RngCore};
use sha1::Sha1;
use subtle::ConstantTimeEq;

use crate::config::{
    TOTP_DIGITS, TOTP_PERIOD_SECS, TOTP_SECRET_LENGTH, TOTP_SKEW_STEPS,
};

type HmacSha1 = Hmac<Sha1>;

/// Generate a fixed-length numeric code. Leading zeros are allowed — the
/// code is a string, not a number, and `"048213"` is a valid code.
pub fn generate_numeric_code<R: RngCore + CryptoRng>(rng: &mut R, digits: usize) -> String {
    (0..digits)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect()
}

/// Constant-time equality for code strings. Length differences short-circuit,
/// which is fine — the length of our codes is public.
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    a.len() == b.len() && bool::from(a.as_bytes().ct_eq(b.as_bytes()))
}

/// An opaque TOTP secret: 20 random bytes (RFC 4226's recommendation for
/// HMAC-SHA1).
#[derive(Clone, PartialEq, Eq)]
pub struct TotpSecret {
    bytes: [u8; TOTP_SECRET_LENGTH],
}

impl TotpSecret {
    pub fn generate<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let mut bytes = [0u8; TOTP_SECRET_LENGTH];
        rng.fill_bytes(&mut bytes);
        Self { bytes }
    }

    pub fn from_bytes(bytes: [u8; TOTP_SECRET_LENGTH]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Unpadded RFC 4648 base32 — the alphabet authenticator apps expect.
    pub fn to_base32(&self) -> String {
        base32::encode(base32::Alphabet::RFC4648 { padding: false }, &self.bytes)
    }

    /// Parse the base32 form back into a secret.
    pub fn from_base32(s: &str) -> Option<Self> {
        let decoded = base32::decode(base32::Alphabet::RFC4648 { padding: false }, s)?;
        let bytes: [u8; TOTP_SECRET_LENGTH] = decoded.try_into().ok()?;
        Some(Self { bytes })
    }

    /// The `otpauth://` provisioning URI consumed by authenticator apps
    /// (and rendered as a QR code by the client).
    pub fn provisioning_uri(&self, issuer: &str, identity: &str) -> String {
        format!(
            "otpauth://totp/{}:{}?secret={}&issuer={}&algorithm=SHA1&digits={}&period={}",
            uri_escape(issuer),
            uri_escape(identity),
            self.to_base32(),
            uri_escape(issuer),
            TOTP_DIGITS,
            TOTP_PERIOD_SECS,
        )
    }
}

impl std::fmt::Debug for TotpSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("TotpSecret").field(&"<redacted>").finish()
    }
}

/// Minimal percent-escaping for the handful of URI-hostile characters that
/// can appear in an issuer name or email address. Everything unreserved
/// passes through.
fn uri_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' | b'@' => {
                out.push(char::from(b))
            }
            _ => out.push_str(&format!("%{:02X}", b)),
        }
    }
    out
}

/// RFC 4226 HOTP: HMAC-SHA1 over the big-endian counter, dynamic
/// truncation, modulo 10^digits.
pub fn hotp(secret: &TotpSecret, counter: u64) -> String {
    // HMAC accepts any key length; this cannot fail.
    let mut mac = HmacSha1::new_from_slice(secret.as_bytes())
        .expect("HMAC-SHA1 accepts any key length");
    mac.update(&counter.to_be_bytes());
    let digest = mac.finalize().into_bytes();

    // Dynamic truncation (RFC 4226 §5.3): low nibble of the last byte
    // picks the offset of a 31-bit big-endian slice.
    let offset = (digest[digest.len() - 1] & 0x0F) as usize;
    let binary = ((u32::from(digest[offset]) & 0x7F) << 24)
        | (u32::from(digest[offset + 1]) << 16)
        | (u32::from(digest[offset + 2]) << 8)
        | u32::from(digest[offset + 3]);

    let code = binary % 10u32.pow(TOTP_DIGITS);
    format!("{:0width$}", code, width = TOTP_DIGITS as usize)
}

/// The TOTP counter for a wall-clock instant.
fn time_step(at: SystemTime) -> u64 {
    at.duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_secs()
        / TOTP_PERIOD_SECS
}

/// The TOTP code valid at `at`.
pub fn totp_at(secret: &TotpSecret, at: SystemTime) -> String {
    hotp(secret, time_step(at))
}

/// Validate a TOTP code at `at`, tolerating the configured clock skew in
/// both directions. Comparison is constant-time per candidate step.
pub fn verify_totp(secret: &TotpSecret, code: &str, at: SystemTime) -> bool {
    let step = time_step(at);
    let lo = step.saturating_sub(TOTP_SKEW_STEPS);
    let hi = step.saturating_add(TOTP_SKEW_STEPS);
    // Check every candidate instead of returning early so timing doesn't
    // reveal which step matched.
    let mut ok = false;
    for candidate in lo..=hi {
        ok |= constant_time_eq(&hotp(secret, candidate), code);
    }
    ok
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn secret() -> TotpSecret {
        TotpSecret::generate(&mut StdRng::seed_from_u64(11))
    }

    #[test]
    fn numeric_codes_have_fixed_length_and_digits_only() {
        let mut rng = StdRng::seed_from_u64(12);
        for _ in 0..100 {
            let code = generate_numeric_code(&mut rng, 6);
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn constant_time_eq_behaves_like_eq() {
        assert!(constant_time_eq("482913", "482913"));
        assert!(!constant_time_eq("482913", "482914"));
        assert!(!constant_time_eq("482913", "48291"));
    }

    #[test]
    fn rfc4226_test_vectors() {
        // Appendix D of RFC 4226: secret "12345678901234567890".
        let secret = TotpSecret::from_bytes(*b"12345678901234567890");
        let expected = [
            "755224", "287082", "359152", "969429", "338314", "254676", "287922", "162583",
            "399871", "520489",
        ];
        for (counter, want) in expected.iter().enumerate() {
            assert_eq!(&hotp(&secret, counter as u64), want, "counter {}", counter);
        }
    }

    #[test]
    fn totp_accepts_within_skew_rejects_beyond() {
        let secret = secret();
        let t = UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        let code = totp_at(&secret, t);

        // Valid at t and one step either side.
        assert!(verify_totp(&secret, &code, t));
        assert!(verify_totp(&secret, &code, t + Duration::from_secs(TOTP_PERIOD_SECS)));
        assert!(verify_totp(&secret, &code, t - Duration::from_secs(TOTP_PERIOD_SECS)));

        // Two full periods later the code is dead.
        assert!(!verify_totp(
            &secret,
            &code,
            t + Duration::from_secs(2 * TOTP_PERIOD_SECS)
        ));
    }

    #[test]
    fn base32_round_trips() {
        let s = secret();
        let encoded = s.to_base32();
        assert!(!encoded.contains('='));
        let restored = TotpSecret::from_base32(&encoded).unwrap();
        assert_eq!(s, restored);
    }

    #[test]
    fn provisioning_uri_names_the_issuer() {
        let s = secret();
        let uri = s.provisioning_uri("VEIL Trust Authority", "alice@example.com");
        assert!(uri.starts_with("otpauth://totp/VEIL%20Trust%20Authority:alice@example.com?"));
        assert!(uri.contains(&format!("secret={}", s.to_base32())));
        assert!(uri.contains("issuer=VEIL%20Trust%20Authority"));
        assert!(uri.contains("algorithm=SHA1"));
        assert!(uri.contains("digits=6"));
        assert!(uri.contains("period=30"));
    }

    #[test]
    fn debug_never_prints_the_secret() {
        let s = secret();
        let out = format!("{:?}", s);
        assert!(out.contains("<redacted>"));
        assert!(!out.contains(&s.to_base32()));
    }
}
