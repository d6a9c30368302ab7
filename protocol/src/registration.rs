//! # Registration Protocol
//!
//! The authorization gate in front of the master secret. Three states per
//! identity:
//!
//! ```text
//! UNREGISTERED ──register──▶ CODE_PENDING ──verify_code──▶ VERIFIED
//!      (no record)      (code stored, expiring)        (terminal)
//! ```
//!
//! Once VERIFIED, the TOTP secret is fixed and every private-key request
//! must present a fresh time-based code. [`RegistrationProtocol::issue_private_key`]
//! is the *sole* path to [`IdentityKeyService::derive`] in the authority
//! flow — if you find another call site, that's a finding, not a feature.
//!
//! All state transitions run inside [`AccountStore::with_slot`], so two
//! concurrent submissions of the same one-time code cannot both win.

use std::sync::Arc;
use std::time::SystemTime;

use rand::rngs::OsRng;

use crate::config::{MAIL_TIMEOUT, OTP_CODE_LENGTH, OTP_CODE_TTL};
use crate::error::{AuthorityError, Result, StateError};
use crate::ibe::keys::{normalize_identity, IdentityKeyService, IdentityPrivateKey};
use crate::mail::Mailer;
use crate::otp::{constant_time_eq, generate_numeric_code, totp_at, verify_totp, TotpSecret};
use crate::registry::{AccountRecord, AccountStore, PendingCode};

/// What a successful one-time-code verification hands back: the TOTP
/// secret (shown to the user exactly once) and the provisioning URI the
/// client renders as a QR code.
#[derive(Debug)]
pub struct VerifiedAccount {
    pub totp_secret: TotpSecret,
    pub provisioning_uri: String,
}

/// Snapshot for account-existence queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountStatus {
    pub exists: bool,
    pub verified: bool,
}

/// The registration state machine. Owns the key service; composes the
/// injected store and mailer.
pub struct RegistrationProtocol {
    store: Arc<dyn AccountStore>,
    mailer: Arc<dyn Mailer>,
    keys: IdentityKeyService,
    issuer: String,
}

impl RegistrationProtocol {
    pub fn new(
        store: Arc<dyn AccountStore>,
        mailer: Arc<dyn Mailer>,
        keys: IdentityKeyService,
        issuer: impl Into<String>,
    ) -> Self {
        Self {
            store,
            mailer,
            keys,
            issuer: issuer.into(),
        }
    }

    /// The key service's public parameter view.
    pub fn keys(&self) -> &IdentityKeyService {
        &self.keys
    }

    /// Start (or re-trigger) registration for an identity.
    ///
    /// Rejected once verified. Otherwise a fresh one-time code replaces
    /// any outstanding one — calling `register` again *is* the resend
    /// path, and it's idempotent in effect: exactly one code is pending
    /// afterwards.
    pub async fn register(&self, identity: &str) -> Result<()> {
        let identity = normalize_identity(identity)?;

        let code = generate_numeric_code(&mut OsRng, OTP_CODE_LENGTH);
        let pending = PendingCode {
            code: code.clone(),
            expires_at: SystemTime::now() + OTP_CODE_TTL,
        };

        let mut refusal: Option<StateError> = None;
        self.store.with_slot(&identity, &mut |slot| {
            match slot {
                Some(record) if record.verified => {
                    refusal = Some(StateError::AlreadyVerified);
                }
                Some(record) => {
                    record.pending_code = Some(pending.clone());
                }
                None => {
                    *slot = Some(AccountRecord::pending(identity.clone(), pending.clone()));
                }
            }
        });
        if let Some(err) = refusal {
            return Err(err.into());
        }

        tracing::info!(identity = %identity, "one-time code issued");
        self.deliver_code(&identity, &code).await
    }

    /// Hand the code to the mail collaborator, bounded by [`MAIL_TIMEOUT`].
    /// The code stays pending on failure so a retried `register` or a
    /// patient user can still finish.
    async fn deliver_code(&self, identity: &str, code: &str) -> Result<()> {
        let body = format!(
            "<p>Your {} verification code is:</p><h2>{}</h2>\
             <p>It expires in {} minutes.</p>",
            self.issuer,
            code,
            OTP_CODE_TTL.as_secs() / 60,
        );
        let send = self.mailer.send(identity, "Your verification code", &body);
        match tokio::time::timeout(MAIL_TIMEOUT, send).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(identity = %identity, "code delivery timed out");
                Err(AuthorityError::Transport("code delivery timed out".into()))
            }
        }
    }

    /// Submit a one-time code. See [`Self::verify_code_at`].
    pub fn verify_code(&self, identity: &str, code: &str) -> Result<VerifiedAccount> {
        self.verify_code_at(identity, code, SystemTime::now())
    }

    /// Submit a one-time code, evaluated at `now`.
    ///
    /// Outcomes, in check order:
    /// - no record → [`StateError::NotFound`]
    /// - already verified → [`StateError::AlreadyVerified`] (success is
    ///   single-use; replaying the consumed code lands here)
    /// - no code pending → [`StateError::NoCodePending`]
    /// - past expiry → [`StateError::CodeExpired`], clearing the code —
    ///   one-shot even on expiry
    /// - wrong code → [`AuthorityError::Authorization`]; the code is
    ///   *retained* so a typo doesn't force re-registration
    /// - match → code cleared, TOTP secret fixed, `verified = true`
    pub fn verify_code_at(
        &self,
        identity: &str,
        code: &str,
        now: SystemTime,
    ) -> Result<VerifiedAccount> {
        let identity = normalize_identity(identity)?;

        let mut outcome: Result<VerifiedAccount> = Err(StateError::NotFound.into());
        self.store.with_slot(&identity, &mut |slot| {
            let Some(record) = slot.as_mut() else {
                outcome = Err(StateError::NotFound.into());
                return;
            };
            if record.verified {
                outcome = Err(StateError::AlreadyVerified.into());
                return;
            }
            let Some(pending) = record.pending_code.as_ref() else {
                outcome = Err(StateError::NoCodePending.into());
                return;
            };
            if pending.is_expired(now) {
                record.pending_code = None;
                outcome = Err(StateError::CodeExpired.into());
                return;
            }
            if !constant_time_eq(&pending.code, code) {
                outcome = Err(AuthorityError::Authorization);
                return;
            }

            // Single atomic transition: consume the code, fix the secret,
            // flip the flag. Nothing here is observable half-done.
            record.pending_code = None;
            let secret = TotpSecret::generate(&mut OsRng);
            record.totp_secret = Some(secret.clone());
            record.verified = true;

            outcome = Ok(VerifiedAccount {
                provisioning_uri: secret.provisioning_uri(&self.issuer, &record.identity),
                totp_secret: secret,
            });
        });

        if outcome.is_ok() {
            tracing::info!(identity = %identity, "identity verified");
        }
        outcome
    }

    /// Validate a TOTP code. See [`Self::verify_totp_at`].
    pub fn verify_totp(&self, identity: &str, code: &str) -> Result<bool> {
        self.verify_totp_at(identity, code, SystemTime::now())
    }

    /// Validate a TOTP code at `at`. `Ok(false)` for a missing or
    /// unverified account — the caller learns "not authenticated", not
    /// which precondition failed.
    pub fn verify_totp_at(&self, identity: &str, code: &str, at: SystemTime) -> Result<bool> {
        let identity = normalize_identity(identity)?;
        let Some(record) = self.store.get(&identity) else {
            return Ok(false);
        };
        let Some(secret) = record.totp_secret.filter(|_| record.verified) else {
            return Ok(false);
        };
        Ok(verify_totp(&secret, code, at))
    }

    /// The sole gated path to key derivation: a fresh TOTP code buys one
    /// private key. Reuse of a still-valid code within its window is
    /// accepted (documented protocol behavior; single-use applies to the
    /// registration code, not TOTP).
    pub fn issue_private_key(&self, identity: &str, totp_code: &str) -> Result<IdentityPrivateKey> {
        self.issue_private_key_at(identity, totp_code, SystemTime::now())
    }

    /// Time-parameterized variant of [`Self::issue_private_key`].
    pub fn issue_private_key_at(
        &self,
        identity: &str,
        totp_code: &str,
        at: SystemTime,
    ) -> Result<IdentityPrivateKey> {
        if !self.verify_totp_at(identity, totp_code, at)? {
            tracing::warn!(identity = %identity, "unauthorized private-key request");
            return Err(AuthorityError::Authorization);
        }
        tracing::info!(identity = %identity, "private key issued");
        self.keys.derive(identity)
    }

    /// Existence/verification snapshot for an identity.
    pub fn check_account(&self, identity: &str) -> Result<AccountStatus> {
        let identity = normalize_identity(identity)?;
        Ok(match self.store.get(&identity) {
            Some(record) => AccountStatus {
                exists: true,
                verified: record.verified,
            },
            None => AccountStatus {
                exists: false,
                verified: false,
            },
        })
    }

    /// Compute the currently valid TOTP code for an account's secret.
    /// Authority-side helper for operator tooling and tests; clients use
    /// their authenticator app.
    pub fn current_totp_at(&self, identity: &str, at: SystemTime) -> Result<String> {
        let identity = normalize_identity(identity)?;
        let record = self.store.get(&identity).ok_or(StateError::NotFound)?;
        let secret = record
            .totp_secret
            .ok_or(StateError::NotVerified)?;
        Ok(totp_at(&secret, at))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{TOTP_PERIOD_SECS, TOTP_SECRET_LENGTH};
    use crate::ibe::params::AuthorityParameters;
    use crate::registry::MemoryAccountStore;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::time::Duration;

    /// Captures every delivery so tests can read the code back out.
    #[derive(Default)]
    struct CapturingMailer {
        sent: Mutex<Vec<(String, String, String)>>,
    }

    #[async_trait]
    impl Mailer for CapturingMailer {
        async fn send(&self, address: &str, subject: &str, body: &str) -> Result<()> {
            self.sent
                .lock()
                .push((address.into(), subject.into(), body.into()));
            Ok(())
        }
    }

    /// Always fails, simulating a dead SMTP relay.
    struct BrokenMailer;

    #[async_trait]
    impl Mailer for BrokenMailer {
        async fn send(&self, _: &str, _: &str, _: &str) -> Result<()> {
            Err(AuthorityError::Transport("relay unreachable".into()))
        }
    }

    struct Harness {
        protocol: RegistrationProtocol,
        store: Arc<MemoryAccountStore>,
        mailer: Arc<CapturingMailer>,
    }

    fn harness() -> Harness {
        let store = Arc::new(MemoryAccountStore::new());
        let mailer = Arc::new(CapturingMailer::default());
        let params = AuthorityParameters::generate(&mut StdRng::seed_from_u64(1234));
        let protocol = RegistrationProtocol::new(
            Arc::clone(&store) as Arc<dyn AccountStore>,
            Arc::clone(&mailer) as Arc<dyn Mailer>,
            IdentityKeyService::new(params),
            "VEIL Trust Authority",
        );
        Harness {
            protocol,
            store,
            mailer,
        }
    }

    fn pending_code(store: &MemoryAccountStore, identity: &str) -> String {
        store
            .get(identity)
            .and_then(|r| r.pending_code)
            .map(|p| p.code)
            .expect("pending code")
    }

    #[tokio::test]
    async fn register_stores_code_and_delivers_it() {
        let h = harness();
        h.protocol.register("Alice@Example.com").await.unwrap();

        // Identity is normalized before anything else happens.
        let code = pending_code(&h.store, "alice@example.com");
        assert_eq!(code.len(), OTP_CODE_LENGTH);

        let sent = h.mailer.sent.lock();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "alice@example.com");
        assert!(sent[0].2.contains(&code), "delivered body carries the code");
    }

    #[tokio::test]
    async fn re_register_replaces_the_pending_code() {
        let h = harness();
        h.protocol.register("alice@example.com").await.unwrap();
        let first = pending_code(&h.store, "alice@example.com");
        h.protocol.register("alice@example.com").await.unwrap();
        let second = pending_code(&h.store, "alice@example.com");
        // 1-in-a-million flake if the RNG repeats; acceptable odds.
        assert_ne!(first, second);
        assert_eq!(h.mailer.sent.lock().len(), 2);
    }

    #[tokio::test]
    async fn register_rejects_verified_identity() {
        let h = harness();
        h.protocol.register("alice@example.com").await.unwrap();
        let code = pending_code(&h.store, "alice@example.com");
        h.protocol.verify_code("alice@example.com", &code).unwrap();

        let err = h.protocol.register("alice@example.com").await.unwrap_err();
        assert!(matches!(
            err,
            AuthorityError::State(StateError::AlreadyVerified)
        ));
    }

    #[tokio::test]
    async fn broken_mailer_surfaces_transport_error_and_keeps_code() {
        let store = Arc::new(MemoryAccountStore::new());
        let params = AuthorityParameters::generate(&mut StdRng::seed_from_u64(5));
        let protocol = RegistrationProtocol::new(
            Arc::clone(&store) as Arc<dyn AccountStore>,
            Arc::new(BrokenMailer),
            IdentityKeyService::new(params),
            "VEIL Trust Authority",
        );

        let err = protocol.register("alice@example.com").await.unwrap_err();
        assert!(matches!(err, AuthorityError::Transport(_)));
        // The code survives; the user can still verify once mail recovers.
        assert!(store
            .get("alice@example.com")
            .unwrap()
            .pending_code
            .is_some());
    }

    #[tokio::test]
    async fn verify_code_success_is_single_use() {
        let h = harness();
        h.protocol.register("alice@example.com").await.unwrap();
        let code = pending_code(&h.store, "alice@example.com");

        let verified = h.protocol.verify_code("alice@example.com", &code).unwrap();
        assert_eq!(verified.totp_secret.as_bytes().len(), TOTP_SECRET_LENGTH);
        assert!(verified
            .provisioning_uri
            .starts_with("otpauth://totp/VEIL%20Trust%20Authority:alice@example.com"));

        let record = h.store.get("alice@example.com").unwrap();
        assert!(record.verified);
        assert!(record.pending_code.is_none());

        // Replaying the consumed code fails with a state error, not a
        // second success.
        let err = h
            .protocol
            .verify_code("alice@example.com", &code)
            .unwrap_err();
        assert!(matches!(err, AuthorityError::State(_)));
    }

    #[tokio::test]
    async fn wrong_code_is_rejected_but_retained() {
        let h = harness();
        h.protocol.register("alice@example.com").await.unwrap();
        let code = pending_code(&h.store, "alice@example.com");
        let wrong = if code == "000000" { "000001" } else { "000000" };

        let err = h
            .protocol
            .verify_code("alice@example.com", wrong)
            .unwrap_err();
        assert!(matches!(err, AuthorityError::Authorization));

        // The typo didn't consume the code; the real one still works.
        h.protocol.verify_code("alice@example.com", &code).unwrap();
    }

    #[tokio::test]
    async fn expired_code_is_consumed_by_expiry() {
        let h = harness();
        h.protocol.register("alice@example.com").await.unwrap();
        let code = pending_code(&h.store, "alice@example.com");

        let late = SystemTime::now() + OTP_CODE_TTL + Duration::from_secs(1);
        let err = h
            .protocol
            .verify_code_at("alice@example.com", &code, late)
            .unwrap_err();
        assert!(matches!(err, AuthorityError::State(StateError::CodeExpired)));

        // Expiry cleared the code: even the correct code, back in time,
        // now finds nothing pending.
        let err = h
            .protocol
            .verify_code("alice@example.com", &code)
            .unwrap_err();
        assert!(matches!(
            err,
            AuthorityError::State(StateError::NoCodePending)
        ));
    }

    #[tokio::test]
    async fn verify_code_unknown_identity() {
        let h = harness();
        let err = h
            .protocol
            .verify_code("ghost@example.com", "123456")
            .unwrap_err();
        assert!(matches!(err, AuthorityError::State(StateError::NotFound)));
    }

    #[tokio::test]
    async fn totp_window_acceptance() {
        let h = harness();
        h.protocol.register("alice@example.com").await.unwrap();
        let code = pending_code(&h.store, "alice@example.com");
        h.protocol.verify_code("alice@example.com", &code).unwrap();

        let t = SystemTime::now();
        let totp = h.protocol.current_totp_at("alice@example.com", t).unwrap();

        assert!(h
            .protocol
            .verify_totp_at("alice@example.com", &totp, t)
            .unwrap());
        // Two full periods later: rejected.
        let later = t + Duration::from_secs(2 * TOTP_PERIOD_SECS);
        assert!(!h
            .protocol
            .verify_totp_at("alice@example.com", &totp, later)
            .unwrap());
    }

    #[tokio::test]
    async fn totp_for_missing_or_unverified_is_false() {
        let h = harness();
        assert!(!h
            .protocol
            .verify_totp("ghost@example.com", "123456")
            .unwrap());

        h.protocol.register("alice@example.com").await.unwrap();
        // Registered but not verified: still unauthenticated.
        assert!(!h
            .protocol
            .verify_totp("alice@example.com", "123456")
            .unwrap());
    }

    #[tokio::test]
    async fn key_issuance_requires_valid_totp() {
        let h = harness();
        h.protocol.register("alice@example.com").await.unwrap();
        let code = pending_code(&h.store, "alice@example.com");
        h.protocol.verify_code("alice@example.com", &code).unwrap();

        let t = SystemTime::now();
        let totp = h.protocol.current_totp_at("alice@example.com", t).unwrap();

        // Valid code: a key comes back, and it's the deterministic one.
        let key = h
            .protocol
            .issue_private_key_at("alice@example.com", &totp, t)
            .unwrap();
        let again = h
            .protocol
            .issue_private_key_at("alice@example.com", &totp, t)
            .unwrap();
        assert_eq!(key.to_bytes(), again.to_bytes(), "reissue yields equal keys");

        // Garbage code: refused, with no hint why.
        let err = h
            .protocol
            .issue_private_key_at("alice@example.com", "000000", t)
            .map(|_| ())
            .unwrap_err();
        assert!(matches!(err, AuthorityError::Authorization));

        // Unregistered identity: same refusal.
        let err = h
            .protocol
            .issue_private_key_at("ghost@example.com", &totp, t)
            .map(|_| ())
            .unwrap_err();
        assert!(matches!(err, AuthorityError::Authorization));
    }

    #[tokio::test]
    async fn check_account_reports_lifecycle() {
        let h = harness();
        assert_eq!(
            h.protocol.check_account("alice@example.com").unwrap(),
            AccountStatus {
                exists: false,
                verified: false
            }
        );

        h.protocol.register("alice@example.com").await.unwrap();
        assert_eq!(
            h.protocol.check_account("alice@example.com").unwrap(),
            AccountStatus {
                exists: true,
                verified: false
            }
        );

        let code = pending_code(&h.store, "alice@example.com");
        h.protocol.verify_code("alice@example.com", &code).unwrap();
        assert_eq!(
            h.protocol.check_account("alice@example.com").unwrap(),
            AccountStatus {
                exists: true,
                verified: true
            }
        );
    }
}
