//! # Trust Authority Orchestration
//!
//! One explicitly owned struct composing the parameter set, the key
//! service, and the registration protocol. The HTTP layer holds an
//! `Arc<TrustAuthority>` and calls these methods — there is no process-wide
//! singleton, and constructing a second authority (say, in a test) is
//! ordinary code.

use std::sync::Arc;

use rand::rngs::OsRng;

use crate::error::Result;
use crate::ibe::keys::IdentityKeyService;
use crate::ibe::params::{AuthorityParameters, PublicParameters};
use crate::mail::Mailer;
use crate::registration::{AccountStatus, RegistrationProtocol, VerifiedAccount};
use crate::registry::AccountStore;

/// The Trust Authority: master-secret holder and sole key issuer.
pub struct TrustAuthority {
    registration: RegistrationProtocol,
    /// Cached public view. Idempotent by construction: every fetch returns
    /// the same `(generator, publicKey)` pair for the process lifetime.
    public: PublicParameters,
}

impl TrustAuthority {
    /// Stand up an authority with freshly generated parameters.
    pub fn new(store: Arc<dyn AccountStore>, mailer: Arc<dyn Mailer>, issuer: &str) -> Self {
        let params = AuthorityParameters::generate(&mut OsRng);
        Self::with_parameters(params, store, mailer, issuer)
    }

    /// Stand up an authority around existing parameters (tests, or a
    /// deployment that persists its master secret elsewhere).
    pub fn with_parameters(
        params: AuthorityParameters,
        store: Arc<dyn AccountStore>,
        mailer: Arc<dyn Mailer>,
        issuer: &str,
    ) -> Self {
        let keys = IdentityKeyService::new(params);
        let public = keys.public_parameters();
        Self {
            registration: RegistrationProtocol::new(store, mailer, keys, issuer),
            public,
        }
    }

    /// The public parameters handed to every client.
    pub fn public_parameters(&self) -> &PublicParameters {
        &self.public
    }

    /// Start or re-trigger registration for an identity.
    pub async fn register(&self, identity: &str) -> Result<()> {
        self.registration.register(identity).await
    }

    /// Submit a one-time code; on success returns the TOTP secret and
    /// provisioning URI.
    pub fn verify_code(&self, identity: &str, code: &str) -> Result<VerifiedAccount> {
        self.registration.verify_code(identity, code)
    }

    /// Standalone TOTP check (the login path).
    pub fn verify_totp(&self, identity: &str, code: &str) -> Result<bool> {
        self.registration.verify_totp(identity, code)
    }

    /// TOTP-gated private-key issuance. Returns the hex-serialized key.
    pub fn issue_private_key(&self, identity: &str, totp_code: &str) -> Result<String> {
        let key = self.registration.issue_private_key(identity, totp_code)?;
        Ok(key.to_hex())
    }

    /// Existence/verification snapshot.
    pub fn check_account(&self, identity: &str) -> Result<AccountStatus> {
        self.registration.check_account(identity)
    }

    /// Access to the underlying protocol, for the time-parameterized
    /// variants used in tests and operator tooling.
    pub fn registration(&self) -> &RegistrationProtocol {
        &self.registration
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mail::LogMailer;
    use crate::registry::MemoryAccountStore;

    fn authority() -> TrustAuthority {
        TrustAuthority::new(
            Arc::new(MemoryAccountStore::new()),
            Arc::new(LogMailer),
            "VEIL Trust Authority",
        )
    }

    #[test]
    fn public_parameters_are_idempotent() {
        let authority = authority();
        let first = authority.public_parameters().to_wire();
        let second = authority.public_parameters().to_wire();
        assert_eq!(first.generator, second.generator);
        assert_eq!(first.public_key, second.public_key);
    }

    #[test]
    fn two_authorities_have_distinct_keys() {
        let a = authority();
        let b = authority();
        assert_ne!(
            a.public_parameters().to_wire().public_key,
            b.public_parameters().to_wire().public_key,
        );
    }
}
