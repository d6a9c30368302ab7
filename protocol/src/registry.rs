//! # Account Registry
//!
//! Identity → account record, behind an injectable storage interface. The
//! registration protocol never touches a concrete map; it talks to
//! [`AccountStore`], so swapping the in-memory table for a real database is
//! a deployment decision, not a refactor.
//!
//! ## Atomicity contract
//!
//! The registry is the only shared mutable state in the core, and its
//! read-modify-write sequences (one-time-code consumption, the verification
//! flip) must be serialized per identity. [`AccountStore::with_slot`] is
//! that serialization point: the implementation must hold exclusive access
//! to the identity's slot for the whole closure. [`MemoryAccountStore`]
//! gets this from DashMap's entry lock.

use std::time::SystemTime;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::otp::TotpSecret;

/// A pending one-time code: the code itself plus its expiry instant.
#[derive(Debug, Clone)]
pub struct PendingCode {
    pub code: String,
    pub expires_at: SystemTime,
}

impl PendingCode {
    pub fn is_expired(&self, now: SystemTime) -> bool {
        now > self.expires_at
    }
}

/// One identity's registration state.
///
/// Lifecycle: created unverified with a pending code; `verified` flips to
/// true exactly once, at which point `totp_secret` is set and immutable.
#[derive(Debug, Clone)]
pub struct AccountRecord {
    /// Normalized (lower-case) identity. The registry key.
    pub identity: String,
    /// Terminal flag: set exactly once, never cleared.
    pub verified: bool,
    /// Fixed at verification time. `None` before, `Some` forever after.
    pub totp_secret: Option<TotpSecret>,
    /// The outstanding one-time code, if any.
    pub pending_code: Option<PendingCode>,
}

impl AccountRecord {
    /// A fresh unverified record with an outstanding code.
    pub fn pending(identity: impl Into<String>, code: PendingCode) -> Self {
        Self {
            identity: identity.into(),
            verified: false,
            totp_secret: None,
            pending_code: Some(code),
        }
    }
}

/// Injectable account storage.
///
/// Object-safe so the protocol can hold an `Arc<dyn AccountStore>`.
/// `with_slot` is deliberately closure-shaped instead of get/put: the
/// implementation owns the locking, the caller owns the transition logic,
/// and there is no window between read and write for a second request to
/// sneak through.
pub trait AccountStore: Send + Sync {
    /// Snapshot of an account, if one exists. Fine for read-only checks;
    /// use [`AccountStore::with_slot`] for anything that writes.
    fn get(&self, identity: &str) -> Option<AccountRecord>;

    /// Run `f` with exclusive access to the identity's record slot.
    /// `None` in the slot means no record exists; the closure may insert,
    /// mutate, or remove by writing the slot.
    fn with_slot(&self, identity: &str, f: &mut dyn FnMut(&mut Option<AccountRecord>));
}

/// The in-memory store: a concurrent map with per-entry locking.
///
/// Durable storage is explicitly out of scope — this is the reference
/// implementation of the trait's atomicity contract, and what the demo
/// authority runs on.
#[derive(Default)]
pub struct MemoryAccountStore {
    accounts: DashMap<String, AccountRecord>,
}

impl MemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of known accounts. Test and operator convenience.
    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

impl AccountStore for MemoryAccountStore {
    fn get(&self, identity: &str) -> Option<AccountRecord> {
        self.accounts.get(identity).map(|r| r.clone())
    }

    fn with_slot(&self, identity: &str, f: &mut dyn FnMut(&mut Option<AccountRecord>)) {
        // The entry guard holds the shard lock for the duration of `f`,
        // which is exactly the per-identity serialization the registration
        // protocol needs.
        match self.accounts.entry(identity.to_owned()) {
            Entry::Occupied(mut occupied) => {
                let mut slot = Some(occupied.get().clone());
                f(&mut slot);
                match slot {
                    Some(record) => {
                        *occupied.get_mut() = record;
                    }
                    None => {
                        occupied.remove();
                    }
                }
            }
            Entry::Vacant(vacant) => {
                let mut slot = None;
                f(&mut slot);
                if let Some(record) = slot {
                    vacant.insert(record);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn code(s: &str) -> PendingCode {
        PendingCode {
            code: s.to_string(),
            expires_at: SystemTime::now() + Duration::from_secs(300),
        }
    }

    #[test]
    fn slot_insert_and_get() {
        let store = MemoryAccountStore::new();
        store.with_slot("alice@example.com", &mut |slot| {
            assert!(slot.is_none());
            *slot = Some(AccountRecord::pending("alice@example.com", code("123456")));
        });
        let record = store.get("alice@example.com").unwrap();
        assert!(!record.verified);
        assert_eq!(record.pending_code.as_ref().unwrap().code, "123456");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn slot_removal() {
        let store = MemoryAccountStore::new();
        store.with_slot("alice@example.com", &mut |slot| {
            *slot = Some(AccountRecord::pending("alice@example.com", code("123456")));
        });
        store.with_slot("alice@example.com", &mut |slot| {
            *slot = None;
        });
        assert!(store.get("alice@example.com").is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn pending_code_expiry() {
        let now = SystemTime::now();
        let pc = PendingCode {
            code: "000000".into(),
            expires_at: now + Duration::from_secs(300),
        };
        assert!(!pc.is_expired(now));
        assert!(!pc.is_expired(now + Duration::from_secs(300)));
        assert!(pc.is_expired(now + Duration::from_secs(301)));
    }

    #[test]
    fn concurrent_consumption_is_single_winner() {
        // Sixteen threads race to consume the same pending code; the slot
        // closure must admit exactly one.
        let store = Arc::new(MemoryAccountStore::new());
        store.with_slot("alice@example.com", &mut |slot| {
            *slot = Some(AccountRecord::pending("alice@example.com", code("482913")));
        });

        let winners = Arc::new(AtomicUsize::new(0));
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let store = Arc::clone(&store);
                let winners = Arc::clone(&winners);
                std::thread::spawn(move || {
                    store.with_slot("alice@example.com", &mut |slot| {
                        if let Some(record) = slot.as_mut() {
                            if record.pending_code.take().is_some() {
                                winners.fetch_add(1, Ordering::SeqCst);
                            }
                        }
                    });
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(winners.load(Ordering::SeqCst), 1);
        assert!(store
            .get("alice@example.com")
            .unwrap()
            .pending_code
            .is_none());
    }
}
