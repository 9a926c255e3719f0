//! Session token paired with its shared secret.
//!
//! A keyset pair is the unit of caching: one per application, shared by every
//! request the process sends on behalf of that application. The refresh
//! counter lets a caller tell whether the token it used is still the one in
//! the pair, so concurrent callers that all saw the same expired token only
//! trigger a single re-authentication.

use std::time::Instant;

use healthvault_core::ApplicationId;

use crate::crypto::{HmacAlgorithm, HmacKeySet};

/// Immutable view of a pair taken at request time.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub application_id: ApplicationId,
    pub token: String,
    pub keyset: HmacKeySet,
    pub refresh_counter: u64,
}

/// Cached (shared secret, session token, refresh counter, expired flag).
#[derive(Debug)]
pub struct AuthenticationTokenKeySetPair {
    application_id: ApplicationId,
    keyset: HmacKeySet,
    token: Option<String>,
    refresh_counter: u64,
    expired: bool,
    issued_at: Option<Instant>,
}

impl AuthenticationTokenKeySetPair {
    /// Fresh pair without a token.
    #[must_use]
    pub fn new(application_id: ApplicationId, algorithm: HmacAlgorithm) -> Self {
        Self {
            application_id,
            keyset: HmacKeySet::generate(algorithm),
            token: None,
            refresh_counter: 0,
            expired: false,
            issued_at: None,
        }
    }

    #[must_use]
    pub fn application_id(&self) -> ApplicationId {
        self.application_id
    }

    /// Token present and not marked expired.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.token.is_some() && !self.expired
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expired
    }

    #[must_use]
    pub fn refresh_counter(&self) -> u64 {
        self.refresh_counter
    }

    #[must_use]
    pub fn keyset(&self) -> &HmacKeySet {
        &self.keyset
    }

    #[must_use]
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// When the current token was installed.
    #[must_use]
    pub fn issued_at(&self) -> Option<Instant> {
        self.issued_at
    }

    /// Install a newly issued token and the keyset it is bound to.
    pub fn update(&mut self, token: String, keyset: HmacKeySet) {
        self.token = Some(token);
        self.keyset = keyset;
        self.expired = false;
        self.refresh_counter += 1;
        self.issued_at = Some(Instant::now());
    }

    /// Mark the token expired if `observed_counter` is still current.
    ///
    /// Returns `false` when the pair was refreshed after the caller took its
    /// snapshot; the stale report is ignored in that case.
    pub fn mark_expired(&mut self, observed_counter: u64) -> bool {
        if observed_counter != self.refresh_counter || self.token.is_none() {
            return false;
        }
        self.expired = true;
        true
    }

    /// Drop the token entirely, e.g. on sign-out.
    pub fn clear(&mut self) {
        self.token = None;
        self.expired = false;
        self.issued_at = None;
    }

    /// Current token and keyset, if authenticated.
    #[must_use]
    pub fn snapshot(&self) -> Option<SessionSnapshot> {
        if !self.is_authenticated() {
            return None;
        }
        self.token.as_ref().map(|token| SessionSnapshot {
            application_id: self.application_id,
            token: token.clone(),
            keyset: self.keyset.clone(),
            refresh_counter: self.refresh_counter,
        })
    }
}
