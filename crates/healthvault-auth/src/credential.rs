//! Application credentials and the session refresh protocol.
//!
//! A credential knows how to prove the application's identity (certificate
//! or long-term shared secret) and owns the keyset pair cached for that
//! application. Obtaining the session token itself is delegated to a
//! [`TokenIssuer`], which the client connection implements by sending the
//! anonymous session-token request.
//!
//! # Refresh protocol
//!
//! 1. A request takes a [`SessionSnapshot`] via [`Credential::session`].
//! 2. If the service reports the session expired, the caller reports the
//!    snapshot with [`Credential::invalidate`] and asks for
//!    [`Credential::refresh`].
//! 3. `refresh` locks the pair. If the pair's counter moved past the
//!    snapshot's and the pair is valid, someone else already refreshed and
//!    the current snapshot is returned without a round trip.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::MutexGuard;

use healthvault_core::{ApplicationId, PersonId, XmlWriter, format_msg_time};

use crate::AuthResult;
use crate::certificate::ApplicationCertificate;
use crate::config::AuthConfig;
use crate::crypto::{HmacAlgorithm, HmacKeySet, SignatureAlgorithm};
use crate::error::AuthError;
use crate::keyset::{AuthenticationTokenKeySetPair, SessionSnapshot};
use crate::session_cache::{AuthSessionKeySetPairs, SharedKeySetPair};

// =============================================================================
// Issuer seam
// =============================================================================

/// Signed body of a session-token request.
#[derive(Debug, Clone)]
pub struct SessionTokenRequest {
    pub application_id: ApplicationId,
    /// `<auth-info>` element, ready to be placed inside `<info>`.
    pub info_xml: String,
}

/// Token returned by the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub token: String,
}

/// Sends session-token requests to the service.
#[async_trait]
pub trait TokenIssuer: Send + Sync {
    async fn create_session_token(&self, request: SessionTokenRequest) -> AuthResult<IssuedToken>;
}

// =============================================================================
// Credential trait
// =============================================================================

/// On whose behalf requests are made.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PersonContext {
    /// Application-only calls.
    #[default]
    Application,
    /// Offline access to a person who previously authorized the application.
    Offline(PersonId),
    /// Calls with a signed-in user's auth token.
    UserToken(String),
}

/// Source of session snapshots for a connection.
#[async_trait]
pub trait Credential: Send + Sync {
    fn application_id(&self) -> ApplicationId;

    fn person(&self) -> &PersonContext;

    /// Current session, authenticating first if there is none.
    async fn session(&self, issuer: &dyn TokenIssuer) -> AuthResult<SessionSnapshot>;

    /// Replace `stale` with a fresh session, unless another caller already did.
    /// Credentials that cannot renew a session return [`AuthError::TokenExpired`].
    async fn refresh(
        &self,
        stale: &SessionSnapshot,
        issuer: &dyn TokenIssuer,
    ) -> AuthResult<SessionSnapshot>;

    /// Report that the service rejected `stale`. Returns whether the cached
    /// pair was marked expired.
    async fn invalidate(&self, stale: &SessionSnapshot) -> AuthResult<bool>;
}

// =============================================================================
// Web application credential
// =============================================================================

/// Proof of application identity.
#[derive(Debug, Clone)]
pub enum ApplicationSigner {
    /// Registered certificate; signs with RSA.
    Certificate(ApplicationCertificate),
    /// Long-term shared secret of a provisioned application instance; signs with HMAC.
    SharedSecret(HmacKeySet),
}

/// Credential of a server-side (or provisioned client) application.
#[derive(Debug, Clone)]
pub struct WebApplicationCredential {
    application_id: ApplicationId,
    signer: ApplicationSigner,
    person: PersonContext,
    cache: Arc<AuthSessionKeySetPairs>,
    hmac_algorithm: HmacAlgorithm,
    signature_algorithm: SignatureAlgorithm,
    refresh_wait_timeout: Duration,
}

impl WebApplicationCredential {
    /// Credential backed by the process-wide keyset cache.
    pub fn new(
        application_id: ApplicationId,
        signer: ApplicationSigner,
        config: &AuthConfig,
    ) -> AuthResult<Self> {
        config
            .validate()
            .map_err(|e| AuthError::configuration(e.to_string()))?;
        Ok(Self {
            application_id,
            signer,
            person: PersonContext::Application,
            cache: AuthSessionKeySetPairs::global(),
            hmac_algorithm: config
                .hmac()
                .map_err(|e| AuthError::configuration(e.to_string()))?,
            signature_algorithm: config
                .signature()
                .map_err(|e| AuthError::configuration(e.to_string()))?,
            refresh_wait_timeout: config.refresh_wait_timeout,
        })
    }

    /// Use a dedicated keyset cache instead of the process-wide one.
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<AuthSessionKeySetPairs>) -> Self {
        self.cache = cache;
        self
    }

    #[must_use]
    pub fn with_person(mut self, person: PersonContext) -> Self {
        self.person = person;
        self
    }

    #[must_use]
    pub fn signer(&self) -> &ApplicationSigner {
        &self.signer
    }

    async fn pair(&self) -> SharedKeySetPair {
        self.cache
            .get_or_create(self.application_id, self.hmac_algorithm)
            .await
    }

    async fn lock<'a>(
        &self,
        pair: &'a SharedKeySetPair,
    ) -> AuthResult<MutexGuard<'a, AuthenticationTokenKeySetPair>> {
        tokio::time::timeout(self.refresh_wait_timeout, pair.lock())
            .await
            .map_err(|_| AuthError::refresh_timeout(self.application_id))
    }

    /// Serialized `<auth-info>` proving the application's identity and
    /// carrying `keyset` as the new session's shared secret.
    pub fn build_auth_info(
        &self,
        keyset: &HmacKeySet,
        signing_time: OffsetDateTime,
    ) -> AuthResult<String> {
        let app_id = self.application_id.to_string();

        let mut content = XmlWriter::new();
        content
            .start("content")
            .element("app-id", &app_id)
            .element("hmac", keyset.algorithm().name())
            .element("signing-time", &format_msg_time(signing_time))
            .start("shared-secret")
            .raw(&keyset.to_xml()?)
            .end("shared-secret")
            .end("content");
        let content = content
            .finish()
            .map_err(|e| AuthError::internal(e.to_string()))?;

        let mut info = XmlWriter::new();
        info.start("auth-info")
            .element("app-id", &app_id)
            .start("credential")
            .start("appserver2");
        match &self.signer {
            ApplicationSigner::Certificate(cert) => {
                let sig = cert.sign_base64(self.signature_algorithm, content.as_bytes())?;
                info.element_with(
                    "sig",
                    &[
                        ("digestMethod", self.signature_algorithm.digest().name()),
                        ("sigMethod", self.signature_algorithm.name()),
                        ("thumbprint", cert.thumbprint()),
                    ],
                    &sig,
                );
            }
            ApplicationSigner::SharedSecret(secret) => {
                let sig = secret.sign(content.as_bytes())?;
                info.element_with("hmacSig", &[("algName", secret.algorithm().name())], &sig);
            }
        }
        info.raw(&content)
            .end("appserver2")
            .end("credential")
            .end("auth-info");
        info.finish().map_err(|e| AuthError::internal(e.to_string()))
    }

    async fn authenticate(
        &self,
        pair: &mut AuthenticationTokenKeySetPair,
        issuer: &dyn TokenIssuer,
    ) -> AuthResult<SessionSnapshot> {
        let keyset = HmacKeySet::generate(self.hmac_algorithm);
        let info_xml = self.build_auth_info(&keyset, OffsetDateTime::now_utc())?;

        tracing::debug!(
            application_id = %self.application_id,
            refresh_counter = pair.refresh_counter(),
            "Requesting session token"
        );
        let issued = issuer
            .create_session_token(SessionTokenRequest {
                application_id: self.application_id,
                info_xml,
            })
            .await?;

        if issued.token.trim().is_empty() {
            return Err(AuthError::authentication("service returned an empty token"));
        }

        pair.update(issued.token, keyset);
        tracing::debug!(
            application_id = %self.application_id,
            refresh_counter = pair.refresh_counter(),
            "Session token installed"
        );
        pair.snapshot()
            .ok_or_else(|| AuthError::internal("pair not authenticated after update"))
    }
}

#[async_trait]
impl Credential for WebApplicationCredential {
    fn application_id(&self) -> ApplicationId {
        self.application_id
    }

    fn person(&self) -> &PersonContext {
        &self.person
    }

    async fn session(&self, issuer: &dyn TokenIssuer) -> AuthResult<SessionSnapshot> {
        let pair = self.pair().await;
        let mut guard = self.lock(&pair).await?;
        if let Some(snapshot) = guard.snapshot() {
            return Ok(snapshot);
        }
        self.authenticate(&mut guard, issuer).await
    }

    async fn refresh(
        &self,
        stale: &SessionSnapshot,
        issuer: &dyn TokenIssuer,
    ) -> AuthResult<SessionSnapshot> {
        let pair = self.pair().await;
        let mut guard = self.lock(&pair).await?;

        if guard.refresh_counter() != stale.refresh_counter
            && let Some(current) = guard.snapshot()
        {
            tracing::debug!(
                application_id = %self.application_id,
                stale_counter = stale.refresh_counter,
                current_counter = current.refresh_counter,
                "Session already refreshed by another caller"
            );
            return Ok(current);
        }

        self.authenticate(&mut guard, issuer).await
    }

    async fn invalidate(&self, stale: &SessionSnapshot) -> AuthResult<bool> {
        let pair = self.pair().await;
        let mut guard = self.lock(&pair).await?;
        let marked = guard.mark_expired(stale.refresh_counter);
        if marked {
            tracing::debug!(
                application_id = %self.application_id,
                refresh_counter = stale.refresh_counter,
                "Session marked expired"
            );
        }
        Ok(marked)
    }
}
