//! # healthvault-auth
//!
//! Application authentication for the HealthVault client.
//!
//! This crate provides:
//! - Hash, HMAC and RSA signing primitives selected by wire name
//! - The per-application keyset pair (session token + shared secret)
//! - A process-wide, lock-protected cache of keyset pairs
//! - Web application credentials and the session refresh protocol
//!
//! ## Modules
//!
//! - [`config`] - Algorithm selection and refresh limits
//! - [`crypto`] - Hash/HMAC primitives and HMAC keysets
//! - [`certificate`] - RSA application certificate
//! - [`keyset`] - Authentication token keyset pair
//! - [`session_cache`] - Per-application keyset pair cache
//! - [`credential`] - Credentials, token issuer seam and refresh logic

pub mod certificate;
pub mod config;
pub mod credential;
pub mod crypto;
pub mod error;
pub mod keyset;
pub mod session_cache;

pub use certificate::ApplicationCertificate;
pub use config::{AuthConfig, ConfigError};
pub use credential::{
    ApplicationSigner, Credential, IssuedToken, PersonContext, SessionTokenRequest, TokenIssuer,
    WebApplicationCredential,
};
pub use crypto::{
    HashAlgorithm, HmacAlgorithm, HmacKeySet, SignatureAlgorithm, compute_hash, compute_hmac,
    hash_base64, verify_hmac,
};
pub use error::{AuthError, ErrorCategory};
pub use keyset::{AuthenticationTokenKeySetPair, SessionSnapshot};
pub use session_cache::{AuthSessionKeySetPairs, SharedKeySetPair};

/// Type alias for authentication results.
pub type AuthResult<T> = Result<T, AuthError>;
