//! Application certificate used to sign session requests.
//!
//! Only the private key and the certificate thumbprint are needed on the
//! client: the service already holds the public certificate registered for
//! the application and looks it up by thumbprint.

use std::fmt;
use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rsa::RsaPrivateKey;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs1v15::SigningKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::signature::{SignatureEncoding, Signer};
use sha1::Sha1;
use sha2::Sha256;

use crate::AuthResult;
use crate::crypto::SignatureAlgorithm;
use crate::error::AuthError;

/// RSA private key plus the thumbprint of its registered certificate.
#[derive(Clone)]
pub struct ApplicationCertificate {
    key: RsaPrivateKey,
    thumbprint: String,
}

impl ApplicationCertificate {
    /// Build from an already-parsed key.
    pub fn new(key: RsaPrivateKey, thumbprint: impl Into<String>) -> AuthResult<Self> {
        let thumbprint = normalize_thumbprint(&thumbprint.into())?;
        Ok(Self { key, thumbprint })
    }

    /// Parse a PKCS#8 (`BEGIN PRIVATE KEY`) or PKCS#1 (`BEGIN RSA PRIVATE KEY`) PEM.
    pub fn from_pem(pem: &str, thumbprint: impl Into<String>) -> AuthResult<Self> {
        let key = RsaPrivateKey::from_pkcs8_pem(pem)
            .or_else(|_| RsaPrivateKey::from_pkcs1_pem(pem))
            .map_err(|e| AuthError::key_load(e.to_string()))?;
        Self::new(key, thumbprint)
    }

    /// Read a PEM file from disk.
    pub fn from_pem_file(path: impl AsRef<Path>, thumbprint: impl Into<String>) -> AuthResult<Self> {
        let path = path.as_ref();
        let pem = std::fs::read_to_string(path)
            .map_err(|e| AuthError::key_load(format!("{}: {e}", path.display())))?;
        Self::from_pem(&pem, thumbprint)
    }

    /// Upper-case hex thumbprint without separators.
    #[must_use]
    pub fn thumbprint(&self) -> &str {
        &self.thumbprint
    }

    /// PKCS#1 v1.5 signature over `data`.
    pub fn sign(&self, algorithm: SignatureAlgorithm, data: &[u8]) -> AuthResult<Vec<u8>> {
        let signature = match algorithm {
            SignatureAlgorithm::RsaSha1 => SigningKey::<Sha1>::new(self.key.clone())
                .try_sign(data)
                .map(|s| s.to_vec()),
            SignatureAlgorithm::RsaSha256 => SigningKey::<Sha256>::new(self.key.clone())
                .try_sign(data)
                .map(|s| s.to_vec()),
        };
        signature.map_err(|e| AuthError::signing(e.to_string()))
    }

    /// Base64 signature, as placed in `<sig>`.
    pub fn sign_base64(&self, algorithm: SignatureAlgorithm, data: &[u8]) -> AuthResult<String> {
        self.sign(algorithm, data).map(|s| STANDARD.encode(s))
    }
}

impl fmt::Debug for ApplicationCertificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApplicationCertificate")
            .field("thumbprint", &self.thumbprint)
            .finish_non_exhaustive()
    }
}

/// Thumbprints are copied from certificate viewers in many shapes
/// (`ab:cd`, `AB CD`, lower case); the service wants plain upper-case hex.
fn normalize_thumbprint(raw: &str) -> AuthResult<String> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ':')
        .collect::<String>()
        .to_ascii_uppercase();
    if cleaned.is_empty() {
        return Err(AuthError::invalid_credential("certificate thumbprint is empty"));
    }
    if hex::decode(&cleaned).is_err() {
        return Err(AuthError::invalid_credential(format!(
            "certificate thumbprint is not hex: {raw}"
        )));
    }
    Ok(cleaned)
}
