//! Hash, HMAC and keyset primitives.
//!
//! The service names algorithms on the wire (`algName="HMACSHA256"`,
//! `digestMethod="SHA1"`), so each algorithm enum round-trips through its wire
//! name. All MAC comparisons are constant-time.

use std::fmt;
use std::str::FromStr;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::digest::KeyInit;
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha512};

use healthvault_core::XmlWriter;

use crate::AuthResult;
use crate::error::AuthError;

// =============================================================================
// Algorithms
// =============================================================================

/// Digest algorithms used for `<info-hash>` and signature digests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashAlgorithm {
    Sha1,
    Sha256,
    Sha512,
}

impl HashAlgorithm {
    /// Wire name, e.g. `SHA256`.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Sha1 => "SHA1",
            Self::Sha256 => "SHA256",
            Self::Sha512 => "SHA512",
        }
    }

    /// Digest length in bytes.
    #[must_use]
    pub fn output_len(&self) -> usize {
        match self {
            Self::Sha1 => 20,
            Self::Sha256 => 32,
            Self::Sha512 => 64,
        }
    }
}

impl FromStr for HashAlgorithm {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SHA1" => Ok(Self::Sha1),
            "SHA256" => Ok(Self::Sha256),
            "SHA512" => Ok(Self::Sha512),
            _ => Err(AuthError::unsupported_algorithm(s)),
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Keyed MAC algorithms used to sign request headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HmacAlgorithm {
    HmacSha1,
    HmacSha256,
    HmacSha512,
}

impl HmacAlgorithm {
    /// Wire name, e.g. `HMACSHA256`.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::HmacSha1 => "HMACSHA1",
            Self::HmacSha256 => "HMACSHA256",
            Self::HmacSha512 => "HMACSHA512",
        }
    }

    /// The underlying digest.
    #[must_use]
    pub fn digest(&self) -> HashAlgorithm {
        match self {
            Self::HmacSha1 => HashAlgorithm::Sha1,
            Self::HmacSha256 => HashAlgorithm::Sha256,
            Self::HmacSha512 => HashAlgorithm::Sha512,
        }
    }
}

impl FromStr for HmacAlgorithm {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "HMACSHA1" => Ok(Self::HmacSha1),
            "HMACSHA256" => Ok(Self::HmacSha256),
            "HMACSHA512" => Ok(Self::HmacSha512),
            _ => Err(AuthError::unsupported_algorithm(s)),
        }
    }
}

impl fmt::Display for HmacAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// RSA PKCS#1 v1.5 signature schemes for certificate-based credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignatureAlgorithm {
    RsaSha1,
    RsaSha256,
}

impl SignatureAlgorithm {
    /// Wire name for `sigMethod`, e.g. `RSA-SHA1`.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::RsaSha1 => "RSA-SHA1",
            Self::RsaSha256 => "RSA-SHA256",
        }
    }

    /// Digest used by the scheme, reported as `digestMethod`.
    #[must_use]
    pub fn digest(&self) -> HashAlgorithm {
        match self {
            Self::RsaSha1 => HashAlgorithm::Sha1,
            Self::RsaSha256 => HashAlgorithm::Sha256,
        }
    }
}

impl FromStr for SignatureAlgorithm {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "RSA-SHA1" => Ok(Self::RsaSha1),
            "RSA-SHA256" => Ok(Self::RsaSha256),
            _ => Err(AuthError::unsupported_algorithm(s)),
        }
    }
}

impl fmt::Display for SignatureAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// Primitives
// =============================================================================

/// Digest `data` with `algorithm`.
#[must_use]
pub fn compute_hash(algorithm: HashAlgorithm, data: &[u8]) -> Vec<u8> {
    match algorithm {
        HashAlgorithm::Sha1 => Sha1::digest(data).to_vec(),
        HashAlgorithm::Sha256 => Sha256::digest(data).to_vec(),
        HashAlgorithm::Sha512 => Sha512::digest(data).to_vec(),
    }
}

fn new_mac<M: Mac + KeyInit>(key: &[u8]) -> AuthResult<M> {
    <M as KeyInit>::new_from_slice(key).map_err(|e| AuthError::signing(e.to_string()))
}

fn mac_bytes<M: Mac + KeyInit>(key: &[u8], data: &[u8]) -> AuthResult<Vec<u8>> {
    let mut mac = new_mac::<M>(key)?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

fn mac_verify<M: Mac + KeyInit>(key: &[u8], data: &[u8], expected: &[u8]) -> AuthResult<bool> {
    let mut mac = new_mac::<M>(key)?;
    mac.update(data);
    Ok(mac.verify_slice(expected).is_ok())
}

/// HMAC `data` under `key`.
pub fn compute_hmac(algorithm: HmacAlgorithm, key: &[u8], data: &[u8]) -> AuthResult<Vec<u8>> {
    match algorithm {
        HmacAlgorithm::HmacSha1 => mac_bytes::<Hmac<Sha1>>(key, data),
        HmacAlgorithm::HmacSha256 => mac_bytes::<Hmac<Sha256>>(key, data),
        HmacAlgorithm::HmacSha512 => mac_bytes::<Hmac<Sha512>>(key, data),
    }
}

/// Check `expected` against the HMAC of `data` in constant time.
pub fn verify_hmac(
    algorithm: HmacAlgorithm,
    key: &[u8],
    data: &[u8],
    expected: &[u8],
) -> AuthResult<bool> {
    match algorithm {
        HmacAlgorithm::HmacSha1 => mac_verify::<Hmac<Sha1>>(key, data, expected),
        HmacAlgorithm::HmacSha256 => mac_verify::<Hmac<Sha256>>(key, data, expected),
        HmacAlgorithm::HmacSha512 => mac_verify::<Hmac<Sha512>>(key, data, expected),
    }
}

/// Base64 of the digest, as used in `<hash-data>`.
#[must_use]
pub fn hash_base64(algorithm: HashAlgorithm, data: &[u8]) -> String {
    STANDARD.encode(compute_hash(algorithm, data))
}

// =============================================================================
// HMAC Keyset
// =============================================================================

/// Shared secret bound to one session token.
///
/// A new keyset is generated for every authentication; the key travels to the
/// service inside the signed session request and afterwards signs every
/// request header.
#[derive(Clone, PartialEq, Eq)]
pub struct HmacKeySet {
    algorithm: HmacAlgorithm,
    key: Vec<u8>,
}

impl HmacKeySet {
    /// Wrap existing key material.
    #[must_use]
    pub fn new(algorithm: HmacAlgorithm, key: Vec<u8>) -> Self {
        Self { algorithm, key }
    }

    /// Random key as long as the algorithm's digest.
    #[must_use]
    pub fn generate(algorithm: HmacAlgorithm) -> Self {
        let mut key = vec![0u8; algorithm.digest().output_len()];
        rand::thread_rng().fill_bytes(&mut key);
        Self { algorithm, key }
    }

    /// Decode a base64 key (e.g. an application instance's shared secret).
    pub fn from_base64(algorithm: HmacAlgorithm, encoded: &str) -> AuthResult<Self> {
        let key = STANDARD
            .decode(encoded.trim())
            .map_err(|e| AuthError::invalid_credential(format!("shared secret: {e}")))?;
        if key.is_empty() {
            return Err(AuthError::invalid_credential("shared secret is empty"));
        }
        Ok(Self { algorithm, key })
    }

    #[must_use]
    pub fn algorithm(&self) -> HmacAlgorithm {
        self.algorithm
    }

    #[must_use]
    pub fn key_base64(&self) -> String {
        STANDARD.encode(&self.key)
    }

    /// Base64 HMAC of `data`.
    pub fn sign(&self, data: &[u8]) -> AuthResult<String> {
        compute_hmac(self.algorithm, &self.key, data).map(|mac| STANDARD.encode(mac))
    }

    /// Verify a base64 HMAC produced by [`HmacKeySet::sign`].
    pub fn verify(&self, data: &[u8], mac_base64: &str) -> AuthResult<bool> {
        let Ok(expected) = STANDARD.decode(mac_base64.trim()) else {
            return Ok(false);
        };
        verify_hmac(self.algorithm, &self.key, data, &expected)
    }

    /// `<hmac-alg algName="HMACSHA256">key</hmac-alg>`
    pub fn to_xml(&self) -> AuthResult<String> {
        let mut w = XmlWriter::new();
        w.element_with(
            "hmac-alg",
            &[("algName", self.algorithm.name())],
            &self.key_base64(),
        );
        w.finish().map_err(|e| AuthError::internal(e.to_string()))
    }
}

impl fmt::Debug for HmacKeySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HmacKeySet")
            .field("algorithm", &self.algorithm)
            .field("key", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_algorithm_names_round_trip() {
        for alg in [
            HmacAlgorithm::HmacSha1,
            HmacAlgorithm::HmacSha256,
            HmacAlgorithm::HmacSha512,
        ] {
            assert_eq!(alg.name().parse::<HmacAlgorithm>().unwrap(), alg);
        }
        assert_eq!("sha256".parse::<HashAlgorithm>().unwrap(), HashAlgorithm::Sha256);
        assert_eq!(
            "RSA-SHA1".parse::<SignatureAlgorithm>().unwrap().digest(),
            HashAlgorithm::Sha1
        );
    }

    #[test]
    fn test_unknown_algorithm() {
        let err = "MD5".parse::<HashAlgorithm>().unwrap_err();
        assert!(matches!(err, AuthError::UnsupportedAlgorithm { .. }));
        assert!("HMACMD5".parse::<HmacAlgorithm>().is_err());
    }

    #[test]
    fn test_compute_hash_known_vector() {
        // SHA-256("abc")
        assert_eq!(
            hex::encode(compute_hash(HashAlgorithm::Sha256, b"abc")),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(compute_hash(HashAlgorithm::Sha1, b"abc").len(), 20);
        assert_eq!(compute_hash(HashAlgorithm::Sha512, b"abc").len(), 64);
    }

    #[test]
    fn test_compute_hmac_rfc4231_case_2() {
        let mac = compute_hmac(
            HmacAlgorithm::HmacSha256,
            b"Jefe",
            b"what do ya want for nothing?",
        )
        .unwrap();
        assert_eq!(
            hex::encode(mac),
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn test_verify_hmac() {
        let mac = compute_hmac(HmacAlgorithm::HmacSha1, b"k", b"data").unwrap();
        assert!(verify_hmac(HmacAlgorithm::HmacSha1, b"k", b"data", &mac).unwrap());
        assert!(!verify_hmac(HmacAlgorithm::HmacSha1, b"k", b"other", &mac).unwrap());
        assert!(!verify_hmac(HmacAlgorithm::HmacSha1, b"x", b"data", &mac).unwrap());
    }

    #[test]
    fn test_keyset_generate_sizes_and_uniqueness() {
        let a = HmacKeySet::generate(HmacAlgorithm::HmacSha256);
        let b = HmacKeySet::generate(HmacAlgorithm::HmacSha256);
        assert_ne!(a, b);
        assert_eq!(STANDARD.decode(a.key_base64()).unwrap().len(), 32);
        let c = HmacKeySet::generate(HmacAlgorithm::HmacSha512);
        assert_eq!(STANDARD.decode(c.key_base64()).unwrap().len(), 64);
    }

    #[test]
    fn test_keyset_sign_and_verify() {
        let keyset = HmacKeySet::generate(HmacAlgorithm::HmacSha256);
        let mac = keyset.sign(b"<header/>").unwrap();
        assert!(keyset.verify(b"<header/>", &mac).unwrap());
        assert!(!keyset.verify(b"<header />", &mac).unwrap());
        assert!(!keyset.verify(b"<header/>", "not base64!").unwrap());
    }

    #[test]
    fn test_keyset_from_base64() {
        let keyset = HmacKeySet::from_base64(HmacAlgorithm::HmacSha256, "a2V5").unwrap();
        assert_eq!(keyset.key_base64(), "a2V5");
        assert!(HmacKeySet::from_base64(HmacAlgorithm::HmacSha256, "").is_err());
        assert!(HmacKeySet::from_base64(HmacAlgorithm::HmacSha256, "%%%").is_err());
    }

    #[test]
    fn test_keyset_xml() {
        let keyset = HmacKeySet::new(HmacAlgorithm::HmacSha256, b"key".to_vec());
        assert_eq!(
            keyset.to_xml().unwrap(),
            r#"<hmac-alg algName="HMACSHA256">a2V5</hmac-alg>"#
        );
    }

    #[test]
    fn test_keyset_debug_redacts_key() {
        let keyset = HmacKeySet::new(HmacAlgorithm::HmacSha256, b"secret".to_vec());
        let debug = format!("{keyset:?}");
        assert!(debug.contains("redacted"));
        assert!(!debug.contains("c2VjcmV0"));
    }
}
