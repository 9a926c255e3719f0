use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use healthvault_auth::{
    ApplicationCertificate, ApplicationSigner, AuthConfig, Credential, HmacKeySet,
    PersonContext, WebApplicationCredential,
};
use healthvault_core::{ApplicationId, PersonId, RecordId};

/// How the application proves its identity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum StoredSigner {
    #[serde(rename = "certificate")]
    Certificate { key_file: String, thumbprint: String },
    #[serde(rename = "shared_secret")]
    SharedSecret { secret: String },
}

/// Stored per profile in `credentials.<profile>.json`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredCredentials {
    pub server: String,
    pub application_id: String,
    pub signer: StoredSigner,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub person_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_id: Option<String>,
}

impl StoredCredentials {
    pub fn application_id(&self) -> Result<ApplicationId> {
        self.application_id
            .parse()
            .with_context(|| format!("Invalid application id: {}", self.application_id))
    }

    pub fn record_id(&self) -> Result<Option<RecordId>> {
        self.record_id
            .as_deref()
            .map(|id| {
                id.parse::<RecordId>()
                    .with_context(|| format!("Invalid record id: {id}"))
            })
            .transpose()
    }

    pub fn person_context(&self) -> Result<PersonContext> {
        Ok(match &self.person_id {
            Some(id) => PersonContext::Offline(
                id.parse::<PersonId>()
                    .with_context(|| format!("Invalid person id: {id}"))?,
            ),
            None => PersonContext::Application,
        })
    }

    /// Load the signer's key material and build a credential.
    pub fn to_credential(&self, auth: &AuthConfig) -> Result<Arc<dyn Credential>> {
        let signer = match &self.signer {
            StoredSigner::Certificate {
                key_file,
                thumbprint,
            } => ApplicationSigner::Certificate(
                ApplicationCertificate::from_pem_file(key_file, thumbprint)
                    .with_context(|| format!("Failed to load application key {key_file}"))?,
            ),
            StoredSigner::SharedSecret { secret } => {
                let algorithm = auth.hmac().context("Invalid auth.hmac_algorithm")?;
                ApplicationSigner::SharedSecret(
                    HmacKeySet::from_base64(algorithm, secret).context("Invalid shared secret")?,
                )
            }
        };
        let credential = WebApplicationCredential::new(self.application_id()?, signer, auth)?
            .with_person(self.person_context()?);
        Ok(Arc::new(credential))
    }
}

fn creds_path(dir: &Path, profile: &str) -> PathBuf {
    dir.join(format!("credentials.{profile}.json"))
}

pub fn load_credentials_in(dir: &Path, profile: &str) -> Result<Option<StoredCredentials>> {
    let path = creds_path(dir, profile);
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&path)?;
    let creds: StoredCredentials = serde_json::from_str(&content)
        .with_context(|| format!("Invalid credentials file {}", path.display()))?;
    Ok(Some(creds))
}

pub fn save_credentials_in(dir: &Path, profile: &str, creds: &StoredCredentials) -> Result<()> {
    let content = serde_json::to_string_pretty(creds)?;
    fs::write(creds_path(dir, profile), content)?;
    Ok(())
}

pub fn remove_credentials_in(dir: &Path, profile: &str) -> Result<bool> {
    let path = creds_path(dir, profile);
    if path.exists() {
        fs::remove_file(path)?;
        Ok(true)
    } else {
        Ok(false)
    }
}

pub fn load_credentials(profile: &str) -> Result<Option<StoredCredentials>> {
    load_credentials_in(&crate::config::config_dir()?, profile)
}

pub fn save_credentials(profile: &str, creds: &StoredCredentials) -> Result<()> {
    save_credentials_in(&crate::config::config_dir()?, profile, creds)
}

pub fn remove_credentials(profile: &str) -> Result<bool> {
    remove_credentials_in(&crate::config::config_dir()?, profile)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shared_secret_creds() -> StoredCredentials {
        StoredCredentials {
            server: "https://hv.example.org/platform/".into(),
            application_id: "05a059c9-c309-4d8d-9fa8-9d8e0d9f6a27".into(),
            signer: StoredSigner::SharedSecret {
                secret: "c2VjcmV0LWtleQ==".into(),
            },
            person_id: Some("7a2d6a3e-2a3b-4c1d-9e8f-0a1b2c3d4e5f".into()),
            record_id: None,
        }
    }

    #[test]
    fn test_save_load_remove() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_credentials_in(dir.path(), "default").unwrap().is_none());

        let creds = shared_secret_creds();
        save_credentials_in(dir.path(), "default", &creds).unwrap();
        assert_eq!(
            load_credentials_in(dir.path(), "default").unwrap(),
            Some(creds)
        );
        assert!(load_credentials_in(dir.path(), "other").unwrap().is_none());

        assert!(remove_credentials_in(dir.path(), "default").unwrap());
        assert!(!remove_credentials_in(dir.path(), "default").unwrap());
    }

    #[test]
    fn test_signer_is_tagged_in_json() {
        let json = serde_json::to_value(shared_secret_creds()).unwrap();
        assert_eq!(json["signer"]["type"], "shared_secret");
        assert!(json.get("record_id").is_none());
    }

    #[test]
    fn test_to_credential_uses_offline_person() {
        let creds = shared_secret_creds();
        let credential = creds.to_credential(&AuthConfig::default()).unwrap();
        assert_eq!(
            credential.application_id().to_string(),
            "05a059c9-c309-4d8d-9fa8-9d8e0d9f6a27"
        );
        assert!(matches!(credential.person(), PersonContext::Offline(_)));
    }

    #[test]
    fn test_to_credential_rejects_bad_ids() {
        let mut creds = shared_secret_creds();
        creds.person_id = Some("someone".into());
        assert!(creds.to_credential(&AuthConfig::default()).is_err());

        let mut creds = shared_secret_creds();
        creds.record_id = Some("nope".into());
        assert!(creds.record_id().is_err());
    }
}
