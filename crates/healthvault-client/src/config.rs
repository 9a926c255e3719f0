use healthvault_auth::AuthConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

pub const DEFAULT_SERVICE_URL: &str = "https://platform.healthvault-ppe.com/platform/";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the platform; requests go to `{service_url}/wildcat.ashx`.
    pub service_url: String,
    /// Application id. Optional here because credentials may carry their own.
    pub application_id: Option<String>,
    pub language: String,
    pub country: String,
    /// Lifetime the service should accept a request for (`<msg-ttl>`).
    #[serde(with = "humantime_serde")]
    pub request_ttl: Duration,
    /// HTTP timeout per attempt.
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    /// Reported in `<version>`.
    pub sdk_version: String,
    pub auth: AuthConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            service_url: DEFAULT_SERVICE_URL.to_string(),
            application_id: None,
            language: "en".to_string(),
            country: "US".to_string(),
            request_ttl: Duration::from_secs(1800),
            request_timeout: Duration::from_secs(30),
            sdk_version: format!("healthvault-rs/{}", env!("CARGO_PKG_VERSION")),
            auth: AuthConfig::default(),
        }
    }
}

impl ClientConfig {
    pub fn validate(&self) -> Result<(), String> {
        let url = Url::parse(&self.service_url)
            .map_err(|e| format!("service_url is not a valid URL: {e}"))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err("service_url must use http or https".into());
        }
        if let Some(app_id) = &self.application_id {
            app_id
                .parse::<healthvault_core::ApplicationId>()
                .map_err(|e| format!("application_id: {e}"))?;
        }
        if self.language.is_empty() || self.country.is_empty() {
            return Err("language and country must not be empty".into());
        }
        if self.request_ttl.is_zero() {
            return Err("request_ttl must be > 0".into());
        }
        if self.request_timeout.is_zero() {
            return Err("request_timeout must be > 0".into());
        }
        self.auth.validate().map_err(|e| format!("auth: {e}"))?;
        Ok(())
    }

    /// Endpoint all methods are posted to.
    pub fn endpoint(&self) -> Result<Url, url::ParseError> {
        let mut base = self.service_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        Url::parse(&base)?.join("wildcat.ashx")
    }
}

pub mod loader {
    use super::ClientConfig;
    use config::{Config, Environment, File};
    use std::path::PathBuf;

    /// Layers `path` (or `./healthvault.toml` when present) under
    /// `HEALTHVAULT__*` env vars and validates the result. An explicit `path`
    /// that does not exist is an error rather than silently skipped.
    pub fn load_config(path: Option<&str>) -> Result<ClientConfig, String> {
        let mut builder = Config::builder();
        match path {
            Some(p) => {
                let pathbuf = PathBuf::from(p);
                if !pathbuf.exists() {
                    return Err(format!("config file not found: {p}"));
                }
                builder = builder.add_source(File::from(pathbuf));
            }
            None => {
                let default_path = PathBuf::from("healthvault.toml");
                if default_path.exists() {
                    builder = builder.add_source(File::from(default_path));
                }
            }
        }
        // HEALTHVAULT__AUTH__MAX_REFRESH_ATTEMPTS=3 sets auth.max_refresh_attempts
        builder = builder.add_source(
            Environment::with_prefix("HEALTHVAULT")
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder
            .build()
            .map_err(|e| format!("config build error: {e}"))?;
        let merged: ClientConfig = cfg
            .try_deserialize()
            .map_err(|e| format!("config deserialize error: {e}"))?;
        merged.validate()?;
        Ok(merged)
    }
}
