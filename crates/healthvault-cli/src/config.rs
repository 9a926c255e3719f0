use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use healthvault_client::config::DEFAULT_SERVICE_URL;

#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct ProfileConfig {
    pub server: Option<String>,
    pub format: Option<String>,
    pub record: Option<String>,
}

pub type ConfigFile = HashMap<String, ProfileConfig>;

/// `~/.healthvault`, or `$HEALTHVAULT_HOME` when set.
pub fn config_dir() -> Result<PathBuf> {
    let dir = match std::env::var_os("HEALTHVAULT_HOME") {
        Some(home) => PathBuf::from(home),
        None => dirs::home_dir()
            .context("Cannot determine home directory")?
            .join(".healthvault"),
    };
    fs::create_dir_all(&dir)?;
    Ok(dir)
}

fn config_path(dir: &Path) -> PathBuf {
    dir.join("config.toml")
}

pub fn load_all_in(dir: &Path) -> Result<ConfigFile> {
    let path = config_path(dir);
    if !path.exists() {
        return Ok(ConfigFile::new());
    }
    let content = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let cfg: ConfigFile = toml::from_str(&content)
        .with_context(|| format!("Invalid config file {}", path.display()))?;
    Ok(cfg)
}

pub fn load_profile_in(dir: &Path, profile: &str) -> Result<ProfileConfig> {
    Ok(load_all_in(dir)?.remove(profile).unwrap_or_default())
}

pub fn save_profile_in(dir: &Path, profile: &str, config: &ProfileConfig) -> Result<()> {
    let mut all = load_all_in(dir)?;
    all.insert(profile.to_string(), config.clone());
    let content = toml::to_string_pretty(&all)?;
    fs::write(config_path(dir), content)?;
    Ok(())
}

pub fn load_profile(profile: &str) -> Result<ProfileConfig> {
    load_profile_in(&config_dir()?, profile)
}

pub fn save_profile(profile: &str, config: &ProfileConfig) -> Result<()> {
    save_profile_in(&config_dir()?, profile, config)
}

/// Apply `hv config set <key> <value>`.
pub fn set_value(config: &mut ProfileConfig, key: &str, value: &str) -> Result<()> {
    match key {
        "server" => config.server = Some(value.to_string()),
        "format" => {
            if !matches!(value, "json" | "table") {
                anyhow::bail!("Invalid format: {value}. Valid formats: json, table");
            }
            config.format = Some(value.to_string());
        }
        "record" => {
            value
                .parse::<healthvault_core::RecordId>()
                .with_context(|| format!("Invalid record id: {value}"))?;
            config.record = Some(value.to_string());
        }
        other => anyhow::bail!("Unknown config key: {other}. Valid keys: server, format, record"),
    }
    Ok(())
}

pub fn resolve_server(cli_server: &Option<String>, profile: &str) -> Result<String> {
    // 1. --server flag / HEALTHVAULT_URL env
    if let Some(s) = cli_server {
        return Ok(s.clone());
    }
    // 2. config.toml profile
    let cfg = load_profile(profile)?;
    if let Some(s) = cfg.server {
        return Ok(s);
    }
    // 3. Stored credentials for this profile
    if let Ok(Some(creds)) = crate::auth::load_credentials(profile) {
        return Ok(creds.server);
    }
    // 4. Pre-production platform
    Ok(DEFAULT_SERVICE_URL.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profiles_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            load_profile_in(dir.path(), "default").unwrap(),
            ProfileConfig::default()
        );

        let mut cfg = ProfileConfig::default();
        set_value(&mut cfg, "server", "https://hv.example.org/platform/").unwrap();
        set_value(&mut cfg, "format", "table").unwrap();
        save_profile_in(dir.path(), "work", &cfg).unwrap();

        let other = ProfileConfig {
            server: Some("https://other.example.org/".into()),
            ..Default::default()
        };
        save_profile_in(dir.path(), "default", &other).unwrap();

        assert_eq!(load_profile_in(dir.path(), "work").unwrap(), cfg);
        assert_eq!(load_profile_in(dir.path(), "default").unwrap(), other);
        assert_eq!(load_all_in(dir.path()).unwrap().len(), 2);
    }

    #[test]
    fn test_set_value_validates() {
        let mut cfg = ProfileConfig::default();
        assert!(set_value(&mut cfg, "format", "yaml").is_err());
        assert!(set_value(&mut cfg, "record", "not-a-guid").is_err());
        assert!(set_value(&mut cfg, "colour", "blue").is_err());

        set_value(&mut cfg, "record", "11111111-2222-3333-4444-555555555555").unwrap();
        assert_eq!(
            cfg.record.as_deref(),
            Some("11111111-2222-3333-4444-555555555555")
        );
    }
}
