use std::sync::Mutex;
use std::time::Duration;
use std::{env, fs};

use healthvault_client::config::loader::load_config;

/// Tests in this file read or write `HEALTHVAULT__*` variables.
static ENV_LOCK: Mutex<()> = Mutex::new(());

const CONFIG: &str = r#"
service_url = "https://hv.example.org/platform/"
request_timeout = "45s"

[auth]
max_refresh_attempts = 2
"#;

#[test]
fn env_overrides_win_over_file() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let dir = tempfile::tempdir().expect("tmp dir");
    let path = dir.path().join("healthvault.toml");
    fs::write(&path, CONFIG).expect("write toml");

    unsafe {
        env::set_var("HEALTHVAULT__SERVICE_URL", "https://override.example.org/platform/");
        env::set_var("HEALTHVAULT__AUTH__MAX_REFRESH_ATTEMPTS", "3");
    }
    let cfg = load_config(path.to_str());
    unsafe {
        env::remove_var("HEALTHVAULT__SERVICE_URL");
        env::remove_var("HEALTHVAULT__AUTH__MAX_REFRESH_ATTEMPTS");
    }

    let cfg = cfg.expect("should parse config with env overrides");
    assert_eq!(cfg.service_url, "https://override.example.org/platform/");
    assert_eq!(cfg.auth.max_refresh_attempts, 3);
    // Keys not overridden still come from the file.
    assert_eq!(cfg.request_timeout, Duration::from_secs(45));
}

#[test]
fn invalid_env_override_fails_validation() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let dir = tempfile::tempdir().expect("tmp dir");
    let path = dir.path().join("healthvault.toml");
    fs::write(&path, CONFIG).expect("write toml");

    unsafe {
        env::set_var("HEALTHVAULT__AUTH__MAX_REFRESH_ATTEMPTS", "0");
    }
    let result = load_config(path.to_str());
    unsafe {
        env::remove_var("HEALTHVAULT__AUTH__MAX_REFRESH_ATTEMPTS");
    }

    let err = result.expect_err("zero refresh attempts must be rejected");
    assert!(err.contains("auth"));
}
