use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use rmctl_core::config::{Config, ConfigError, FixtureMode};
use tempfile::TempDir;

/// Returns true if running as root (euid == 0). Used to skip permission tests.
#[cfg(unix)]
fn is_root() -> bool {
    std::process::Command::new("id")
        .arg("-u")
        .output()
        .ok()
        .and_then(|o| String::from_utf8(o.stdout).ok())
        .map(|s| s.trim() == "0")
        .unwrap_or(false)
}

// ---------------------------------------------------------------------------
// Missing and empty files
// ---------------------------------------------------------------------------

#[test]
fn load_from_nonexistent_path_returns_default_config() {
    let path = PathBuf::from("/tmp/rmctl-test-nonexistent/does/not/exist/config.toml");
    assert!(!path.exists());

    let config = Config::load_from_path(&path).expect("missing file should yield defaults");

    assert!(config.profiles.is_empty());
    assert!(config.default_profile.is_none());
}

#[test]
fn load_empty_config_file_returns_default_config() {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("config.toml");
    fs::write(&config_path, "").unwrap();

    let config = Config::load_from_path(&config_path).expect("empty file should parse as default");

    assert!(config.profiles.is_empty());
    assert!(matches!(
        config.resolve_profile(None),
        Err(ConfigError::NoProfiles)
    ));
}

// ---------------------------------------------------------------------------
// Malformed content
// ---------------------------------------------------------------------------

#[test]
fn load_corrupt_toml_returns_parse_error() {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("config.toml");
    fs::write(&config_path, "[[[broken").unwrap();

    let err = Config::load_from_path(&config_path).unwrap_err();
    let msg = err.to_string();
    assert!(
        msg.contains("parse") || msg.contains("Parse"),
        "error should mention parsing: {msg}"
    );
}

#[test]
fn load_profile_without_endpoint_returns_error() {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("config.toml");
    fs::write(
        &config_path,
        r#"
[profiles.broken]
api_version = "2024-03-01"
"#,
    )
    .unwrap();

    assert!(Config::load_from_path(&config_path).is_err());
}

#[test]
fn load_config_with_unknown_fields_ignores_them() {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("config.toml");
    fs::write(
        &config_path,
        r#"
unknown_top_level_key = "hello"

[profiles.dev]
endpoint = "https://management.example.test"
totally_unknown_field = true
"#,
    )
    .unwrap();

    let config =
        Config::load_from_path(&config_path).expect("unknown fields should be silently ignored");

    assert!(config.profiles.contains_key("dev"));
}

#[test]
fn invalid_endpoint_is_reported_with_profile_name() {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("config.toml");
    fs::write(
        &config_path,
        r#"
[profiles.bad]
endpoint = "not a url"
"#,
    )
    .unwrap();

    let config = Config::load_from_path(&config_path).unwrap();
    let (name, profile) = config.resolve_profile(Some("bad")).unwrap();
    match profile.endpoint_url(&name) {
        Err(ConfigError::InvalidEndpoint { profile, .. }) => assert_eq!(profile, "bad"),
        other => panic!("expected InvalidEndpoint, got {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// Nested polling and fixture sections
// ---------------------------------------------------------------------------

#[test]
fn load_full_profile_with_polling_and_fixture() {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("config.toml");
    fs::write(
        &config_path,
        r#"
default_profile = "lab"

[profiles.lab]
endpoint = "https://management.example.test/base"
api_version = "2024-03-01"

[profiles.lab.polling]
min_delay_ms = 500
max_delay_ms = 10000
timeout_secs = 600

[profiles.lab.fixture]
resources = ["disk-a", "disk-b", "disk-c"]
settle_delay_secs = 30
rollback_on_failure = false
mode = "playback"
"#,
    )
    .unwrap();

    let config = Config::load_from_path(&config_path).unwrap();
    let (name, profile) = config.resolve_profile(None).unwrap();

    assert_eq!(name, "lab");
    assert_eq!(
        profile.endpoint_url(&name).unwrap().as_str(),
        "https://management.example.test/base/"
    );
    assert_eq!(profile.polling.min_delay(), Duration::from_millis(500));
    assert_eq!(profile.polling.max_delay(), Duration::from_secs(10));
    assert_eq!(profile.polling.timeout(), Some(Duration::from_secs(600)));
    assert_eq!(profile.fixture.resources.len(), 3);
    assert_eq!(profile.fixture.settle_delay(), Some(Duration::from_secs(30)));
    assert!(!profile.fixture.rollback_on_failure);
    assert_eq!(profile.fixture.mode, FixtureMode::Playback);
}

#[test]
fn save_then_load_preserves_profiles() {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("nested").join("config.toml");

    let mut config = Config::default();
    config.set_profile(
        "dev".to_string(),
        rmctl_core::config::Profile::new("https://dev.example.test"),
    );
    config.default_profile = Some("dev".to_string());
    config.save_to_path(&config_path).unwrap();

    let loaded = Config::load_from_path(&config_path).unwrap();
    assert_eq!(loaded.default_profile.as_deref(), Some("dev"));
    assert_eq!(loaded.profiles["dev"].endpoint, "https://dev.example.test");
}

// ---------------------------------------------------------------------------
// Permission errors (unix only)
// ---------------------------------------------------------------------------

#[cfg(unix)]
#[test]
fn load_unreadable_file_returns_clear_error() {
    use std::os::unix::fs::PermissionsExt;

    if is_root() {
        eprintln!("skipping test: running as root");
        return;
    }

    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("config.toml");
    fs::write(&config_path, "# valid toml").unwrap();
    fs::set_permissions(&config_path, fs::Permissions::from_mode(0o000)).unwrap();

    let err = Config::load_from_path(&config_path).unwrap_err();
    let msg = err.to_string();
    assert!(
        msg.contains("load") || msg.contains("Load") || msg.contains("Permission"),
        "error should reference loading or permissions: {msg}"
    );

    fs::set_permissions(&config_path, fs::Permissions::from_mode(0o644)).unwrap();
}

#[cfg(unix)]
#[test]
fn save_to_readonly_directory_returns_clear_error() {
    use std::os::unix::fs::PermissionsExt;

    if is_root() {
        eprintln!("skipping test: running as root");
        return;
    }

    let dir = TempDir::new().unwrap();
    let readonly_dir = dir.path().join("readonly");
    fs::create_dir(&readonly_dir).unwrap();
    fs::set_permissions(&readonly_dir, fs::Permissions::from_mode(0o444)).unwrap();

    let err = Config::default()
        .save_to_path(&readonly_dir.join("config.toml"))
        .unwrap_err();
    let msg = err.to_string();
    assert!(
        msg.contains("save") || msg.contains("Save") || msg.contains("Permission"),
        "error should reference saving or permissions: {msg}"
    );

    fs::set_permissions(&readonly_dir, fs::Permissions::from_mode(0o755)).unwrap();
}
