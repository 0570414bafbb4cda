//! Configuration management for rmctl
//!
//! Handles configuration loading from files and environment variables.
//! Configuration is stored in TOML format with support for multiple named profiles,
//! one per control-plane endpoint.

#[cfg(target_os = "macos")]
use directories::BaseDirs;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use url::Url;

use super::error::{ConfigError, Result};
use super::fixture::FixtureConfig;
use super::polling::PollingConfig;

/// Main configuration structure
#[derive(Debug, Serialize, Deserialize, Default, Clone)]
pub struct Config {
    /// Profile used when none is given explicitly
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_profile: Option<String>,
    /// Map of profile name -> profile configuration
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

/// Individual profile configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Profile {
    /// Base URL of the control plane
    pub endpoint: String,
    /// Value for the `api-version` query parameter, if the service requires one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
    /// Polling behavior for long-running operations
    #[serde(default)]
    pub polling: PollingConfig,
    /// Shared fixture settings
    #[serde(default)]
    pub fixture: FixtureConfig,
}

impl Profile {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_version: None,
            polling: PollingConfig::default(),
            fixture: FixtureConfig::default(),
        }
    }

    /// Parse the endpoint, forcing a trailing slash so relative ids join under it
    pub fn endpoint_url(&self, profile_name: &str) -> Result<Url> {
        let mut url = Url::parse(&self.endpoint).map_err(|e| ConfigError::InvalidEndpoint {
            profile: profile_name.to_string(),
            endpoint: self.endpoint.clone(),
            reason: e.to_string(),
        })?;
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        Ok(url)
    }
}

impl Config {
    /// Resolve the profile to use
    ///
    /// Resolution order: explicit name, `default_profile`, then the first
    /// profile alphabetically.
    pub fn resolve_profile(&self, explicit_profile: Option<&str>) -> Result<(String, &Profile)> {
        let name = match explicit_profile {
            Some(name) => name.to_string(),
            None => match &self.default_profile {
                Some(default) => default.clone(),
                None => {
                    let mut names: Vec<_> = self.profiles.keys().collect();
                    names.sort();
                    names
                        .first()
                        .map(|name| name.to_string())
                        .ok_or(ConfigError::NoProfiles)?
                }
            },
        };

        let profile = self
            .profiles
            .get(&name)
            .ok_or_else(|| ConfigError::ProfileNotFound { name: name.clone() })?;
        Ok((name, profile))
    }

    /// Load configuration from the standard location
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            return Ok(Config::default());
        }

        let content = fs::read_to_string(config_path).map_err(|e| ConfigError::LoadError {
            path: config_path.display().to_string(),
            source: e,
        })?;

        // Expand environment variables in the config content
        let expanded_content = Self::expand_env_vars(&content);

        let config: Config = toml::from_str(&expanded_content)?;

        Ok(config)
    }

    /// Save configuration to the standard location
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;
        self.save_to_path(&config_path)
    }

    /// Save configuration to a specific path
    pub fn save_to_path(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::SaveError {
                path: parent.display().to_string(),
                source: e,
            })?;
        }

        let content = toml::to_string_pretty(self)?;

        fs::write(config_path, content).map_err(|e| ConfigError::SaveError {
            path: config_path.display().to_string(),
            source: e,
        })?;

        Ok(())
    }

    /// Set or update a profile
    pub fn set_profile(&mut self, name: String, profile: Profile) {
        self.profiles.insert(name, profile);
    }

    /// Remove a profile by name
    pub fn remove_profile(&mut self, name: &str) -> Option<Profile> {
        if self.default_profile.as_deref() == Some(name) {
            self.default_profile = None;
        }
        self.profiles.remove(name)
    }

    /// List all profiles sorted by name
    pub fn list_profiles(&self) -> Vec<(&String, &Profile)> {
        let mut profiles: Vec<_> = self.profiles.iter().collect();
        profiles.sort_by_key(|(name, _)| *name);
        profiles
    }

    /// Get the path to the configuration file
    ///
    /// On macOS, `~/.config/rmctl/config.toml` is preferred when it exists,
    /// falling back to `~/Library/Application Support/dev.rmctl.rmctl/config.toml`.
    ///
    /// On Linux: ~/.config/rmctl/config.toml
    /// On Windows: %APPDATA%\rmctl\rmctl\config.toml
    pub fn config_path() -> Result<PathBuf> {
        #[cfg(target_os = "macos")]
        {
            if let Some(base_dirs) = BaseDirs::new() {
                let linux_style_path = base_dirs
                    .home_dir()
                    .join(".config")
                    .join("rmctl")
                    .join("config.toml");

                if linux_style_path
                    .parent()
                    .map(|p| p.exists())
                    .unwrap_or(false)
                {
                    return Ok(linux_style_path);
                }
            }
        }

        let proj_dirs =
            ProjectDirs::from("dev", "rmctl", "rmctl").ok_or(ConfigError::ConfigDirError)?;

        Ok(proj_dirs.config_dir().join("config.toml"))
    }

    /// Expand environment variables in configuration content
    ///
    /// Supports ${VAR} and ${VAR:-default} syntax. Unknown variables are left
    /// as-is so profiles that are not used never fail to load.
    ///
    /// Example:
    /// ```toml
    /// endpoint = "${RMCTL_ENDPOINT:-https://management.example.com}"
    /// ```
    fn expand_env_vars(content: &str) -> String {
        let expanded =
            shellexpand::env_with_context_no_errors(content, |var| std::env::var(var).ok());
        expanded.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FixtureMode;

    fn config_with(names: &[&str]) -> Config {
        let mut config = Config::default();
        for name in names {
            config.set_profile(
                name.to_string(),
                Profile::new(format!("https://{name}.example.test")),
            );
        }
        config
    }

    #[test]
    fn test_config_serialization() {
        let mut config = config_with(&["prod"]);
        config.default_profile = Some("prod".to_string());

        let serialized = toml::to_string(&config).unwrap();
        let deserialized: Config = toml::from_str(&serialized).unwrap();

        assert_eq!(config.default_profile, deserialized.default_profile);
        assert_eq!(config.profiles.len(), deserialized.profiles.len());
        assert_eq!(
            deserialized.profiles["prod"].polling,
            PollingConfig::default()
        );
    }

    #[test]
    fn test_full_profile_parses() {
        let content = r#"
default_profile = "live"

[profiles.live]
endpoint = "https://management.example.test"
api_version = "2024-03-01"

[profiles.live.polling]
min_delay_ms = 500
timeout_secs = 900

[profiles.live.fixture]
resources = ["first", "second", "third"]
settle_delay_secs = 60
mode = "playback"
"#;
        let config: Config = toml::from_str(content).unwrap();
        let (name, profile) = config.resolve_profile(None).unwrap();
        assert_eq!(name, "live");
        assert_eq!(profile.api_version.as_deref(), Some("2024-03-01"));
        assert_eq!(profile.polling.min_delay_ms, 500);
        assert_eq!(profile.polling.timeout_secs, Some(900));
        assert_eq!(profile.fixture.resources.len(), 3);
        assert_eq!(profile.fixture.mode, FixtureMode::Playback);
    }

    #[test]
    #[serial_test::serial]
    fn test_env_var_expansion() {
        unsafe {
            std::env::set_var("TEST_RMCTL_ENDPOINT", "https://env.example.test");
        }

        let content = r#"
[profiles.test]
endpoint = "${TEST_RMCTL_ENDPOINT}"
"#;

        let expanded = Config::expand_env_vars(content);
        assert!(expanded.contains("https://env.example.test"));

        unsafe {
            std::env::remove_var("TEST_RMCTL_ENDPOINT");
        }
    }

    #[test]
    #[serial_test::serial]
    fn test_env_var_expansion_with_defaults() {
        unsafe {
            std::env::remove_var("NONEXISTENT_RMCTL_VAR");
        }

        let content = r#"
[profiles.test]
endpoint = "${NONEXISTENT_RMCTL_VAR:-https://default.example.test}"
api_version = "${UNSET_RMCTL_API_VERSION}"
"#;

        let expanded = Config::expand_env_vars(content);
        assert!(expanded.contains("https://default.example.test"));
        assert!(expanded.contains("${UNSET_RMCTL_API_VERSION}"));
    }

    #[test]
    fn test_resolve_profile_order() {
        let mut config = config_with(&["zeta", "alpha"]);
        assert_eq!(config.resolve_profile(None).unwrap().0, "alpha");

        config.default_profile = Some("zeta".to_string());
        assert_eq!(config.resolve_profile(None).unwrap().0, "zeta");
        assert_eq!(config.resolve_profile(Some("alpha")).unwrap().0, "alpha");
    }

    #[test]
    fn test_resolve_profile_errors() {
        let config = Config::default();
        assert!(matches!(
            config.resolve_profile(None),
            Err(ConfigError::NoProfiles)
        ));

        let config = config_with(&["prod"]);
        assert!(matches!(
            config.resolve_profile(Some("missing")),
            Err(ConfigError::ProfileNotFound { .. })
        ));
    }

    #[test]
    fn test_remove_profile_clears_default() {
        let mut config = config_with(&["prod"]);
        config.default_profile = Some("prod".to_string());

        assert!(config.remove_profile("prod").is_some());
        assert!(config.default_profile.is_none());
        assert!(config.list_profiles().is_empty());
    }

    #[test]
    fn test_endpoint_url_gets_trailing_slash() {
        let profile = Profile::new("https://management.example.test/base");
        let url = profile.endpoint_url("p").unwrap();
        assert_eq!(url.as_str(), "https://management.example.test/base/");

        let bad = Profile::new("not a url");
        assert!(matches!(
            bad.endpoint_url("p"),
            Err(ConfigError::InvalidEndpoint { .. })
        ));
    }
}
