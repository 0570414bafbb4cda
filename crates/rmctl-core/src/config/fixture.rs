//! Shared fixture settings

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Environment variable that overrides the configured fixture mode
pub const TEST_MODE_ENV: &str = "RMCTL_TEST_MODE";

/// Whether fixtures talk to the live control plane
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FixtureMode {
    /// Provision and tear down real resources
    #[default]
    Live,
    /// Recorded sessions: no remote provisioning or teardown
    Playback,
}

impl FixtureMode {
    /// Parse a mode name; `record` is a live mode
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "live" | "record" => Some(FixtureMode::Live),
            "playback" => Some(FixtureMode::Playback),
            _ => None,
        }
    }

    /// Mode from `RMCTL_TEST_MODE`, if set to a known value
    pub fn from_env() -> Option<Self> {
        std::env::var(TEST_MODE_ENV)
            .ok()
            .and_then(|value| Self::parse(&value))
    }
}

impl fmt::Display for FixtureMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FixtureMode::Live => write!(f, "live"),
            FixtureMode::Playback => write!(f, "playback"),
        }
    }
}

/// Settings for a shared resource fixture
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixtureConfig {
    /// Logical names of the resources to provision, in creation order
    #[serde(default = "default_resources")]
    pub resources: Vec<String>,

    /// Prefix for generated remote resource names
    #[serde(default = "default_name_prefix")]
    pub name_prefix: String,

    /// Pause between consecutive creates; 0 provisions resources concurrently
    #[serde(default)]
    pub settle_delay_secs: u64,

    /// Lifetime of granted read access
    #[serde(default = "default_access_duration_secs")]
    pub access_duration_secs: u64,

    /// Tear down already-created resources when set-up fails
    #[serde(default = "default_true")]
    pub rollback_on_failure: bool,

    #[serde(default)]
    pub mode: FixtureMode,
}

impl Default for FixtureConfig {
    fn default() -> Self {
        Self {
            resources: default_resources(),
            name_prefix: default_name_prefix(),
            settle_delay_secs: 0,
            access_duration_secs: default_access_duration_secs(),
            rollback_on_failure: true,
            mode: FixtureMode::default(),
        }
    }
}

impl FixtureConfig {
    pub fn settle_delay(&self) -> Option<Duration> {
        (self.settle_delay_secs > 0).then(|| Duration::from_secs(self.settle_delay_secs))
    }

    pub fn access_duration(&self) -> Duration {
        Duration::from_secs(self.access_duration_secs)
    }

    /// Configured mode, overridden by `RMCTL_TEST_MODE` when set
    pub fn effective_mode(&self) -> FixtureMode {
        FixtureMode::from_env().unwrap_or(self.mode)
    }
}

fn default_resources() -> Vec<String> {
    vec!["snapshot1".to_string(), "snapshot2".to_string()]
}

fn default_name_prefix() -> String {
    "rmctl-".to_string()
}

fn default_access_duration_secs() -> u64 {
    3600
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = FixtureConfig::default();
        assert_eq!(config.resources, vec!["snapshot1", "snapshot2"]);
        assert_eq!(config.settle_delay(), None);
        assert_eq!(config.access_duration(), Duration::from_secs(3600));
        assert!(config.rollback_on_failure);
        assert_eq!(config.mode, FixtureMode::Live);
    }

    #[test]
    fn test_settle_delay_from_toml() {
        let config: FixtureConfig = toml::from_str(
            r#"
resources = ["a"]
settle_delay_secs = 60
mode = "playback"
"#,
        )
        .unwrap();
        assert_eq!(config.settle_delay(), Some(Duration::from_secs(60)));
        assert_eq!(config.mode, FixtureMode::Playback);
        assert_eq!(config.name_prefix, "rmctl-");
    }

    #[test]
    fn test_mode_parse() {
        assert_eq!(FixtureMode::parse("Playback"), Some(FixtureMode::Playback));
        assert_eq!(FixtureMode::parse("record"), Some(FixtureMode::Live));
        assert_eq!(FixtureMode::parse(" live "), Some(FixtureMode::Live));
        assert_eq!(FixtureMode::parse("replay"), None);
    }

    #[test]
    #[serial_test::serial]
    fn test_env_overrides_mode() {
        let config = FixtureConfig::default();
        unsafe {
            std::env::set_var(TEST_MODE_ENV, "playback");
        }
        assert_eq!(config.effective_mode(), FixtureMode::Playback);

        unsafe {
            std::env::remove_var(TEST_MODE_ENV);
        }
        assert_eq!(config.effective_mode(), FixtureMode::Live);
    }
}
