//! Polling configuration for long-running operations
//!
//! Defines the backoff envelope a poller must respect: a minimum floor it may
//! never poll faster than, the initial delay, the exponential growth factor,
//! and the ceiling that bounds computed delays.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Backoff settings for status polling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Never poll faster than this, even when the server suggests it
    #[serde(default = "default_min_delay_ms")]
    pub min_delay_ms: u64,

    /// First delay when the server gives no suggestion
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    /// Upper bound for computed delays; server `Retry-After` may exceed it
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Growth factor between consecutive unsuggested delays
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,

    /// Default wait timeout in seconds, applied when the caller sets no deadline
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            min_delay_ms: default_min_delay_ms(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            multiplier: default_multiplier(),
            timeout_secs: None,
        }
    }
}

impl PollingConfig {
    pub fn min_delay(&self) -> Duration {
        Duration::from_millis(self.min_delay_ms)
    }

    /// Initial delay, never below the floor
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms).max(self.min_delay())
    }

    /// Ceiling, never below the floor
    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms).max(self.min_delay())
    }

    /// Growth factor; values below 1.0 (or NaN) are treated as 1.0
    pub fn multiplier(&self) -> f64 {
        if self.multiplier.is_finite() && self.multiplier >= 1.0 {
            self.multiplier
        } else {
            1.0
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

// Default value functions for serde
fn default_min_delay_ms() -> u64 {
    1_000
}

fn default_initial_delay_ms() -> u64 {
    1_000
}

fn default_max_delay_ms() -> u64 {
    30_000
}

fn default_multiplier() -> f64 {
    2.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PollingConfig::default();
        assert_eq!(config.min_delay(), Duration::from_secs(1));
        assert_eq!(config.initial_delay(), Duration::from_secs(1));
        assert_eq!(config.max_delay(), Duration::from_secs(30));
        assert_eq!(config.multiplier(), 2.0);
        assert!(config.timeout().is_none());
    }

    #[test]
    fn test_floor_wins_over_smaller_settings() {
        let config = PollingConfig {
            min_delay_ms: 5_000,
            initial_delay_ms: 100,
            max_delay_ms: 1_000,
            multiplier: 0.5,
            timeout_secs: Some(60),
        };
        assert_eq!(config.initial_delay(), Duration::from_secs(5));
        assert_eq!(config.max_delay(), Duration::from_secs(5));
        assert_eq!(config.multiplier(), 1.0);
        assert_eq!(config.timeout(), Some(Duration::from_secs(60)));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: PollingConfig = toml::from_str("min_delay_ms = 250").unwrap();
        assert_eq!(config.min_delay_ms, 250);
        assert_eq!(config.max_delay_ms, 30_000);
        assert_eq!(config.multiplier, 2.0);
    }
}
