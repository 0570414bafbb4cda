//! Configuration and profile management for rmctl
//!
// Allow nested config module - this is intentional for the config subsystem

#![allow(clippy::module_inception)]
//!
//! Profiles name a control-plane endpoint together with the polling and
//! shared-fixture settings used against it.
//!
//! # Features
//!
//! - Multiple named profiles
//! - Environment variable expansion in config files
//! - Platform-specific config file locations
//! - Serde defaults for every tunable, so partial files load

pub mod config;
pub mod error;
pub mod fixture;
pub mod polling;

// Re-export main types for convenience
pub use config::{Config, Profile};
pub use error::{ConfigError, Result};
pub use fixture::{FixtureConfig, FixtureMode, TEST_MODE_ENV};
pub use polling::PollingConfig;
