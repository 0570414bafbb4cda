//! Builds transports and clients from the resolved profile

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use rmctl_core::{Config, ExistencePolicy, HttpTransport, Profile, ResourceClient};
use tracing::{debug, info};

/// User agent string for rmctl HTTP requests
const RMCTL_USER_AGENT: &str = concat!("rmctl/", env!("CARGO_PKG_VERSION"));

/// Owns the loaded configuration and where it came from
pub struct ConnectionManager {
    pub config: Config,
    pub config_path: Option<PathBuf>,
}

impl ConnectionManager {
    pub fn with_config_path(config: Config, config_path: Option<PathBuf>) -> Self {
        Self {
            config,
            config_path,
        }
    }

    /// Save the configuration to the file it was loaded from
    pub fn save_config(&self) -> Result<()> {
        match &self.config_path {
            Some(path) => self.config.save_to_path(path),
            None => self.config.save(),
        }
        .context("Failed to save configuration")
    }

    pub fn resolve_profile(&self, profile_name: Option<&str>) -> Result<(String, &Profile)> {
        self.config
            .resolve_profile(profile_name)
            .context("Failed to resolve profile")
    }

    /// Resource client for the resolved profile
    pub fn resource_client(
        &self,
        profile_name: Option<&str>,
        existence: ExistencePolicy,
    ) -> Result<ResourceClient> {
        let (name, profile) = self.resolve_profile(profile_name)?;
        debug!(profile = %name, endpoint = %profile.endpoint, "Creating HTTP transport");

        let endpoint = profile.endpoint_url(&name)?;
        let mut transport = HttpTransport::with_user_agent(endpoint, RMCTL_USER_AGENT)
            .context("Failed to build HTTP client")?;
        if let Some(version) = &profile.api_version {
            transport = transport.api_version(version.clone());
        }
        info!(profile = %name, "Using profile");

        Ok(ResourceClient::new(Arc::new(transport), profile.polling.clone())
            .with_existence_policy(existence))
    }
}
