//! Profile management commands

use anyhow::{Result, bail};
use rmctl_core::Profile;
use serde_json::json;
use tracing::info;

use super::print_json;
use crate::cli::ProfileCommands;
use crate::connection::ConnectionManager;

pub fn handle_profile_command(
    conn_mgr: &mut ConnectionManager,
    profile_name: Option<&str>,
    command: &ProfileCommands,
) -> Result<()> {
    match command {
        ProfileCommands::List => {
            let profiles = conn_mgr.config.list_profiles();
            if profiles.is_empty() {
                println!("No profiles configured.");
                println!("Create one with: rmctl profile set <name> --endpoint <url>");
                return Ok(());
            }
            let default = conn_mgr.config.default_profile.as_deref();
            for (name, profile) in profiles {
                let marker = if default == Some(name.as_str()) { "*" } else { " " };
                println!("{} {}\t{}", marker, name, profile.endpoint);
            }
            Ok(())
        }
        ProfileCommands::Show { name } => {
            let (name, profile) = conn_mgr.resolve_profile(name.as_deref().or(profile_name))?;
            let is_default = conn_mgr.config.default_profile.as_deref() == Some(name.as_str());
            print_json(&json!({
                "name": name,
                "default": is_default,
                "profile": profile,
            }))
        }
        ProfileCommands::Set {
            name,
            endpoint,
            api_version,
            default,
        } => {
            let mut profile = conn_mgr
                .config
                .profiles
                .get(name)
                .cloned()
                .unwrap_or_else(|| Profile::new(endpoint.clone()));
            profile.endpoint = endpoint.clone();
            if api_version.is_some() {
                profile.api_version = api_version.clone();
            }
            profile.endpoint_url(name)?;

            conn_mgr.config.set_profile(name.clone(), profile);
            if *default || conn_mgr.config.default_profile.is_none() {
                conn_mgr.config.default_profile = Some(name.clone());
            }
            conn_mgr.save_config()?;
            info!(profile = %name, "Profile saved");
            println!("Profile '{}' saved", name);
            Ok(())
        }
        ProfileCommands::Remove { name } => {
            if conn_mgr.config.remove_profile(name).is_none() {
                bail!("Profile '{}' not found", name);
            }
            conn_mgr.save_config()?;
            println!("Profile '{}' removed", name);
            Ok(())
        }
        ProfileCommands::Default { name } => {
            if !conn_mgr.config.profiles.contains_key(name) {
                bail!("Profile '{}' not found", name);
            }
            conn_mgr.config.default_profile = Some(name.clone());
            conn_mgr.save_config()?;
            println!("Default profile set to '{}'", name);
            Ok(())
        }
    }
}
