use anyhow::{Context, Result};
use rmctl_core::ExistencePolicy;
use serde_json::{Value, json};

use super::print_json;
use crate::cli::ResourceCommands;
use crate::connection::ConnectionManager;

pub async fn handle_resource_command(
    conn_mgr: &ConnectionManager,
    profile_name: Option<&str>,
    command: &ResourceCommands,
) -> Result<()> {
    match command {
        ResourceCommands::Get { id } => {
            let client = conn_mgr.resource_client(profile_name, ExistencePolicy::Strict)?;
            let resource: Value = client
                .get(id)
                .await
                .with_context(|| format!("Failed to get {}", id))?;
            print_json(&resource)
        }
        ResourceCommands::Exists {
            id,
            forbidden_means_absent,
        } => {
            let policy = if *forbidden_means_absent {
                ExistencePolicy::ForbiddenMeansAbsent
            } else {
                ExistencePolicy::Strict
            };
            let client = conn_mgr.resource_client(profile_name, policy)?;
            let exists = client
                .exists(id)
                .await
                .with_context(|| format!("Failed to check {}", id))?;
            print_json(&json!({ "id": id, "exists": exists }))
        }
        ResourceCommands::List { collection } => {
            let client = conn_mgr.resource_client(profile_name, ExistencePolicy::Strict)?;
            let items: Vec<Value> = client
                .list(collection)
                .await
                .with_context(|| format!("Failed to list {}", collection))?;
            print_json(&Value::Array(items))
        }
    }
}
