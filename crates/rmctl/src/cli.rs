//! CLI structure and command definitions

use clap::{Args, Parser, Subcommand};
use rmctl_core::Method;

/// Long-running operation client for resource-management APIs
#[derive(Parser, Debug)]
#[command(name = "rmctl")]
#[command(version, about = "Resource management CLI for long-running operations")]
#[command(long_about = "
Resource management CLI for long-running operations

Mutating calls against the control plane return an operation that completes
later. rmctl starts them, polls them with backoff, and fetches the result.

EXAMPLES:
    # Configure a profile
    rmctl profile set lab --endpoint https://management.example.com --api-version 2024-03-01

    # Create a resource and wait for it
    rmctl operation start --method put --target /snapshots/snap1 --body @snap.json --wait

    # Resume waiting on an operation started elsewhere
    rmctl operation wait https://management.example.com/operations/abc --resource /snapshots/snap1

    # Read resources
    rmctl resource get /snapshots/snap1
    rmctl resource list /snapshots
")]
pub struct Cli {
    /// Profile to use for this command
    #[arg(long, short, global = true, env = "RMCTL_PROFILE")]
    pub profile: Option<String>,

    /// Path to alternate configuration file
    #[arg(long, global = true, env = "RMCTL_CONFIG_FILE")]
    pub config_file: Option<String>,

    /// Enable verbose logging
    #[arg(long, short, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start and wait on long-running operations
    #[command(subcommand, visible_alias = "op")]
    Operation(OperationCommands),

    /// Read resources
    #[command(subcommand, visible_alias = "res")]
    Resource(ResourceCommands),

    /// Profile management
    #[command(subcommand, visible_alias = "prof")]
    Profile(ProfileCommands),

    /// Show version information
    #[command(visible_alias = "ver")]
    Version,
}

/// Options for waiting on an operation
#[derive(Args, Debug, Clone)]
pub struct WaitArgs {
    /// Maximum time to wait in seconds (defaults to the profile's polling timeout)
    #[arg(long)]
    pub wait_timeout: Option<u64>,

    /// Do not show a progress spinner
    #[arg(long)]
    pub no_progress: bool,
}

#[derive(Subcommand, Debug)]
pub enum OperationCommands {
    /// Issue a mutating request
    Start {
        /// HTTP method
        #[arg(long, short, value_enum)]
        method: Method,

        /// Resource id or path the request is sent to
        #[arg(long, short)]
        target: String,

        /// JSON body, or @file to read it from a file
        #[arg(long, short)]
        body: Option<String>,

        /// Resource fetched on success when the operation returns no body
        /// (defaults to the target for PUT and PATCH)
        #[arg(long)]
        resource: Option<String>,

        /// Wait for the operation to complete
        #[arg(long)]
        wait: bool,

        #[command(flatten)]
        wait_args: WaitArgs,
    },

    /// Wait for an operation started earlier
    Wait {
        /// Operation reference printed by `operation start`
        reference: String,

        /// Resource fetched on success when the operation returns no body
        #[arg(long)]
        resource: Option<String>,

        #[command(flatten)]
        wait_args: WaitArgs,
    },
}

#[derive(Subcommand, Debug)]
pub enum ResourceCommands {
    /// Fetch a resource
    Get {
        /// Resource id
        id: String,
    },

    /// Check whether a resource exists
    Exists {
        /// Resource id
        id: String,

        /// Treat 403 Forbidden like 404 Not Found
        #[arg(long)]
        forbidden_means_absent: bool,
    },

    /// List a collection, following pages
    List {
        /// Collection path
        collection: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum ProfileCommands {
    /// List configured profiles
    List,

    /// Show a profile
    Show {
        /// Profile name (defaults to the resolved profile)
        name: Option<String>,
    },

    /// Create or update a profile
    Set {
        /// Profile name
        name: String,

        /// Base URL of the control plane
        #[arg(long)]
        endpoint: String,

        /// Value for the api-version query parameter
        #[arg(long)]
        api_version: Option<String>,

        /// Make this the default profile
        #[arg(long)]
        default: bool,
    },

    /// Remove a profile
    Remove {
        /// Profile name
        name: String,
    },

    /// Set the default profile
    Default {
        /// Profile name
        name: String,
    },
}
