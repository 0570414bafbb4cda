use anyhow::Result;
use clap::Parser;
use rmctl_core::Config;
use tracing::{debug, info, trace};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;
mod commands;
mod connection;

use cli::{Cli, Commands};
use connection::ConnectionManager;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing based on verbosity level
    init_tracing(cli.verbose);

    let (config, config_path) = match &cli.config_file {
        Some(config_file) => {
            let path = std::path::PathBuf::from(config_file);
            debug!("Loading config from explicit path: {:?}", path);
            (Config::load_from_path(&path)?, Some(path))
        }
        None => {
            debug!("Loading config from default location");
            (Config::load()?, None)
        }
    };
    let mut conn_mgr = ConnectionManager::with_config_path(config, config_path);

    if let Err(e) = execute_command(&cli, &mut conn_mgr).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

fn init_tracing(verbose: u8) {
    // RUST_LOG wins over the verbosity flag
    let filter = if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::EnvFilter::from_default_env()
    } else {
        let level = match verbose {
            0 => "rmctl=warn,rmctl_core=warn",
            1 => "rmctl=info,rmctl_core=info",
            2 => "rmctl=debug,rmctl_core=debug",
            _ => "rmctl=trace,rmctl_core=trace",
        };
        tracing_subscriber::EnvFilter::new(level)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(false)
                .with_thread_names(false)
                .compact(),
        )
        .init();

    debug!("Tracing initialized with verbosity level: {}", verbose);
}

async fn execute_command(cli: &Cli, conn_mgr: &mut ConnectionManager) -> Result<()> {
    trace!("Executing command: {:?}", cli.command);
    let profile = cli.profile.as_deref();

    let start = std::time::Instant::now();
    let result = match &cli.command {
        Commands::Version => {
            println!("rmctl {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Commands::Operation(command) => {
            commands::operation::handle_operation_command(conn_mgr, profile, command).await
        }
        Commands::Resource(command) => {
            commands::resource::handle_resource_command(conn_mgr, profile, command).await
        }
        Commands::Profile(command) => {
            commands::profile::handle_profile_command(conn_mgr, profile, command)
        }
    };

    info!(
        "Command completed in {:?} ({})",
        start.elapsed(),
        if result.is_ok() { "success" } else { "failure" }
    );
    result
}
