//! WWC Hub - World Wide Cluster rendezvous hub
//!
//! This is the main entry point for the `wwc-hub` binary.
//! The hub accepts requesters and worker sandboxes over WebSocket, routes
//! job fragments to workers and relays results back to requesters.

use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};

use wwc_hub::cli::{Cli, Commands, ConfigSubcommand};
use wwc_hub::config::{self, HubConfig};
use wwc_hub::error::{Error, Result};
use wwc_hub::hub::Hub;
use wwc_hub::logging;
use wwc_hub::server::HubServer;
use wwc_hub::version;

fn main() {
    if let Err(e) = run() {
        eprint!("{}", e.format_for_terminal());
        std::process::exit(e.exit_code());
    }
}

fn run() -> Result<()> {
    // Parse CLI arguments first (before logging, so we know verbosity)
    let cli = Cli::parse();

    let (config_path, host, port) = match cli.command {
        Commands::Version => {
            version::print_version();
            return Ok(());
        }
        Commands::Config { subcommand } => {
            logging::init_simple(tracing::Level::WARN)?;
            return handle_config_command(subcommand);
        }
        Commands::Serve { config, host, port } => (config, host, port),
    };

    let mut config = HubConfig::load(config_path.as_deref())?;
    config.apply_cli_overrides(host, port);
    config.validate()?;

    // The guard must be kept alive for the lifetime of the program
    let _log_guard = logging::init_logging(&config.logging, cli.verbose, cli.quiet)?;

    let build = version::BuildInfo::current();
    info!(
        version = %build.full_version(),
        target = %build.target,
        profile = %build.profile,
        "Starting WWC hub"
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(num_cpus::get().clamp(1, 8))
        .enable_all()
        .build()
        .map_err(|e| Error::Internal(format!("Failed to create runtime: {}", e)))?;

    runtime.block_on(serve(config))
}

/// Run the listener until ctrl-c
async fn serve(config: HubConfig) -> Result<()> {
    info!(
        bind = %config.server.bind_addr(),
        max_connections = config.server.max_connections,
        min_pool_size = config.topology.min_pool_size,
        geo_entries = config.geo.entries.len(),
        "Configuration loaded"
    );

    let hub = Arc::new(Hub::from_config(&config));
    let server = HubServer::bind(&config.server, Arc::clone(&hub)).await?;

    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
            info!("Shutdown signal received");
        })
        .await?;

    info!(
        connections = hub.connection_count(),
        running_jobs = hub.router().running_job_count(),
        "Hub stopped"
    );
    Ok(())
}

/// Handle configuration subcommands
fn handle_config_command(subcommand: ConfigSubcommand) -> Result<()> {
    match subcommand {
        ConfigSubcommand::Show { config } => {
            let cfg = HubConfig::load(config.as_deref())?;
            println!("{}", toml::to_string_pretty(&cfg)?);
        }
        ConfigSubcommand::Init { path, force } => {
            let path = config::init_config(path.as_deref(), force)?;
            println!("Configuration written to {}", path.display());
        }
        ConfigSubcommand::Validate { config } => {
            HubConfig::load(config.as_deref())?;
            println!("Configuration is valid.");
        }
    }

    Ok(())
}
