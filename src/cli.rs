//! CLI argument parsing using clap v4
//!
//! Defines the command-line interface for the WWC hub.

use clap::{Parser, Subcommand};

/// WWC Hub - World Wide Cluster rendezvous hub
///
/// Accepts WebSocket connections from requesters and worker sandboxes,
/// fans job fragments out to workers and relays their results back.
#[derive(Parser, Debug)]
#[command(name = "wwc-hub")]
#[command(author, version, about = "WWC Hub - World Wide Cluster rendezvous hub", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for the hub
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the hub
    Serve {
        /// Path to configuration file
        #[arg(short, long, env = "WWC_CONFIG")]
        config: Option<String>,

        /// Interface to bind (overrides config and environment)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind (overrides config and environment)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Display version and build information
    Version,

    /// Configuration management
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

/// Configuration subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum ConfigSubcommand {
    /// Display the current configuration
    Show {
        /// Path to configuration file
        #[arg(short, long)]
        config: Option<String>,
    },

    /// Initialize a new configuration file
    Init {
        /// Path where to create the config file
        #[arg(short, long)]
        path: Option<String>,

        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Validate a configuration file
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        config: Option<String>,
    },
}
