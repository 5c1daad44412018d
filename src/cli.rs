// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines all subcommands and their arguments.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use deployer::output::OutputMode;

#[derive(Parser)]
#[command(name = "deployer")]
#[command(about = "Deploy locally built images to a Docker swarm over SSH")]
#[command(version)]
pub struct Cli {
    /// Config file (defaults to deployer.yml in the current directory)
    #[arg(short, long, global = true)]
    pub file: Option<PathBuf>,

    /// Only print final results
    #[arg(short, long, global = true, conflicts_with = "json")]
    pub quiet: bool,

    /// Print JSON lines
    #[arg(long, global = true)]
    pub json: bool,

    /// Show debug logs
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn output_mode(&self) -> OutputMode {
        if self.json {
            OutputMode::Json
        } else if self.quiet {
            OutputMode::Quiet
        } else {
            OutputMode::Normal
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build and deploy services to the swarm behind HOST
    Up {
        /// SSH destination of a swarm manager: [user@]host[:port]
        host: String,

        /// Service keys from the config, or `all`
        #[arg(required = true)]
        services: Vec<String>,
    },

    /// Manage the local registry container
    Registry {
        #[command(subcommand)]
        action: RegistryAction,
    },

    /// Show who deployed a service and whether it still runs that image
    Inspect {
        /// SSH destination of a swarm manager
        host: String,

        /// Service key from the config, or a swarm service name
        service: String,
    },
}

#[derive(Subcommand)]
pub enum RegistryAction {
    /// Start the local registry (kept running across reboots)
    Start {
        /// Host port to publish (defaults to the configured port)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Stop and remove the local registry
    Stop,
}
