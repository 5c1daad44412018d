// ABOUTME: Entry point for the deployer CLI application.
// ABOUTME: Parses arguments, sets up logging, and maps outcomes to exit codes.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands, RegistryAction};
use deployer::config::RegistryConfig;
use deployer::error::{Error, Result};
use deployer::output::Output;
use deployer::types::RemoteHost;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing subscriber based on verbose flag
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let output = Output::new(cli.output_mode());
    let code = match run(cli, output.clone()).await {
        Ok(code) => code,
        Err(e) => {
            output.error(&e.to_string());
            1
        }
    };

    std::process::exit(code);
}

async fn run(cli: Cli, output: Output) -> Result<i32> {
    match &cli.command {
        Commands::Up { host, services } => {
            let host = RemoteHost::parse(host)?;
            let (config, path) = commands::load_config(cli.file.as_deref())?;
            commands::up(&config, &path, &host, services, output, cli.verbose).await
        }
        Commands::Registry { action } => {
            let settings = registry_settings(&cli)?;
            match action {
                RegistryAction::Start { port } => {
                    commands::start_registry(&settings, *port, &output).await?
                }
                RegistryAction::Stop => commands::stop_registry(&settings, &output).await?,
            }
            Ok(0)
        }
        Commands::Inspect { host, service } => {
            let host = RemoteHost::parse(host)?;
            let config = match commands::load_config(cli.file.as_deref()) {
                Ok((config, _)) => Some(config),
                Err(Error::ConfigNotFound(_)) if cli.file.is_none() => None,
                Err(e) => return Err(e),
            };
            commands::inspect(config.as_ref(), &host, service, &output).await?;
            Ok(0)
        }
    }
}

/// Registry settings from the config when there is one, defaults otherwise.
fn registry_settings(cli: &Cli) -> Result<RegistryConfig> {
    match commands::load_config(cli.file.as_deref()) {
        Ok((config, _)) => Ok(config.registry),
        Err(Error::ConfigNotFound(_)) if cli.file.is_none() => Ok(RegistryConfig::default()),
        Err(e) => Err(e),
    }
}
