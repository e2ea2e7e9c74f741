use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use dishtemp_cli::cli::{Cli, Commands};
use dishtemp_cli::commands::{cmd_config, cmd_convert, cmd_simulate};
use dishtemp_cli::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // When quiet mode is enabled, suppress info-level logging
    let filter = if cli.quiet {
        EnvFilter::new("warn")
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config_path = Config::resolve_path(cli.config.as_deref());
    tracing::debug!("Using config file: {}", config_path.display());

    match cli.command {
        Commands::Simulate(args) => {
            let config = Config::load_from(&config_path);
            cmd_simulate(args, &config, cli.no_color).await?;
        }
        Commands::Convert {
            value,
            from,
            format,
        } => {
            cmd_convert(&value, from.into(), format)?;
        }
        Commands::Config { action } => {
            cmd_config(action, &config_path, cli.quiet)?;
        }
    }

    Ok(())
}
