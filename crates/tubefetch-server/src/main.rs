mod args;
mod commands;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use args::{Cli, Commands, ServeOptions};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "tubefetch=info,tubefetch_core=info",
        1 => "tubefetch=debug,tubefetch_core=debug",
        2 => "tubefetch=trace,tubefetch_core=trace",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    let config_path = cli.config.as_deref();

    match cli.command {
        Some(Commands::Serve(options)) => commands::serve::run(&options, config_path).await,
        Some(Commands::Formats { url, all }) => {
            commands::formats::run(&url, all, config_path).await
        }
        Some(Commands::Download {
            url,
            format_id,
            max_height,
        }) => commands::download::run(&url, format_id, max_height, config_path).await,
        Some(Commands::Doctor) => commands::doctor::run(config_path).await,
        Some(Commands::Config) => commands::config::run(config_path).await,
        None => commands::serve::run(&ServeOptions::default(), config_path).await,
    }
}
