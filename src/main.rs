pub mod types;
pub mod config;
pub mod error;
pub mod data;
pub mod status;
pub mod processing;
pub mod timestamp;
pub mod render;
pub mod pipeline;
pub mod server;

use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the map page, rebuilding it from both sources on every request
    Serve {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
    },
    /// Render the map page once and print it to stdout
    Render {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Serve { config } => {
            info!(config = ?config, "serving map");
            let app_config = config::AppConfig::load_from_file(config)?;
            let source = status::ConfiguredSource::from_config(&app_config.status)?;

            server::start_server(app_config, source).await?;
        }
        Commands::Render { config } => {
            info!(config = ?config, "rendering map page");
            let app_config = config::AppConfig::load_from_file(config)?;
            let source = status::ConfiguredSource::from_config(&app_config.status)?;

            let page = pipeline::build_page(&app_config, &source).await?;
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(page.as_bytes())?;
            stdout.flush()?;
        }
    }

    Ok(())
}
