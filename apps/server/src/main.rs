//! Courier server entry point.

mod app;
mod config;

use std::path::Path;

use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "courier-server")]
#[command(author, version, about = "Courier file server", long_about = None)]
struct Cli {
    /// Enable verbose diagnostic output
    #[arg(short, long)]
    verbose: bool,

    /// Registry port to listen on
    #[arg(short, long)]
    port: Option<u16>,
}

fn main() -> anyhow::Result<()> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            std::process::exit(0);
        }
    };

    let mut config = config::Config::load(Path::new(config::CONFIG_FILE))?;
    config.apply_overrides(cli.port, cli.verbose);

    let default_level = if config.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        port = config.port,
        "starting courier server"
    );

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(app::run(config))?;

    tracing::info!("server shut down cleanly");
    Ok(())
}
