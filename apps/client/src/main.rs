//! Courier interactive client.

mod config;
mod repl;

use std::path::Path;

use clap::Parser;
use tokio::io::BufReader;
use tracing_subscriber::EnvFilter;

use courier_client::ClientSession;
use courier_locator::TcpLocator;

#[derive(Parser)]
#[command(name = "courier-client")]
#[command(author, version, about = "Courier interactive file client", long_about = None)]
struct Cli {
    /// Enable verbose diagnostic output
    #[arg(short, long)]
    verbose: bool,

    /// Server registry port
    #[arg(short, long)]
    port: Option<u16>,

    /// Server host name or address
    #[arg(long)]
    host: Option<String>,
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
    config.apply_overrides(cli.host, cli.port, cli.verbose);

    let default_level = if config.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!(
        version = env!("CARGO_PKG_VERSION"),
        host = %config.host,
        port = config.port,
        "starting courier client"
    );

    let locator = TcpLocator::new(config.connect_timeout(), config.call_timeout());
    let session = ClientSession::new(config.session_config(), locator);

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let input = BufReader::new(tokio::io::stdin());
        repl::Repl::new(session, input, std::io::stdout())
            .run()
            .await
    })?;

    Ok(())
}
