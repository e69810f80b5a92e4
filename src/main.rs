//! GameSpy login server binary.

use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info, Level};

use gamespy_login::config::LoginConfig;
use gamespy_login::service::Server;
use gamespy_login::utils::logging;

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "gamespy-login")]
#[command(version, about = "GameSpy login handshake server")]
struct Args {
    /// Listen address, overrides the configuration file
    #[arg(short, long, value_name = "ADDR")]
    address: Option<String>,

    /// TOML configuration file
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long)]
    debug: bool,

    /// ANSI colours in log output
    #[arg(long)]
    colorize_logs: bool,

    /// JSON log output
    #[arg(long, conflicts_with = "colorize_logs")]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => LoginConfig::from_file(path)?,
        None => LoginConfig::default(),
    };
    config.apply_env()?;

    if let Some(address) = args.address {
        config.server.address = address;
    }
    if args.debug {
        config.logging.log_level = Level::DEBUG;
    }
    config.logging.colorize |= args.colorize_logs;
    config.logging.json_format |= args.json_logs;

    config.validate_strict()?;
    logging::init(&config.logging)?;

    info!(version = env!("CARGO_PKG_VERSION"), "Starting gamespy-login");

    let server = match Server::bind(config.server.clone()).await {
        Ok(server) => server,
        Err(e) => {
            error!(error = %e, address = %config.server.address, "Failed to bind listen address");
            return Err(e.into());
        }
    };

    server.run().await?;
    Ok(())
}
