//! relayd — the standby-relay daemon.
//!
//! Launches the MCP gateway, waits for its health endpoint, and proxies
//! the platform's inbound traffic to it.
//!
//! # Usage
//!
//! ```text
//! relayd run --config relay.toml
//! relayd config --config relay.toml
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::info;

use relay_core::{PlatformEnv, RelayConfig};
use relayd::{App, DEFAULT_LOG_FILTER, Lifecycle};

#[derive(Parser)]
#[command(name = "relayd", about = "MCP gateway supervisor and reverse proxy", version)]
struct Cli {
    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Launch the gateway and proxy traffic to it (standby mode only).
    Run {
        /// Path to relay.toml. Defaults apply when omitted.
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Port to listen on, overriding the platform standby port.
        #[arg(long)]
        port: Option<u16>,
    },
    /// Print the effective configuration as TOML.
    Config {
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<RelayConfig> {
    Ok(match path {
        Some(path) => RelayConfig::from_file(path)?,
        None => RelayConfig::default(),
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_LOG_FILTER));
    if cli.log_json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    match cli.command {
        Command::Run { config, port } => {
            let mut config = load_config(config.as_ref())?;
            if port.is_some() {
                config.proxy.port = port;
            }
            let platform = PlatformEnv::from_env()?;

            let lifecycle = Lifecycle::new();
            lifecycle.listen_for_signals()?;

            App::new(config, platform).run(lifecycle).await?;
            info!("relay stopped");
            Ok(())
        }
        Command::Config { config } => {
            let config = load_config(config.as_ref())?;
            print!("{}", config.to_toml_string()?);
            Ok(())
        }
    }
}
