//! # courier
//!
//! Interactive Courier client: registers a username, then reads commands
//! from stdin until `salir` or the connection is lost.

#![deny(unsafe_code)]

use std::io::Write as _;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use courier_client::command::HELP;
use courier_client::{ClientError, MessengerClient};
use courier_settings::loader;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Courier interactive client.
#[derive(Parser, Debug)]
#[command(name = "courier", version, about = "Courier interactive client")]
struct Cli {
    /// Username to register.
    #[arg(short = 'u', long)]
    username: Option<String>,

    /// Server port.
    #[arg(short = 'p', long)]
    port: Option<u16>,

    /// Server address.
    #[arg(short = 'd', long)]
    host: Option<String>,

    /// Settings file (defaults to `~/.courier/settings.json`).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log level filter for diagnostics on stderr.
    #[arg(long, default_value = "warn")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings_path = cli.config.unwrap_or_else(loader::settings_path);
    let settings = loader::load_settings_from_path(&settings_path)
        .with_context(|| format!("Failed to load settings from {}", settings_path.display()))?;
    courier_core::logging::init_subscriber(&cli.log_level, settings.logging.json);

    let client_settings = settings.client;
    let username = cli.username.unwrap_or(client_settings.username);
    let addr = format!(
        "{}:{}",
        cli.host.unwrap_or(client_settings.host),
        cli.port.unwrap_or(client_settings.port)
    );
    let timeout = Duration::from_secs(client_settings.connect_timeout_secs);

    let client = match MessengerClient::connect(&addr, username.as_str(), timeout).await {
        Ok(client) => client,
        Err(e) => {
            println!("{e}");
            return Ok(());
        }
    };

    println!("Welcome {username}. Try any of the following commands");
    println!("{HELP}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("{username}@ ");
        std::io::stdout().flush().context("Failed to flush stdout")?;

        let Some(line) = lines.next_line().await.context("Failed to read stdin")? else {
            // end of input ends the session like `salir`
            let _ = client.disconnect().await;
            println!();
            return Ok(());
        };

        match client.execute(&line).await {
            Ok(output) => println!("{output}"),
            Err(e) => {
                println!("{e}");
                if let ClientError::Disconnected { .. } = e {
                    return Ok(());
                }
            }
        }
    }
}
