use std::path::PathBuf;

use cardlobby::{LobbyConfig, LobbyServer};
use clap::Parser;
use tracing_subscriber::EnvFilter;

/// Matchmaking lobby for the card game core.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Platform config file
    #[arg(short, long)]
    config: PathBuf,

    /// Host to bind the lobby port on
    #[arg(short, long, default_value = "0.0.0.0")]
    bind: String,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)),
        )
        .init();

    let config = LobbyConfig::load(&args.config)?;
    tracing::info!(
        config = %args.config.display(),
        port = config.port,
        rooms = %format!("{}-{}", config.room_min_port, config.room_max_port),
        core = %config.core_info.file_name,
        "configuration loaded"
    );

    let server = LobbyServer::builder(config)
        .bind_host(&args.bind)
        .build_with_core()
        .await?;

    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "cannot listen for ctrl-c");
                std::future::pending::<()>().await;
            }
        })
        .await?;
    Ok(())
}
