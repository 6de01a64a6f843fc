//! questlog server entry point.

use anyhow::Result;
use clap::Parser;
use questlog::cli::Cli;
use questlog::config::Config;
use questlog::db::Database;
use questlog::server;
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Arc;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on --log option
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    match cli.log.as_str() {
        "0" | "off" => {
            // No logging
        }
        "1" | "stdout" => {
            let subscriber = FmtSubscriber::builder()
                .with_max_level(level)
                .with_writer(std::io::stdout)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        "2" | "stderr" => {
            let subscriber = FmtSubscriber::builder()
                .with_max_level(level)
                .with_writer(std::io::stderr)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        filename => {
            // Log to file (append mode)
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(filename)?;
            let subscriber = FmtSubscriber::builder()
                .with_max_level(level)
                .with_writer(file)
                .with_ansi(false)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
    }

    let mut config = Config::load(cli.config.as_deref().map(Path::new))?;

    // Override config from CLI arguments
    if let Some(db_path) = &cli.database {
        config.server.db_path = db_path.into();
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(static_dir) = &cli.static_dir {
        config.server.static_dir = static_dir.into();
    }

    config.ensure_db_dir()?;

    info!("Starting questlog v{}", env!("CARGO_PKG_VERSION"));
    info!("Database: {:?}", config.server.db_path);
    info!("Static dir: {:?}", config.server.static_dir);
    info!("Port: {}", config.server.port);

    let db = Arc::new(Database::open(&config.server.db_path)?);
    let user = db.default_user()?;

    info!(
        "Tracking progression for '{}' (level {}, {} xp)",
        user.username, user.level, user.xp
    );

    let handle = server::start_server_with_retry(Arc::clone(&db), user.id, &config.server);

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");
    handle.shutdown();

    Ok(())
}
