//! CLI definitions for questlog.

use clap::Parser;

/// Gamified personal task tracker
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    pub config: Option<String>,

    /// Path to database file (overrides config)
    #[arg(short, long)]
    pub database: Option<String>,

    /// Port for the HTTP API (overrides config)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Directory with the built web client (overrides config)
    #[arg(long)]
    pub static_dir: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Logging output: 0/off, 1/stdout, 2/stderr (default), or filename
    #[arg(short, long, default_value = "2")]
    pub log: String,
}
