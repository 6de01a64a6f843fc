//! Configuration types and loading.
//!
//! Configuration comes from a YAML file (explicit `--config` path,
//! `questlog.yaml` in the working directory, or `~/.questlog/config.yaml`),
//! with every field defaulting so a missing file is not an error. CLI
//! arguments override file values in `main`.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default port for the HTTP API.
pub const DEFAULT_PORT: u16 = 3000;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Port for the HTTP API (default: 3000).
    #[serde(default = "default_port")]
    pub port: u16,

    /// Directory with the built web client, served at the root.
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,

    /// Initial retry delay in milliseconds when the port bind fails.
    #[serde(default = "default_retry_initial_ms")]
    pub retry_initial_ms: u64,

    /// Jitter range in milliseconds for the retry delay.
    #[serde(default = "default_retry_jitter_ms")]
    pub retry_jitter_ms: u64,

    /// Maximum retry interval in milliseconds.
    #[serde(default = "default_retry_max_ms")]
    pub retry_max_ms: u64,

    /// Exponential backoff multiplier.
    #[serde(default = "default_retry_multiplier")]
    pub retry_multiplier: f64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            port: default_port(),
            static_dir: default_static_dir(),
            retry_initial_ms: default_retry_initial_ms(),
            retry_jitter_ms: default_retry_jitter_ms(),
            retry_max_ms: default_retry_max_ms(),
            retry_multiplier: default_retry_multiplier(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("questlog.db")
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_static_dir() -> PathBuf {
    PathBuf::from("client/dist")
}

fn default_retry_initial_ms() -> u64 {
    1_000
}

fn default_retry_jitter_ms() -> u64 {
    500
}

fn default_retry_max_ms() -> u64 {
    30_000
}

fn default_retry_multiplier() -> f64 {
    2.0
}

impl Config {
    /// Load configuration from the first location that exists:
    /// an explicit path, `questlog.yaml` next to the process, or
    /// `~/.questlog/config.yaml`. Falls back to defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        let local = PathBuf::from("questlog.yaml");
        if local.exists() {
            return Self::from_file(&local);
        }

        if let Some(home) = dirs::home_dir() {
            let user = home.join(".questlog").join("config.yaml");
            if user.exists() {
                return Self::from_file(&user);
            }
        }

        Ok(Self::default())
    }

    fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&text)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Create the database file's parent directory if needed.
    pub fn ensure_db_dir(&self) -> Result<()> {
        if let Some(parent) = self.server.db_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_when_no_file() {
        let config = Config::default();
        assert_eq!(config.server.port, DEFAULT_PORT);
        assert_eq!(config.server.db_path, PathBuf::from("questlog.db"));
        assert_eq!(config.server.retry_multiplier, 2.0);
    }

    #[test]
    fn partial_yaml_fills_in_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "server:\n  port: 8080").unwrap();

        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.db_path, PathBuf::from("questlog.db"));
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let result = Config::load(Some(Path::new("/nonexistent/questlog.yaml")));
        assert!(result.is_err());
    }
}
