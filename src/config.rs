//! Server configuration.

use derive_getters::Getters;
use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

/// Runtime configuration for the game server.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface to bind.
    host: String,

    /// Port to bind.
    port: u16,

    /// Directory holding one database file per game.
    storage_dir: PathBuf,

    /// Seconds a WebSocket may stay silent before it is closed.
    idle_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            storage_dir: PathBuf::from("storage/games/tictactoe"),
            idle_timeout_secs: 90,
        }
    }
}

impl ServerConfig {
    /// Loads configuration from a TOML file. Missing keys take their defaults.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        debug!("Loading config from file");
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::new(format!("Failed to read config file: {}", e)))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| ConfigError::new(format!("Failed to parse config: {}", e)))?;

        config.validate()?;
        info!(host = %config.host, port = config.port, "Config loaded successfully");
        Ok(config)
    }

    /// Applies command-line overrides on top of this configuration.
    #[instrument(skip(self))]
    pub fn with_overrides(
        mut self,
        host: Option<String>,
        port: Option<u16>,
        storage_dir: Option<PathBuf>,
        idle_timeout_secs: Option<u64>,
    ) -> Result<Self, ConfigError> {
        if let Some(host) = host {
            self.host = host;
        }
        if let Some(port) = port {
            self.port = port;
        }
        if let Some(dir) = storage_dir {
            self.storage_dir = dir;
        }
        if let Some(secs) = idle_timeout_secs {
            self.idle_timeout_secs = secs;
        }
        self.validate()?;
        Ok(self)
    }

    /// Socket address string, e.g. `127.0.0.1:8080`.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::new("host must not be empty".to_string()));
        }
        if self.idle_timeout_secs == 0 {
            return Err(ConfigError::new(
                "idle_timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration error.
#[derive(Debug, Clone, Display, Error)]
#[display("Config error: {} at {}:{}", message, file, line)]
pub struct ConfigError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl ConfigError {
    /// Creates a new configuration error.
    #[track_caller]
    #[instrument(skip(message))]
    pub fn new(message: String) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message,
            line: loc.line(),
            file: loc.file(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr(), "127.0.0.1:8080");
        assert_eq!(config.storage_dir(), &PathBuf::from("storage/games/tictactoe"));
        assert_eq!(*config.idle_timeout_secs(), 90);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "port = 9000\nstorage_dir = \"/tmp/games\"").unwrap();

        let config = ServerConfig::from_file(file.path()).unwrap();
        assert_eq!(*config.port(), 9000);
        assert_eq!(config.host(), "127.0.0.1");
        assert_eq!(config.storage_dir(), &PathBuf::from("/tmp/games"));
    }

    #[test]
    fn test_overrides_win() {
        let config = ServerConfig::default()
            .with_overrides(Some("0.0.0.0".to_string()), Some(1234), None, Some(5))
            .unwrap();
        assert_eq!(config.bind_addr(), "0.0.0.0:1234");
        assert_eq!(*config.idle_timeout_secs(), 5);
    }

    #[test]
    fn test_rejects_zero_timeout() {
        let err = ServerConfig::default()
            .with_overrides(None, None, None, Some(0))
            .unwrap_err();
        assert!(err.message.contains("idle_timeout_secs"));
    }

    #[test]
    fn test_missing_file_errors() {
        assert!(ServerConfig::from_file("/definitely/not/here.toml").is_err());
    }
}
