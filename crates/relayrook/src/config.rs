//! Server configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ServerError;

/// Where the server listens.
///
/// Loaded from a JSON file or assembled from command-line flags; every
/// field has a default so a bare `relayrook` invocation just works.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface to bind.
    pub host: String,
    /// TCP port to listen on. Zero asks the OS for an ephemeral port.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 4578,
        }
    }
}

impl ServerConfig {
    /// The `host:port` string handed to the listener.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Reads a JSON config file. Missing fields fall back to defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ServerError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_the_stock_server() {
        let config = ServerConfig::default();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 4578);
        assert_eq!(config.bind_addr(), "127.0.0.1:4578");
    }

    #[test]
    fn test_partial_json_keeps_defaults_for_the_rest() {
        let config: ServerConfig = serde_json::from_str(r#"{"port": 9000}"#)
            .expect("parse partial config");
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 9000);
    }

    #[test]
    fn test_from_file_round_trips() {
        let path = std::env::temp_dir().join("relayrook-config-test.json");
        std::fs::write(&path, r#"{"host": "0.0.0.0", "port": 1234}"#)
            .expect("write config file");

        let config = ServerConfig::from_file(&path).expect("load config");
        assert_eq!(config.bind_addr(), "0.0.0.0:1234");

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_missing_file_is_an_io_error() {
        let err = ServerConfig::from_file("/nonexistent/relayrook.json")
            .expect_err("file should not exist");
        assert!(matches!(err, ServerError::Io(_)));
    }

    #[test]
    fn test_garbage_file_is_a_config_error() {
        let path = std::env::temp_dir().join("relayrook-garbage-test.json");
        std::fs::write(&path, "not json at all").expect("write file");

        let err = ServerConfig::from_file(&path).expect_err("not parseable");
        assert!(matches!(err, ServerError::Config(_)));

        std::fs::remove_file(&path).ok();
    }
}
