//! Server configuration
//!
//! Read from a YAML or JSON file (YAML is a superset, one parser covers both).
//! Missing fields fall back to defaults; CLI flags override afterwards.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_ENDPOINT: &str = "/mcp";

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Which transport the server is exposed on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TransportMode {
    /// Newline-delimited JSON-RPC on stdin/stdout
    #[default]
    Stdio,
    /// Streamable HTTP
    Http {
        #[serde(default = "default_host")]
        host: String,
        #[serde(default = "default_port")]
        port: u16,
        #[serde(default = "default_endpoint")]
        endpoint: String,
    },
}

impl TransportMode {
    pub fn http(port: u16) -> Self {
        Self::Http {
            host: default_host(),
            port,
            endpoint: default_endpoint(),
        }
    }
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Server configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    pub name: String,
    pub version: String,
    /// `tracing` filter directive, e.g. `info` or `emcp_core=debug`
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub transport: TransportMode,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: "emcp-server".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            log_level: default_log_level(),
            transport: TransportMode::default(),
        }
    }
}

impl ServerConfig {
    /// Load and validate a config file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config = Self::parse(&contents)?;
        debug!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::Invalid("name must not be empty".to_string()));
        }
        if let TransportMode::Http { endpoint, port, .. } = &self.transport {
            if !endpoint.starts_with('/') {
                return Err(ConfigError::Invalid(format!(
                    "endpoint must start with '/': {endpoint}"
                )));
            }
            if endpoint == "/health" {
                return Err(ConfigError::Invalid("endpoint /health is reserved".to_string()));
            }
            if *port == 0 {
                return Err(ConfigError::Invalid("port must be non-zero".to_string()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_yaml_with_defaults() {
        let config = ServerConfig::parse(
            r#"
name: weather
version: "2.1.0"
transport:
  type: http
  port: 8080
"#,
        )
        .unwrap();

        assert_eq!(config.name, "weather");
        assert_eq!(config.log_level, "info");
        assert_eq!(
            config.transport,
            TransportMode::Http {
                host: "127.0.0.1".to_string(),
                port: 8080,
                endpoint: "/mcp".to_string()
            }
        );
    }

    #[test]
    fn test_parse_json() {
        let config = ServerConfig::parse(
            r#"{"name": "json-server", "version": "1.0.0", "logLevel": "debug"}"#,
        )
        .unwrap();

        assert_eq!(config.transport, TransportMode::Stdio);
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn test_rejects_relative_endpoint() {
        let err = ServerConfig::parse(
            r#"
name: bad
version: "1"
transport:
  type: http
  endpoint: mcp
"#,
        )
        .unwrap_err();

        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "name: from-file\nversion: \"0.3.0\"").unwrap();

        let config = ServerConfig::load(file.path()).unwrap();
        assert_eq!(config.name, "from-file");
        assert_eq!(config.version, "0.3.0");
    }

    #[test]
    fn test_missing_file() {
        let err = ServerConfig::load(Path::new("/nonexistent/emcp.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
