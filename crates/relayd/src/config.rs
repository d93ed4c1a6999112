//! Relay configuration.
//!
//! Values are layered: built-in defaults, then an optional TOML file, then
//! the `RELAY_LISTEN` environment variable, then command-line flags (applied
//! by the binary).
//!
//! ```toml
//! listen = "0.0.0.0:12345"
//! max_line_length = 1048576
//! # idle_timeout_secs = 600
//! ```

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use relay_protocol::DEFAULT_PORT;

/// Environment variable overriding the listen address.
pub const LISTEN_ENV: &str = "RELAY_LISTEN";

/// Environment variable naming a config file.
pub const CONFIG_ENV: &str = "RELAY_CONFIG";

/// Default maximum line length (1 MB)
pub const DEFAULT_MAX_LINE_LENGTH: usize = 1_048_576;

/// Runtime configuration for the relay daemon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RelayConfig {
    /// Address the listener binds to
    pub listen: SocketAddr,

    /// Longest accepted inbound line in bytes; a longer line ends the connection
    pub max_line_length: usize,

    /// Close connections that send nothing for this many seconds.
    ///
    /// Absent by default: an idle client keeps its nickname forever.
    pub idle_timeout_secs: Option<u64>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), DEFAULT_PORT),
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
            idle_timeout_secs: None,
        }
    }
}

impl RelayConfig {
    /// Loads config from a TOML file.
    ///
    /// The file must exist; an explicitly named config that is missing is
    /// an error rather than a silent fallback to defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Self::from_toml(&contents).map_err(|e| match e {
            ConfigError::Parse { error } => ConfigError::ParseFile {
                path: path.to_path_buf(),
                error,
            },
            other => other,
        })
    }

    /// Parses and validates config from TOML text.
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(contents).map_err(|e| ConfigError::Parse {
            error: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Applies `RELAY_LISTEN` if it is set.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        match std::env::var(LISTEN_ENV) {
            Ok(value) => self.apply_listen_override(LISTEN_ENV, &value),
            Err(_) => Ok(()),
        }
    }

    /// Replaces the listen address with `value`, attributing errors to `source`.
    pub fn apply_listen_override(&mut self, source: &str, value: &str) -> Result<(), ConfigError> {
        self.listen = value.trim().parse().map_err(|_| ConfigError::InvalidValue {
            field: source.to_string(),
            value: value.to_string(),
            expected: "a socket address such as 0.0.0.0:12345".to_string(),
        })?;
        Ok(())
    }

    /// Keeps the listen host but uses `port`.
    pub fn with_port(mut self, port: u16) -> Self {
        self.listen.set_port(port);
        self
    }

    /// Idle timeout as a duration, if configured.
    pub fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout_secs.map(Duration::from_secs)
    }

    /// Checks values that parse but cannot work.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_line_length == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_line_length".to_string(),
                value: "0".to_string(),
                expected: "a positive number of bytes".to_string(),
            });
        }
        if self.idle_timeout_secs == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "idle_timeout_secs".to_string(),
                value: "0".to_string(),
                expected: "a positive number of seconds, or omit the key".to_string(),
            });
        }
        Ok(())
    }
}

/// Errors that can occur when loading config.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {}: {error}", .path.display())]
    Read { path: PathBuf, error: String },

    #[error("Failed to parse config: {error}")]
    Parse { error: String },

    #[error("Failed to parse config {}: {error}", .path.display())]
    ParseFile { path: PathBuf, error: String },

    #[error("Invalid {field}: {value} (expected {expected})")]
    InvalidValue {
        field: String,
        value: String,
        expected: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = RelayConfig::default();
        assert_eq!(config.listen.port(), 12345);
        assert!(config.listen.ip().is_unspecified());
        assert_eq!(config.max_line_length, DEFAULT_MAX_LINE_LENGTH);
        assert_eq!(config.idle_timeout(), None);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = RelayConfig::from_toml("idle_timeout_secs = 30\n").unwrap();
        assert_eq!(config.idle_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.listen, RelayConfig::default().listen);
    }

    #[test]
    fn test_full_toml() {
        let config = RelayConfig::from_toml(
            r#"
            listen = "127.0.0.1:4000"
            max_line_length = 512
            "#,
        )
        .unwrap();
        assert_eq!(config.listen, "127.0.0.1:4000".parse().unwrap());
        assert_eq!(config.max_line_length, 512);
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = RelayConfig::from_toml("port = 1\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_zero_values_rejected() {
        let err = RelayConfig::from_toml("max_line_length = 0\n").unwrap_err();
        assert!(err.to_string().contains("max_line_length"));

        let err = RelayConfig::from_toml("idle_timeout_secs = 0\n").unwrap_err();
        assert!(err.to_string().contains("idle_timeout_secs"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "listen = \"127.0.0.1:5555\"").unwrap();

        let config = RelayConfig::load(file.path()).unwrap();
        assert_eq!(config.listen.port(), 5555);
    }

    #[test]
    fn test_load_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");

        let err = RelayConfig::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
        assert!(err.to_string().contains("absent.toml"));
    }

    #[test]
    fn test_load_parse_error_names_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "listen = 12").unwrap();

        let err = RelayConfig::load(file.path()).unwrap_err();
        assert!(err.to_string().contains(&file.path().display().to_string()));
    }

    #[test]
    fn test_listen_override() {
        let mut config = RelayConfig::default();
        config
            .apply_listen_override("--listen", "127.0.0.1:9000")
            .unwrap();
        assert_eq!(config.listen, "127.0.0.1:9000".parse().unwrap());

        let err = config
            .apply_listen_override(LISTEN_ENV, "not-an-address")
            .unwrap_err();
        assert!(err.to_string().contains(LISTEN_ENV));
    }

    #[test]
    fn test_with_port_keeps_host() {
        let mut config = RelayConfig::default();
        config.apply_listen_override("test", "127.0.0.1:1").unwrap();

        let config = config.with_port(2020);
        assert_eq!(config.listen, "127.0.0.1:2020".parse().unwrap());
    }
}
