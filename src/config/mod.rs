//! Configuration
//!
//! Layered from an optional TOML file and `REALIP__`-prefixed environment
//! variables (`REALIP__PROXY_PROTOCOL__ENABLED=true`).

mod proxy;
mod toggle;

use std::fmt;
use std::net::SocketAddr;
use std::path::Path;

use serde::Deserialize;

pub use proxy::{FailurePolicy, ProxyProtocolConfig};
pub use toggle::FeatureToggle;

/// Default bind address for the host endpoint server
pub const DEFAULT_BIND: &str = "127.0.0.1:8088";

/// Environment variable prefix
const ENV_PREFIX: &str = "REALIP";

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub log: LogConfig,
    pub proxy_protocol: ProxyProtocolConfig,
}

/// Host endpoint server configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the sniff/ingress/API endpoints listen on
    pub bind: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 8088)),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Filter directive used when RUST_LOG is unset
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Errors loading configuration
#[derive(Debug)]
pub enum ConfigError {
    /// Source could not be read or deserialized
    Load(config::ConfigError),
    /// Values were read but are not usable
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Load(e) => write!(f, "failed to load configuration: {}", e),
            ConfigError::Invalid(msg) => write!(f, "invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Load(e) => Some(e),
            ConfigError::Invalid(_) => None,
        }
    }
}

impl From<config::ConfigError> for ConfigError {
    fn from(e: config::ConfigError) -> Self {
        ConfigError::Load(e)
    }
}

impl Config {
    /// Load from an optional file, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        let config: Config = builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse from a TOML document without consulting the environment.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Config = config::Config::builder()
            .add_source(config::File::from_str(s, config::FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.proxy_protocol.validate().map_err(ConfigError::Invalid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config.server.bind.to_string(), DEFAULT_BIND);
        assert_eq!(config.log.level, "info");
        assert!(!config.proxy_protocol.enabled);
        assert_eq!(
            config.proxy_protocol.timeout_duration(),
            Duration::from_secs(5)
        );
        assert_eq!(config.proxy_protocol.on_error, FailurePolicy::Passthrough);
    }

    #[test]
    fn test_parse_toml() {
        let config = Config::from_toml_str(
            r#"
            [server]
            bind = "0.0.0.0:9000"

            [log]
            level = "debug"

            [proxy_protocol]
            enabled = true
            timeout = 2
            on_error = "reject"
            max_header_len = 1024
            "#,
        )
        .unwrap();

        assert_eq!(config.server.bind.port(), 9000);
        assert_eq!(config.log.level, "debug");
        assert!(config.proxy_protocol.enabled);
        assert_eq!(config.proxy_protocol.timeout, 2);
        assert_eq!(config.proxy_protocol.on_error, FailurePolicy::Reject);
        assert_eq!(config.proxy_protocol.max_header_len, 1024);
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let err = Config::from_toml_str("[proxy_protocol]\ntimeout = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_unknown_policy_rejected() {
        let err = Config::from_toml_str("[proxy_protocol]\non_error = \"retry\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Load(_)));
    }
}
