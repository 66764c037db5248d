//! Configuration loading and constants.
//!
//! Loads server configuration from a TOML file and defines constants for
//! listener ports, redirect timeouts, the access-log format, and default
//! paths. `ServerConfig` is the root configuration struct.

use serde::Deserialize;
use std::path::Path;

// =============================================================================
// Listener Constants
// =============================================================================

/// Port for the plaintext redirect listener
pub const HTTP_PORT: u16 = 80;

/// Port for the TLS listener
pub const HTTPS_PORT: u16 = 443;

/// Per-request timeout on the redirect listener, in seconds
pub const REDIRECT_TIMEOUT_SECS: u64 = 5;

// =============================================================================
// Access Log Constants
// =============================================================================

/// Placeholder identity logged for every request (no authentication)
pub const ACCESS_LOG_USER: &str = "nobody";

/// Timestamp format for access-log lines (e.g. `23/Aug/2026:14:05:09 +0000`)
pub const ACCESS_LOG_TIME_FORMAT: &str = "%d/%b/%Y:%H:%M:%S %z";

// =============================================================================
// Default Paths and Strings
// =============================================================================

/// Default configuration file path
pub const DEFAULT_CONFIG_PATH: &str = "httpsd.toml";

/// Default log filter when RUST_LOG is not set
pub const DEFAULT_LOG_FILTER: &str = "httpsd=info";

/// Server configuration, immutable after load.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Hostnames served over TLS; also the certificate allow-list
    #[serde(default = "ServerConfig::default_hostnames")]
    pub hostnames: Vec<String>,
    /// Directory used to cache ACME certificates
    #[serde(default = "ServerConfig::default_certs")]
    pub certs: String,
    /// Operational log file; absent means log to stderr
    #[serde(default)]
    pub log: Option<String>,
    /// Access log file; empty string disables access logging
    #[serde(default = "ServerConfig::default_access_log")]
    pub access_log: String,
    /// Use the Let's Encrypt production directory (staging when false)
    #[serde(default = "ServerConfig::default_acme_production")]
    pub acme_production: bool,
    /// Optional ACME contact address, sent as `mailto:`
    #[serde(default)]
    pub acme_email: Option<String>,
}

impl ServerConfig {
    fn default_hostnames() -> Vec<String> {
        vec!["localhost".to_string()]
    }

    fn default_certs() -> String {
        "certs".to_string()
    }

    fn default_access_log() -> String {
        "access_log".to_string()
    }

    fn default_acme_production() -> bool {
        true
    }

    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: ServerConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Access-log path, or `None` when access logging is disabled.
    pub fn access_log_path(&self) -> Option<&str> {
        if self.access_log.is_empty() {
            None
        } else {
            Some(&self.access_log)
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            hostnames: Self::default_hostnames(),
            certs: Self::default_certs(),
            log: None,
            access_log: Self::default_access_log(),
            acme_production: Self::default_acme_production(),
            acme_email: None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}
