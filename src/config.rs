//! Configuration system for the WWC hub
//!
//! Supports multiple configuration sources with the following precedence (highest to lowest):
//! 1. CLI arguments
//! 2. Environment variables (WWC_* prefix, then the bare IP / PORT pair)
//! 3. Configuration file (TOML)
//! 4. Default values

use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::geo::GeoEntry;

/// Main hub configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// Listener settings
    pub server: ServerSettings,

    /// Worker pool topology settings
    pub topology: TopologySettings,

    /// Static geographic enrichment table
    pub geo: GeoSettings,

    /// Logging configuration
    pub logging: LoggingSettings,
}

/// Listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Interface to bind
    pub host: String,

    /// TCP port to bind
    pub port: u16,

    /// Maximum simultaneously connected peers (requesters + workers)
    pub max_connections: usize,

    /// Outbound messages buffered per connection before new ones are dropped
    pub outbound_queue_size: usize,
}

/// Worker pool topology settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TopologySettings {
    /// Pool size at which a joining worker receives the full worker listing
    pub min_pool_size: usize,
}

/// Static geographic enrichment table
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GeoSettings {
    /// Known public IPs and their location
    pub entries: Vec<GeoEntry>,
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Log level: trace, debug, info, warn, error
    pub level: String,

    /// Log file path (empty = no file logging)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,

    /// Maximum log file size in MB before rotation
    pub max_file_size_mb: u64,

    /// Number of rotated log files to keep
    pub max_files: u32,

    /// Enable JSON formatted logging
    pub json_format: bool,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            max_connections: 1024,
            outbound_queue_size: 256,
        }
    }
}

impl Default for TopologySettings {
    fn default() -> Self {
        Self { min_pool_size: 2 }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
            max_file_size_mb: 100,
            max_files: 5,
            json_format: false,
        }
    }
}

impl ServerSettings {
    /// Address string suitable for `TcpListener::bind`
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl HubConfig {
    /// Load configuration from file with environment variable overrides
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(path) = Self::find_config_file(config_path)? {
            debug!(path = %path.display(), "Loading configuration file");
            let content = fs::read_to_string(&path).map_err(|e| Error::IoRead {
                path: path.clone(),
                source: e,
            })?;
            config = Self::from_toml(&content)?;
            info!(path = %path.display(), "Configuration loaded from file");
        }

        config.apply_env_overrides();
        config.expand_paths();
        config.validate()?;

        Ok(config)
    }

    /// Parse a TOML document
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::ConfigParse {
            message: e.message().to_string(),
            source: Some(e),
        })
    }

    /// Find the configuration file to use
    fn find_config_file(explicit_path: Option<&str>) -> Result<Option<PathBuf>> {
        if let Some(path) = explicit_path {
            let path = PathBuf::from(expand_path(path));
            if path.exists() {
                return Ok(Some(path));
            }
            return Err(Error::config_not_found(path));
        }

        let search_paths = [
            PathBuf::from("wwc-hub.toml"),
            dirs::config_dir()
                .map(|p| p.join("wwc").join("hub.toml"))
                .unwrap_or_default(),
            dirs::home_dir()
                .map(|p| p.join(".wwc").join("hub.toml"))
                .unwrap_or_default(),
            PathBuf::from("/etc/wwc/hub.toml"),
        ];

        for path in &search_paths {
            if path.is_file() {
                debug!(path = %path.display(), "Found configuration file");
                return Ok(Some(path.clone()));
            }
        }

        debug!("No configuration file found, using defaults");
        Ok(None)
    }

    /// Apply overrides from the process environment
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary key lookup
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        // Conventional hosting variables first so the prefixed ones win
        if let Some(val) = lookup("IP") {
            self.server.host = val;
        }
        if let Some(n) = lookup("PORT").and_then(|v| v.parse().ok()) {
            self.server.port = n;
        }

        if let Some(val) = lookup("WWC_HOST") {
            self.server.host = val;
        }
        if let Some(n) = lookup("WWC_PORT").and_then(|v| v.parse().ok()) {
            self.server.port = n;
        }
        if let Some(n) = lookup("WWC_MAX_CONNECTIONS").and_then(|v| v.parse().ok()) {
            self.server.max_connections = n;
        }
        if let Some(n) = lookup("WWC_OUTBOUND_QUEUE_SIZE").and_then(|v| v.parse().ok()) {
            self.server.outbound_queue_size = n;
        }
        if let Some(n) = lookup("WWC_MIN_POOL_SIZE").and_then(|v| v.parse().ok()) {
            self.topology.min_pool_size = n;
        }

        if let Some(val) = lookup("WWC_LOG_LEVEL") {
            self.logging.level = val;
        }
        if let Some(val) = lookup("WWC_LOG_FILE") {
            self.logging.file = Some(val);
        }
        if let Some(val) = lookup("WWC_LOG_JSON") {
            self.logging.json_format = val.to_lowercase() == "true" || val == "1";
        }
    }

    /// Apply `serve --host/--port` overrides
    pub fn apply_cli_overrides(&mut self, host: Option<String>, port: Option<u16>) {
        if let Some(host) = host {
            self.server.host = host;
        }
        if let Some(port) = port {
            self.server.port = port;
        }
    }

    /// Expand ~ and other path variables
    fn expand_paths(&mut self) {
        if let Some(ref file) = self.logging.file {
            self.logging.file = Some(expand_path(file));
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.host.trim().is_empty() {
            return Err(Error::config_field_invalid("server.host", "host cannot be empty"));
        }
        if self.server.port == 0 {
            return Err(Error::config_field_invalid("server.port", "port must be non-zero"));
        }
        if self.server.max_connections == 0 {
            return Err(Error::config_field_invalid(
                "server.max_connections",
                "max_connections must be at least 1",
            ));
        }
        if self.server.outbound_queue_size == 0 {
            return Err(Error::config_field_invalid(
                "server.outbound_queue_size",
                "outbound_queue_size must be at least 1",
            ));
        }
        if self.topology.min_pool_size == 0 {
            return Err(Error::config_field_invalid(
                "topology.min_pool_size",
                "min_pool_size must be at least 1",
            ));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(Error::config_field_invalid(
                "logging.level",
                format!(
                    "Invalid log level '{}'. Must be one of: {}",
                    self.logging.level,
                    valid_levels.join(", ")
                ),
            ));
        }

        Ok(())
    }
}

/// Expand ~ and environment variables in paths
fn expand_path(path: &str) -> String {
    shellexpand::full(path)
        .unwrap_or_else(|_| std::borrow::Cow::Borrowed(path))
        .into_owned()
}

/// Initialize a new configuration file
pub fn init_config(path: Option<&str>, force: bool) -> Result<PathBuf> {
    let config_path = path
        .map(|p| PathBuf::from(expand_path(p)))
        .unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".wwc")
                .join("hub.toml")
        });

    if config_path.exists() && !force {
        return Err(Error::Config(format!(
            "Configuration file already exists: {}. Use --force to overwrite.",
            config_path.display()
        )));
    }

    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::IoWrite {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }

    fs::write(&config_path, generate_default_config()).map_err(|e| Error::IoWrite {
        path: config_path.clone(),
        source: e,
    })?;

    Ok(config_path)
}

/// Generate default configuration content with comments
fn generate_default_config() -> String {
    r#"# WWC Hub Configuration

[server]
# Interface to bind (overridden by IP / WWC_HOST)
host = "0.0.0.0"

# TCP port (overridden by PORT / WWC_PORT)
port = 3000

# Maximum simultaneously connected peers
max_connections = 1024

# Outbound messages buffered per connection
outbound_queue_size = 256

[topology]
# Pool size at which a joining worker receives the worker listing
min_pool_size = 2

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log file path (comment out to disable file logging)
# file = "~/.wwc/logs/hub.log"

# Maximum log file size in MB before rotation
max_file_size_mb = 100

# Number of rotated log files to keep
max_files = 5

# Enable JSON formatted logging
json_format = false

# Static geographic enrichment, one table per known public IP
# [[geo.entries]]
# ip = "203.0.113.7"
# country = "US"
# region = "IN"
# city = "West Lafayette"
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = HubConfig::default();
        assert_eq!(config.server.bind_addr(), "0.0.0.0:3000");
        assert_eq!(config.topology.min_pool_size, 2);
        assert_eq!(config.logging.level, "info");
        assert!(config.geo.entries.is_empty());
    }

    #[test]
    fn test_conventional_env_override() {
        let mut config = HubConfig::default();
        config.apply_overrides_from(env_of(&[("IP", "127.0.0.1"), ("PORT", "8080")]));
        assert_eq!(config.server.bind_addr(), "127.0.0.1:8080");
    }

    #[test]
    fn test_prefixed_env_wins() {
        let mut config = HubConfig::default();
        config.apply_overrides_from(env_of(&[
            ("PORT", "8080"),
            ("WWC_PORT", "9090"),
            ("WWC_MIN_POOL_SIZE", "3"),
            ("WWC_LOG_JSON", "1"),
        ]));
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.topology.min_pool_size, 3);
        assert!(config.logging.json_format);
    }

    #[test]
    fn test_unparseable_env_is_ignored() {
        let mut config = HubConfig::default();
        config.apply_overrides_from(env_of(&[("PORT", "not-a-port")]));
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    fn test_cli_overrides() {
        let mut config = HubConfig::default();
        config.apply_cli_overrides(Some("localhost".into()), Some(4000));
        assert_eq!(config.server.bind_addr(), "localhost:4000");
    }

    #[test]
    fn test_validation() {
        assert!(HubConfig::default().validate().is_ok());

        let mut config = HubConfig::default();
        config.server.port = 0;
        assert!(config.validate().is_err());

        let mut config = HubConfig::default();
        config.topology.min_pool_size = 0;
        assert!(config.validate().is_err());

        let mut config = HubConfig::default();
        config.logging.level = "loud".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_config_template_parses() {
        let config = HubConfig::from_toml(&generate_default_config()).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    fn test_parse_config_file() {
        let config_str = r#"
[server]
host = "127.0.0.1"
port = 3100

[topology]
min_pool_size = 4

[[geo.entries]]
ip = "203.0.113.7"
country = "US"
city = "West Lafayette"
"#;

        let config = HubConfig::from_toml(config_str).unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3100);
        assert_eq!(config.server.max_connections, 1024);
        assert_eq!(config.topology.min_pool_size, 4);
        assert_eq!(config.geo.entries.len(), 1);
        assert_eq!(config.geo.entries[0].info.country.as_deref(), Some("US"));
    }

    #[test]
    fn test_parse_error_is_reported() {
        let err = HubConfig::from_toml("[server\nport = 1").unwrap_err();
        assert_eq!(err.code(), crate::error::ErrorCode::ConfigParseError);
    }
}
