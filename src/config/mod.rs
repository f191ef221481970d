//! Configuration management.
//!
//! Settings are resolved in layers, later layers winning:
//!
//! 1. Built-in defaults
//! 2. A TOML file (`--config`, `MATGRAPH_CONFIG_PATH`, or the platform config dir)
//! 3. `MATGRAPH_*` environment variables (a `.env` file is loaded first)
//!
//! ```toml
//! database_path = "/var/lib/matgraph/matgraph.db"
//!
//! [server]
//! host = "0.0.0.0"
//! port = 8000
//! cors_origins = ["http://localhost:3000"]
//!
//! [logging]
//! format = "json"
//! level = "info"
//!
//! [metrics]
//! enabled = true
//! port = 9090
//! ```

use crate::observability::LogFormat;
use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Name of the database file inside the data directory.
const DATABASE_FILE: &str = "matgraph.db";

/// Main configuration for matgraph.
#[derive(Debug, Clone, PartialEq)]
pub struct MatgraphConfig {
    /// Path to the `SQLite` database.
    pub database_path: PathBuf,
    /// HTTP server settings.
    pub server: ServerConfig,
    /// Logging settings.
    pub logging: LoggingSettings,
    /// Prometheus exporter settings.
    pub metrics: MetricsSettings,
}

/// HTTP server settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Interface to bind.
    pub host: String,
    /// Port to bind.
    pub port: u16,
    /// Allowed CORS origins; empty means any origin.
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            cors_origins: Vec::new(),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    /// Output format.
    pub format: LogFormat,
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
    /// Append logs to this file instead of stderr.
    pub file: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            format: LogFormat::Pretty,
            level: "warn".to_string(),
            file: None,
        }
    }
}

/// Prometheus exporter settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSettings {
    /// Whether to install the exporter.
    pub enabled: bool,
    /// Port of the scrape endpoint.
    pub port: u16,
}

impl Default for MetricsSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            port: 9090,
        }
    }
}

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    /// Database path.
    pub database_path: Option<String>,
    /// Server section.
    pub server: Option<ConfigFileServer>,
    /// Logging section.
    pub logging: Option<ConfigFileLogging>,
    /// Metrics section.
    pub metrics: Option<ConfigFileMetrics>,
}

/// Server section in config file.
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFileServer {
    /// Bind host.
    pub host: Option<String>,
    /// Bind port.
    pub port: Option<u16>,
    /// Allowed CORS origins.
    pub cors_origins: Option<Vec<String>>,
}

/// Logging section in config file.
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFileLogging {
    /// `pretty` or `json`.
    pub format: Option<String>,
    /// Filter directive.
    pub level: Option<String>,
    /// Log file path.
    pub file: Option<String>,
}

/// Metrics section in config file.
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFileMetrics {
    /// Whether the exporter is enabled.
    pub enabled: Option<bool>,
    /// Scrape port.
    pub port: Option<u16>,
}

impl Default for MatgraphConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            server: ServerConfig::default(),
            logging: LoggingSettings::default(),
            metrics: MetricsSettings::default(),
        }
    }
}

impl MatgraphConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves the full configuration for a process.
    ///
    /// An explicit path must exist; the default locations are optional.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file cannot be read or parsed, or if an
    /// environment override has an invalid value.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let _ = dotenvy::dotenv();

        let from_env = std::env::var("MATGRAPH_CONFIG_PATH").ok().map(PathBuf::from);
        let mut config = match explicit.map(Path::to_path_buf).or(from_env) {
            Some(path) => Self::load_from_file(&path)?,
            None => Self::load_default(),
        };
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Loads configuration from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::OperationFailed {
            operation: "read_config_file".to_string(),
            cause: format!("{}: {e}", path.display()),
        })?;

        let file: ConfigFile = toml::from_str(&contents).map_err(|e| Error::OperationFailed {
            operation: "parse_config_file".to_string(),
            cause: e.to_string(),
        })?;

        Self::from_config_file(file)
    }

    /// Loads configuration from the platform config directory
    /// (`~/.config/matgraph/config.toml` on Linux).
    ///
    /// Returns default configuration if no readable config file is found.
    #[must_use]
    pub fn load_default() -> Self {
        let Some(dirs) = directories::ProjectDirs::from("", "", "matgraph") else {
            return Self::default();
        };

        let path = dirs.config_dir().join("config.toml");
        if !path.exists() {
            return Self::default();
        }
        Self::load_from_file(&path).unwrap_or_else(|e| {
            tracing::warn!(path = %path.display(), error = %e, "Ignoring unreadable config file");
            Self::default()
        })
    }

    /// Converts a `ConfigFile` to `MatgraphConfig`.
    fn from_config_file(file: ConfigFile) -> Result<Self> {
        let mut config = Self::default();

        if let Some(path) = file.database_path {
            config.database_path = PathBuf::from(path);
        }
        if let Some(server) = file.server {
            if let Some(host) = server.host {
                config.server.host = host;
            }
            if let Some(port) = server.port {
                config.server.port = port;
            }
            if let Some(origins) = server.cors_origins {
                config.server.cors_origins = origins;
            }
        }
        if let Some(logging) = file.logging {
            if let Some(format) = logging.format {
                config.logging.format = format.parse()?;
            }
            if let Some(level) = logging.level {
                config.logging.level = level;
            }
            config.logging.file = logging.file.map(PathBuf::from);
        }
        if let Some(metrics) = file.metrics {
            if let Some(enabled) = metrics.enabled {
                config.metrics.enabled = enabled;
            }
            if let Some(port) = metrics.port {
                config.metrics.port = port;
            }
        }

        Ok(config)
    }

    /// Applies `MATGRAPH_*` overrides read through `lookup`.
    ///
    /// Empty values are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for an unparseable port, boolean or
    /// log format.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        if let Some(path) = get("MATGRAPH_DATABASE") {
            self.database_path = PathBuf::from(path);
        }
        if let Some(host) = get("MATGRAPH_HOST") {
            self.server.host = host;
        }
        if let Some(port) = get("MATGRAPH_PORT") {
            self.server.port = parse_port("MATGRAPH_PORT", &port)?;
        }
        if let Some(origins) = get("MATGRAPH_CORS_ORIGINS") {
            self.server.cors_origins = origins
                .split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(format) = get("MATGRAPH_LOG_FORMAT") {
            self.logging.format = format.parse()?;
        }
        if let Some(level) = get("MATGRAPH_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(file) = get("MATGRAPH_LOG_FILE") {
            self.logging.file = Some(PathBuf::from(file));
        }
        if let Some(enabled) = get("MATGRAPH_METRICS_ENABLED") {
            self.metrics.enabled = parse_bool("MATGRAPH_METRICS_ENABLED", &enabled)?;
        }
        if let Some(port) = get("MATGRAPH_METRICS_PORT") {
            self.metrics.port = parse_port("MATGRAPH_METRICS_PORT", &port)?;
        }
        Ok(())
    }

    /// Sets the database path.
    #[must_use]
    pub fn with_database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.database_path = path.into();
        self
    }
}

/// `matgraph.db` in the platform data directory, or the working directory
/// when no home directory is known.
fn default_database_path() -> PathBuf {
    directories::ProjectDirs::from("", "", "matgraph").map_or_else(
        || PathBuf::from(DATABASE_FILE),
        |dirs| dirs.data_dir().join(DATABASE_FILE),
    )
}

fn parse_port(key: &str, value: &str) -> Result<u16> {
    value
        .parse()
        .map_err(|_| Error::InvalidInput(format!("{key} must be a port number, got '{value}'")))
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(Error::InvalidInput(format!(
            "{key} must be a boolean, got '{value}'"
        ))),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used, clippy::unwrap_used)]

    use super::*;
    use std::collections::HashMap;
    use test_case::test_case;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let config = MatgraphConfig::new();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.server.host, "127.0.0.1");
        assert!(!config.metrics.enabled);
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert!(config.database_path.ends_with(DATABASE_FILE));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
database_path = "/tmp/kg.db"

[server]
port = 9100
cors_origins = ["http://localhost:3000"]

[logging]
format = "json"
"#,
        )
        .unwrap();

        let config = MatgraphConfig::load_from_file(&path).unwrap();
        assert_eq!(config.database_path, PathBuf::from("/tmp/kg.db"));
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.cors_origins, vec!["http://localhost:3000"]);
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "databse_path = \"typo.db\"\n").unwrap();

        let result = MatgraphConfig::load_from_file(&path);
        assert!(matches!(result, Err(Error::OperationFailed { .. })));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let result = MatgraphConfig::load_from_file(Path::new("/nonexistent/matgraph.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_env_overrides() {
        let vars = env(&[
            ("MATGRAPH_DATABASE", "/data/kg.db"),
            ("MATGRAPH_PORT", "8080"),
            ("MATGRAPH_CORS_ORIGINS", "http://a.test, http://b.test,"),
            ("MATGRAPH_LOG_FORMAT", "JSON"),
            ("MATGRAPH_METRICS_ENABLED", "yes"),
            ("MATGRAPH_HOST", "  "),
        ]);
        let mut config = MatgraphConfig::new();
        config
            .apply_env_overrides(|key| vars.get(key).cloned())
            .unwrap();

        assert_eq!(config.database_path, PathBuf::from("/data/kg.db"));
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.cors_origins, vec!["http://a.test", "http://b.test"]);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert!(config.metrics.enabled);
    }

    #[test_case("MATGRAPH_PORT", "eighty" ; "bad port")]
    #[test_case("MATGRAPH_METRICS_PORT", "70000" ; "port out of range")]
    #[test_case("MATGRAPH_METRICS_ENABLED", "maybe" ; "bad bool")]
    #[test_case("MATGRAPH_LOG_FORMAT", "xml" ; "bad format")]
    fn test_invalid_env_override(key: &str, value: &str) {
        let vars = env(&[(key, value)]);
        let mut config = MatgraphConfig::new();
        let result = config.apply_env_overrides(|k| vars.get(k).cloned());
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }
}
