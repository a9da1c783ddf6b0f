//! Configuration management for the Zotero MCP server

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use serde::Deserialize;
use thiserror::Error;
use tokio::time::Duration;

use crate::pdf::DEFAULT_EXTRACTION_TIMEOUT_SECS;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 23120;
pub const DEFAULT_SHUTDOWN_GRACE_SECS: u64 = 5;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {name}: '{value}'")]
    Invalid { name: &'static str, value: String },

    #[error("Cannot determine home directory; set ZOTERO_DATA_DIR")]
    NoHomeDir,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub enabled: bool,
    pub server: ServerConfig,
    pub library: LibraryConfig,
    pub extraction: ExtractionConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Time in-flight requests get to finish on stop
    pub shutdown_grace_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LibraryConfig {
    /// Zotero profile directory holding `zotero.sqlite` and `storage/`
    pub data_dir: PathBuf,
    /// JSON snapshot served instead of the SQLite database
    pub snapshot: Option<PathBuf>,
    /// Base directory for relative linked attachments
    pub base_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExtractionConfig {
    pub timeout_secs: u64,
}

impl ServerConfig {
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

impl ExtractionConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            shutdown_grace_secs: DEFAULT_SHUTDOWN_GRACE_SECS,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            enabled: true,
            server: ServerConfig::default(),
            library: LibraryConfig {
                data_dir: default_data_dir().unwrap_or_else(|| PathBuf::from("Zotero")),
                snapshot: None,
                base_dir: None,
            },
            extraction: ExtractionConfig {
                timeout_secs: DEFAULT_EXTRACTION_TIMEOUT_SECS,
            },
        }
    }
}

fn default_data_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join("Zotero"))
}

impl Config {
    /// Read the process environment
    ///
    /// Each invalid variable keeps its default and is reported back.
    pub fn from_env() -> (Self, Vec<ConfigError>) {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build from any variable lookup; unset or invalid variables take their defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> (Self, Vec<ConfigError>) {
        let mut vars = Vars {
            lookup,
            errors: Vec::new(),
        };

        let data_dir = match vars.get("ZOTERO_DATA_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => default_data_dir().unwrap_or_else(|| {
                vars.errors.push(ConfigError::NoHomeDir);
                PathBuf::from("Zotero")
            }),
        };

        let config = Config {
            enabled: vars.parse_or("ZOTERO_MCP_ENABLED", true, parse_bool),
            server: ServerConfig {
                host: vars
                    .get("ZOTERO_MCP_HOST")
                    .unwrap_or_else(|| DEFAULT_HOST.to_string()),
                port: vars.parse_or("ZOTERO_MCP_PORT", DEFAULT_PORT, parse_from_str),
                shutdown_grace_secs: vars.parse_or(
                    "ZOTERO_SHUTDOWN_GRACE_SECS",
                    DEFAULT_SHUTDOWN_GRACE_SECS,
                    parse_from_str,
                ),
            },
            library: LibraryConfig {
                data_dir,
                snapshot: vars.get("ZOTERO_LIBRARY_JSON").map(PathBuf::from),
                base_dir: vars.get("ZOTERO_BASE_DIR").map(PathBuf::from),
            },
            extraction: ExtractionConfig {
                timeout_secs: vars.parse_or(
                    "ZOTERO_EXTRACTION_TIMEOUT_SECS",
                    DEFAULT_EXTRACTION_TIMEOUT_SECS,
                    parse_from_str,
                ),
            },
        };
        (config, vars.errors)
    }
}

struct Vars<F> {
    lookup: F,
    errors: Vec<ConfigError>,
}

impl<F: Fn(&str) -> Option<String>> Vars<F> {
    /// Blank counts as unset
    fn get(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|v| !v.trim().is_empty())
    }

    fn parse_or<T>(&mut self, name: &'static str, default: T, parse: fn(&str) -> Option<T>) -> T {
        let Some(value) = self.get(name) else {
            return default;
        };
        match parse(value.trim()) {
            Some(parsed) => parsed,
            None => {
                self.errors.push(ConfigError::Invalid { name, value });
                default
            }
        }
    }
}

fn parse_from_str<T: FromStr>(value: &str) -> Option<T> {
    value.parse().ok()
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> (Config, Vec<ConfigError>) {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let (config, errors) = config(&[("ZOTERO_DATA_DIR", "/zotero")]);
        assert!(errors.is_empty());
        assert!(config.enabled);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 23120);
        assert_eq!(config.server.shutdown_grace(), Duration::from_secs(5));
        assert_eq!(config.library.data_dir, PathBuf::from("/zotero"));
        assert!(config.library.snapshot.is_none());
        assert_eq!(config.extraction.timeout_secs, 60);
    }

    #[test]
    fn test_overrides() {
        let (config, errors) = config(&[
            ("ZOTERO_MCP_ENABLED", "off"),
            ("ZOTERO_MCP_HOST", "0.0.0.0"),
            ("ZOTERO_MCP_PORT", "8080"),
            ("ZOTERO_DATA_DIR", "/data"),
            ("ZOTERO_LIBRARY_JSON", "/data/library.json"),
            ("ZOTERO_BASE_DIR", "/papers"),
            ("ZOTERO_EXTRACTION_TIMEOUT_SECS", "5"),
            ("ZOTERO_SHUTDOWN_GRACE_SECS", "1"),
        ]);

        assert!(errors.is_empty());
        assert!(!config.enabled);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.library.snapshot, Some(PathBuf::from("/data/library.json")));
        assert_eq!(config.library.base_dir, Some(PathBuf::from("/papers")));
        assert_eq!(config.extraction.timeout(), Duration::from_secs(5));
        assert_eq!(config.server.shutdown_grace_secs, 1);
    }

    #[test]
    fn test_blank_values_use_defaults() {
        let (config, errors) = config(&[("ZOTERO_DATA_DIR", "/zotero"), ("ZOTERO_MCP_PORT", "  ")]);
        assert!(errors.is_empty());
        assert_eq!(config.server.port, DEFAULT_PORT);
    }

    #[test]
    fn test_invalid_values_are_reported() {
        let (config, errors) = config(&[("ZOTERO_DATA_DIR", "/zotero"), ("ZOTERO_MCP_PORT", "99999")]);
        assert_eq!(config.server.port, DEFAULT_PORT);
        assert!(matches!(errors.as_slice(), [ConfigError::Invalid { name: "ZOTERO_MCP_PORT", .. }]));

        let (config, errors) = self::config(&[("ZOTERO_DATA_DIR", "/zotero"), ("ZOTERO_MCP_ENABLED", "maybe")]);
        assert!(config.enabled);
        assert!(matches!(errors.as_slice(), [ConfigError::Invalid { name: "ZOTERO_MCP_ENABLED", .. }]));
    }

    #[test]
    fn test_invalid_value_keeps_other_overrides() {
        let (config, errors) = config(&[
            ("ZOTERO_MCP_ENABLED", "false"),
            ("ZOTERO_MCP_HOST", "0.0.0.0"),
            ("ZOTERO_MCP_PORT", "8080"),
            ("ZOTERO_DATA_DIR", "/data"),
            ("ZOTERO_LIBRARY_JSON", "/data/library.json"),
            ("ZOTERO_SHUTDOWN_GRACE_SECS", "5s"),
        ]);

        assert_eq!(errors.len(), 1);
        assert_eq!(
            errors[0].to_string(),
            "Invalid value for ZOTERO_SHUTDOWN_GRACE_SECS: '5s'"
        );
        assert_eq!(config.server.shutdown_grace_secs, DEFAULT_SHUTDOWN_GRACE_SECS);

        assert!(!config.enabled);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.library.data_dir, PathBuf::from("/data"));
        assert_eq!(config.library.snapshot, Some(PathBuf::from("/data/library.json")));
    }
}
