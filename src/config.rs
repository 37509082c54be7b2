//! Configuration file handling.
//!
//! This module provides loading and saving of lateral-recon configuration
//! from a TOML file.
//!
//! # Configuration Location
//!
//! The configuration file is stored at:
//! - Linux: `~/.config/lateral-recon/config.toml`
//! - macOS: `~/Library/Application Support/lateral-recon/config.toml`
//! - Windows: `%APPDATA%\lateral-recon\config.toml`
//!
//! # Example Configuration
//!
//! ```toml
//! agent_version = "2.3.0"
//! default_format = "table"
//! plugin_index = "/opt/agent/plugins/index.json"
//!
//! [scan]
//! probe_timeout_ms = 1500
//! operation_deadline_ms = 10000
//! max_concurrent_probes = 64
//! max_concurrent_hosts = 8
//! fingerprinters = ["ssh", "http", "mssql"]
//!
//! [fingerprinter_options.http]
//! http_ports = [80, 443, 8443]
//!
//! [collection]
//! deadline_ms = 30000
//! lsa_dump = "/tmp/lsass.json"
//! ```

use anyhow::{Context, Result};
use semver::Version;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::PluginError;
use crate::plugin::version::parse_version;

/// Application configuration.
///
/// Every field has a default, so a partial file (or no file at all) is
/// valid.
///
/// # Example
///
/// ```no_run
/// use lateral_recon::Config;
///
/// let config = Config::load().unwrap();
///
/// println!("Probe timeout: {:?}", config.scan.probe_timeout());
/// println!("Fingerprinters: {:?}", config.scan.fingerprinters);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Version of the running agent, checked against the plugin index.
    ///
    /// Default: this crate's version
    pub agent_version: String,

    /// Default output format when no `--format` flag is provided.
    ///
    /// Valid values: "table", "json"
    /// Default: "table"
    pub default_format: String,

    /// Plugin repository index used to resolve plugin releases.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plugin_index: Option<PathBuf>,

    pub scan: ScanConfig,

    /// Free-form option tables, keyed by fingerprinter name.
    pub fingerprinter_options: HashMap<String, serde_json::Value>,

    pub collection: CollectionConfig,
}

/// Fingerprinting limits and plugin selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Timeout for a single network exchange.
    pub probe_timeout_ms: u64,

    /// How long one fingerprinter may run against one host.
    pub operation_deadline_ms: u64,

    /// Upper bound on probe sockets open at once across all hosts. Each
    /// fingerprinter run holds one permit and keeps one socket open.
    pub max_concurrent_probes: usize,

    pub max_concurrent_hosts: usize,

    /// Enabled fingerprinters. The order decides which plugin's OS
    /// observation wins.
    pub fingerprinters: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionConfig {
    /// How long a credential collector may run before its result is discarded.
    pub deadline_ms: u64,

    /// pypykatz JSON dump read by the `mimikatz` collector.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lsa_dump: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            agent_version: env!("CARGO_PKG_VERSION").to_string(),
            default_format: "table".to_string(),
            plugin_index: None,
            scan: ScanConfig::default(),
            fingerprinter_options: HashMap::new(),
            collection: CollectionConfig::default(),
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            probe_timeout_ms: 1500,
            operation_deadline_ms: 10_000,
            max_concurrent_probes: 64,
            max_concurrent_hosts: 8,
            fingerprinters: vec!["ssh".to_string(), "http".to_string(), "mssql".to_string()],
        }
    }
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            deadline_ms: 30_000,
            lsa_dump: None,
        }
    }
}

impl ScanConfig {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn operation_deadline(&self) -> Duration {
        Duration::from_millis(self.operation_deadline_ms)
    }
}

impl CollectionConfig {
    pub fn deadline(&self) -> Duration {
        Duration::from_millis(self.deadline_ms)
    }
}

impl Config {
    /// Loads configuration from the config file.
    ///
    /// If the config file doesn't exist, returns default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Loads configuration from `path`, or defaults if it doesn't exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;
        Ok(config)
    }

    /// Saves the configuration to the config file.
    ///
    /// Creates the parent directory if it doesn't exist.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Returns the path to the configuration file.
    ///
    /// # Example
    ///
    /// ```
    /// use lateral_recon::Config;
    ///
    /// let path = Config::config_path();
    /// assert!(path.ends_with("lateral-recon/config.toml"));
    /// ```
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("lateral-recon")
            .join("config.toml")
    }

    /// The config file to use: `explicit` when given, else [`Config::config_path`].
    pub fn resolve_path(explicit: Option<&Path>) -> PathBuf {
        explicit
            .map(Path::to_path_buf)
            .unwrap_or_else(Self::config_path)
    }

    /// Writes the default configuration to `path` unless a file is already
    /// there. Returns whether a file was created.
    pub fn init_at(path: &Path) -> Result<bool> {
        if path.exists() {
            return Ok(false);
        }

        Self::default().save_to(path)?;
        Ok(true)
    }

    /// Generates a string containing the default configuration.
    pub fn generate_default_config() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }

    /// Parsed `agent_version`.
    pub fn agent_version(&self) -> Result<Version, PluginError> {
        parse_version(&self.agent_version)
    }

    /// Option table for one fingerprinter, `Null` when none is configured.
    pub fn fingerprinter_options(&self, name: &str) -> serde_json::Value {
        self.fingerprinter_options
            .get(name)
            .cloned()
            .unwrap_or(serde_json::Value::Null)
    }
}
