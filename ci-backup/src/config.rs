//! Configuration management for the backup tool.
//!
//! Loads configuration from a TOML file; command-line flags and environment
//! variables are applied on top by the binary.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::utils::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub backup: BackupConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// CI server base URL
    #[serde(default = "default_url")]
    pub url: String,

    /// Basic auth user; anonymous access when unset
    #[serde(default)]
    pub username: Option<String>,

    /// Password or API token
    #[serde(default)]
    pub password: Option<String>,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupConfig {
    /// Root of the config store; the manifest is written here too
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Manifest file name inside `data_dir`
    #[serde(default = "default_file_name")]
    pub file_name: String,

    /// Highest build index (0-based, newest first) captured and replayed per job
    #[serde(default = "default_build_depth")]
    pub build_depth: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default values
fn default_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("jenkins_data")
}

fn default_file_name() -> String {
    "jenkins_data.json".to_string()
}

fn default_build_depth() -> usize {
    3
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            username: None,
            password: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            file_name: default_file_name(),
            build_depth: default_build_depth(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig::default(),
            backup: BackupConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    /// Full path of the manifest file
    pub fn manifest_path(&self) -> PathBuf {
        self.backup.data_dir.join(&self.backup.file_name)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.server.timeout_secs)
    }

    /// Credentials are only used when both halves are present.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.server.username, &self.server.password) {
            (Some(user), Some(pass)) => Some((user.as_str(), pass.as_str())),
            _ => None,
        }
    }
}
