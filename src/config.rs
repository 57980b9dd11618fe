//! Configuration loading and management
//!
//! Handles parsing of `exsync.toml` configuration files and the
//! environment overrides (`TODOIST_API_KEY`, `EXISTIO_API_KEY`, ...).

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Name of the configuration file looked up in the platform config dir
pub const CONFIG_FILENAME: &str = "exsync.toml";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Debug mode: verbose logging, job failures are propagated
    #[serde(default)]
    pub debug: bool,

    /// Path of the task -> tag binding file
    #[serde(default = "default_data_filename")]
    pub data_filename: PathBuf,

    /// Todoist configuration
    #[serde(default)]
    pub todoist: TodoistConfig,

    /// Exist.io configuration
    #[serde(default)]
    pub existio: ExistioConfig,

    /// Synchronization behaviour
    #[serde(default)]
    pub sync: SyncConfig,

    /// Webhook server configuration
    #[serde(default)]
    pub server: ServerConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            debug: false,
            data_filename: default_data_filename(),
            todoist: TodoistConfig::default(),
            existio: ExistioConfig::default(),
            sync: SyncConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

fn default_data_filename() -> PathBuf {
    PathBuf::from("data.txt")
}

/// Todoist API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TodoistConfig {
    /// Personal API token
    #[serde(default)]
    pub api_key: String,

    /// REST API base URL
    #[serde(default = "default_todoist_api_url")]
    pub api_url: String,

    /// App client secret used to verify webhook signatures (empty disables)
    #[serde(default)]
    pub client_secret: String,
}

fn default_todoist_api_url() -> String {
    "https://api.todoist.com/rest/v2/".to_string()
}

impl Default for TodoistConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_url: default_todoist_api_url(),
            client_secret: String::new(),
        }
    }
}

/// Exist.io API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExistioConfig {
    /// OAuth2 / personal token
    #[serde(default)]
    pub api_key: String,

    /// API base URL
    #[serde(default = "default_existio_api_url")]
    pub api_url: String,
}

fn default_existio_api_url() -> String {
    "https://exist.io/api/2/".to_string()
}

impl Default for ExistioConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_url: default_existio_api_url(),
        }
    }
}

/// Synchronization configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Prefix marking a comment as a command
    #[serde(default = "default_command_prefix")]
    pub command_prefix: String,

    /// Hour of day at which the effective date rolls over
    #[serde(default = "default_day_boundary_hour")]
    pub day_boundary_hour: u32,

    /// Months before the current one that are reconciled
    #[serde(default = "default_update_window")]
    pub update_window: u32,

    /// Months reconciled by a forced refresh from the CLI
    #[serde(default = "default_force_update_window")]
    pub force_update_window: u32,

    /// The previous month is regenerated while day-of-month is below this
    #[serde(default = "default_prior_month_cutoff_day")]
    pub prior_month_cutoff_day: u32,
}

fn default_command_prefix() -> String {
    "existio:".to_string()
}

fn default_day_boundary_hour() -> u32 {
    4
}

/// Largest number of months before the current one a refresh may cover.
pub const MAX_UPDATE_WINDOW: u32 = 24;

fn default_update_window() -> u32 {
    2
}

fn default_force_update_window() -> u32 {
    12
}

fn default_prior_month_cutoff_day() -> u32 {
    10
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            command_prefix: default_command_prefix(),
            day_boundary_hour: default_day_boundary_hour(),
            update_window: default_update_window(),
            force_update_window: default_force_update_window(),
            prior_month_cutoff_day: default_prior_month_cutoff_day(),
        }
    }
}

/// Webhook server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Socket address to listen on
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Timeout for outbound API requests
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_bind() -> String {
    "0.0.0.0:8000".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Resolve configuration: explicit path, then the platform config dir,
    /// then defaults. Environment overrides are applied last.
    pub fn resolve(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load(path)?,
            None => match default_config_path() {
                Some(path) if path.exists() => Self::load(&path)?,
                _ => Self::default(),
            },
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides using the given lookup.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("TODOIST_API_KEY") {
            self.todoist.api_key = value.trim().to_string();
        }
        if let Some(value) = lookup("TODOIST_CLIENT_SECRET") {
            self.todoist.client_secret = value.trim().to_string();
        }
        if let Some(value) = lookup("EXISTIO_API_KEY") {
            self.existio.api_key = value.trim().to_string();
        }
        if let Some(value) = lookup("DATA_FILENAME") {
            if !value.trim().is_empty() {
                self.data_filename = PathBuf::from(value.trim());
            }
        }
        if let Some(value) = lookup("DEBUG") {
            self.debug = parse_bool(&value);
        }
    }

    /// Fail when either API key is missing.
    pub fn require_credentials(&self) -> Result<()> {
        if self.todoist.api_key.trim().is_empty() {
            return Err(Error::MissingCredential("TODOIST_API_KEY"));
        }
        if self.existio.api_key.trim().is_empty() {
            return Err(Error::MissingCredential("EXISTIO_API_KEY"));
        }
        Ok(())
    }

    /// Write the configuration as TOML, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        crate::lock::write_atomic(path, content.as_bytes())
    }

    fn validate(&self) -> Result<()> {
        self.sync.validate()?;
        if self.server.request_timeout_secs == 0 {
            return Err(Error::InvalidConfig(
                "server.request_timeout_secs must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

impl SyncConfig {
    fn validate(&self) -> Result<()> {
        let prefix = self.command_prefix.trim();
        if prefix.is_empty() {
            return Err(Error::InvalidConfig(
                "sync.command_prefix cannot be empty".to_string(),
            ));
        }
        if prefix.starts_with('/') {
            return Err(Error::InvalidConfig(
                "sync.command_prefix cannot start with '/'".to_string(),
            ));
        }
        if self.day_boundary_hour > 23 {
            return Err(Error::InvalidConfig(
                "sync.day_boundary_hour must be <= 23".to_string(),
            ));
        }
        if !(1..=31).contains(&self.prior_month_cutoff_day) {
            return Err(Error::InvalidConfig(
                "sync.prior_month_cutoff_day must be between 1 and 31".to_string(),
            ));
        }
        if self.update_window > MAX_UPDATE_WINDOW || self.force_update_window > MAX_UPDATE_WINDOW {
            return Err(Error::InvalidConfig(format!(
                "sync.update_window must be <= {MAX_UPDATE_WINDOW}"
            )));
        }
        Ok(())
    }
}

/// Platform-specific default config location (e.g. `~/.config/exsync/exsync.toml`).
pub fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "exsync")
        .map(|dirs| dirs.config_dir().join(CONFIG_FILENAME))
}

/// Lenient boolean parsing for environment flags: `false`, `0` and the
/// empty string are false, everything else is true.
pub fn parse_bool(raw: &str) -> bool {
    let value = raw.trim().to_lowercase();
    !matches!(value.as_str(), "" | "false" | "0")
}
