//! Configuration loading and root folder resolution
//!
//! Resolution order for every setting:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! A missing TOML file yields compiled defaults. An unreadable or invalid one
//! is reported as an error; the binary logs it and falls back to defaults.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

/// Environment variable overriding the root folder
pub const ENV_ROOT_FOLDER: &str = "TUNESMITH_ROOT_FOLDER";
/// Environment variable selecting the upstream dialect
pub const ENV_API_PROVIDER: &str = "TUNESMITH_API_PROVIDER";
/// Environment variable overriding the upstream base URL
pub const ENV_API_BASE_URL: &str = "TUNESMITH_API_BASE_URL";
/// Environment variable overriding the poll interval
pub const ENV_POLL_INTERVAL_MS: &str = "TUNESMITH_POLL_INTERVAL_MS";

const APP_DIR_NAME: &str = "tunesmith";
const CONFIG_FILE_NAME: &str = "config.toml";
const CREDENTIALS_FILE_NAME: &str = "credentials.toml";
const TASKS_FILE_NAME: &str = "tasks.json";

/// Upstream API dialect
///
/// Chosen once at startup; every call made by a client goes to the same dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ApiProvider {
    /// sunoapi.org envelope format (`{code, msg, data}`)
    #[default]
    #[serde(rename = "default", alias = "sunoapi")]
    SunoApi,
    /// api.acedata.cloud format (`{success, task_id, data[]}`)
    #[serde(rename = "acedata")]
    AceData,
}

impl ApiProvider {
    /// Base URL used when none is configured
    pub fn default_base_url(&self) -> &'static str {
        match self {
            ApiProvider::SunoApi => "https://api.sunoapi.org/api/v1",
            ApiProvider::AceData => "https://api.acedata.cloud",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ApiProvider::SunoApi => "default",
            ApiProvider::AceData => "acedata",
        }
    }
}

impl fmt::Display for ApiProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApiProvider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "default" | "sunoapi" | "" => Ok(ApiProvider::SunoApi),
            "acedata" => Ok(ApiProvider::AceData),
            other => Err(Error::Config(format!(
                "Unknown API provider '{}' (expected 'default' or 'acedata')",
                other
            ))),
        }
    }
}

/// Compiled-in fallback values
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub root_folder: PathBuf,
    pub log_level: String,
    pub poll_interval_ms: u64,
    pub request_timeout_secs: u64,
}

impl CompiledDefaults {
    pub fn for_current_platform() -> Self {
        Self {
            root_folder: default_root_folder(),
            log_level: "info".to_string(),
            poll_interval_ms: 3000,
            request_timeout_secs: 60,
        }
    }
}

/// `[logging]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// `[api]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    pub provider: ApiProvider,
    /// Overrides the provider's default base URL
    pub base_url: Option<String>,
    pub timeout_secs: u64,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            provider: ApiProvider::default(),
            base_url: None,
            timeout_secs: 60,
        }
    }
}

impl ApiSettings {
    /// Configured base URL, or the provider default, without a trailing slash
    pub fn effective_base_url(&self) -> String {
        self.base_url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| self.provider.default_base_url())
            .trim_end_matches('/')
            .to_string()
    }
}

/// `[polling]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingSettings {
    pub interval_ms: u64,
}

impl Default for PollingSettings {
    fn default() -> Self {
        Self { interval_ms: 3000 }
    }
}

/// Contents of `config.toml`
///
/// Every field has a default so partial files (or older files) still parse.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub root_folder: Option<PathBuf>,
    pub logging: LoggingConfig,
    pub api: ApiSettings,
    pub polling: PollingSettings,
}

impl TomlConfig {
    /// Apply `TUNESMITH_*` environment overrides on top of file values
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(provider) = std::env::var(ENV_API_PROVIDER) {
            self.api.provider = provider.parse()?;
            debug!(provider = %self.api.provider, "API provider set from environment");
        }

        if let Ok(base_url) = std::env::var(ENV_API_BASE_URL) {
            if !base_url.trim().is_empty() {
                self.api.base_url = Some(base_url);
            }
        }

        if let Ok(interval) = std::env::var(ENV_POLL_INTERVAL_MS) {
            self.polling.interval_ms = parse_interval(&interval)?;
        }

        Ok(())
    }

    /// Reject values that cannot drive a client
    pub fn validate(&self) -> Result<()> {
        if self.polling.interval_ms == 0 {
            return Err(Error::Config(
                "[polling] interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.api.timeout_secs == 0 {
            return Err(Error::Config(
                "[api] timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Parse a poll interval in milliseconds; zero is rejected
pub fn parse_interval(raw: &str) -> Result<u64> {
    match raw.trim().parse::<u64>() {
        Ok(0) | Err(_) => Err(Error::Config(format!(
            "Invalid poll interval '{}' (expected a positive number of milliseconds)",
            raw
        ))),
        Ok(ms) => Ok(ms),
    }
}

/// Default location of `config.toml` for the platform
pub fn config_file_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_DIR_NAME).join(CONFIG_FILE_NAME))
}

/// Load a TOML config file
///
/// A missing file is not an error: defaults are returned. A file that exists
/// but cannot be parsed, or holds out-of-range values, is reported as
/// `Error::Config`.
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    if !path.exists() {
        debug!("Config file not found at {}, using defaults", path.display());
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse TOML failed ({}): {}", path.display(), e)))?;
    config.validate()?;
    Ok(config)
}

/// Replace `path` with `contents` via a sibling temp file (write + rename)
pub fn write_atomically(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let tmp_path = path.with_extension("tmp");
    std::fs::write(&tmp_path, contents)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Resolves the root folder holding credentials and task history
pub struct RootFolderResolver {
    module_name: String,
    cli_arg: Option<PathBuf>,
    toml_root: Option<PathBuf>,
}

impl RootFolderResolver {
    pub fn new(module_name: &str) -> Self {
        Self {
            module_name: module_name.to_string(),
            cli_arg: None,
            toml_root: None,
        }
    }

    pub fn with_cli_arg(mut self, path: Option<PathBuf>) -> Self {
        self.cli_arg = path;
        self
    }

    pub fn with_toml_config(mut self, config: &TomlConfig) -> Self {
        self.toml_root = config.root_folder.clone();
        self
    }

    pub fn resolve(&self) -> PathBuf {
        if let Some(path) = &self.cli_arg {
            debug!(module = %self.module_name, "Root folder from command line");
            return path.clone();
        }

        if let Ok(path) = std::env::var(ENV_ROOT_FOLDER) {
            if !path.trim().is_empty() {
                debug!(module = %self.module_name, "Root folder from {}", ENV_ROOT_FOLDER);
                return PathBuf::from(path);
            }
        }

        if let Some(path) = &self.toml_root {
            debug!(module = %self.module_name, "Root folder from TOML config");
            return path.clone();
        }

        CompiledDefaults::for_current_platform().root_folder
    }
}

/// Creates the root folder and names the files inside it
pub struct RootFolderInitializer {
    root_folder: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root_folder: PathBuf) -> Self {
        Self { root_folder }
    }

    pub fn ensure_directory_exists(&self) -> Result<()> {
        if !self.root_folder.exists() {
            std::fs::create_dir_all(&self.root_folder).map_err(|e| {
                Error::Config(format!(
                    "Failed to create root folder {}: {}",
                    self.root_folder.display(),
                    e
                ))
            })?;
            debug!("Created root folder {}", self.root_folder.display());
        }
        Ok(())
    }

    pub fn root_folder(&self) -> &Path {
        &self.root_folder
    }

    /// Key-value file holding the bearer token
    pub fn credentials_path(&self) -> PathBuf {
        self.root_folder.join(CREDENTIALS_FILE_NAME)
    }

    /// Task registry snapshot
    pub fn tasks_path(&self) -> PathBuf {
        self.root_folder.join(TASKS_FILE_NAME)
    }
}

fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join(APP_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from("./tunesmith_data"))
}
