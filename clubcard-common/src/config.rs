//! Configuration loading and config file resolution
//!
//! Resolution priority for every setting:
//! 1. Command-line argument (applied by the binary, highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Default HTTP bind address for the registry service
pub const DEFAULT_BIND: &str = "127.0.0.1:5740";
/// Live tab connected to the membership form
pub const DEFAULT_SHEET_NAME: &str = "Members List";
/// Columns fetched from the sheet (scalars plus Mod1..Mod10)
pub const DEFAULT_RANGE_COLUMNS: &str = "A:Q";
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 1000;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "CLUBCARD_CONFIG";

/// Top-level TOML configuration
///
/// Every section is optional; absent keys fall back to compiled defaults.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TomlConfig {
    /// HTTP bind address (e.g. "127.0.0.1:5740")
    pub bind: Option<String>,
    pub source: SourceConfig,
    pub sync: SyncConfig,
    pub insights: InsightsConfig,
}

/// Tabular source (hosted spreadsheet) settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SourceConfig {
    pub sheet_id: Option<String>,
    pub api_key: Option<String>,
    pub sheet_name: String,
    pub range_columns: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            sheet_id: None,
            api_key: None,
            sheet_name: DEFAULT_SHEET_NAME.to_string(),
            range_columns: DEFAULT_RANGE_COLUMNS.to_string(),
        }
    }
}

/// Write path and post-save reconciliation settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Script endpoint accepting record patches (and serving insights)
    pub script_url: Option<String>,
    /// Wait between a dispatched write and the authoritative reload
    pub settle_delay_ms: u64,
    pub request_timeout_secs: u64,
    pub on_reconcile_failure: ReconcileFailurePolicy,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            script_url: None,
            settle_delay_ms: DEFAULT_SETTLE_DELAY_MS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            on_reconcile_failure: ReconcileFailurePolicy::default(),
        }
    }
}

impl SyncConfig {
    pub fn settle_delay(&self) -> Duration {
        crate::time::millis_to_duration(self.settle_delay_ms)
    }

    /// Timeout applied to every gateway request
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// What a session does when a saved record cannot be found after reload
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileFailurePolicy {
    /// Keep showing the optimistic in-memory record, flagged unverified
    #[default]
    KeepOptimistic,
    /// Drop the selection so the operator must search again
    ClearSelection,
}

/// Remote insights settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct InsightsConfig {
    /// Ask the script endpoint for insights before computing them locally
    pub enabled: bool,
}

impl Default for InsightsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl TomlConfig {
    /// Parse a TOML config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
    }

    /// Effective bind address
    pub fn bind_address(&self) -> &str {
        self.bind.as_deref().unwrap_or(DEFAULT_BIND)
    }

    /// Apply `CLUBCARD_*` environment overrides on top of file values
    pub fn apply_env_overrides(&mut self) {
        if let Some(bind) = env_value("CLUBCARD_BIND") {
            self.bind = Some(bind);
        }
        if let Some(sheet_id) = env_value("CLUBCARD_SHEET_ID") {
            self.source.sheet_id = Some(sheet_id);
        }
        if let Some(api_key) = env_value("CLUBCARD_API_KEY") {
            self.source.api_key = Some(api_key);
        }
        if let Some(url) = env_value("CLUBCARD_SCRIPT_URL") {
            self.sync.script_url = Some(url);
        }
        if let Some(raw) = env_value("CLUBCARD_SETTLE_DELAY_MS") {
            match raw.parse::<u64>() {
                Ok(ms) => self.sync.settle_delay_ms = ms,
                Err(_) => warn!(
                    "Ignoring CLUBCARD_SETTLE_DELAY_MS={:?}: not a millisecond count",
                    raw
                ),
            }
        }
    }
}

/// Read an environment variable, treating blank values as unset
fn env_value(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Locate the config file to load
///
/// Explicit paths (CLI argument, then `CLUBCARD_CONFIG`) are returned even
/// when missing so the caller can report them. Platform locations are only
/// returned if they exist.
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    if let Some(path) = env_value(CONFIG_ENV_VAR) {
        return Some(PathBuf::from(path));
    }

    let user_config = dirs::config_dir().map(|d| d.join("clubcard").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    let system_config = PathBuf::from("/etc/clubcard/config.toml");
    if cfg!(unix) && system_config.exists() {
        return Some(system_config);
    }

    None
}

/// Load configuration with graceful degradation
///
/// A missing config file is not fatal: a warning is logged and compiled
/// defaults are used. A file that exists but does not parse is an error.
/// Environment overrides are applied last.
pub fn load_config(cli_arg: Option<&Path>) -> Result<TomlConfig> {
    let mut config = match resolve_config_path(cli_arg) {
        Some(path) if path.exists() => {
            let config = TomlConfig::from_file(&path)?;
            info!("Loaded config from {}", path.display());
            config
        }
        Some(path) => {
            warn!(
                "Config file {} not found, using compiled defaults",
                path.display()
            );
            TomlConfig::default()
        }
        None => {
            info!("No config file found, using compiled defaults");
            TomlConfig::default()
        }
    };

    config.apply_env_overrides();
    Ok(config)
}
