//! Configuration management for the tilework engine.
//!
//! Configuration is loaded from TOML files in the following locations (in order):
//! 1. The platform config directory (`%APPDATA%/tilework/config.toml`,
//!    `~/Library/Application Support/...`, `$XDG_CONFIG_HOME/tilework/...`)
//! 2. `~/.config/tilework/config.toml`
//! 3. `./config.toml` (current directory, for development)

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tilework_core_layout::{NarrowThresholds, MAX_SPLIT_RATIO, MIN_SPLIT_RATIO};
use tilework_ipc::DEFAULT_ENGINE_ADDR;

/// Longest accepted persistence quiet period.
const MAX_PERSIST_DEBOUNCE_MS: u64 = 10_000;

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Tiling engine configuration.
    pub tiling: TilingConfig,
    /// Sockets and backend connection.
    pub ipc: IpcConfig,
    /// Behavior configuration.
    pub behavior: BehaviorConfig,
}

/// Tiling-related configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TilingConfig {
    /// Minimum container width for split, two-thirds and grid layouts.
    #[serde(default = "default_min_width")]
    pub min_width: f64,

    /// Minimum container width for the three-column layout.
    #[serde(default = "default_min_width_three_column")]
    pub min_width_three_column: f64,

    /// Split ratio a fresh engine starts with.
    #[serde(default = "default_split_ratio")]
    pub default_split_ratio: f64,

    /// Quiet period before tiling changes are persisted, in milliseconds.
    #[serde(default = "default_persist_debounce_ms")]
    pub persist_debounce_ms: u64,
}

impl Default for TilingConfig {
    fn default() -> Self {
        Self {
            min_width: default_min_width(),
            min_width_three_column: default_min_width_three_column(),
            default_split_ratio: default_split_ratio(),
            persist_debounce_ms: default_persist_debounce_ms(),
        }
    }
}

impl TilingConfig {
    pub fn thresholds(&self) -> NarrowThresholds {
        NarrowThresholds {
            min_width: self.min_width,
            min_width_three_column: self.min_width_three_column,
        }
    }

    pub fn persist_debounce(&self) -> Duration {
        Duration::from_millis(self.persist_debounce_ms)
    }
}

/// IPC configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IpcConfig {
    /// Address the engine accepts UI and CLI commands on.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Backend address. When unset the engine runs against an in-memory
    /// backend.
    #[serde(default)]
    pub backend_addr: Option<String>,

    /// Timeout for a single backend request, in milliseconds.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for IpcConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            backend_addr: None,
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl IpcConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Behavior-related configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BehaviorConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Workspace assumed when the backend cannot report the active one.
    #[serde(default = "default_workspace")]
    pub default_workspace: String,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            default_workspace: default_workspace(),
        }
    }
}

// Default value functions for serde
fn default_min_width() -> f64 {
    500.0
}

fn default_min_width_three_column() -> f64 {
    600.0
}

fn default_split_ratio() -> f64 {
    0.5
}

fn default_persist_debounce_ms() -> u64 {
    500
}

fn default_listen_addr() -> String {
    DEFAULT_ENGINE_ADDR.to_string()
}

fn default_request_timeout_ms() -> u64 {
    2000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_workspace() -> String {
    "default".to_string()
}

/// A config value that was out of range and has been corrected.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigWarning {
    pub field: String,
    pub message: String,
}

impl ConfigWarning {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl Config {
    /// Load configuration from standard locations.
    ///
    /// Returns default config if no file is found.
    pub fn load() -> Result<Self> {
        let paths = config_paths();

        for path in &paths {
            if path.exists() {
                tracing::info!("Loading config from: {}", path.display());
                return Self::load_from_path(path);
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Load configuration from a specific path.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Clamp out-of-range values, returning one warning per correction.
    pub fn validate(&mut self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();
        let tiling = &mut self.tiling;

        if !(tiling.min_width.is_finite() && tiling.min_width > 0.0) {
            warnings.push(ConfigWarning::new(
                "tiling.min_width",
                format!("{} is not a positive width, using {}", tiling.min_width, default_min_width()),
            ));
            tiling.min_width = default_min_width();
        }

        if !(tiling.min_width_three_column.is_finite() && tiling.min_width_three_column > 0.0) {
            warnings.push(ConfigWarning::new(
                "tiling.min_width_three_column",
                format!(
                    "{} is not a positive width, using {}",
                    tiling.min_width_three_column,
                    default_min_width_three_column()
                ),
            ));
            tiling.min_width_three_column = default_min_width_three_column();
        }

        let ratio = tiling_ratio_in_range(tiling.default_split_ratio);
        if ratio != tiling.default_split_ratio {
            warnings.push(ConfigWarning::new(
                "tiling.default_split_ratio",
                format!(
                    "{} is outside [{MIN_SPLIT_RATIO}, {MAX_SPLIT_RATIO}], using {ratio}",
                    tiling.default_split_ratio
                ),
            ));
            tiling.default_split_ratio = ratio;
        }

        if tiling.persist_debounce_ms > MAX_PERSIST_DEBOUNCE_MS {
            warnings.push(ConfigWarning::new(
                "tiling.persist_debounce_ms",
                format!(
                    "{} exceeds {MAX_PERSIST_DEBOUNCE_MS}, clamping",
                    tiling.persist_debounce_ms
                ),
            ));
            tiling.persist_debounce_ms = MAX_PERSIST_DEBOUNCE_MS;
        }

        if self.ipc.request_timeout_ms == 0 {
            warnings.push(ConfigWarning::new(
                "ipc.request_timeout_ms",
                format!("0 disables every backend call, using {}", default_request_timeout_ms()),
            ));
            self.ipc.request_timeout_ms = default_request_timeout_ms();
        }

        if self.behavior.default_workspace.is_empty() {
            warnings.push(ConfigWarning::new(
                "behavior.default_workspace",
                format!("empty workspace id, using '{}'", default_workspace()),
            ));
            self.behavior.default_workspace = default_workspace();
        }

        warnings
    }
}

fn tiling_ratio_in_range(ratio: f64) -> f64 {
    if ratio.is_nan() {
        return default_split_ratio();
    }
    ratio.clamp(MIN_SPLIT_RATIO, MAX_SPLIT_RATIO)
}

/// Get all possible config file paths in priority order.
pub fn config_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    // 1. Platform standard config directory
    if let Some(proj_dirs) = ProjectDirs::from("", "", "tilework") {
        paths.push(proj_dirs.config_dir().join("config.toml"));
    }

    // 2. Unix-style: ~/.config/tilework/config.toml
    if let Some(home) = dirs_home() {
        let unix_style = home.join(".config").join("tilework").join("config.toml");
        if !paths.contains(&unix_style) {
            paths.push(unix_style);
        }
    }

    // 3. Current directory: ./config.toml
    paths.push(PathBuf::from("config.toml"));

    paths
}

/// Get the user's home directory.
fn dirs_home() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf())
}
