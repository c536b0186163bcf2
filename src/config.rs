//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `$MAILIAS_CONFIG` (environment variable)
//! 2. `~/.config/mailias/config.toml` (Linux)
//!    `~/Library/Application Support/mailias/config.toml` (macOS)
//! 3. Built-in defaults
//!
//! Command-line flags override values from the file.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General behavior settings.
    pub general: GeneralConfig,
    /// Where to look and what to collect.
    pub harvest: HarvestConfig,
    /// Alias file handling.
    pub store: StoreConfig,
    /// Purge and impersonal-address filtering.
    pub filter: FilterConfig,
}

/// General behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Override cache directory for logs.
    pub cache_dir: Option<PathBuf>,
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
}

/// What to scan and how to read it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvestConfig {
    /// Alias file to update. A leading `~/` is expanded.
    pub alias_file: PathBuf,
    /// Mail directories to scan (Maildir or flat directories of messages).
    pub sources: Vec<PathBuf>,
    /// Address headers to collect from, e.g. `["to", "cc"]`.
    pub headers: Vec<String>,
    /// Only use messages younger than this many days (0 = no limit).
    pub max_age_days: u32,
    /// Keep commas in stored display names.
    pub keep_comma_in_display_name: bool,
}

/// Alias file handling.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Keep a copy of the previous alias file.
    pub backup: bool,
    /// Suffix for the backup copy.
    pub backup_suffix: String,
    /// Create the alias file if it does not exist.
    pub create: bool,
    /// Start from an empty alias file (the old one becomes the backup).
    pub fresh: bool,
}

/// Purge and filter passes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Remove every previously generated entry before merging.
    pub purge: bool,
    /// Skip impersonal addresses among the new entries.
    pub filter_new: bool,
    /// Remove impersonal addresses from the whole alias file.
    pub filter_all: bool,
}

// ── Default implementations ─────────────────────────────────────

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            cache_dir: None,
            log_level: "warn".to_string(),
        }
    }
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            alias_file: PathBuf::from("~/.mutt/aliases"),
            sources: Vec::new(),
            headers: vec!["to".to_string()],
            max_age_days: 0,
            keep_comma_in_display_name: false,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backup: true,
            backup_suffix: ".bak".to_string(),
            create: true,
            fresh: false,
        }
    }
}

// ── Load ────────────────────────────────────────────────────────

/// Load configuration, searching standard locations.
///
/// Returns the default configuration if no file is found or on parse error.
pub fn load_config() -> Config {
    match config_file_path() {
        Some(path) if path.exists() => load_config_from(&path),
        _ => Config::default(),
    }
}

/// Load configuration from an explicit file, falling back to defaults.
pub fn load_config_from(path: &Path) -> Config {
    match std::fs::read_to_string(path) {
        Ok(contents) => match toml::from_str::<Config>(&contents) {
            Ok(cfg) => {
                tracing::info!(path = %path.display(), "Loaded config");
                cfg
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Failed to parse config, using defaults"
                );
                Config::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "Failed to read config file, using defaults"
            );
            Config::default()
        }
    }
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    // 1. Environment variable override
    if let Ok(env_path) = std::env::var("MAILIAS_CONFIG") {
        return Some(PathBuf::from(env_path));
    }

    // 2. Standard config directory
    dirs::config_dir().map(|d| d.join("mailias").join("config.toml"))
}

/// Return the cache directory for logs.
pub fn cache_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.cache_dir {
        return expand_home(dir);
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mailias")
}

/// Expand a leading `~` to the home directory. Other paths are returned as-is.
pub fn expand_home(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match dirs::home_dir() {
        Some(home) => home.join(rest),
        None => path.to_path_buf(),
    }
}
