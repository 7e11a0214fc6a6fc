//! Configuration management for the SpaceNotes daemon.
//!
//! Configuration is loaded from TOML files in the following locations (in order):
//! 1. The platform config directory (`~/Library/Application Support/spacenotes/config.toml` on macOS)
//! 2. `~/.config/spacenotes/config.toml`
//! 3. `./config.toml` (current directory, for development)

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use spacenotes_core::SettleDelays;
use spacenotes_platform_macos::WatcherConfig;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Longest accepted settle delay.
const MAX_SETTLE_MS: u64 = 10_000;

/// Bounds for the space watcher poll interval.
const MIN_POLL_INTERVAL_MS: u64 = 20;
const MAX_POLL_INTERVAL_MS: u64 = 5_000;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Main configuration structure for SpaceNotes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Re-check delays after OS events.
    pub settle: SettleConfig,
    /// Desktop-switch watcher.
    pub watcher: WatcherSection,
    /// Behavior configuration.
    pub behavior: BehaviorConfig,
    /// Note store location.
    pub store: StoreConfig,
}

/// Settle delays in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SettleConfig {
    /// First re-check after a desktop switch.
    #[serde(default = "default_space_change_first_ms")]
    pub space_change_first_ms: u64,

    /// Second re-check after a desktop switch.
    #[serde(default = "default_space_change_second_ms")]
    pub space_change_second_ms: u64,

    /// Re-check after a window drag finishes.
    #[serde(default = "default_drag_ms")]
    pub drag_ms: u64,

    /// Re-lower a pinned note after a header click.
    #[serde(default = "default_pin_restore_ms")]
    pub pin_restore_ms: u64,

    /// Apply the saved pin level after a window appears.
    #[serde(default = "default_initial_pin_ms")]
    pub initial_pin_ms: u64,
}

impl Default for SettleConfig {
    fn default() -> Self {
        Self {
            space_change_first_ms: default_space_change_first_ms(),
            space_change_second_ms: default_space_change_second_ms(),
            drag_ms: default_drag_ms(),
            pin_restore_ms: default_pin_restore_ms(),
            initial_pin_ms: default_initial_pin_ms(),
        }
    }
}

impl SettleConfig {
    /// Convert to the engine's delay set.
    pub fn to_settle_delays(&self) -> SettleDelays {
        SettleDelays {
            space_change_first: Duration::from_millis(self.space_change_first_ms),
            space_change_second: Duration::from_millis(self.space_change_second_ms),
            drag: Duration::from_millis(self.drag_ms),
            pin_restore: Duration::from_millis(self.pin_restore_ms),
            initial_pin: Duration::from_millis(self.initial_pin_ms),
        }
    }
}

/// Desktop-switch watcher configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatcherSection {
    /// Whether to watch for desktop switches at all.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// How often the active space is sampled, in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for WatcherSection {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl WatcherSection {
    pub fn to_watcher_config(&self) -> WatcherConfig {
        WatcherConfig {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
        }
    }
}

/// Behavior-related configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BehaviorConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

/// Note store configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Override for the notes file. Defaults to `notes.json` in the data directory.
    pub path: Option<PathBuf>,
}

impl StoreConfig {
    /// The notes file to use.
    pub fn resolve_path(&self) -> PathBuf {
        if let Some(path) = &self.path {
            return path.clone();
        }
        ProjectDirs::from("", "", "spacenotes")
            .map(|dirs| dirs.data_dir().join("notes.json"))
            .unwrap_or_else(|| PathBuf::from("notes.json"))
    }
}

// Default value functions for serde
fn default_space_change_first_ms() -> u64 {
    100
}

fn default_space_change_second_ms() -> u64 {
    500
}

fn default_drag_ms() -> u64 {
    300
}

fn default_pin_restore_ms() -> u64 {
    100
}

fn default_initial_pin_ms() -> u64 {
    100
}

fn default_poll_interval_ms() -> u64 {
    250
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

/// A value that was out of range and has been replaced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigWarning {
    pub field: &'static str,
    pub message: String,
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

    /// Clamp out-of-range values. Returns one warning per corrected field.
    pub fn validate(&mut self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        let settle = &mut self.settle;
        for (field, value) in [
            ("settle.space_change_first_ms", &mut settle.space_change_first_ms),
            ("settle.space_change_second_ms", &mut settle.space_change_second_ms),
            ("settle.drag_ms", &mut settle.drag_ms),
            ("settle.pin_restore_ms", &mut settle.pin_restore_ms),
            ("settle.initial_pin_ms", &mut settle.initial_pin_ms),
        ] {
            if *value > MAX_SETTLE_MS {
                warnings.push(ConfigWarning {
                    field,
                    message: format!("{} exceeds {}ms, clamped", value, MAX_SETTLE_MS),
                });
                *value = MAX_SETTLE_MS;
            }
        }

        if settle.space_change_second_ms < settle.space_change_first_ms {
            warnings.push(ConfigWarning {
                field: "settle.space_change_second_ms",
                message: format!(
                    "{} is earlier than the first re-check, raised to {}",
                    settle.space_change_second_ms, settle.space_change_first_ms
                ),
            });
            settle.space_change_second_ms = settle.space_change_first_ms;
        }

        let clamped = self
            .watcher
            .poll_interval_ms
            .clamp(MIN_POLL_INTERVAL_MS, MAX_POLL_INTERVAL_MS);
        if clamped != self.watcher.poll_interval_ms {
            warnings.push(ConfigWarning {
                field: "watcher.poll_interval_ms",
                message: format!(
                    "{} outside {}..={}, clamped to {}",
                    self.watcher.poll_interval_ms, MIN_POLL_INTERVAL_MS, MAX_POLL_INTERVAL_MS, clamped
                ),
            });
            self.watcher.poll_interval_ms = clamped;
        }

        let level = self.behavior.log_level.to_lowercase();
        if !LOG_LEVELS.contains(&level.as_str()) {
            warnings.push(ConfigWarning {
                field: "behavior.log_level",
                message: format!("unknown level {:?}, using info", self.behavior.log_level),
            });
            self.behavior.log_level = default_log_level();
        }

        warnings
    }
}

/// Get all possible config file paths in priority order.
pub fn config_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if let Some(proj_dirs) = ProjectDirs::from("", "", "spacenotes") {
        paths.push(proj_dirs.config_dir().join("config.toml"));
    }

    if let Some(home) = dirs_home() {
        paths.push(home.join(".config").join("spacenotes").join("config.toml"));
    }

    paths.push(PathBuf::from("config.toml"));

    paths
}

/// Get the user's home directory.
fn dirs_home() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.settle.space_change_first_ms, 100);
        assert_eq!(config.settle.space_change_second_ms, 500);
        assert_eq!(config.settle.drag_ms, 300);
        assert!(config.watcher.enabled);
        assert_eq!(config.watcher.poll_interval_ms, 250);
        assert_eq!(config.behavior.log_level, "info");
        assert!(config.store.path.is_none());
    }

    #[test]
    fn test_defaults_match_engine_defaults() {
        let delays = Config::default().settle.to_settle_delays();
        assert_eq!(delays, SettleDelays::default());
        assert_eq!(
            Config::default().watcher.to_watcher_config(),
            WatcherConfig::default()
        );
    }

    #[test]
    fn test_config_serialization_roundtrip() {
        let config = Config::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.settle.drag_ms, config.settle.drag_ms);
        assert_eq!(parsed.behavior.log_level, config.behavior.log_level);
    }

    #[test]
    fn test_config_partial_parse() {
        let toml_str = r#"
            [settle]
            drag_ms = 450

            [store]
            path = "/tmp/notes.json"
        "#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.settle.drag_ms, 450);
        assert_eq!(config.settle.space_change_first_ms, 100); // default
        assert_eq!(config.store.resolve_path(), PathBuf::from("/tmp/notes.json"));
    }

    #[test]
    fn test_default_store_path() {
        let path = StoreConfig::default().resolve_path();
        assert!(path.ends_with("notes.json"));
    }

    #[test]
    fn test_validate_accepts_defaults() {
        let mut config = Config::default();
        assert!(config.validate().is_empty());
    }

    #[test]
    fn test_validate_clamps_values() {
        let toml_str = r#"
            [settle]
            space_change_first_ms = 800
            space_change_second_ms = 200
            pin_restore_ms = 60000

            [watcher]
            poll_interval_ms = 1

            [behavior]
            log_level = "loud"
        "#;
        let mut config: Config = toml::from_str(toml_str).unwrap();
        let warnings = config.validate();
        let fields: Vec<&str> = warnings.iter().map(|w| w.field).collect();

        assert_eq!(
            fields,
            vec![
                "settle.pin_restore_ms",
                "settle.space_change_second_ms",
                "watcher.poll_interval_ms",
                "behavior.log_level",
            ]
        );
        assert_eq!(config.settle.pin_restore_ms, MAX_SETTLE_MS);
        assert_eq!(config.settle.space_change_second_ms, 800);
        assert_eq!(config.watcher.poll_interval_ms, MIN_POLL_INTERVAL_MS);
        assert_eq!(config.behavior.log_level, "info");
    }

    #[test]
    fn test_log_level_is_case_insensitive() {
        let mut config = Config::default();
        config.behavior.log_level = "DEBUG".to_string();
        assert!(config.validate().is_empty());
    }

    #[test]
    fn test_load_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[watcher]\nenabled = false\n").unwrap();

        let config = Config::load_from_path(&path).unwrap();
        assert!(!config.watcher.enabled);
    }

    #[test]
    fn test_load_from_path_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[settle\n").unwrap();

        let err = Config::load_from_path(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }

    #[test]
    fn test_config_paths_not_empty() {
        let paths = config_paths();
        assert!(!paths.is_empty());
        assert_eq!(paths.last(), Some(&PathBuf::from("config.toml")));
    }
}
