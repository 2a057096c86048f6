//! Configuration module for the recorder
//!
//! Holds the server, browse and recording defaults plus the scenarios the
//! headless runner starts with. A configuration file is TOML or JSON,
//! chosen by its extension; every field has a default so partial files load.
//!
//! # App Data Location
//!
//! The default configuration file lives in the platform data directory:
//! - **Linux**: `~/.local/share/dev.opc-recorder/config.toml`
//! - **macOS**: `~/Library/Application Support/dev.opc-recorder/config.toml`
//! - **Windows**: `%APPDATA%\dev.opc-recorder\config.toml`
//!
//! # Example
//!
//! ```toml
//! [server]
//! url = "opc.tcp://plc.local:4840"
//!
//! [browse]
//! path_filter = ["Root", "Objects", "PLC"]
//!
//! [recording]
//! interval_ms = 1000
//! target_count = 3
//!
//! [[scenarios]]
//! name = "Oven"
//! variables = [{ label = "Temp", node_id = "ns=2;i=5" }]
//! ```

use crate::browse::WalkOptions;
use crate::error::{RecorderError, Result};
use crate::recording::{ScenarioSettings, SelectedVariable};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application identifier for data directories
pub const APP_ID: &str = "dev.opc-recorder";

/// Default configuration filename
pub const CONFIG_FILE: &str = "config.toml";

/// Maximum number of server URLs to remember
pub const MAX_RECENT_URLS: usize = 10;

/// Default server endpoint
pub const DEFAULT_SERVER_URL: &str = "opc.tcp://localhost:4840";

/// Default deadline of a single remote read in milliseconds
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 1000;

/// Default sampling interval in milliseconds
pub const DEFAULT_INTERVAL_MS: u64 = 100;

/// Default number of samples per recording
pub const DEFAULT_TARGET_COUNT: usize = 5;

/// Auto-save is on unless turned off
pub const DEFAULT_AUTO_SAVE: bool = true;

/// Default base directory of auto-saved records
pub const DEFAULT_RECORDS_DIR: &str = "Records";

/// Default live view refresh interval in milliseconds
pub const DEFAULT_LIVE_UPDATE_INTERVAL_MS: u64 = 100;

/// Display-name prefix browsed when nothing else is configured
pub const DEFAULT_PATH_FILTER: [&str; 3] = ["Root", "Objects", "PLC"];

// ==================== App Data Directory ====================

/// Get the application data directory path
pub fn app_data_dir() -> Option<PathBuf> {
    dirs_next::data_dir().map(|p| p.join(APP_ID))
}

/// Path of the default configuration file
pub fn default_config_path() -> Option<PathBuf> {
    app_data_dir().map(|p| p.join(CONFIG_FILE))
}

// ==================== Sections ====================

/// Server connection settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub url: String,
    pub read_timeout_ms: u64,
    /// Most recent first
    pub recent_urls: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_SERVER_URL.to_string(),
            read_timeout_ms: DEFAULT_READ_TIMEOUT_MS,
            recent_urls: Vec::new(),
        }
    }
}

impl ServerConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    /// Remember `url`, moving it to the front
    pub fn add_recent_url(&mut self, url: &str) {
        self.recent_urls.retain(|u| u != url);
        self.recent_urls.insert(0, url.to_string());
        self.recent_urls.truncate(MAX_RECENT_URLS);
    }
}

/// Address-space walk settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowseConfig {
    pub path_filter: Option<Vec<String>>,
    pub max_depth: Option<usize>,
    pub max_nodes: Option<usize>,
}

impl Default for BrowseConfig {
    fn default() -> Self {
        Self {
            path_filter: Some(DEFAULT_PATH_FILTER.iter().map(|s| s.to_string()).collect()),
            max_depth: None,
            max_nodes: None,
        }
    }
}

impl From<&BrowseConfig> for WalkOptions {
    fn from(config: &BrowseConfig) -> Self {
        WalkOptions {
            path_filter: config.path_filter.clone(),
            max_depth: config.max_depth,
            max_nodes: config.max_nodes,
        }
    }
}

/// Defaults for new recording scenarios
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingConfig {
    pub interval_ms: u64,
    pub target_count: usize,
    pub auto_save: bool,
    pub records_dir: PathBuf,
    pub live_update_interval_ms: u64,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_INTERVAL_MS,
            target_count: DEFAULT_TARGET_COUNT,
            auto_save: DEFAULT_AUTO_SAVE,
            records_dir: PathBuf::from(DEFAULT_RECORDS_DIR),
            live_update_interval_ms: DEFAULT_LIVE_UPDATE_INTERVAL_MS,
        }
    }
}

impl From<&RecordingConfig> for ScenarioSettings {
    fn from(config: &RecordingConfig) -> Self {
        ScenarioSettings {
            interval: Duration::from_millis(config.interval_ms),
            target_count: config.target_count,
            auto_save: config.auto_save,
            records_dir: config.records_dir.clone(),
            live_interval: Duration::from_millis(config.live_update_interval_ms),
        }
    }
}

/// A variable of a configured scenario
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableConfig {
    pub label: String,
    pub node_id: String,
    #[serde(default = "default_true")]
    pub live: bool,
}

fn default_true() -> bool {
    true
}

impl From<&VariableConfig> for SelectedVariable {
    fn from(config: &VariableConfig) -> Self {
        SelectedVariable {
            label: config.label.clone(),
            node_id: config.node_id.clone(),
            live: config.live,
        }
    }
}

/// A scenario started by the headless runner
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScenarioConfig {
    pub name: String,
    /// Directory path label whose variables are all recorded
    #[serde(default)]
    pub directory: Option<String>,
    #[serde(default)]
    pub variables: Vec<VariableConfig>,
    #[serde(default)]
    pub interval_ms: Option<u64>,
    #[serde(default)]
    pub target_count: Option<usize>,
    #[serde(default)]
    pub auto_save: Option<bool>,
}

impl ScenarioConfig {
    /// Recording defaults with this scenario's overrides applied
    pub fn settings(&self, defaults: &RecordingConfig) -> ScenarioSettings {
        let mut settings = ScenarioSettings::from(defaults);
        if let Some(ms) = self.interval_ms {
            settings.interval = Duration::from_millis(ms);
        }
        if let Some(count) = self.target_count {
            settings.target_count = count;
        }
        if let Some(auto_save) = self.auto_save {
            settings.auto_save = auto_save;
        }
        settings
    }

    pub fn selection(&self) -> Vec<SelectedVariable> {
        self.variables.iter().map(SelectedVariable::from).collect()
    }
}

// ==================== App Config ====================

/// Complete recorder configuration
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub browse: BrowseConfig,
    pub recording: RecordingConfig,
    pub scenarios: Vec<ScenarioConfig>,
}

/// On-disk format, by extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConfigFormat {
    Toml,
    Json,
}

impl ConfigFormat {
    fn of(path: &Path) -> Result<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => Ok(ConfigFormat::Toml),
            Some(ext) if ext.eq_ignore_ascii_case("json") => Ok(ConfigFormat::Json),
            _ => Err(RecorderError::Config(format!(
                "Unsupported config file {:?}, expected .toml or .json",
                path
            ))),
        }
    }
}

impl AppConfig {
    /// Load and validate a configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let format = ConfigFormat::of(path)?;
        let content = std::fs::read_to_string(path).map_err(|e| {
            RecorderError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config: AppConfig = match format {
            ConfigFormat::Toml => toml::from_str(&content).map_err(|e| {
                RecorderError::Config(format!("Failed to parse config file {:?}: {}", path, e))
            })?,
            ConfigFormat::Json => serde_json::from_str(&content).map_err(|e| {
                RecorderError::Config(format!("Failed to parse config file {:?}: {}", path, e))
            })?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file, returning defaults on any error
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Save to disk in the format given by the extension
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let format = ConfigFormat::of(path)?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                RecorderError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let content = match format {
            ConfigFormat::Toml => toml::to_string_pretty(self)
                .map_err(|e| RecorderError::Serialization(e.to_string()))?,
            ConfigFormat::Json => serde_json::to_string_pretty(self)
                .map_err(|e| RecorderError::Serialization(e.to_string()))?,
        };

        std::fs::write(path, content).map_err(|e| {
            RecorderError::Config(format!("Failed to write config file {:?}: {}", path, e))
        })
    }

    /// Reject settings no scenario could run with
    pub fn validate(&self) -> Result<()> {
        if self.server.url.trim().is_empty() {
            return Err(RecorderError::Config("Server URL cannot be empty".to_string()));
        }
        if self.recording.interval_ms == 0 || self.recording.live_update_interval_ms == 0 {
            return Err(RecorderError::Config(
                "Intervals must be greater than zero".to_string(),
            ));
        }
        if self.recording.target_count == 0 {
            return Err(RecorderError::Config(
                "Target count must be greater than zero".to_string(),
            ));
        }
        if self.server.read_timeout_ms == 0 {
            return Err(RecorderError::Config(
                "Read timeout must be greater than zero".to_string(),
            ));
        }

        let mut names = std::collections::HashSet::new();
        for scenario in &self.scenarios {
            let name = scenario.name.trim();
            if name.is_empty() {
                return Err(RecorderError::Config(
                    "Scenario name cannot be empty".to_string(),
                ));
            }
            if !names.insert(name) {
                return Err(RecorderError::Config(format!(
                    "Duplicate scenario name '{}'",
                    name
                )));
            }
            if scenario.interval_ms == Some(0) || scenario.target_count == Some(0) {
                return Err(RecorderError::Config(format!(
                    "Scenario '{}': interval and target count must be greater than zero",
                    name
                )));
            }
        }
        Ok(())
    }

    pub fn walk_options(&self) -> WalkOptions {
        WalkOptions::from(&self.browse)
    }

    pub fn scenario_defaults(&self) -> ScenarioSettings {
        ScenarioSettings::from(&self.recording)
    }
}
