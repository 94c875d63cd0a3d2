//! Configuration module for the file index mirror.
//!
//! This module provides a layered configuration system that supports:
//! - Default values
//! - TOML configuration file
//! - Environment variable overrides
//! - CLI argument overrides
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `FSI_` and use double underscores
//! to separate nested levels:
//! - `FSI_WATCH__ROOT=/srv/data` sets `watch.root`
//! - `FSI_WORKER__URL=http://indexer:8080/task` sets `worker.url`
//! - `FSI_SEARCH__ENABLED=false` sets `search.enabled`

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Directory holding the workspace settings file.
pub const CONFIG_DIR: &str = ".fsindex";

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Version of the configuration schema
    #[serde(default = "default_version")]
    pub version: u32,

    /// Watched tree settings
    #[serde(default)]
    pub watch: WatchConfig,

    /// External indexing worker settings
    #[serde(default)]
    pub worker: WorkerConfig,

    /// Completion callback endpoint
    #[serde(default)]
    pub callback: CallbackConfig,

    /// Remote full-text search index
    #[serde(default)]
    pub search: SearchConfig,

    /// Logging levels
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct WatchConfig {
    /// Root of the mirrored tree
    #[serde(default = "default_watch_root")]
    pub root: PathBuf,

    /// Quiet period before a path's events are coalesced and forwarded
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Feed every existing file to the pipeline after the startup walk
    #[serde(default = "default_true")]
    pub index_on_startup: bool,

    /// Skip files and directories whose name starts with `.`
    #[serde(default = "default_true")]
    pub ignore_hidden: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct WorkerConfig {
    /// URL the index tasks are posted to
    #[serde(default = "default_worker_url")]
    pub url: String,

    /// Timeout for a single task submission
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Short retry window used while idle or after a transport failure
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// How long a dispatched task may hold the in-flight slot
    #[serde(default = "default_max_task_duration_secs")]
    pub max_task_duration_secs: u64,

    /// Capacity of the task intake and callback channels
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CallbackConfig {
    /// Address the callback HTTP listener binds to
    #[serde(default = "default_callback_bind")]
    pub bind: String,

    /// Route receiving worker completion callbacks
    #[serde(default = "default_callback_path")]
    pub path: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SearchConfig {
    /// Mirror parseable documents into the search index directly
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_search_url")]
    pub url: String,

    /// Index name documents are written to
    #[serde(default = "default_search_index")]
    pub index: String,

    #[serde(default = "default_search_username")]
    pub username: String,

    #[serde(default = "default_search_password")]
    pub password: String,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Default filter directive (`error`, `warn`, `info`, `debug`, `trace`)
    #[serde(default = "default_log_level")]
    pub default: String,

    /// Per-target overrides, e.g. `fsindex::tasks = "debug"`
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

// Default value functions
fn default_version() -> u32 {
    1
}
fn default_true() -> bool {
    true
}
fn default_watch_root() -> PathBuf {
    PathBuf::from("/data")
}
fn default_debounce_ms() -> u64 {
    1000
}
fn default_worker_url() -> String {
    "http://localhost:8080/api/indexer".to_string()
}
fn default_request_timeout_secs() -> u64 {
    60
}
fn default_poll_interval_ms() -> u64 {
    5000
}
fn default_max_task_duration_secs() -> u64 {
    30 * 60
}
fn default_channel_capacity() -> usize {
    1024
}
fn default_callback_bind() -> String {
    "0.0.0.0:6317".to_string()
}
fn default_callback_path() -> String {
    "/callback/vector".to_string()
}
fn default_search_url() -> String {
    "http://localhost:4080".to_string()
}
fn default_search_index() -> String {
    "Files".to_string()
}
fn default_search_username() -> String {
    "admin".to_string()
}
fn default_search_password() -> String {
    "User#123".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            watch: WatchConfig::default(),
            worker: WorkerConfig::default(),
            callback: CallbackConfig::default(),
            search: SearchConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            root: default_watch_root(),
            debounce_ms: default_debounce_ms(),
            index_on_startup: true,
            ignore_hidden: true,
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            url: default_worker_url(),
            request_timeout_secs: default_request_timeout_secs(),
            poll_interval_ms: default_poll_interval_ms(),
            max_task_duration_secs: default_max_task_duration_secs(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl Default for CallbackConfig {
    fn default() -> Self {
        Self {
            bind: default_callback_bind(),
            path: default_callback_path(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: default_search_url(),
            index: default_search_index(),
            username: default_search_username(),
            password: default_search_password(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default: default_log_level(),
            modules: HashMap::new(),
        }
    }
}

impl WatchConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

impl WorkerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn max_task_duration(&self) -> Duration {
        Duration::from_secs(self.max_task_duration_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Settings {
    /// Load configuration from all sources
    pub fn load() -> Result<Self, Box<figment::Error>> {
        // Try to find the workspace config by walking up from the current directory
        let config_path = Self::find_workspace_config()
            .unwrap_or_else(|| PathBuf::from(CONFIG_DIR).join("settings.toml"));

        Self::load_from(config_path)
    }

    /// Load configuration from a specific file, still honoring env overrides
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, Box<figment::Error>> {
        Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path.as_ref()))
            // Double underscore separates nested levels, single underscore stays
            .merge(Env::prefixed("FSI_").map(|key| {
                key.as_str().to_lowercase().replace("__", ".").into()
            }))
            .extract()
            .map_err(Box::new)
    }

    /// Find the settings file by looking for a `.fsindex` directory
    /// from the current directory up to the filesystem root
    fn find_workspace_config() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;

        for ancestor in current.ancestors() {
            let config_dir = ancestor.join(CONFIG_DIR);
            if config_dir.is_dir() {
                return Some(config_dir.join("settings.toml"));
            }
        }

        None
    }

    /// Save current configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), Box<dyn std::error::Error>> {
        let parent = path.as_ref().parent().ok_or("Invalid path")?;
        std::fs::create_dir_all(parent)?;

        let toml_string = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_string)?;

        Ok(())
    }

    /// Create a default settings file under `.fsindex/`
    pub fn init_config_file(force: bool) -> Result<PathBuf, Box<dyn std::error::Error>> {
        let config_path = PathBuf::from(CONFIG_DIR).join("settings.toml");

        if !force && config_path.exists() {
            return Err("Configuration file already exists. Use --force to overwrite".into());
        }

        Settings::default().save(&config_path)?;
        Ok(config_path)
    }
}
