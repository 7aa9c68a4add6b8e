//! Bootstrap configuration loading and folder resolution
//!
//! Every bootstrap value is resolved in the same priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! A missing config file is never fatal: the service logs a warning and
//! starts with defaults.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable holding the catalog connection URL
pub const DATABASE_URL_ENV: &str = "DATABASE_URL";
/// Environment variable overriding the cache folder
pub const CACHE_FOLDER_ENV: &str = "SDOS_CACHE_FOLDER";
/// Environment variable overriding the pathfinder HTTP port
pub const PORT_ENV: &str = "SDOS_PF_PORT";

/// Default catalog URL (local MusicBrainz mirror)
pub const DEFAULT_DATABASE_URL: &str = "postgres://localhost:5432/mb_sdos_db";
/// Default HTTP port of the pathfinder service
pub const DEFAULT_PORT: u16 = 5740;

/// Bootstrap configuration loaded from TOML file
///
/// Read once at startup; the service must restart to pick up changes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Catalog connection URL
    #[serde(default)]
    pub database_url: Option<String>,

    /// HTTP server port
    #[serde(default)]
    pub port: Option<u16>,

    /// Folder holding the graph and artist-name cache artifacts
    #[serde(default)]
    pub cache_folder: Option<PathBuf>,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub graph: GraphConfig,

    #[serde(default)]
    pub catalog: CatalogConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// What a path query does when the graph has not been loaded yet
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Readiness {
    /// Wait for the in-flight load/build to finish
    #[default]
    Wait,
    /// Fail immediately with a "not ready" error
    FailFast,
}

/// Graph build, cache and search tuning
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphConfig {
    /// Sort adjacency lists by neighbor id so tie-breaking is reproducible
    #[serde(default)]
    pub canonical_order: bool,

    /// Treat cache artifacts older than this as stale (no limit when unset)
    #[serde(default)]
    pub max_cache_age_hours: Option<u64>,

    /// Abort a path search after expanding this many nodes (unbounded when unset)
    #[serde(default)]
    pub max_node_expansions: Option<usize>,

    #[serde(default)]
    pub readiness: Readiness,
}

/// Domain filters applied by the catalog when streaming collaborations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Release-group primary/secondary types whose recordings are ignored
    #[serde(default = "default_unwanted_types")]
    pub unwanted_release_group_types: Vec<String>,

    /// Release statuses whose recordings are ignored
    #[serde(default = "default_unwanted_statuses")]
    pub unwanted_release_statuses: Vec<String>,

    /// Release artist credits marking placeholder releases
    #[serde(default = "default_excluded_release_artists")]
    pub excluded_release_artists: Vec<String>,

    /// Label names that mark unlabelled releases
    #[serde(default = "default_excluded_labels")]
    pub excluded_labels: Vec<String>,

    /// ILIKE pattern on credit join phrases marking a "versus" pairing
    #[serde(default = "default_versus_pattern")]
    pub versus_join_pattern: String,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            unwanted_release_group_types: default_unwanted_types(),
            unwanted_release_statuses: default_unwanted_statuses(),
            excluded_release_artists: default_excluded_release_artists(),
            excluded_labels: default_excluded_labels(),
            versus_join_pattern: default_versus_pattern(),
        }
    }
}

fn default_unwanted_types() -> Vec<String> {
    [
        "Compilation",
        "DJ-mix",
        "Audiobook",
        "Audio drama",
        "Field recording",
        "Interview",
        "Live",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_unwanted_statuses() -> Vec<String> {
    vec!["Bootleg".to_string(), "Pseudo-Release".to_string()]
}

fn default_excluded_release_artists() -> Vec<String> {
    vec!["Various Artists".to_string(), "[unknown]".to_string()]
}

fn default_excluded_labels() -> Vec<String> {
    vec!["[no label]".to_string()]
}

fn default_versus_pattern() -> String {
    "%vs%".to_string()
}

/// Load the TOML config from the platform config location
///
/// Missing or unreadable files degrade to defaults with a warning.
pub fn load_toml_config() -> TomlConfig {
    let path = match config_file_path() {
        Ok(path) => path,
        Err(e) => {
            warn!("{}; using built-in defaults", e);
            return TomlConfig::default();
        }
    };

    match load_toml_config_from(&path) {
        Ok(config) => {
            info!("Loaded config file: {}", path.display());
            config
        }
        Err(e) => {
            warn!("Ignoring config file {}: {}", path.display(), e);
            TomlConfig::default()
        }
    }
}

/// Load and parse a TOML config file
pub fn load_toml_config_from(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read TOML failed: {}", e)))?;
    toml::from_str(&content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
}

/// Resolve the catalog connection URL
pub fn resolve_database_url(cli_arg: Option<&str>, config: &TomlConfig) -> String {
    if let Some(url) = cli_arg {
        return url.to_string();
    }

    if let Ok(url) = std::env::var(DATABASE_URL_ENV) {
        if !url.trim().is_empty() {
            return url;
        }
    }

    if let Some(url) = &config.database_url {
        return url.clone();
    }

    DEFAULT_DATABASE_URL.to_string()
}

/// Resolve the cache folder
pub fn resolve_cache_folder(cli_arg: Option<&Path>, config: &TomlConfig) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(CACHE_FOLDER_ENV) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &config.cache_folder {
        return path.clone();
    }

    get_default_cache_folder()
}

/// Resolve the HTTP port
pub fn resolve_port(cli_arg: Option<u16>, config: &TomlConfig) -> u16 {
    if let Some(port) = cli_arg {
        return port;
    }

    if let Some(port) = std::env::var(PORT_ENV).ok().and_then(|p| p.parse().ok()) {
        return port;
    }

    config.port.unwrap_or(DEFAULT_PORT)
}

/// Create a folder (and parents) if it does not exist yet
pub fn ensure_directory_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
        info!("Created folder: {}", path.display());
    }
    Ok(())
}

/// Get default configuration file path for the platform
fn config_file_path() -> Result<PathBuf> {
    if cfg!(target_os = "linux") {
        // Try ~/.config/sdos/config.toml first, then /etc/sdos/config.toml
        let user_config = dirs::config_dir().map(|d| d.join("sdos").join("config.toml"));
        let system_config = PathBuf::from("/etc/sdos/config.toml");

        if let Some(path) = user_config {
            if path.exists() {
                return Ok(path);
            }
        }
        if system_config.exists() {
            return Ok(system_config);
        }
        return Err(Error::Config("No config file found".to_string()));
    }

    let path = dirs::config_dir()
        .map(|d| d.join("sdos").join("config.toml"))
        .ok_or_else(|| Error::Config("Could not determine config directory".to_string()))?;

    if path.exists() {
        Ok(path)
    } else {
        Err(Error::Config(format!("Config file not found: {:?}", path)))
    }
}

/// Get OS-dependent default cache folder
pub fn get_default_cache_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/sdos (or /var/lib/sdos for system-wide)
        dirs::data_local_dir()
            .map(|d| d.join("sdos"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/sdos"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("sdos"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/sdos"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("sdos"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\sdos"))
    } else {
        PathBuf::from("./sdos_data")
    }
}
