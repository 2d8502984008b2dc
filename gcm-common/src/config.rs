//! Configuration loading and root folder resolution
//!
//! Bootstrap settings live in `<root>/gcm.toml` (or an explicit `--config`
//! path). A missing file yields defaults; a malformed one is an error.

use crate::clustering::ClusteringEngine;
use crate::workflow::TransitionPolicy;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Environment variable naming the root folder
pub const ROOT_FOLDER_ENV: &str = "GCM_ROOT_FOLDER";

/// Config file name inside the root folder
pub const CONFIG_FILE_NAME: &str = "gcm.toml";

/// Upper bound for a single AI statement generation request
pub const MAX_STATEMENTS_PER_REQUEST: u32 = 50;

/// Bootstrap configuration from TOML file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Root folder override (only honoured from an explicit config path)
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,

    /// Database file, relative to the root folder unless absolute
    #[serde(default = "default_database_file")]
    pub database_file: PathBuf,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub workflow: WorkflowConfig,

    #[serde(default)]
    pub ai: AiConfig,

    #[serde(default)]
    pub events: EventsConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default `EnvFilter` directive when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WorkflowConfig {
    #[serde(default)]
    pub allow_backward_transitions: bool,

    #[serde(default)]
    pub min_statements_to_structure: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AiConfig {
    #[serde(default)]
    pub clustering_engine: ClusteringEngine,

    /// Artificial delay added to each assistant call
    #[serde(default)]
    pub simulated_latency_ms: u64,

    #[serde(default = "default_max_statements")]
    pub max_statements_per_request: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EventsConfig {
    /// Broadcast buffer per bus; slow subscribers past this lag are skipped ahead
    #[serde(default = "default_event_capacity")]
    pub capacity: usize,
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 5740))
}

fn default_database_file() -> PathBuf {
    PathBuf::from("gcm.db")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_statements() -> u32 {
    MAX_STATEMENTS_PER_REQUEST
}

fn default_event_capacity() -> usize {
    1000
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            root_folder: None,
            bind_addr: default_bind_addr(),
            database_file: default_database_file(),
            logging: LoggingConfig::default(),
            workflow: WorkflowConfig::default(),
            ai: AiConfig::default(),
            events: EventsConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_log_level() }
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            clustering_engine: ClusteringEngine::default(),
            simulated_latency_ms: 0,
            max_statements_per_request: default_max_statements(),
        }
    }
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self { capacity: default_event_capacity() }
    }
}

impl WorkflowConfig {
    pub fn policy(&self) -> TransitionPolicy {
        TransitionPolicy {
            allow_backward: self.allow_backward_transitions,
            min_statements_to_structure: self.min_statements_to_structure,
        }
    }
}

impl TomlConfig {
    /// Load from `path`; a missing file yields defaults
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config = Self::parse(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Parse and validate TOML text
    pub fn parse(content: &str) -> Result<Self> {
        let config: TomlConfig =
            toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let max = self.ai.max_statements_per_request;
        if max == 0 || max > MAX_STATEMENTS_PER_REQUEST {
            return Err(Error::Config(format!(
                "ai.max_statements_per_request must be within 1..={}, got {}",
                MAX_STATEMENTS_PER_REQUEST, max
            )));
        }
        if self.events.capacity == 0 {
            return Err(Error::Config("events.capacity must be positive".to_string()));
        }
        if self.logging.level.trim().is_empty() {
            return Err(Error::Config("logging.level must not be empty".to_string()));
        }
        Ok(())
    }

    /// Database path resolved against the root folder
    pub fn database_path(&self, root_folder: &Path) -> PathBuf {
        if self.database_file.is_absolute() {
            self.database_file.clone()
        } else {
            root_folder.join(&self.database_file)
        }
    }
}

/// Root folder resolution, highest priority first:
/// 1. Command-line argument
/// 2. Environment variable
/// 3. `root_folder` from an explicitly named config file
/// 4. OS-dependent default
pub fn resolve_root_folder(cli_arg: Option<&Path>, env_var_name: &str, config_root: Option<&Path>) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = config_root {
        return path.to_path_buf();
    }

    default_root_folder()
}

/// OS-dependent default root folder path
pub fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("gcm"))
        .unwrap_or_else(|| PathBuf::from("./gcm_data"))
}

/// Load config and resolve the root folder in one step
///
/// With an explicit `config_path` the file is read first so its
/// `root_folder` can take part in resolution. Otherwise the root is resolved
/// and `<root>/gcm.toml` is read.
pub fn load(cli_root: Option<&Path>, config_path: Option<&Path>) -> Result<(PathBuf, TomlConfig)> {
    match config_path {
        Some(path) => {
            if !path.exists() {
                return Err(Error::Config(format!("config file not found: {}", path.display())));
            }
            let config = TomlConfig::load(path)?;
            let root = resolve_root_folder(cli_root, ROOT_FOLDER_ENV, config.root_folder.as_deref());
            Ok((root, config))
        }
        None => {
            let root = resolve_root_folder(cli_root, ROOT_FOLDER_ENV, None);
            let config = TomlConfig::load(&root.join(CONFIG_FILE_NAME))?;
            Ok((root, config))
        }
    }
}
