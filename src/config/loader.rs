use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::rename::HistoryFile;
use crate::utils::{deserialize_duration, serialize_duration};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenameConfig {
    pub enabled: bool,
    #[serde(
        deserialize_with = "deserialize_duration",
        serialize_with = "serialize_duration"
    )]
    pub poll_interval: Duration,
    #[serde(
        deserialize_with = "deserialize_duration",
        serialize_with = "serialize_duration"
    )]
    pub timeout: Duration,
    /// Defaults to the agent CLI's own history file.
    pub history_path: Option<PathBuf>,
    pub generator_command: String,
    pub generator_args: Vec<String>,
}

impl Default for RenameConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval: Duration::from_secs(2),
            timeout: Duration::from_secs(600),
            history_path: None,
            generator_command: "claude".to_string(),
            generator_args: vec!["-p".to_string(), "--model".to_string(), "haiku".to_string()],
        }
    }
}

impl RenameConfig {
    pub fn history_path(&self) -> PathBuf {
        self.history_path
            .clone()
            .unwrap_or_else(HistoryFile::default_path)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `tracing` filter directive; `RUST_LOG` takes precedence.
    pub level: String,
    /// Dashboard log directory. Defaults to the platform state/cache dir.
    pub dir: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            dir: None,
        }
    }
}

impl LogConfig {
    pub fn log_dir(&self) -> PathBuf {
        self.dir.clone().unwrap_or_else(|| {
            dirs::state_dir()
                .or_else(dirs::cache_dir)
                .unwrap_or_else(|| PathBuf::from("."))
                .join("treedeck")
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Run once in the worktree before the session's panes are created.
    pub startup_command: Option<String>,
    /// Typed into the centre pane of every newly created session.
    pub agent_command: Option<String>,
    /// Relative paths are resolved against the repository root.
    pub worktree_dir: PathBuf,
    #[serde(
        deserialize_with = "deserialize_duration",
        serialize_with = "serialize_duration"
    )]
    pub status_poll_interval: Duration,
    pub rename: RenameConfig,
    pub log: LogConfig,
    /// File the values were read from, if any.
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            startup_command: None,
            agent_command: Some("claude".to_string()),
            worktree_dir: PathBuf::from(".treedeck/worktrees"),
            status_poll_interval: Duration::from_secs(2),
            rename: RenameConfig::default(),
            log: LogConfig::default(),
            source: None,
        }
    }
}

impl Config {
    pub fn load(config_path: Option<PathBuf>) -> Result<Self> {
        let path = config_path.unwrap_or_else(Self::default_config_path);

        if path.exists() {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            let mut config: Config = serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?;
            config.source = Some(path);
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    pub fn default_config_path() -> PathBuf {
        if let Some(config_path) = std::env::var_os("TREEDECK_CONFIG") {
            PathBuf::from(config_path)
        } else {
            dirs::config_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("treedeck")
                .join("config.yaml")
        }
    }

    pub fn startup_command(&self) -> Option<&str> {
        non_empty(self.startup_command.as_deref())
    }

    pub fn agent_command(&self) -> Option<&str> {
        non_empty(self.agent_command.as_deref())
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}
