//! Shopdesk Configuration
//!
//! Config file lookup order:
//! 1. Explicit path (`--config`)
//! 2. User config ($XDG_CONFIG_HOME/shopdesk/config.toml or ~/.config/shopdesk/config.toml)
//! 3. System config (/etc/shopdesk/config.toml)
//! 4. Defaults
//!
//! `SHOPDESK_DB` overrides the database path from any source.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// System config path
pub const SYSTEM_CONFIG_PATH: &str = "/etc/shopdesk/config.toml";

/// Environment override for the database path
pub const DB_ENV_VAR: &str = "SHOPDESK_DB";

/// How bulk flag updates treat missing ids
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BulkMode {
    /// One transaction; any missing id aborts the whole batch
    #[default]
    Atomic,
    /// One transaction per id; report every outcome
    BestEffort,
}

impl BulkMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            BulkMode::Atomic => "atomic",
            BulkMode::BestEffort => "best_effort",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "atomic" | "all_or_nothing" => Some(BulkMode::Atomic),
            "best_effort" | "report" => Some(BulkMode::BestEffort),
            _ => None,
        }
    }
}

/// Database settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database file; defaults to the user data directory
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// Status manager settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagerConfig {
    #[serde(default)]
    pub bulk_mode: BulkMode,

    /// Retries after a concurrent-writer conflict (valid: 0-5)
    #[serde(default = "default_conflict_retries")]
    pub max_conflict_retries: u32,

    /// Default number of journal entries shown
    #[serde(default = "default_journal_limit")]
    pub journal_limit: usize,
}

fn default_conflict_retries() -> u32 {
    1
}

fn default_journal_limit() -> usize {
    20
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            bulk_mode: BulkMode::default(),
            max_conflict_retries: default_conflict_retries(),
            journal_limit: default_journal_limit(),
        }
    }
}

impl ManagerConfig {
    /// Clamp max_conflict_retries to 0-5
    pub fn effective_conflict_retries(&self) -> u32 {
        self.max_conflict_retries.min(5)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShopdeskConfig {
    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub manager: ManagerConfig,

    #[serde(default)]
    pub log: LogConfig,
}

impl ShopdeskConfig {
    /// User config path: $XDG_CONFIG_HOME/shopdesk/config.toml or ~/.config/shopdesk/config.toml
    pub fn user_config_path() -> Result<PathBuf> {
        if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
            return Ok(PathBuf::from(xdg).join("shopdesk").join("config.toml"));
        }
        let home = std::env::var("HOME").context("Cannot determine home directory")?;
        Ok(Path::new(&home)
            .join(".config")
            .join("shopdesk")
            .join("config.toml"))
    }

    /// Default database path: $XDG_DATA_HOME/shopdesk/shopdesk.db or ~/.local/share/shopdesk/shopdesk.db
    pub fn default_db_path() -> Result<PathBuf> {
        let base = if let Ok(xdg_data) = std::env::var("XDG_DATA_HOME") {
            PathBuf::from(xdg_data)
        } else if let Ok(home) = std::env::var("HOME") {
            PathBuf::from(home).join(".local/share")
        } else {
            anyhow::bail!("Could not determine user data directory");
        };
        Ok(base.join("shopdesk").join("shopdesk.db"))
    }

    /// Load from an explicit file
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&contents).with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Load using the lookup order in the module docs
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => Self::load_from(path)?,
            None => Self::load_discovered()?,
        };

        if let Ok(db) = std::env::var(DB_ENV_VAR) {
            if !db.is_empty() {
                config.database.path = Some(PathBuf::from(db));
            }
        }
        Ok(config)
    }

    fn load_discovered() -> Result<Self> {
        if let Ok(user_path) = Self::user_config_path() {
            if user_path.exists() {
                return Self::load_from(&user_path);
            }
        }

        let system_path = Path::new(SYSTEM_CONFIG_PATH);
        if system_path.exists() {
            return Self::load_from(system_path);
        }

        Ok(Self::default())
    }

    /// Resolved database path
    pub fn db_path(&self) -> Result<PathBuf> {
        match &self.database.path {
            Some(path) => Ok(path.clone()),
            None => Self::default_db_path(),
        }
    }

    /// Write this config as TOML
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }
        let toml_string = toml::to_string_pretty(self).context("Failed to serialize configuration")?;
        fs::write(path, toml_string).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }
}
