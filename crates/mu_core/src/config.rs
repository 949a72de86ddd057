//! Environment-driven configuration.
//!
//! # Responsibility
//! - Resolve server/store/seed/logging settings from `MU_API_*` variables.
//! - Fall back to defaults for unset variables.
//!
//! # Invariants
//! - Invalid values are reported as `ConfigError`, never a panic.

use crate::logging::{default_log_level, LogSettings, LoggingError};
use crate::model::patch::MergePolicy;
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub const PORT_VAR: &str = "MU_API_PORT";
pub const DB_PATH_VAR: &str = "MU_API_DB_PATH";
pub const LOG_LEVEL_VAR: &str = "MU_API_LOG_LEVEL";
pub const LOG_DIR_VAR: &str = "MU_API_LOG_DIR";
pub const MERGE_POLICY_VAR: &str = "MU_API_MERGE_POLICY";
pub const SEED_FILE_VAR: &str = "MU_API_SEED_FILE";

const DEFAULT_PORT: u16 = 3000;

/// Resolved process configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub port: u16,
    /// SQLite file. `None` selects the in-memory repository.
    pub db_path: Option<PathBuf>,
    /// JSON array of sites created at startup when not already stored.
    pub seed_file: Option<PathBuf>,
    pub log: LogSettings,
    pub merge_policy: MergePolicy,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
    Logging(LoggingError),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidValue { key, value, reason } => {
                write!(f, "invalid {key} value `{value}`: {reason}")
            }
            Self::Logging(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Logging(err) => Some(err),
            Self::InvalidValue { .. } => None,
        }
    }
}

impl From<LoggingError> for ConfigError {
    fn from(value: LoggingError) -> Self {
        Self::Logging(value)
    }
}

impl Config {
    /// Reads configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads configuration through `lookup`, which returns a variable's value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &'static str| {
            let value = lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty());
            if value.is_none() {
                info!("event=config_default module=config status=ok key={key}");
            }
            value
        };

        let port = match var(PORT_VAR) {
            Some(raw) => raw.parse::<u16>().map_err(|err| ConfigError::InvalidValue {
                key: PORT_VAR,
                value: raw.clone(),
                reason: err.to_string(),
            })?,
            None => DEFAULT_PORT,
        };

        let merge_policy = match var(MERGE_POLICY_VAR) {
            Some(raw) => MergePolicy::parse(&raw).ok_or_else(|| ConfigError::InvalidValue {
                key: MERGE_POLICY_VAR,
                value: raw.clone(),
                reason: "expected present|truthy".to_string(),
            })?,
            None => MergePolicy::default(),
        };

        let level = var(LOG_LEVEL_VAR).unwrap_or_else(|| default_log_level().to_string());
        let log_dir = var(LOG_DIR_VAR).unwrap_or_else(default_log_dir);

        Ok(Self {
            port,
            db_path: var(DB_PATH_VAR).map(PathBuf::from),
            seed_file: var(SEED_FILE_VAR).map(PathBuf::from),
            log: LogSettings::new(&level, &log_dir)?,
            merge_policy,
        })
    }
}

fn default_log_dir() -> String {
    std::env::temp_dir()
        .join("mu_api")
        .join("logs")
        .to_string_lossy()
        .into_owned()
}
