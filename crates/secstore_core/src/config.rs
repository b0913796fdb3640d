//! Store configuration.
//!
//! # Responsibility
//! - Describe where the database lives, its busy timeout, logging and the
//!   defaults document, as a JSON-deserializable value.
//! - Turn configuration into opened resources (defaults, logging).
//!
//! # Invariants
//! - Unknown keys are rejected so typos do not silently fall back to
//!   defaults.
//! - `log_level` is only honored together with `log_dir`.

use crate::db::{DatabaseLocation, DbError, DEFAULT_BUSY_TIMEOUT};
use crate::defaults::{DefaultsError, SecurityDefaults};
use crate::logging::{default_log_level, init_logging};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse(serde_json::Error),
    Invalid(String),
    Db(DbError),
    Defaults(DefaultsError),
    Logging(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "invalid config document: {err}"),
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::Defaults(err) => write!(f, "{err}"),
            Self::Logging(message) => write!(f, "logging setup failed: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::Defaults(err) => Some(err),
            Self::Invalid(_) | Self::Logging(_) => None,
        }
    }
}

impl From<DbError> for ConfigError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<DefaultsError> for ConfigError {
    fn from(value: DefaultsError) -> Self {
        Self::Defaults(value)
    }
}

/// Settings for one security store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    pub database: DatabaseLocation,
    pub busy_timeout_ms: u64,
    pub log_level: Option<String>,
    /// Absolute directory for rolling log files. Logging stays off when unset.
    pub log_dir: Option<PathBuf>,
    /// JSON defaults document; the built-in defaults apply when unset.
    pub defaults_path: Option<PathBuf>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database: DatabaseLocation::Memory,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT.as_millis() as u64,
            log_level: None,
            log_dir: None,
            defaults_path: None,
        }
    }
}

impl StoreConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.busy_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "busy_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.log_level.is_some() && self.log_dir.is_none() {
            return Err(ConfigError::Invalid(
                "log_level requires log_dir".to_string(),
            ));
        }
        Ok(())
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    /// Loads `defaults_path`, or the built-in defaults when unset.
    pub fn load_defaults(&self) -> Result<SecurityDefaults, ConfigError> {
        let defaults = match &self.defaults_path {
            Some(path) => SecurityDefaults::from_path(path)?,
            None => SecurityDefaults::builtin()?,
        };
        Ok(defaults)
    }

    /// Starts file logging when `log_dir` is set. Returns whether it did.
    pub fn init_logging(&self) -> Result<bool, ConfigError> {
        let Some(log_dir) = &self.log_dir else {
            return Ok(false);
        };
        let level = self.log_level.as_deref().unwrap_or(default_log_level());
        let log_dir = log_dir.to_str().ok_or_else(|| {
            ConfigError::Logging(format!("log_dir `{}` is not UTF-8", log_dir.display()))
        })?;
        init_logging(level, log_dir).map_err(ConfigError::Logging)?;
        Ok(true)
    }
}
