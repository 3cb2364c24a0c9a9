//! Back office configuration.
//!
//! Layered with the `config` crate, later layers winning:
//!
//! ```text
//! built-in defaults  →  backoffice.toml (optional)  →  FURNISH_* environment
//! ```
//!
//! ```toml
//! # backoffice.toml
//! database_path = "/var/lib/furnish/backoffice.db"
//! max_connections = 8
//! log_filter = "info,furnish=debug,sqlx=warn"
//! log_json = true
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use furnish_db::DbConfig;

/// File looked up (any supported extension) in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "backoffice";

/// Prefix of the environment overrides (`FURNISH_DATABASE_PATH`, ...).
pub const ENV_PREFIX: &str = "FURNISH";

pub const DEFAULT_LOG_FILTER: &str = "info,furnish=debug,sqlx=warn";

/// Path value that selects a private in-memory database.
pub const IN_MEMORY_DATABASE: &str = ":memory:";

/// Back office configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackOfficeConfig {
    /// SQLite database file, or `:memory:`
    pub database_path: String,

    /// Pool size
    pub max_connections: u32,

    /// Seconds to wait for a pooled connection
    pub connect_timeout_secs: u64,

    /// Seconds a writer queues on the database lock before giving up
    pub busy_timeout_secs: u64,

    /// `tracing` filter directives, used when RUST_LOG is unset
    pub log_filter: String,

    /// Emit JSON log lines instead of human-readable ones
    pub log_json: bool,

    /// Apply pending migrations on startup
    pub run_migrations: bool,
}

impl BackOfficeConfig {
    /// Loads defaults, then `backoffice.toml` if present, then `FURNISH_*`.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None, ENV_PREFIX)
    }

    /// Loads with an explicit file (required when given) and env prefix.
    pub fn load_from(file: Option<&Path>, env_prefix: &str) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder()
            .set_default("database_path", "backoffice.db")?
            .set_default("max_connections", 5_i64)?
            .set_default("connect_timeout_secs", 10_i64)?
            .set_default("busy_timeout_secs", 5_i64)?
            .set_default("log_filter", DEFAULT_LOG_FILTER)?
            .set_default("log_json", false)?
            .set_default("run_migrations", true)?;

        builder = match file {
            Some(path) => builder.add_source(config::File::from(path).required(true)),
            None => builder.add_source(config::File::with_name(DEFAULT_CONFIG_FILE).required(false)),
        };

        let config: BackOfficeConfig = builder
            .add_source(config::Environment::with_prefix(env_prefix).try_parsing(true))
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.database_path.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "database_path".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        if self.max_connections == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_connections".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.connect_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "connect_timeout_secs".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Pool settings for [`furnish_db::Database::new`].
    pub fn db_config(&self) -> DbConfig {
        let base = if self.database_path == IN_MEMORY_DATABASE {
            DbConfig::in_memory()
        } else {
            DbConfig::new(PathBuf::from(&self.database_path)).max_connections(self.max_connections)
        };

        base.connect_timeout(Duration::from_secs(self.connect_timeout_secs))
            .busy_timeout(Duration::from_secs(self.busy_timeout_secs))
            .run_migrations(self.run_migrations)
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

// =============================================================================
// Unit Tests
// =============================================================================
