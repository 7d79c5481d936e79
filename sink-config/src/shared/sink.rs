use serde::Deserialize;
use std::time::Duration;

use crate::shared::{SecretConfig, ValidationError};

/// Table written to when the configuration does not name one.
const DEFAULT_TABLE_NAME: &str = "records";

fn default_table_name() -> String {
    DEFAULT_TABLE_NAME.to_string()
}

/// Top-level configuration of the handler binary.
#[derive(Debug, Clone, Deserialize)]
pub struct HandlerConfig {
    pub sink: SinkConfig,
}

impl HandlerConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.sink.validate()
    }
}

/// Configuration of the upsert sink.
#[derive(Debug, Clone, Deserialize)]
pub struct SinkConfig {
    /// Target table, optionally qualified as `database.table`.
    #[serde(default = "default_table_name")]
    pub table_name: String,
    /// Source of the database credentials.
    pub secret: SecretConfig,
    #[serde(default)]
    pub pool: PoolConfig,
}

impl SinkConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.table_name.trim().is_empty() {
            return Err(ValidationError::EmptyTableName);
        }

        self.secret.validate()?;
        self.pool.validate()
    }
}

/// Connection pool settings.
///
/// The sink processes records one at a time, so a single connection is enough by default.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct PoolConfig {
    #[serde(default)]
    pub min_connections: u32,
    #[serde(default = "PoolConfig::default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "PoolConfig::default_acquire_timeout_ms")]
    pub acquire_timeout_ms: u64,
}

impl PoolConfig {
    const fn default_max_connections() -> u32 {
        1
    }

    const fn default_acquire_timeout_ms() -> u64 {
        5_000
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_connections == 0 {
            return Err(ValidationError::MaxConnectionsZero);
        }

        if self.min_connections > self.max_connections {
            return Err(ValidationError::MinConnectionsAboveMax {
                min: self.min_connections,
                max: self.max_connections,
            });
        }

        Ok(())
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            min_connections: 0,
            max_connections: Self::default_max_connections(),
            acquire_timeout_ms: Self::default_acquire_timeout_ms(),
        }
    }
}
