use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("`table_name` cannot be empty")]
    EmptyTableName,
    #[error("`max_connections` cannot be zero")]
    MaxConnectionsZero,
    #[error("`min_connections` ({min}) cannot exceed `max_connections` ({max})")]
    MinConnectionsAboveMax { min: u32, max: u32 },
    #[error("Invalid secret config: {0}")]
    SecretConfig(String),
}
