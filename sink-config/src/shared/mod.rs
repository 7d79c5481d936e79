//! Shared configuration types for the sink crates.

mod base;
mod connection;
mod secret;
mod sink;

pub use base::ValidationError;
pub use connection::{DEFAULT_MYSQL_PORT, IntoConnectOptions, MySqlConnectionConfig};
pub use secret::{DatabaseCredentials, SecretConfig};
pub use sink::{HandlerConfig, PoolConfig, SinkConfig};
