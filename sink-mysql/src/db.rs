use sink_config::shared::{IntoConnectOptions, MySqlConnectionConfig, PoolConfig};
use sqlx::MySqlPool;
use sqlx::mysql::MySqlPoolOptions;

fn pool_options(pool_config: &PoolConfig) -> MySqlPoolOptions {
    MySqlPoolOptions::new()
        .min_connections(pool_config.min_connections)
        .max_connections(pool_config.max_connections)
        .acquire_timeout(pool_config.acquire_timeout())
}

/// Connects to the target database, establishing the minimum number of connections eagerly.
pub async fn connect_to_database(
    config: &MySqlConnectionConfig,
    pool_config: &PoolConfig,
) -> Result<MySqlPool, sqlx::Error> {
    pool_options(pool_config)
        .connect_with(config.with_db())
        .await
}

/// Creates a pool that opens connections on first use.
///
/// Connectivity problems then surface on the operation that needs the connection instead of
/// at startup.
pub fn connect_lazy_to_database(
    config: &MySqlConnectionConfig,
    pool_config: &PoolConfig,
) -> MySqlPool {
    pool_options(pool_config).connect_lazy_with(config.with_db())
}
