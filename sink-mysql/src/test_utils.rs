use sink_config::shared::{DEFAULT_MYSQL_PORT, IntoConnectOptions, MySqlConnectionConfig};
use sqlx::mysql::MySqlConnectOptions;
use sqlx::{ConnectOptions, Executor};

use crate::types::quote_identifier;

/// Creates the database named by `config`.
///
/// # Panics
/// Panics if connecting to the server or creating the database fails.
pub async fn create_mysql_database(config: &MySqlConnectionConfig) {
    let options: MySqlConnectOptions = config.without_db();
    let mut connection = options
        .connect()
        .await
        .expect("Failed to connect to MySQL");

    connection
        .execute(&*format!(
            "CREATE DATABASE {}",
            quote_identifier(&config.name)
        ))
        .await
        .expect("Failed to create database");
}

/// Drops the database named by `config` if it exists.
///
/// # Panics
/// Panics if connecting to the server or dropping the database fails.
pub async fn drop_mysql_database(config: &MySqlConnectionConfig) {
    let options: MySqlConnectOptions = config.without_db();
    let mut connection = options
        .connect()
        .await
        .expect("Failed to connect to MySQL");

    connection
        .execute(&*format!(
            "DROP DATABASE IF EXISTS {}",
            quote_identifier(&config.name)
        ))
        .await
        .expect("Failed to destroy database");
}

/// Builds the connection configuration of a local test server for the database `name`.
///
/// Configuration is read from environment variables:
/// - `TESTS_DATABASE_HOST`: MySQL server hostname (required)
/// - `TESTS_DATABASE_PORT`: MySQL server port (optional, defaults to 3306)
/// - `TESTS_DATABASE_USERNAME`: Database user (required)
/// - `TESTS_DATABASE_PASSWORD`: Database password (optional)
///
/// # Panics
/// Panics if a required variable is missing or the port is not a number.
pub fn local_mysql_connection_config(name: String) -> MySqlConnectionConfig {
    MySqlConnectionConfig {
        host: std::env::var("TESTS_DATABASE_HOST").expect("TESTS_DATABASE_HOST must be set"),
        port: std::env::var("TESTS_DATABASE_PORT")
            .map(|port| {
                port.parse()
                    .expect("TESTS_DATABASE_PORT must be a valid port number")
            })
            .unwrap_or(DEFAULT_MYSQL_PORT),
        name,
        username: std::env::var("TESTS_DATABASE_USERNAME")
            .expect("TESTS_DATABASE_USERNAME must be set"),
        password: std::env::var("TESTS_DATABASE_PASSWORD")
            .ok()
            .map(Into::into),
    }
}
