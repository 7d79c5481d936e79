use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use sqlx::mysql::MySqlConnectOptions;

/// Port used when neither the configuration nor the secret names one.
pub const DEFAULT_MYSQL_PORT: u16 = 3306;

fn default_port() -> u16 {
    DEFAULT_MYSQL_PORT
}

/// Parameters for connecting to the target MySQL database.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct MySqlConnectionConfig {
    /// Hostname or IP address of the MySQL server.
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Name of the database (schema) holding the target tables.
    pub name: String,
    pub username: String,
    /// Redacted in debug output.
    pub password: Option<SecretString>,
}

/// Converts a connection configuration into driver specific connect options.
pub trait IntoConnectOptions<Output> {
    /// Options for the server without selecting a database.
    ///
    /// Used for administrative statements such as creating the database itself.
    fn without_db(&self) -> Output;

    /// Options for the configured database.
    fn with_db(&self) -> Output;
}

impl IntoConnectOptions<MySqlConnectOptions> for MySqlConnectionConfig {
    fn without_db(&self) -> MySqlConnectOptions {
        let mut options = MySqlConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.username);

        if let Some(password) = &self.password {
            options = options.password(password.expose_secret());
        }

        options
    }

    fn with_db(&self) -> MySqlConnectOptions {
        self.without_db().database(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_defaults_to_mysql_port() {
        let config: MySqlConnectionConfig = serde_json::from_str(
            r#"{"host": "localhost", "name": "test_db", "username": "root", "password": "root"}"#,
        )
        .unwrap();

        assert_eq!(config.port, DEFAULT_MYSQL_PORT);
        assert_eq!(config.password.unwrap().expose_secret(), "root");
    }

    #[test]
    fn debug_output_redacts_password() {
        let config: MySqlConnectionConfig = serde_json::from_str(
            r#"{"host": "db", "port": 3307, "name": "app", "username": "u", "password": "hunter2"}"#,
        )
        .unwrap();

        let rendered = format!("{config:?}");
        assert!(!rendered.contains("hunter2"));
        assert_eq!(config.port, 3307);
    }
}
