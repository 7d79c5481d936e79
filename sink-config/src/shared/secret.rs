use secrecy::SecretString;
use serde::Deserialize;
use std::path::PathBuf;

use crate::shared::ValidationError;
use crate::shared::connection::{DEFAULT_MYSQL_PORT, MySqlConnectionConfig};

/// Database credentials as stored in the secret backing the sink.
///
/// The secret is a JSON document with `host`, `username`, `password`, `database` and an
/// optional `port`.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseCredentials {
    pub host: String,
    pub username: String,
    pub password: SecretString,
    pub database: String,
    #[serde(default)]
    pub port: Option<u16>,
}

impl From<DatabaseCredentials> for MySqlConnectionConfig {
    fn from(credentials: DatabaseCredentials) -> Self {
        MySqlConnectionConfig {
            host: credentials.host,
            port: credentials.port.unwrap_or(DEFAULT_MYSQL_PORT),
            name: credentials.database,
            username: credentials.username,
            password: Some(credentials.password),
        }
    }
}

/// Where the database credentials secret is read from.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum SecretConfig {
    /// Secret JSON stored in an environment variable.
    Env { variable: String },
    /// Secret JSON stored in a file, e.g. a mounted secret volume.
    File { path: PathBuf },
}

impl SecretConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            SecretConfig::Env { variable } if variable.trim().is_empty() => Err(
                ValidationError::SecretConfig("`variable` cannot be empty".to_string()),
            ),
            SecretConfig::File { path } if path.as_os_str().is_empty() => Err(
                ValidationError::SecretConfig("`path` cannot be empty".to_string()),
            ),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use secrecy::ExposeSecret;

    use super::*;

    #[test]
    fn credentials_without_port_use_default_port() {
        let credentials: DatabaseCredentials = serde_json::from_str(
            r#"{"host": "localhost", "username": "root", "password": "root", "database": "test_db"}"#,
        )
        .unwrap();

        let config = MySqlConnectionConfig::from(credentials);

        assert_eq!(config.port, 3306);
        assert_eq!(config.name, "test_db");
        assert_eq!(config.password.unwrap().expose_secret(), "root");
    }

    #[test]
    fn credentials_keep_explicit_port() {
        let credentials: DatabaseCredentials = serde_json::from_str(
            r#"{"host": "db", "username": "app", "password": "pw", "database": "app", "port": 3310}"#,
        )
        .unwrap();

        assert_eq!(MySqlConnectionConfig::from(credentials).port, 3310);
    }

    #[test]
    fn secret_config_is_tagged_by_type() {
        let config: SecretConfig =
            serde_json::from_str(r#"{"type": "env", "variable": "MYSQL_SECRET"}"#).unwrap();

        assert!(matches!(config, SecretConfig::Env { ref variable } if variable == "MYSQL_SECRET"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_secret_variable_is_rejected() {
        let config = SecretConfig::Env {
            variable: " ".to_string(),
        };

        assert!(matches!(
            config.validate(),
            Err(ValidationError::SecretConfig(_))
        ));
    }
}
