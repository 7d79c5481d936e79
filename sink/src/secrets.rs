//! Database credential providers.
//!
//! The credentials secret is a JSON document deserialized into [`DatabaseCredentials`]. A
//! provider that cannot produce it fails with [`ErrorKind::SecretUnavailable`].

use std::future::Future;
use std::path::PathBuf;

use sink_config::shared::{DatabaseCredentials, SecretConfig};

use crate::error::{ErrorKind, SinkResult};
use crate::sink_error;

/// Source of the credentials used to connect to the database.
pub trait SecretProvider {
    fn get_secret(&self) -> impl Future<Output = SinkResult<DatabaseCredentials>> + Send;
}

/// Reads the secret JSON from an environment variable.
#[derive(Debug, Clone)]
pub struct EnvSecretProvider {
    variable: String,
}

impl EnvSecretProvider {
    pub fn new(variable: impl Into<String>) -> Self {
        Self {
            variable: variable.into(),
        }
    }
}

impl SecretProvider for EnvSecretProvider {
    async fn get_secret(&self) -> SinkResult<DatabaseCredentials> {
        let secret = std::env::var(&self.variable).map_err(|err| {
            sink_error!(
                ErrorKind::SecretUnavailable,
                "Secret environment variable is not readable",
                format!("variable `{}`: {err}", self.variable)
            )
        })?;

        parse_credentials(&secret, &self.variable)
    }
}

/// Reads the secret JSON from a file.
#[derive(Debug, Clone)]
pub struct FileSecretProvider {
    path: PathBuf,
}

impl FileSecretProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SecretProvider for FileSecretProvider {
    async fn get_secret(&self) -> SinkResult<DatabaseCredentials> {
        let secret = tokio::fs::read_to_string(&self.path).await.map_err(|err| {
            sink_error!(
                ErrorKind::SecretUnavailable,
                "Secret file is not readable",
                format!("file `{}`", self.path.display()),
                source: err
            )
        })?;

        parse_credentials(&secret, &self.path.display().to_string())
    }
}

/// Returns fixed credentials.
#[derive(Debug, Clone)]
pub struct StaticSecretProvider {
    credentials: DatabaseCredentials,
}

impl StaticSecretProvider {
    pub fn new(credentials: DatabaseCredentials) -> Self {
        Self { credentials }
    }
}

impl SecretProvider for StaticSecretProvider {
    async fn get_secret(&self) -> SinkResult<DatabaseCredentials> {
        Ok(self.credentials.clone())
    }
}

/// The provider selected by a [`SecretConfig`].
#[derive(Debug, Clone)]
pub enum ConfiguredSecretProvider {
    Env(EnvSecretProvider),
    File(FileSecretProvider),
}

impl From<&SecretConfig> for ConfiguredSecretProvider {
    fn from(config: &SecretConfig) -> Self {
        match config {
            SecretConfig::Env { variable } => {
                ConfiguredSecretProvider::Env(EnvSecretProvider::new(variable.clone()))
            }
            SecretConfig::File { path } => {
                ConfiguredSecretProvider::File(FileSecretProvider::new(path.clone()))
            }
        }
    }
}

impl SecretProvider for ConfiguredSecretProvider {
    async fn get_secret(&self) -> SinkResult<DatabaseCredentials> {
        match self {
            ConfiguredSecretProvider::Env(provider) => provider.get_secret().await,
            ConfiguredSecretProvider::File(provider) => provider.get_secret().await,
        }
    }
}

/// Parses the secret document.
///
/// Only the error position is reported so that secret values never end up in logs.
fn parse_credentials(secret: &str, origin: &str) -> SinkResult<DatabaseCredentials> {
    serde_json::from_str(secret).map_err(|err| {
        sink_error!(
            ErrorKind::SecretUnavailable,
            "Secret is not valid credentials JSON",
            format!(
                "{origin}: invalid document at line {}, column {}",
                err.line(),
                err.column()
            )
        )
    })
}

#[cfg(test)]
mod tests {
    use sink_config::shared::MySqlConnectionConfig;

    use super::*;

    const SECRET: &str = r#"{
        "host": "localhost",
        "username": "sink",
        "password": "hunter2",
        "database": "test_db"
    }"#;

    #[tokio::test]
    async fn static_provider_returns_its_credentials() {
        let credentials: DatabaseCredentials = serde_json::from_str(SECRET).unwrap();
        let provider = StaticSecretProvider::new(credentials);

        let config = MySqlConnectionConfig::from(provider.get_secret().await.unwrap());

        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 3306);
    }

    #[tokio::test]
    async fn file_provider_reads_secret_document() {
        let path = std::env::temp_dir().join(format!("sink-secret-{}.json", std::process::id()));
        std::fs::write(&path, SECRET).unwrap();

        let provider = ConfiguredSecretProvider::from(&SecretConfig::File { path: path.clone() });
        let credentials = provider.get_secret().await.unwrap();

        assert_eq!(credentials.username, "sink");
        assert_eq!(credentials.database, "test_db");
        std::fs::remove_file(path).unwrap();
    }

    #[tokio::test]
    async fn missing_file_is_secret_unavailable() {
        let provider = FileSecretProvider::new("/nonexistent/sink-secret.json");

        let err = provider.get_secret().await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::SecretUnavailable);
    }

    #[tokio::test]
    async fn unset_variable_is_secret_unavailable() {
        let provider = EnvSecretProvider::new("SINK_TEST_SECRET_THAT_IS_NEVER_SET");

        let err = provider.get_secret().await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::SecretUnavailable);
    }

    #[test]
    fn invalid_document_does_not_leak_values() {
        let err = parse_credentials(r#"{"host": "h", "password": 12345}"#, "test").unwrap_err();

        assert_eq!(err.kind(), ErrorKind::SecretUnavailable);
        assert!(!err.to_string().contains("12345"));
    }
}
