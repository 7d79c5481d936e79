use std::{
    fmt, io,
    path::{Path, PathBuf},
};

use config::builder::{ConfigBuilder, DefaultState};
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::environment::Environment;

/// Directory containing configuration files relative to the working directory.
const CONFIGURATION_DIR: &str = "configuration";

/// Supported extensions for configuration files, in lookup order.
const CONFIG_FILE_EXTENSIONS: &[&str] = &["yaml", "yml", "json"];

/// Prefix for environment variable overrides.
const ENV_PREFIX: &str = "APP";

const ENV_PREFIX_SEPARATOR: &str = "_";

/// Separator for nested keys in environment variables (`APP_SINK__TABLE_NAME`).
const ENV_SEPARATOR: &str = "__";

/// The configuration file being merged.
#[derive(Debug, Clone, Copy)]
enum ConfigFileKind {
    Base,
    Environment(Environment),
}

impl ConfigFileKind {
    fn stem(&self) -> &'static str {
        match self {
            ConfigFileKind::Base => "base",
            ConfigFileKind::Environment(env) => env.as_str(),
        }
    }
}

impl fmt::Display for ConfigFileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigFileKind::Base => f.write_str("base configuration"),
            ConfigFileKind::Environment(env) => write!(f, "{env} environment configuration"),
        }
    }
}

/// Errors raised while loading configuration files and overrides.
#[derive(Debug, Error)]
pub enum LoadConfigError {
    #[error("failed to determine the current directory: {0}")]
    CurrentDir(#[source] io::Error),

    #[error("configuration directory `{0}` does not exist")]
    MissingConfigurationDirectory(PathBuf),

    /// The base configuration file is mandatory.
    #[error("could not locate {kind_description} in `{directory}`; attempted: {attempted}")]
    ConfigurationFileMissing {
        kind_description: String,
        directory: PathBuf,
        attempted: String,
    },

    #[error("failed to load {kind_description} from `{path}`: {source}")]
    ConfigurationFileLoad {
        kind_description: String,
        path: PathBuf,
        source: config::ConfigError,
    },

    #[error("failed to determine runtime environment: {0}")]
    Environment(#[from] io::Error),

    #[error("failed to build configuration: {0}")]
    Builder(#[source] config::ConfigError),

    #[error("failed to deserialize configuration: {0}")]
    Deserialization(#[source] config::ConfigError),
}

/// Loads configuration from `./configuration` for the environment named by `APP_ENVIRONMENT`.
///
/// Sources are merged in order: `base.(yaml|yml|json)`, then `{environment}.(yaml|yml|json)`
/// if present, then `APP_`-prefixed environment variables. Nested keys use double
/// underscores (`APP_SINK__POOL__MAX_CONNECTIONS`).
pub fn load_config<T>() -> Result<T, LoadConfigError>
where
    T: DeserializeOwned,
{
    let base_path = std::env::current_dir().map_err(LoadConfigError::CurrentDir)?;
    let environment = Environment::load()?;

    load_config_from(&base_path.join(CONFIGURATION_DIR), environment)
}

/// Loads configuration from an explicit directory and environment.
pub fn load_config_from<T>(directory: &Path, environment: Environment) -> Result<T, LoadConfigError>
where
    T: DeserializeOwned,
{
    if !directory.is_dir() {
        return Err(LoadConfigError::MissingConfigurationDirectory(
            directory.to_path_buf(),
        ));
    }

    let base_file = find_configuration_file(directory, ConfigFileKind::Base).ok_or_else(|| {
        LoadConfigError::ConfigurationFileMissing {
            kind_description: ConfigFileKind::Base.to_string(),
            directory: directory.to_path_buf(),
            attempted: attempted_paths(directory, ConfigFileKind::Base),
        }
    })?;

    let mut builder = config::Config::builder().add_source(config::File::from(base_file.clone()));
    validate_configuration_source(&builder, ConfigFileKind::Base, &base_file)?;

    let environment_kind = ConfigFileKind::Environment(environment);
    if let Some(environment_file) = find_configuration_file(directory, environment_kind) {
        builder = builder.add_source(config::File::from(environment_file.clone()));
        validate_configuration_source(&builder, environment_kind, &environment_file)?;
    }

    let environment_source = config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator(ENV_PREFIX_SEPARATOR)
        .separator(ENV_SEPARATOR)
        .try_parsing(true);

    let settings = builder
        .add_source(environment_source)
        .build()
        .map_err(LoadConfigError::Builder)?;

    settings
        .try_deserialize::<T>()
        .map_err(LoadConfigError::Deserialization)
}

fn candidate_paths(directory: &Path, kind: ConfigFileKind) -> impl Iterator<Item = PathBuf> + '_ {
    CONFIG_FILE_EXTENSIONS
        .iter()
        .map(move |extension| directory.join(format!("{}.{extension}", kind.stem())))
}

fn find_configuration_file(directory: &Path, kind: ConfigFileKind) -> Option<PathBuf> {
    candidate_paths(directory, kind).find(|path| path.is_file())
}

fn attempted_paths(directory: &Path, kind: ConfigFileKind) -> String {
    candidate_paths(directory, kind)
        .map(|path| format!("`{}`", path.display()))
        .collect::<Vec<_>>()
        .join(", ")
}

fn validate_configuration_source(
    builder: &ConfigBuilder<DefaultState>,
    kind: ConfigFileKind,
    path: &Path,
) -> Result<(), LoadConfigError> {
    builder
        .clone()
        .build()
        .map_err(|source| LoadConfigError::ConfigurationFileLoad {
            kind_description: kind.to_string(),
            path: path.to_path_buf(),
            source,
        })
        .map(|_| ())
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;
    use std::fs;

    use super::*;

    #[derive(Debug, Deserialize)]
    struct TestConfig {
        name: String,
        retries: u32,
    }

    fn scratch_dir(test_name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "sink-config-{test_name}-{}",
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn environment_file_overrides_base() {
        let dir = scratch_dir("override");
        fs::write(dir.join("base.yaml"), "name: base\nretries: 1\n").unwrap();
        fs::write(dir.join("prod.yaml"), "retries: 5\n").unwrap();

        let config: TestConfig = load_config_from(&dir, Environment::Prod).unwrap();

        assert_eq!(config.name, "base");
        assert_eq!(config.retries, 5);
        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn environment_file_is_optional() {
        let dir = scratch_dir("optional");
        fs::write(dir.join("base.json"), r#"{"name": "only-base", "retries": 2}"#).unwrap();

        let config: TestConfig = load_config_from(&dir, Environment::Dev).unwrap();

        assert_eq!(config.name, "only-base");
        assert_eq!(config.retries, 2);
        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn missing_base_file_is_reported() {
        let dir = scratch_dir("missing");

        let err = load_config_from::<TestConfig>(&dir, Environment::Dev).unwrap_err();

        assert!(matches!(err, LoadConfigError::ConfigurationFileMissing { .. }));
        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn missing_directory_is_reported() {
        let dir = std::env::temp_dir().join("sink-config-does-not-exist");

        let err = load_config_from::<TestConfig>(&dir, Environment::Dev).unwrap_err();

        assert!(matches!(
            err,
            LoadConfigError::MissingConfigurationDirectory(_)
        ));
    }
}
