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

/// Extensions tried, in order, for every configuration file stem.
const CONFIG_FILE_EXTENSIONS: &[&str] = &["yaml", "yml", "json"];

/// Prefix for environment variable overrides.
const ENV_PREFIX: &str = "APP";

/// Separator between the prefix and the first key segment.
const ENV_PREFIX_SEPARATOR: &str = "_";

/// Separator for nested keys in environment variables (`APP_STORE__DIRECTORY`).
const ENV_SEPARATOR: &str = "__";

/// Separator for list elements in environment variables.
const LIST_SEPARATOR: &str = ",";

/// Trait implemented by top-level configuration structures.
pub trait Config {
    /// Keys whose environment variable values are parsed as comma-separated lists.
    const LIST_PARSE_KEYS: &'static [&'static str];
}

/// Which configuration file is being resolved.
#[derive(Debug, Clone, Copy)]
enum ConfigFile {
    Base,
    Environment(Environment),
}

impl ConfigFile {
    fn stem(&self) -> &'static str {
        match self {
            ConfigFile::Base => "base",
            ConfigFile::Environment(env) => env.as_str(),
        }
    }
}

impl fmt::Display for ConfigFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigFile::Base => f.write_str("base configuration"),
            ConfigFile::Environment(env) => write!(f, "{env} environment configuration"),
        }
    }
}

/// Errors that can occur while loading configuration files and overrides.
#[derive(Debug, Error)]
pub enum LoadConfigError {
    #[error("failed to determine the current directory: {0}")]
    CurrentDir(#[source] io::Error),

    #[error("configuration directory `{0}` does not exist")]
    MissingConfigurationDirectory(PathBuf),

    #[error("could not locate the base configuration in `{directory}`; attempted: {attempted}")]
    BaseFileMissing { directory: PathBuf, attempted: String },

    #[error("failed to load {description} from `{path}`: {source}")]
    FileLoad {
        description: String,
        path: PathBuf,
        source: config::ConfigError,
    },

    #[error("failed to determine runtime environment: {0}")]
    Environment(#[source] io::Error),

    #[error("failed to build configuration: {0}")]
    Build(#[source] config::ConfigError),

    #[error("failed to deserialize configuration: {0}")]
    Deserialization(#[source] config::ConfigError),
}

/// Loads configuration from the `configuration` directory under the working directory.
///
/// See [`load_config_from`] for the resolution order.
pub fn load_config<T>() -> Result<T, LoadConfigError>
where
    T: Config + DeserializeOwned,
{
    let base_path = std::env::current_dir().map_err(LoadConfigError::CurrentDir)?;

    load_config_from(&base_path.join(CONFIGURATION_DIR))
}

/// Loads hierarchical configuration from `directory`.
///
/// Sources are merged in order, later ones overriding earlier ones:
/// 1. `base.(yaml|yml|json)`, required.
/// 2. `{environment}.(yaml|yml|json)`, optional, where the environment comes from
///    `APP_ENVIRONMENT` (defaults to `dev`).
/// 3. `APP_`-prefixed environment variables, nested keys separated by `__`.
pub fn load_config_from<T>(directory: &Path) -> Result<T, LoadConfigError>
where
    T: Config + DeserializeOwned,
{
    if !directory.is_dir() {
        return Err(LoadConfigError::MissingConfigurationDirectory(
            directory.to_path_buf(),
        ));
    }

    let environment = Environment::load().map_err(LoadConfigError::Environment)?;

    let Some(base_file) = find_configuration_file(directory, ConfigFile::Base) else {
        return Err(LoadConfigError::BaseFileMissing {
            directory: directory.to_path_buf(),
            attempted: attempted_paths(directory, ConfigFile::Base),
        });
    };

    let mut builder = config::Config::builder().add_source(config::File::from(base_file.clone()));
    check_source(&builder, ConfigFile::Base, &base_file)?;

    let environment_file = ConfigFile::Environment(environment);
    if let Some(path) = find_configuration_file(directory, environment_file) {
        builder = builder.add_source(config::File::from(path.clone()));
        check_source(&builder, environment_file, &path)?;
    }

    let mut environment_source = config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator(ENV_PREFIX_SEPARATOR)
        .separator(ENV_SEPARATOR);

    if !T::LIST_PARSE_KEYS.is_empty() {
        environment_source = environment_source
            .try_parsing(true)
            .list_separator(LIST_SEPARATOR);

        for key in T::LIST_PARSE_KEYS {
            environment_source = environment_source.with_list_parse_key(key);
        }
    }

    let settings = builder
        .add_source(environment_source)
        .build()
        .map_err(LoadConfigError::Build)?;

    settings
        .try_deserialize::<T>()
        .map_err(LoadConfigError::Deserialization)
}

fn candidate_paths(directory: &Path, file: ConfigFile) -> impl Iterator<Item = PathBuf> + '_ {
    CONFIG_FILE_EXTENSIONS
        .iter()
        .map(move |extension| directory.join(format!("{}.{extension}", file.stem())))
}

fn find_configuration_file(directory: &Path, file: ConfigFile) -> Option<PathBuf> {
    candidate_paths(directory, file).find(|path| path.is_file())
}

fn attempted_paths(directory: &Path, file: ConfigFile) -> String {
    candidate_paths(directory, file)
        .map(|path| format!("`{}`", path.display()))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Builds the configuration accumulated so far to attribute parse errors to `path`.
fn check_source(
    builder: &ConfigBuilder<DefaultState>,
    file: ConfigFile,
    path: &Path,
) -> Result<(), LoadConfigError> {
    builder
        .clone()
        .build()
        .map(|_| ())
        .map_err(|source| LoadConfigError::FileLoad {
            description: file.to_string(),
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::{SnapsyncConfig, SourceConfig};

    #[test]
    fn missing_directory_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");

        let err = load_config_from::<SnapsyncConfig>(&missing).unwrap_err();
        assert!(matches!(err, LoadConfigError::MissingConfigurationDirectory(_)));
    }

    #[test]
    fn missing_base_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();

        let err = load_config_from::<SnapsyncConfig>(dir.path()).unwrap_err();
        assert!(matches!(err, LoadConfigError::BaseFileMissing { .. }));
    }

    #[test]
    fn loads_base_file_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("base.yaml"),
            "source:\n  json_file:\n    path: items.json\n    table_name: ofertas_trabajo\n",
        )
        .unwrap();

        let config = load_config_from::<SnapsyncConfig>(dir.path()).unwrap();

        assert!(matches!(config.source, SourceConfig::JsonFile { .. }));
        assert_eq!(config.source.table_name(), "ofertas_trabajo");
        assert_eq!(config.store.snapshot_file, "ofertas_powerbi_live.csv");
        assert_eq!(config.sync.interval_mins, 30);
        assert!(config.validate().is_ok());
    }
}
