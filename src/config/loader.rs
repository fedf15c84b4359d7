//! Locates and merges the configuration sources into [`Settings`].

use std::path::{Path, PathBuf};

use config::{Config, Environment, File, FileFormat};

use crate::config::environment::Environment as AppEnvironment;
use crate::config::error::ConfigError;
use crate::config::settings::Settings;

const CONFIG_DIR_ENV: &str = "NOTIFY_HUB_CONFIG_DIR";
const CONFIG_FILE_ENV: &str = "NOTIFY_HUB_CONFIG_FILE";
const DEFAULT_CONFIG_DIR: &str = "config";

/// `NOTIFY_HUB_LOGGER__LEVEL` maps to `logger.level`
const ENV_PREFIX: &str = "NOTIFY_HUB";
const ENV_SEPARATOR: &str = "__";

/// Overlays stacked on top of `default.toml` in layered mode
const LOCAL_OVERLAY: &str = "local.toml";
const BASE_FILE: &str = "default.toml";

type Builder = config::ConfigBuilder<config::builder::DefaultState>;

/// Where the TOML part of the configuration comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// `default.toml`, `{env}.toml` and `local.toml` from one directory
    Layered(PathBuf),
    /// Exactly one file, no overlays
    SingleFile(PathBuf),
}

/// Builds [`Settings`] from TOML files plus `NOTIFY_HUB_*` overrides.
///
/// Environment variables always win over file content.
#[derive(Debug)]
pub struct ConfigLoader {
    source: ConfigSource,
    environment: AppEnvironment,
}

impl ConfigLoader {
    /// Resolves the source from `NOTIFY_HUB_CONFIG_DIR` or
    /// `NOTIFY_HUB_CONFIG_FILE` and the overlay from `NOTIFY_HUB_APP_ENV`.
    ///
    /// # Errors
    ///
    /// `MutualExclusivityError` when both path variables are set.
    pub fn new() -> Result<Self, ConfigError> {
        let dir = std::env::var_os(CONFIG_DIR_ENV).map(PathBuf::from);
        let file = std::env::var_os(CONFIG_FILE_ENV).map(PathBuf::from);

        let source = match (dir, file) {
            (Some(_), Some(_)) => {
                return Err(ConfigError::mutual_exclusivity(format!(
                    "{CONFIG_DIR_ENV} and {CONFIG_FILE_ENV} cannot both be set; \
                     pick a layered directory or a single file"
                )));
            }
            (_, Some(file)) => ConfigSource::SingleFile(file),
            (Some(dir), None) => ConfigSource::Layered(dir),
            (None, None) => ConfigSource::Layered(PathBuf::from(DEFAULT_CONFIG_DIR)),
        };

        Ok(Self {
            source,
            environment: AppEnvironment::from_env(),
        })
    }

    /// Replaces the source with a path given on the command line; a
    /// directory is loaded in layers, anything else as a single file.
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        self.source = if path.is_dir() {
            ConfigSource::Layered(path)
        } else {
            ConfigSource::SingleFile(path)
        };
        self
    }

    pub fn with_environment(mut self, environment: AppEnvironment) -> Self {
        self.environment = environment;
        self
    }

    pub fn environment(&self) -> AppEnvironment {
        self.environment
    }

    pub fn source(&self) -> &ConfigSource {
        &self.source
    }

    /// Merges every source, deserializes and runs the fatal settings checks.
    ///
    /// Routing problems are not checked here; they surface as diagnostics
    /// when the routing table is built.
    pub fn load(&self) -> Result<Settings, ConfigError> {
        let settings: Settings = self.build_config()?.try_deserialize().map_err(|e| {
            ConfigError::ParseError(format!("Failed to deserialize configuration: {e}"))
        })?;

        settings.validate()?;
        Ok(settings)
    }

    fn build_config(&self) -> Result<Config, ConfigError> {
        let mut builder = Config::builder();
        for (path, required) in self.file_layers() {
            builder = add_file_source(builder, &path, required)?;
        }

        builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator(ENV_SEPARATOR)
                    .ignore_empty(true)
                    .try_parsing(true),
            )
            .build()
            .map_err(ConfigError::from)
    }

    /// TOML files in merge order, each with whether it must exist
    fn file_layers(&self) -> Vec<(PathBuf, bool)> {
        match &self.source {
            ConfigSource::SingleFile(file) => vec![(file.clone(), true)],
            ConfigSource::Layered(dir) => vec![
                (dir.join(BASE_FILE), true),
                (dir.join(self.environment.config_file_name()), false),
                (dir.join(LOCAL_OVERLAY), false),
            ],
        }
    }
}

fn add_file_source(builder: Builder, path: &Path, required: bool) -> Result<Builder, ConfigError> {
    if required && !path.exists() {
        return Err(ConfigError::file_not_found(format!(
            "Required configuration file not found: {}",
            path.display()
        )));
    }

    let name = path.to_str().ok_or_else(|| {
        ConfigError::ParseError(format!("Non UTF-8 configuration path: {}", path.display()))
    })?;

    Ok(builder.add_source(File::new(name, FileFormat::Toml).required(required)))
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new().unwrap_or(Self {
            source: ConfigSource::Layered(PathBuf::from(DEFAULT_CONFIG_DIR)),
            environment: AppEnvironment::default(),
        })
    }
}
