//! Layered configuration: defaults, optional TOML file, then environment.

use config::{Config, Environment, File};
use gridiron_cache::CacheConfig;
use gridiron_db::DatabaseConfig;
use gridiron_loader::{LoaderConfig, ScheduleConfig};
use gridiron_source::SourceConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_CONFIG_FILE: &str = "gridiron.toml";
pub const ENV_PREFIX: &str = "GRIDIRON";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub loader: LoaderConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

fn default_bind() -> String {
    "0.0.0.0:8000".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind: default_bind() }
    }
}

impl Settings {
    /// Load settings.
    ///
    /// An explicit `path` must exist; the default `gridiron.toml` is optional.
    /// Environment variables such as `GRIDIRON__DATABASE__HOST` override both.
    pub fn load(path: Option<&Path>) -> Result<Self, config::ConfigError> {
        let file = match path {
            Some(p) => File::from(p).required(true),
            None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };
        Self::from_sources(file, Environment::with_prefix(ENV_PREFIX))
    }

    fn from_sources(
        file: File<config::FileSourceFile, config::FileFormat>,
        env: Environment,
    ) -> Result<Self, config::ConfigError> {
        Config::builder()
            .add_source(file)
            .add_source(env.prefix_separator("__").separator("__").try_parsing(true))
            .build()?
            .try_deserialize()
    }
}
