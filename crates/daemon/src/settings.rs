// Layered configuration: defaults, optional TOML file, BLOGSTORE__* environment

use std::path::Path;

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;

use blogstore_core::DataConfig;

pub const DEFAULT_CONFIG_FILE: &str = "blogstore.toml";
pub const ENV_PREFIX: &str = "BLOGSTORE";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub data: DataConfig,
}

impl Settings {
    /// Load from `BLOGSTORE_CONFIG` (or `blogstore.toml`) and the process environment
    pub fn load() -> Result<Self> {
        let file = std::env::var("BLOGSTORE_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        Self::load_from(Path::new(&file), env_source())
    }

    pub fn load_from(file: &Path, env: Environment) -> Result<Self> {
        let raw = Config::builder()
            .add_source(File::from(file).required(false))
            .add_source(env)
            .build()
            .with_context(|| format!("failed to read configuration from {}", file.display()))?;

        let mut settings: Settings = raw
            .try_deserialize()
            .context("invalid configuration")?;
        settings.data.database_url = expand_database_url(&settings.data.database_url);
        settings.data.validate()?;
        Ok(settings)
    }
}

fn env_source() -> Environment {
    // BLOGSTORE__DATA__MAX_CONNECTIONS=4 -> data.max_connections
    Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .try_parsing(true)
}

/// Expand `~` in the path part of a sqlite URL (or a bare path)
pub fn expand_database_url(url: &str) -> String {
    match url.strip_prefix("sqlite://") {
        Some(path) => format!("sqlite://{}", shellexpand::tilde(path)),
        None => shellexpand::tilde(url).into_owned(),
    }
}
