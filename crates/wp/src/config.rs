use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};
use thiserror::Error;
use wp_core::EngineConfig;
use wp_core::config::ConfigError;
use wp_core::types::TripSheet;

pub const CONFIG_ENV: &str = "WAYPOST_CONFIG";
pub const DB_PATH_ENV: &str = "WAYPOST_DB_PATH";
pub const PORT_ENV: &str = "WAYPOST_PORT";

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error(transparent)]
    Engine(#[from] ConfigError),
    #[error("{name}={value} is not valid")]
    Env { name: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServeConfig {
    pub db_path: PathBuf,
    pub port: u16,
    pub bind: IpAddr,
    /// `RUST_LOG` takes precedence when set.
    pub log_level: String,
    pub log_format: LogFormat,
    pub engine: EngineConfig,
    /// Rows served by the in-memory trip-sheet directory.
    pub trip_sheets: Vec<TripSheet>,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(".waypost/waypost.db"),
            port: 4830,
            bind: IpAddr::V4(Ipv4Addr::LOCALHOST),
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            engine: EngineConfig::default(),
            trip_sheets: Vec::new(),
        }
    }
}

impl ServeConfig {
    /// Defaults, then the TOML file (explicit path or `WAYPOST_CONFIG`), then
    /// `WAYPOST_DB_PATH` / `WAYPOST_PORT`.
    pub fn load(path: Option<&Path>) -> Result<Self, LoadError> {
        let env_path = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
        let mut config = match path.map(Path::to_path_buf).or(env_path) {
            Some(path) => {
                let raw = std::fs::read_to_string(&path)
                    .map_err(|source| LoadError::Read { path, source })?;
                Self::from_toml_str(&raw)?
            }
            None => Self::default(),
        };
        config.apply_env(|name| std::env::var(name).ok())?;
        config.engine.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, LoadError> {
        Ok(toml::from_str(raw)?)
    }

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<(), LoadError> {
        if let Some(path) = var(DB_PATH_ENV).filter(|value| !value.trim().is_empty()) {
            self.db_path = PathBuf::from(path);
        }
        if let Some(value) = var(PORT_ENV) {
            self.port = value.trim().parse().map_err(|_| LoadError::Env {
                name: PORT_ENV,
                value,
            })?;
        }
        Ok(())
    }
}
