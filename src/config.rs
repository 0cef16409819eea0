use serde::{Deserialize, Deserializer};
use std::io::Read;
use std::time::Duration;
use std::{
    fs::File,
    path::{Path, PathBuf},
};
use thiserror::*;

use crate::provider::DEFAULT_USER_ID;

pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_MAX_CONNECTIONS: u32 = 4;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("io error {0} when reading config")]
    IoError(#[from] std::io::Error),
    #[error("cannot open config file '{0}' : {1}")]
    OpeningError(PathBuf, std::io::Error),
    #[error("UTF8 format error when reading config")]
    Utf8Error,
    #[error("format error {0} when reading config")]
    FormatError(#[from] serde_yaml::Error),
    #[error("{0} must be set when DATA_PROVIDER is '{1}'")]
    MissingEnv(&'static str, String),
}

/// Backend selection. Local is used whenever nothing else is configured.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderConfig {
    Local {
        /// YAML catalog replacing the built-in one.
        catalog: Option<PathBuf>,
        /// Directory of the completion files, defaults to [`default_data_dir`].
        completion_dir: Option<PathBuf>,
        #[serde(default)]
        in_memory: bool,
    },
    Relational {
        url: String,
        #[serde(default = "default_user_id")]
        user_id: String,
        #[serde(default = "default_max_connections")]
        max_connections: u32,
        /// Write the built-in catalog into empty definition tables.
        #[serde(default = "default_true")]
        seed: bool,
    },
}

impl Default for ProviderConfig {
    fn default() -> Self {
        ProviderConfig::Local {
            catalog: None,
            completion_dir: None,
            in_memory: false,
        }
    }
}

impl ProviderConfig {
    pub fn name(&self) -> &'static str {
        match self {
            ProviderConfig::Local { .. } => "local",
            ProviderConfig::Relational { .. } => "relational",
        }
    }
}

fn default_user_id() -> String {
    DEFAULT_USER_ID.to_string()
}

fn default_max_connections() -> u32 {
    DEFAULT_MAX_CONNECTIONS
}

fn default_true() -> bool {
    true
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    value
        .map(|s| humantime::parse_duration(&s).map_err(serde::de::Error::custom))
        .transpose()
}

/// `CHECKLIST_DATA_DIR`, else `$HOME/.config/checklist`, else `.checklist`.
pub fn default_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("CHECKLIST_DATA_DIR") {
        if !dir.trim().is_empty() {
            return PathBuf::from(dir);
        }
    }
    match std::env::var("HOME") {
        Ok(home) if !home.trim().is_empty() => {
            PathBuf::from(home).join(".config").join("checklist")
        }
        _ => PathBuf::from(".checklist"),
    }
}

#[derive(Deserialize, Default)]
pub struct Config {
    pub log: Option<crate::log::Log>,
    #[serde(default)]
    pub provider: ProviderConfig,
    /// Upper bound for a single provider call, e.g. `500ms` or `5s`.
    #[serde(default, deserialize_with = "deserialize_duration")]
    pub timeout: Option<Duration>,
}

impl Config {
    pub fn from_str(s: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(&s)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let p = path.as_ref();
        let mut file = File::open(p).map_err(|e| ConfigError::OpeningError(p.to_owned(), e))?;
        let mut contents = vec![];
        file.read_to_end(&mut contents)?;
        let contents = String::from_utf8(contents).map_err(|_| ConfigError::Utf8Error)?;
        let config = Config::from_str(&contents)?;
        Ok(config)
    }

    /// Configuration from the process environment.
    ///
    /// `DATA_PROVIDER` set to `relational`, `postgresql` or `sqlite` selects the
    /// relational backend at `DATABASE_URL`; anything else keeps the local one.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    fn from_vars<F>(var: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let provider = match var("DATA_PROVIDER").as_deref().map(str::trim) {
            Some(kind @ "relational") | Some(kind @ "postgresql") | Some(kind @ "sqlite") => {
                let url = var("DATABASE_URL")
                    .filter(|url| !url.trim().is_empty())
                    .ok_or_else(|| ConfigError::MissingEnv("DATABASE_URL", kind.to_string()))?;
                ProviderConfig::Relational {
                    url,
                    user_id: var("CHECKLIST_USER_ID").unwrap_or_else(default_user_id),
                    max_connections: DEFAULT_MAX_CONNECTIONS,
                    seed: true,
                }
            }
            _ => ProviderConfig::default(),
        };
        Ok(Config {
            log: None,
            provider,
            timeout: None,
        })
    }

    pub fn provider_timeout(&self) -> Duration {
        self.timeout.unwrap_or(DEFAULT_PROVIDER_TIMEOUT)
    }
}

pub mod testdata {
    use super::Config;

    #[allow(dead_code)]
    pub fn test_config() -> Config {
        Config::from_str(
            r#"
        log:
            level: trace
            backend:
                type: Stderr
            structured: false
        timeout: 250ms
        provider:
            type: relational
            url: "sqlite::memory:"
        "#,
        )
        .unwrap()
    }
}
