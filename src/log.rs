use serde::Deserialize;
use tracing::subscriber::{set_global_default, SetGlobalDefaultError};
use tracing_subscriber::{fmt::time::ChronoUtc, fmt::Subscriber, EnvFilter};

const DEFAULT_LEVEL: &str = "warn";

#[derive(Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum LogType {
    Stdout,
    #[default]
    Stderr,
}

#[derive(Deserialize, Debug)]
pub struct Log {
    pub level: String,
    #[serde(default)]
    pub structured: bool,
    #[serde(default)]
    pub backend: LogType,
}

/// the environment filter if present, the configured level otherwise
fn filter(env_filter: Option<EnvFilter>, config: Option<&Log>) -> EnvFilter {
    match env_filter {
        Some(filter) => filter,
        None => EnvFilter::new(config.map(|c| c.level.as_str()).unwrap_or(DEFAULT_LEVEL)),
    }
}

/// setup log from an optional environment filter and the config file section
///
/// if the environment filter is present, the configured level is not used
pub fn setup(env_filter: Option<EnvFilter>, config: Option<&Log>) -> Result<(), SetGlobalDefaultError> {
    let filter = filter(env_filter, config);
    let structured = config.map(|c| c.structured).unwrap_or(false);
    let backend = config.map(|c| c.backend).unwrap_or_default();

    let sbuilder = Subscriber::builder()
        .with_timer(ChronoUtc::rfc_3339())
        .with_level(true)
        .with_env_filter(filter);

    match (backend, structured) {
        (LogType::Stdout, false) => {
            set_global_default(sbuilder.with_writer(std::io::stdout).with_ansi(true).finish())
        }
        (LogType::Stdout, true) => {
            set_global_default(sbuilder.with_writer(std::io::stdout).json().finish())
        }
        (LogType::Stderr, false) => {
            set_global_default(sbuilder.with_writer(std::io::stderr).with_ansi(true).finish())
        }
        (LogType::Stderr, true) => {
            set_global_default(sbuilder.with_writer(std::io::stderr).json().finish())
        }
    }
}
