use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while turning configuration into running probers.
///
/// Every variant is fatal at startup; nothing here is produced once the
/// probers are running.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("malformed configuration entry {entry:?}: expected NAME=URL")]
    MalformedEntry { entry: String },

    #[error("{key} does not name a target")]
    EmptyName { key: String },

    #[error("{} invalid target(s):\n{}", .0.len(), format_target_errors(.0))]
    InvalidTargets(Vec<TargetError>),

    #[error("target {name:?} is defined more than once")]
    DuplicateTarget { name: String },

    #[error("invalid bind address {value:?}")]
    BindAddress {
        value: String,
        #[source]
        source: std::net::AddrParseError,
    },

    #[error("invalid setting {name}: {reason}")]
    InvalidSetting { name: &'static str, reason: String },

    #[error("failed to read config file {path}")]
    ConfigFileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}")]
    ConfigFileParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("failed to build HTTP client")]
    Client(#[source] reqwest::Error),
}

/// A single target that failed validation, attributed to the configuration
/// key it came from.
#[derive(Debug, Error)]
#[error("{key}: {reason}")]
pub struct TargetError {
    pub key: String,
    pub reason: String,
}

fn format_target_errors(errors: &[TargetError]) -> String {
    errors
        .iter()
        .map(|e| format!("  - {e}"))
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("instrument {name} with labels {labels:?} is already registered")]
    DuplicateInstrument {
        name: String,
        labels: Vec<(String, String)>,
    },

    #[error("failed to create instrument {name}")]
    Prometheus {
        name: String,
        #[source]
        source: prometheus::Error,
    },
}
