use std::ffi::OsString;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;

use super::model::{FileConfig, TargetDefinition, TargetSource, WATCH_PREFIX};
use crate::error::ConfigError;
use crate::logging::LogFormat;

/// Command line of the exporter. Every flag except `--target` can also be
/// given through the environment (or a `.env` file).
#[derive(Debug, Parser)]
#[command(name = "critic", version, about)]
pub struct Cli {
    /// Address the /metrics endpoint listens on. `:PORT` listens on all interfaces.
    #[arg(long, env = "BIND_ADDRESS", default_value = ":3001")]
    pub bind_address: String,

    /// Seconds between two probes of the same target.
    #[arg(long, env = "PROBE_INTERVAL_SECONDS", default_value_t = 30)]
    pub interval_seconds: u64,

    /// Per-request timeout in seconds.
    #[arg(long, env = "REQUEST_TIMEOUT_SECONDS", default_value_t = 10)]
    pub request_timeout_seconds: u64,

    /// Spread the first probe of each target over this many seconds.
    #[arg(long, env = "PROBE_START_JITTER_SECONDS", default_value_t = 0)]
    pub start_jitter_seconds: u64,

    /// Accept invalid TLS certificates (expired, self-signed, wrong host).
    #[arg(long, env = "INSECURE_SKIP_VERIFY")]
    pub insecure_skip_verify: bool,

    /// Optional YAML file with additional targets.
    #[arg(long, env = "CONFIG_FILE")]
    pub config: Option<PathBuf>,

    /// Additional target, may be repeated.
    #[arg(long = "target", value_name = "NAME=URL")]
    pub targets: Vec<String>,

    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

/// Timing knobs shared by every prober.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeSettings {
    pub interval: Duration,
    pub request_timeout: Duration,
    pub start_jitter: Duration,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            request_timeout: Duration::from_secs(10),
            start_jitter: Duration::ZERO,
        }
    }
}

pub struct AppConfig {
    pub bind_address: SocketAddr,
    pub settings: ProbeSettings,
    pub insecure_skip_verify: bool,
    pub targets: Vec<TargetDefinition>,
}

impl AppConfig {
    /// Build the application configuration from the parsed command line and
    /// the process environment.
    ///
    /// Targets are collected from the config file, then `WATCH_*` variables,
    /// then `--target` flags. They are not validated here; that is the
    /// supervisor's job, so every bad target can be reported at once.
    pub fn from_cli<I>(cli: Cli, vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (OsString, OsString)>,
    {
        let bind_address = parse_bind_address(&cli.bind_address)?;

        if cli.interval_seconds == 0 {
            return Err(ConfigError::InvalidSetting {
                name: "interval-seconds",
                reason: "must be greater than zero".to_string(),
            });
        }
        if cli.request_timeout_seconds == 0 {
            return Err(ConfigError::InvalidSetting {
                name: "request-timeout-seconds",
                reason: "must be greater than zero".to_string(),
            });
        }

        let mut targets = Vec::new();
        if let Some(path) = &cli.config {
            targets.extend(targets_from_file(path)?);
        }
        targets.extend(targets_from_env(vars)?);
        for entry in &cli.targets {
            targets.push(parse_target_flag(entry)?);
        }

        Ok(AppConfig {
            bind_address,
            settings: ProbeSettings {
                interval: Duration::from_secs(cli.interval_seconds),
                request_timeout: Duration::from_secs(cli.request_timeout_seconds),
                start_jitter: Duration::from_secs(cli.start_jitter_seconds),
            },
            insecure_skip_verify: cli.insecure_skip_verify,
            targets,
        })
    }
}

/// Parse a listen address, accepting the `:PORT` shorthand for all interfaces.
pub fn parse_bind_address(value: &str) -> Result<SocketAddr, ConfigError> {
    let normalized = match value.strip_prefix(':') {
        Some(port) => format!("0.0.0.0:{port}"),
        None => value.to_string(),
    };
    normalized
        .parse()
        .map_err(|source| ConfigError::BindAddress {
            value: value.to_string(),
            source,
        })
}

/// Collect the `WATCH_<NAME>=<URL>` entries of an environment.
pub fn targets_from_env<I>(vars: I) -> Result<Vec<TargetDefinition>, ConfigError>
where
    I: IntoIterator<Item = (OsString, OsString)>,
{
    let mut targets = Vec::new();
    for (key, value) in vars {
        let Some(key_str) = key.to_str() else {
            if key.to_string_lossy().starts_with(WATCH_PREFIX) {
                return Err(ConfigError::MalformedEntry {
                    entry: key.to_string_lossy().into_owned(),
                });
            }
            continue;
        };
        let Some(name) = key_str.strip_prefix(WATCH_PREFIX) else {
            continue;
        };
        if name.is_empty() {
            return Err(ConfigError::EmptyName {
                key: key_str.to_string(),
            });
        }
        let url = value.into_string().map_err(|value| ConfigError::MalformedEntry {
            entry: format!("{key_str}={}", value.to_string_lossy()),
        })?;
        targets.push(TargetDefinition::new(name, url, TargetSource::Env));
    }
    // Environment order is platform dependent; keep startup logs stable.
    targets.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(targets)
}

/// Parse a `--target NAME=URL` value.
pub fn parse_target_flag(entry: &str) -> Result<TargetDefinition, ConfigError> {
    let Some((name, url)) = entry.split_once('=') else {
        return Err(ConfigError::MalformedEntry {
            entry: entry.to_string(),
        });
    };
    if name.is_empty() {
        return Err(ConfigError::EmptyName {
            key: format!("--target {entry}"),
        });
    }
    Ok(TargetDefinition::new(name, url, TargetSource::Flag))
}

/// Load the targets listed in a YAML config file.
pub fn targets_from_file(path: &Path) -> Result<Vec<TargetDefinition>, ConfigError> {
    let config_str = std::fs::read_to_string(path).map_err(|source| ConfigError::ConfigFileRead {
        path: path.to_path_buf(),
        source,
    })?;
    let config: FileConfig =
        serde_yaml::from_str(&config_str).map_err(|source| ConfigError::ConfigFileParse {
            path: path.to_path_buf(),
            source,
        })?;

    tracing::debug!(path = %path.display(), targets = config.targets.len(), "loaded config file");

    Ok(config
        .targets
        .into_iter()
        .map(|t| TargetDefinition::new(t.name, t.url, TargetSource::File))
        .collect())
}

/// Setup the HTTP client shared by all probers.
///
/// TLS details are kept on every response so the prober can read the peer
/// certificate without opening a second connection.
pub fn setup_http_client(
    settings: &ProbeSettings,
    insecure_skip_verify: bool,
) -> Result<reqwest::Client, ConfigError> {
    reqwest::Client::builder()
        .timeout(settings.request_timeout)
        .danger_accept_invalid_certs(insecure_skip_verify)
        .tls_info(true)
        .user_agent(concat!("critic/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(ConfigError::Client)
}
