use std::fmt;

use serde::Deserialize;
use url::Url;

/// Prefix of the environment variables that declare targets.
pub const WATCH_PREFIX: &str = "WATCH_";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Http,
    Https,
}

/// Where a target definition was read from. Used to attribute validation
/// errors to the configuration key the operator has to fix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetSource {
    Env,
    Flag,
    File,
}

/// A target as written in the configuration, not yet validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetDefinition {
    pub name: String,
    pub url: String,
    pub source: TargetSource,
}

impl TargetDefinition {
    pub fn new(name: impl Into<String>, url: impl Into<String>, source: TargetSource) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            source,
        }
    }

    /// The configuration key this definition came from, e.g. `WATCH_GOOGLE`.
    pub fn key(&self) -> String {
        match self.source {
            TargetSource::Env => format!("{WATCH_PREFIX}{}", self.name),
            TargetSource::Flag => format!("--target {}", self.name),
            TargetSource::File => format!("config file target {}", self.name),
        }
    }

    /// Validate the URL and turn the definition into a [`Target`].
    pub fn validate(&self) -> Result<Target, String> {
        let parsed = Url::parse(&self.url).map_err(|e| format!("invalid URL {:?}: {e}", self.url))?;

        let scheme = match parsed.scheme() {
            "http" => Scheme::Http,
            "https" => Scheme::Https,
            other => return Err(format!("unsupported scheme {other:?} in {:?}", self.url)),
        };

        if parsed.host_str().is_none_or(str::is_empty) {
            return Err(format!("URL {:?} has no host", self.url));
        }

        Ok(Target {
            name: self.name.clone(),
            url: self.url.clone(),
            scheme,
        })
    }
}

/// A validated probe target. Immutable for the lifetime of the process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    name: String,
    /// The URL exactly as configured; used as the `url` label.
    url: String,
    scheme: Scheme,
}

impl Target {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    pub fn is_https(&self) -> bool {
        self.scheme == Scheme::Https
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.url)
    }
}

/// Layout of the optional YAML config file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub targets: Vec<TargetConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TargetConfig {
    /// Value of the `name` label.
    pub name: String,

    /// The URL of the target service to be monitored.
    pub url: String,
}
