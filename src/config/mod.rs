pub mod app_config;
pub mod model;

pub use app_config::{AppConfig, Cli, ProbeSettings, setup_http_client};
pub use model::{Scheme, Target, TargetDefinition, TargetSource};
