use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

pub mod config;
pub mod error;
pub mod exporter;
pub mod http_probe;
pub mod logging;
pub mod metrics;
pub mod prober;
pub mod supervisor;
#[cfg(test)]
mod test_support;

use config::{AppConfig, Cli, setup_http_client};
use exporter::Exporter;
use metrics::MetricsRegistry;
use supervisor::Supervisor;

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env is the normal case.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    logging::init(cli.log_format);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %format!("{e:#}"), "exiting");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let app_config = AppConfig::from_cli(cli, std::env::vars_os())?;
    let client = setup_http_client(&app_config.settings, app_config.insecure_skip_verify)?;

    let registry = MetricsRegistry::new();
    let supervisor = Supervisor::start(
        &registry,
        client,
        &app_config.targets,
        app_config.settings,
    )?;

    let exporter = Exporter::bind(app_config.bind_address, registry.clone())
        .await
        .with_context(|| format!("failed to bind {}", app_config.bind_address))?;

    let cancel = CancellationToken::new();
    let server = tokio::spawn(exporter.serve(cancel.clone()));

    shutdown_signal().await;
    info!("shutdown requested");

    cancel.cancel();
    supervisor.shutdown().await;
    server.await.context("metrics listener panicked")??;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
