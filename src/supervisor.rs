//! Turns the configured targets into running probers.
//!
//! Startup is all-or-nothing: every target is validated first and every
//! failure is reported together; then each target's instruments are
//! registered. If anything fails, instruments registered so far are removed
//! and no prober is launched.

use std::collections::HashSet;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::{ProbeSettings, Target, TargetDefinition};
use crate::error::{ConfigError, TargetError};
use crate::metrics::{MetricSet, MetricsRegistry};
use crate::prober::Prober;

pub struct Supervisor {
    targets: Vec<Target>,
    tasks: JoinSet<()>,
    cancel: CancellationToken,
}

impl Supervisor {
    /// Validate and register every target, then launch one prober per target.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(
        registry: &MetricsRegistry,
        client: reqwest::Client,
        definitions: &[TargetDefinition],
        settings: ProbeSettings,
    ) -> Result<Self, ConfigError> {
        let targets = validate_targets(definitions)?;
        let metric_sets = register_all(registry, &targets)?;

        if targets.is_empty() {
            warn!("no targets configured; set WATCH_<NAME>=<URL> to add one");
        }

        let cancel = CancellationToken::new();
        let mut tasks = JoinSet::new();
        for (target, metrics) in targets.iter().cloned().zip(metric_sets) {
            let prober = Prober::new(target, metrics, client.clone(), settings);
            tasks.spawn(prober.run(cancel.child_token()));
        }

        info!(probers = tasks.len(), "probers launched");

        Ok(Supervisor {
            targets,
            tasks,
            cancel,
        })
    }

    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Cancel every prober and wait for all of them to exit.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        while let Some(result) = self.tasks.join_next().await {
            if let Err(e) = result {
                warn!(error = %e, "prober task ended abnormally");
            }
        }
        info!("all probers stopped");
    }
}

/// Validate every definition, collecting all URL errors before failing.
pub fn validate_targets(definitions: &[TargetDefinition]) -> Result<Vec<Target>, ConfigError> {
    let mut seen = HashSet::new();
    let mut targets = Vec::with_capacity(definitions.len());
    let mut errors = Vec::new();

    for definition in definitions {
        if !seen.insert(definition.name.as_str()) {
            return Err(ConfigError::DuplicateTarget {
                name: definition.name.clone(),
            });
        }
        match definition.validate() {
            Ok(target) => targets.push(target),
            Err(reason) => errors.push(TargetError {
                key: definition.key(),
                reason,
            }),
        }
    }

    if !errors.is_empty() {
        return Err(ConfigError::InvalidTargets(errors));
    }
    Ok(targets)
}

fn register_all(registry: &MetricsRegistry, targets: &[Target]) -> Result<Vec<MetricSet>, ConfigError> {
    let mut sets = Vec::with_capacity(targets.len());
    for target in targets {
        match MetricSet::register(registry, target) {
            Ok(set) => sets.push(set),
            Err(e) => {
                for set in &sets {
                    set.unregister(registry);
                }
                return Err(e.into());
            }
        }
    }
    Ok(sets)
}
