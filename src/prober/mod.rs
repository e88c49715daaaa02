//! The per-target probe loop.
//!
//! A prober sleeps until its ticker fires, probes its target once, records
//! the outcome into its [`MetricSet`] and goes back to sleep. It has no
//! terminal state of its own; it stops only when its cancellation token
//! fires, which is observed both while sleeping and while a request is in
//! flight.

pub mod ticker;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{ProbeSettings, Target};
use crate::http_probe::{Classification, ProbeOutcome, probe_target};
use crate::metrics::MetricSet;
use ticker::{Ticker, start_offset};

pub struct Prober {
    target: Target,
    metrics: MetricSet,
    client: reqwest::Client,
    settings: ProbeSettings,
}

impl Prober {
    pub fn new(
        target: Target,
        metrics: MetricSet,
        client: reqwest::Client,
        settings: ProbeSettings,
    ) -> Self {
        Self {
            target,
            metrics,
            client,
            settings,
        }
    }

    /// Probe once and publish the outcome.
    pub async fn run_cycle(&self) -> ProbeOutcome {
        let outcome = probe_target(&self.client, &self.target).await;
        self.metrics.record(&outcome);

        match outcome.classification {
            Classification::Healthy => debug!(
                target_name = self.target.name(),
                target_url = self.target.url(),
                status = outcome.status_code_value(),
                duration_ms = outcome.duration.as_millis() as u64,
                certificate_expires = ?outcome
                    .certificate_expiry
                    .and_then(|ts| chrono::DateTime::from_timestamp(ts, 0))
                    .map(|dt| dt.to_rfc3339()),
                "probe succeeded"
            ),
            Classification::Unhealthy => warn!(
                target_name = self.target.name(),
                target_url = self.target.url(),
                status = outcome.status_code_value(),
                "target responded with a failing status"
            ),
            // Already logged with the underlying error by the probe.
            Classification::Failed => {}
        }

        outcome
    }

    /// Run until `cancel` fires.
    pub async fn run(self, cancel: CancellationToken) {
        let offset = start_offset(self.target.name(), self.settings.start_jitter);
        let mut ticker = Ticker::new(self.settings.interval, offset);

        info!(
            target_name = self.target.name(),
            target_url = self.target.url(),
            interval_secs = self.settings.interval.as_secs(),
            start_offset_ms = offset.as_millis() as u64,
            "watching target"
        );

        while ticker.tick(&cancel).await {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = self.run_cycle() => {}
            }
        }

        debug!(
            target_name = self.target.name(),
            target_url = self.target.url(),
            "prober stopped"
        );
    }
}
