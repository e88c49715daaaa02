pub mod registry;

pub use registry::{MetricsRegistry, Sample};

use prometheus::{Counter, Gauge};

use crate::config::Target;
use crate::error::RegistryError;
use crate::http_probe::result::ProbeOutcome;

const NAME_LABEL: &str = "name";
const URL_LABEL: &str = "url";

pub const STATUS_CODE_METRIC: &str = "critic_target_status_code";
pub const REQUEST_DURATION_METRIC: &str = "critic_target_request_duration";
pub const PROBE_FAILED_METRIC: &str = "critic_target_probe_failed_counter";
pub const HEALTHY_METRIC: &str = "critic_target_is_healthy";
pub const CERTIFICATE_EXPIRATION_METRIC: &str = "critic_target_server_certificate_expiration_time";

/// The instruments of one target.
///
/// Created once per target at startup; the prober only ever writes through
/// these handles. `certificate_expiration` exists for https targets only.
pub struct MetricSet {
    status_code: Gauge,
    request_duration: Gauge,
    probe_failed: Counter,
    healthy: Gauge,
    certificate_expiration: Option<Gauge>,
}

impl MetricSet {
    /// Register the instruments for `target`, labelled with its name and URL.
    ///
    /// If any instrument fails to register, the ones created so far are
    /// removed again before the error is returned.
    pub fn register(registry: &MetricsRegistry, target: &Target) -> Result<Self, RegistryError> {
        let labels = [(NAME_LABEL, target.name()), (URL_LABEL, target.url())];
        let mut created: Vec<Gauge> = Vec::new();

        let result = (|| -> Result<Self, RegistryError> {
            let status_code = registry.register_gauge(
                STATUS_CODE_METRIC,
                "HTTP status code of the last probe; 0 if the request could not be built, 1 on transport errors.",
                &labels,
            )?;
            created.push(status_code.clone());

            let request_duration = registry.register_gauge(
                REQUEST_DURATION_METRIC,
                "Duration of the last probe request in seconds.",
                &labels,
            )?;
            created.push(request_duration.clone());

            let healthy = registry.register_gauge(
                HEALTHY_METRIC,
                "1 if the last probe succeeded, 0 otherwise.",
                &labels,
            )?;
            created.push(healthy.clone());

            let certificate_expiration = if target.is_https() {
                let gauge = registry.register_gauge(
                    CERTIFICATE_EXPIRATION_METRIC,
                    "NotAfter of the server's leaf certificate as a unix timestamp.",
                    &labels,
                )?;
                created.push(gauge.clone());
                Some(gauge)
            } else {
                None
            };

            let probe_failed = registry.register_counter(
                PROBE_FAILED_METRIC,
                "Number of failed probes.",
                &labels,
            )?;

            Ok(MetricSet {
                status_code,
                request_duration,
                probe_failed,
                healthy,
                certificate_expiration,
            })
        })();

        if result.is_err() {
            for gauge in &created {
                registry.unregister(gauge);
            }
        }
        result
    }

    /// Remove every instrument of this set from the registry.
    pub fn unregister(&self, registry: &MetricsRegistry) {
        registry.unregister(&self.status_code);
        registry.unregister(&self.request_duration);
        registry.unregister(&self.healthy);
        registry.unregister(&self.probe_failed);
        if let Some(gauge) = &self.certificate_expiration {
            registry.unregister(gauge);
        }
    }

    /// Publish one probe outcome.
    pub fn record(&self, outcome: &ProbeOutcome) {
        self.request_duration.set(outcome.duration.as_secs_f64());
        self.status_code.set(f64::from(outcome.status_code_value()));

        if outcome.classification.is_healthy() {
            self.healthy.set(1.0);
        } else {
            self.probe_failed.inc();
            self.healthy.set(0.0);
        }

        // Without a certificate the previous expiry stays exposed.
        if let (Some(gauge), Some(not_after)) = (&self.certificate_expiration, outcome.certificate_expiry) {
            gauge.set(not_after as f64);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::config::{TargetDefinition, TargetSource};
    use crate::http_probe::result::Classification;

    fn target(name: &str, url: &str) -> Target {
        TargetDefinition::new(name, url, TargetSource::Env)
            .validate()
            .unwrap()
    }

    fn outcome(status: Option<u16>, classification: Classification) -> ProbeOutcome {
        ProbeOutcome {
            request_built: true,
            response_received: status.is_some(),
            status_code: status,
            duration: Duration::from_millis(250),
            certificate_expiry: None,
            classification,
        }
    }

    fn labels<'a>(t: &'a Target) -> [(&'static str, &'a str); 2] {
        [(NAME_LABEL, t.name()), (URL_LABEL, t.url())]
    }

    #[test]
    fn http_targets_have_no_certificate_gauge() {
        let registry = MetricsRegistry::new();
        let http = target("plain", "http://example.com");
        let https = target("secure", "https://example.com");

        MetricSet::register(&registry, &http).unwrap();
        MetricSet::register(&registry, &https).unwrap();

        assert_eq!(registry.value(CERTIFICATE_EXPIRATION_METRIC, &labels(&http)), None);
        assert_eq!(registry.value(CERTIFICATE_EXPIRATION_METRIC, &labels(&https)), Some(0.0));
        assert_eq!(registry.snapshot().len(), 4 + 5);
    }

    #[test]
    fn same_url_with_different_names_registers() {
        let registry = MetricsRegistry::new();
        MetricSet::register(&registry, &target("a", "http://example.com")).unwrap();
        MetricSet::register(&registry, &target("b", "http://example.com")).unwrap();
    }

    #[test]
    fn duplicate_target_fails_and_leaves_registry_unchanged() {
        let registry = MetricsRegistry::new();
        let t = target("a", "https://example.com");
        MetricSet::register(&registry, &t).unwrap();
        let before = registry.snapshot().len();

        let err = MetricSet::register(&registry, &t).err().unwrap();

        assert!(matches!(err, RegistryError::DuplicateInstrument { .. }));
        assert_eq!(registry.snapshot().len(), before);
    }

    #[test]
    fn record_healthy_and_failed_outcomes() {
        let registry = MetricsRegistry::new();
        let t = target("a", "http://example.com");
        let set = MetricSet::register(&registry, &t).unwrap();

        set.record(&outcome(Some(200), Classification::Healthy));
        assert_eq!(registry.value(STATUS_CODE_METRIC, &labels(&t)), Some(200.0));
        assert_eq!(registry.value(HEALTHY_METRIC, &labels(&t)), Some(1.0));
        assert_eq!(registry.value(PROBE_FAILED_METRIC, &labels(&t)), Some(0.0));
        assert_eq!(registry.value(REQUEST_DURATION_METRIC, &labels(&t)), Some(0.25));

        set.record(&outcome(Some(503), Classification::Unhealthy));
        set.record(&outcome(None, Classification::Failed));
        assert_eq!(registry.value(STATUS_CODE_METRIC, &labels(&t)), Some(1.0));
        assert_eq!(registry.value(HEALTHY_METRIC, &labels(&t)), Some(0.0));
        assert_eq!(registry.value(PROBE_FAILED_METRIC, &labels(&t)), Some(2.0));
    }

    #[test]
    fn certificate_expiry_is_kept_when_missing() {
        let registry = MetricsRegistry::new();
        let t = target("a", "https://example.com");
        let set = MetricSet::register(&registry, &t).unwrap();

        let mut with_cert = outcome(Some(200), Classification::Healthy);
        with_cert.certificate_expiry = Some(1_893_456_000);
        set.record(&with_cert);
        set.record(&outcome(None, Classification::Failed));

        assert_eq!(
            registry.value(CERTIFICATE_EXPIRATION_METRIC, &labels(&t)),
            Some(1_893_456_000.0)
        );
    }

    #[test]
    fn unregister_removes_every_instrument() {
        let registry = MetricsRegistry::new();
        let set = MetricSet::register(&registry, &target("a", "https://example.com")).unwrap();

        set.unregister(&registry);

        assert!(registry.snapshot().is_empty());
    }
}
