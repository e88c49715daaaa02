//! Thread-safe store of every instrument the exporter publishes.
//!
//! Instruments are lock-free atomics owned by an explicitly constructed
//! [`prometheus::Registry`]; probers write through cloned handles while the
//! exporter gathers. A gather is consistent per instrument only.

use std::collections::HashMap;

use prometheus::core::Collector;
use prometheus::proto::MetricType;
use prometheus::{Counter, Encoder, Gauge, Opts, Registry, TextEncoder};

use crate::error::RegistryError;

/// One exposed value.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub name: String,
    pub labels: Vec<(String, String)>,
    pub value: f64,
}

#[derive(Clone, Default)]
pub struct MetricsRegistry {
    registry: Registry,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a gauge identified by `name` and constant `labels`.
    ///
    /// Fails with [`RegistryError::DuplicateInstrument`] when the same name
    /// and label values are already registered.
    pub fn register_gauge(
        &self,
        name: &str,
        help: &str,
        labels: &[(&str, &str)],
    ) -> Result<Gauge, RegistryError> {
        let gauge = Gauge::with_opts(opts(name, help, labels)).map_err(|source| {
            RegistryError::Prometheus {
                name: name.to_string(),
                source,
            }
        })?;
        self.register(name, labels, gauge)
    }

    /// Register a monotonic counter. Same identity rules as gauges.
    pub fn register_counter(
        &self,
        name: &str,
        help: &str,
        labels: &[(&str, &str)],
    ) -> Result<Counter, RegistryError> {
        let counter = Counter::with_opts(opts(name, help, labels)).map_err(|source| {
            RegistryError::Prometheus {
                name: name.to_string(),
                source,
            }
        })?;
        self.register(name, labels, counter)
    }

    fn register<C>(&self, name: &str, labels: &[(&str, &str)], collector: C) -> Result<C, RegistryError>
    where
        C: Collector + Clone + 'static,
    {
        match self.registry.register(Box::new(collector.clone())) {
            Ok(()) => Ok(collector),
            Err(prometheus::Error::AlreadyReg) => Err(RegistryError::DuplicateInstrument {
                name: name.to_string(),
                labels: labels
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            }),
            Err(source) => Err(RegistryError::Prometheus {
                name: name.to_string(),
                source,
            }),
        }
    }

    /// Remove an instrument again. Only used to roll back a failed startup.
    pub fn unregister<C>(&self, collector: &C)
    where
        C: Collector + Clone + 'static,
    {
        if let Err(e) = self.registry.unregister(Box::new(collector.clone())) {
            tracing::debug!(error = %e, "instrument was not registered");
        }
    }

    /// Current value of every registered instrument, sorted by name.
    pub fn snapshot(&self) -> Vec<Sample> {
        let families = self.registry.gather();
        let mut samples = Vec::new();

        for family in &families {
            for metric in family.get_metric() {
                let value = match family.get_field_type() {
                    MetricType::COUNTER => metric.get_counter().get_value(),
                    MetricType::GAUGE => metric.get_gauge().get_value(),
                    _ => metric.get_untyped().get_value(),
                };
                samples.push(Sample {
                    name: family.get_name().to_string(),
                    labels: metric
                        .get_label()
                        .iter()
                        .map(|l| (l.get_name().to_string(), l.get_value().to_string()))
                        .collect(),
                    value,
                });
            }
        }

        samples
    }

    /// Look up a single value by name and label values. Mostly useful in tests
    /// and for debugging output.
    pub fn value(&self, name: &str, labels: &[(&str, &str)]) -> Option<f64> {
        self.snapshot()
            .into_iter()
            .find(|s| {
                s.name == name
                    && labels.iter().all(|(k, v)| {
                        s.labels.iter().any(|(lk, lv)| lk == k && lv == v)
                    })
            })
            .map(|s| s.value)
    }

    /// Render every instrument in the Prometheus text exposition format.
    /// Returns the body together with its content type.
    pub fn encode_text(&self) -> Result<(Vec<u8>, String), prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok((buffer, encoder.format_type().to_string()))
    }
}

fn opts(name: &str, help: &str, labels: &[(&str, &str)]) -> Opts {
    let const_labels: HashMap<String, String> = labels
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    Opts::new(name, help).const_labels(const_labels)
}
