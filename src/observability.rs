//! Observability: dispatch counters and tracing setup

use std::sync::atomic::{AtomicU64, Ordering};
use tracing_subscriber::EnvFilter;

/// Dispatch counters shared by every clone of a factory
#[derive(Debug, Default)]
pub struct Metrics {
    facades_created: AtomicU64,
    probes: AtomicU64,
    access_failures: AtomicU64,
    unsupported_formats: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn facade_created(&self) {
        self.facades_created.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "facades_created", "Metric incremented");
    }

    pub fn probe(&self) {
        self.probes.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "probes", "Metric incremented");
    }

    pub fn access_failure(&self) {
        self.access_failures.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "access_failures", "Metric incremented");
    }

    pub fn unsupported_format(&self) {
        self.unsupported_formats.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "unsupported_formats", "Metric incremented");
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            facades_created: self.facades_created.load(Ordering::Relaxed),
            probes: self.probes.load(Ordering::Relaxed),
            access_failures: self.access_failures.load(Ordering::Relaxed),
            unsupported_formats: self.unsupported_formats.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub facades_created: u64,
    pub probes: u64,
    pub access_failures: u64,
    pub unsupported_formats: u64,
}

/// Install the global fmt subscriber.
///
/// `RUST_LOG` wins over the configured filter; an unparsable filter falls
/// back to `info`.
pub fn init_tracing(filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
