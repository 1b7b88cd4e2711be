use crate::error::VersionError;
use anyhow::Context;
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

/// Receives the outcome of every updater a reconcile pass looks at.
pub trait ReconcileObserver: Send + Sync {
    fn updated(&self, updater: &str);
    fn skipped(&self, updater: &str);
    fn failed(&self, updater: &str, error: &VersionError);
}

/// Observer that ignores everything.
pub struct NoopObserver;

impl ReconcileObserver for NoopObserver {
    fn updated(&self, _updater: &str) {}
    fn skipped(&self, _updater: &str) {}
    fn failed(&self, _updater: &str, _error: &VersionError) {}
}

/// Counters shared between the controller and the `/metrics` endpoint.
pub struct ReconcileCounters {
    passes: IntCounter,
    pass_errors: IntCounter,
    updater_results: IntCounterVec,
}

impl ReconcileCounters {
    pub fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        let passes = IntCounter::with_opts(Opts::new(
            "version_reconcile_passes_total",
            "Resource reconcile passes run by the controller",
        ))?;
        registry.register(Box::new(passes.clone()))?;

        let pass_errors = IntCounter::with_opts(Opts::new(
            "version_reconcile_pass_errors_total",
            "Resource reconcile passes that failed or timed out",
        ))?;
        registry.register(Box::new(pass_errors.clone()))?;

        let updater_results = IntCounterVec::new(
            Opts::new(
                "version_updater_results_total",
                "Version updater outcomes per reconcile pass",
            ),
            &["updater", "result"],
        )?;
        registry.register(Box::new(updater_results.clone()))?;

        Ok(Self {
            passes,
            pass_errors,
            updater_results,
        })
    }

    pub fn pass_completed(&self, ok: bool) {
        self.passes.inc();
        if !ok {
            self.pass_errors.inc();
        }
    }

    fn record(&self, updater: &str, result: &str) {
        self.updater_results
            .with_label_values(&[updater, result])
            .inc();
    }

    #[cfg(test)]
    pub(crate) fn passes(&self) -> (u64, u64) {
        (self.passes.get(), self.pass_errors.get())
    }

    #[cfg(test)]
    pub(crate) fn result_count(&self, updater: &str, result: &str) -> u64 {
        self.updater_results
            .with_label_values(&[updater, result])
            .get()
    }
}

impl ReconcileObserver for ReconcileCounters {
    fn updated(&self, updater: &str) {
        self.record(updater, "updated");
    }

    fn skipped(&self, updater: &str) {
        self.record(updater, "skipped");
    }

    fn failed(&self, updater: &str, _error: &VersionError) {
        self.record(updater, "failed");
    }
}

/// Renders every metric of the registry in the Prometheus text exposition format.
pub fn encode(registry: &Registry) -> anyhow::Result<String> {
    let mut buffer = Vec::new();
    TextEncoder::new()
        .encode(&registry.gather(), &mut buffer)
        .context("Failed to encode metrics")?;
    String::from_utf8(buffer).context("Encoded metrics are not valid UTF-8")
}
