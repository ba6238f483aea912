use anyhow::{Context, Result};
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use std::sync::Arc;

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    // Header sync
    header_requests: IntCounterVec,
    headers_imported: IntCounter,
    sync_failures: IntCounterVec,
    sync_rounds: IntCounter,
    sync_phase: IntGauge,
    local_best_number: IntGauge,
    peer_best_number: IntGauge,
}

impl Metrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let header_requests = IntCounterVec::new(
            Opts::new("light_sync_header_requests_total", "Total number of header requests sent"),
            &["kind"],
        )?;
        registry.register(Box::new(header_requests.clone()))?;

        let headers_imported = IntCounter::with_opts(Opts::new(
            "light_sync_headers_imported_total",
            "Total number of headers imported into the local chain",
        ))?;
        registry.register(Box::new(headers_imported.clone()))?;

        let sync_failures = IntCounterVec::new(
            Opts::new("light_sync_failures_total", "Total number of aborted sync sessions"),
            &["reason"],
        )?;
        registry.register(Box::new(sync_failures.clone()))?;

        let sync_rounds = IntCounter::with_opts(Opts::new(
            "light_sync_rounds_total",
            "Total number of completed sync rounds",
        ))?;
        registry.register(Box::new(sync_rounds.clone()))?;

        let sync_phase = IntGauge::with_opts(Opts::new("light_sync_phase", "Current sync phase"))?;
        registry.register(Box::new(sync_phase.clone()))?;

        let local_best_number = IntGauge::with_opts(Opts::new(
            "light_sync_local_best_number",
            "Number of the best local header",
        ))?;
        registry.register(Box::new(local_best_number.clone()))?;

        let peer_best_number = IntGauge::with_opts(Opts::new(
            "light_sync_target_number",
            "Best number advertised by the sync peer",
        ))?;
        registry.register(Box::new(peer_best_number.clone()))?;

        Ok(Self {
            registry,
            header_requests,
            headers_imported,
            sync_failures,
            sync_rounds,
            sync_phase,
            local_best_number,
            peer_best_number,
        })
    }

    pub fn gather(&self) -> Result<String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::<u8>::new();
        let encoder = TextEncoder::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .context("failed to encode metrics")?;
        String::from_utf8(buffer).context("metrics not utf8")
    }

    pub fn inc_header_requests(&self, kind: &str) {
        self.header_requests.with_label_values(&[kind]).inc();
    }

    pub fn inc_headers_imported(&self, count: u64) {
        self.headers_imported.inc_by(count);
    }

    pub fn inc_sync_failures(&self, reason: &str) {
        self.sync_failures.with_label_values(&[reason]).inc();
    }

    pub fn inc_sync_rounds(&self) {
        self.sync_rounds.inc();
    }

    pub fn set_sync_phase(&self, v: i64) {
        self.sync_phase.set(v);
    }

    pub fn set_local_best_number(&self, v: i64) {
        self.local_best_number.set(v);
    }

    pub fn set_peer_best_number(&self, v: i64) {
        self.peer_best_number.set(v);
    }
}

pub type SharedMetrics = Arc<Metrics>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gather_contains_counters() {
        let metrics = Metrics::new().unwrap();
        metrics.inc_header_requests("by_number");
        metrics.inc_headers_imported(192);
        metrics.inc_sync_failures("bad_subchain");

        let text = metrics.gather().unwrap();
        assert!(text.contains("light_sync_header_requests_total{kind=\"by_number\"} 1"));
        assert!(text.contains("light_sync_headers_imported_total 192"));
        assert!(text.contains("light_sync_failures_total{reason=\"bad_subchain\"} 1"));
    }
}
