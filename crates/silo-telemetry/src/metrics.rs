//! Prometheus-backed metrics registry and snapshot helpers.
//!
//! # Design
//! - Encapsulates collector registration to keep the public API small.
//! - Covers the three subsystems: scan, link planner/executor, rehome.

use anyhow::Result;
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use serde::Serialize;

/// Prometheus-backed metrics registry shared across subsystems.
#[derive(Clone)]
pub struct Metrics {
    inner: std::sync::Arc<MetricsInner>,
}

struct MetricsInner {
    registry: Registry,
    events_emitted_total: IntCounterVec,
    files_scanned_total: IntCounterVec,
    bytes_hashed_total: IntCounter,
    scan_sessions_active: IntGauge,
    payloads_indexed_total: IntCounter,
    link_actions_total: IntCounterVec,
    link_bytes_saved_total: IntCounter,
    rehome_runs_total: IntCounterVec,
    rehome_blocks_total: IntCounter,
}

/// Snapshot of selected gauges and counters, for CLI `stats` output.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    /// Cumulative bytes hashed across all scans.
    pub bytes_hashed_total: u64,
    /// Scan sessions currently in progress.
    pub scan_sessions_active: i64,
    /// Cumulative payloads (re)indexed.
    pub payloads_indexed_total: u64,
    /// Cumulative bytes saved by completed hardlink actions.
    pub link_bytes_saved_total: u64,
    /// Cumulative rehome plans that resolved to BLOCK.
    pub rehome_blocks_total: u64,
}

impl Metrics {
    /// Construct a new metrics registry with the standard collectors
    /// registered.
    ///
    /// # Errors
    ///
    /// Returns an error if any collector fails to register (e.g. a name
    /// collision), which would indicate a programming error.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let events_emitted_total = IntCounterVec::new(
            Opts::new("events_emitted_total", "Domain events emitted by type"),
            &["type"],
        )?;
        let files_scanned_total = IntCounterVec::new(
            Opts::new("files_scanned_total", "Files observed during scans by outcome"),
            &["outcome"],
        )?;
        let bytes_hashed_total = IntCounter::with_opts(Opts::new(
            "bytes_hashed_total",
            "Cumulative bytes passed through the hasher",
        ))?;
        let scan_sessions_active =
            IntGauge::with_opts(Opts::new("scan_sessions_active", "Scan sessions in progress"))?;
        let payloads_indexed_total = IntCounter::with_opts(Opts::new(
            "payloads_indexed_total",
            "Cumulative payload manifests (re)computed",
        ))?;
        let link_actions_total = IntCounterVec::new(
            Opts::new("link_actions_total", "Hardlink actions executed by status"),
            &["status"],
        )?;
        let link_bytes_saved_total = IntCounter::with_opts(Opts::new(
            "link_bytes_saved_total",
            "Cumulative bytes saved by completed hardlink actions",
        ))?;
        let rehome_runs_total = IntCounterVec::new(
            Opts::new("rehome_runs_total", "Rehome plans resolved by decision"),
            &["decision"],
        )?;
        let rehome_blocks_total = IntCounter::with_opts(Opts::new(
            "rehome_blocks_total",
            "Cumulative rehome plans that resolved to block",
        ))?;

        registry.register(Box::new(events_emitted_total.clone()))?;
        registry.register(Box::new(files_scanned_total.clone()))?;
        registry.register(Box::new(bytes_hashed_total.clone()))?;
        registry.register(Box::new(scan_sessions_active.clone()))?;
        registry.register(Box::new(payloads_indexed_total.clone()))?;
        registry.register(Box::new(link_actions_total.clone()))?;
        registry.register(Box::new(link_bytes_saved_total.clone()))?;
        registry.register(Box::new(rehome_runs_total.clone()))?;
        registry.register(Box::new(rehome_blocks_total.clone()))?;

        Ok(Self {
            inner: std::sync::Arc::new(MetricsInner {
                registry,
                events_emitted_total,
                files_scanned_total,
                bytes_hashed_total,
                scan_sessions_active,
                payloads_indexed_total,
                link_actions_total,
                link_bytes_saved_total,
                rehome_runs_total,
                rehome_blocks_total,
            }),
        })
    }

    /// Record an emitted event by its kind string.
    pub fn record_event(&self, kind: &str) {
        self.inner.events_emitted_total.with_label_values(&[kind]).inc();
    }

    /// Record a scanned file by outcome (`added`, `updated`, `unchanged`,
    /// `deleted`).
    pub fn record_file_scanned(&self, outcome: &str) {
        self.inner
            .files_scanned_total
            .with_label_values(&[outcome])
            .inc();
    }

    /// Record bytes passed through the hasher.
    pub fn record_bytes_hashed(&self, bytes: u64) {
        self.inner.bytes_hashed_total.inc_by(bytes);
    }

    /// Adjust the in-progress scan session gauge.
    pub fn set_scan_sessions_active(&self, count: i64) {
        self.inner.scan_sessions_active.set(count);
    }

    /// Record a payload (re)index.
    pub fn record_payload_indexed(&self) {
        self.inner.payloads_indexed_total.inc();
    }

    /// Record a resolved link action by status.
    pub fn record_link_action(&self, status: &str, bytes_saved: u64) {
        self.inner.link_actions_total.with_label_values(&[status]).inc();
        self.inner.link_bytes_saved_total.inc_by(bytes_saved);
    }

    /// Record a resolved rehome plan by decision.
    pub fn record_rehome_run(&self, decision: &str) {
        self.inner.rehome_runs_total.with_label_values(&[decision]).inc();
        if decision == "block" {
            self.inner.rehome_blocks_total.inc();
        }
    }

    /// Render the Prometheus text exposition format for this registry.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding the collected metric families fails.
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }

    /// Snapshot selected counters/gauges for CLI display.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            bytes_hashed_total: u64::try_from(self.inner.bytes_hashed_total.get()).unwrap_or_default(),
            scan_sessions_active: self.inner.scan_sessions_active.get(),
            payloads_indexed_total: u64::try_from(self.inner.payloads_indexed_total.get())
                .unwrap_or_default(),
            link_bytes_saved_total: u64::try_from(self.inner.link_bytes_saved_total.get())
                .unwrap_or_default(),
            rehome_blocks_total: u64::try_from(self.inner.rehome_blocks_total.get()).unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_recorded_counters() {
        let metrics = Metrics::new().unwrap();
        metrics.record_bytes_hashed(1024);
        metrics.record_payload_indexed();
        metrics.record_link_action("completed", 512);
        metrics.record_rehome_run("block");

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.bytes_hashed_total, 1024);
        assert_eq!(snapshot.payloads_indexed_total, 1);
        assert_eq!(snapshot.link_bytes_saved_total, 512);
        assert_eq!(snapshot.rehome_blocks_total, 1);
    }

    #[test]
    fn render_produces_prometheus_text_format() {
        let metrics = Metrics::new().unwrap();
        metrics.record_event("scan_started");
        let text = metrics.render().unwrap();
        assert!(text.contains("events_emitted_total"));
    }
}
