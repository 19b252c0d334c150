//! Prometheus metrics for the status reporter.
//!
//! A custom registry with the `kafka_status` namespace avoids collisions
//! with the default registry. The HTTP middleware feeds the request
//! counter and latency histogram; the status handler feeds the report
//! outcome counter.

use std::sync::Arc;

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};

use crate::status::ReportOutcome;

/// Metrics registry and the instruments registered on it.
pub struct Metrics {
    registry: Registry,
    http_requests: IntCounterVec,
    http_duration: HistogramVec,
    reports: IntCounterVec,
}

/// Shared handle to the metrics registry.
pub type SharedMetrics = Arc<Metrics>;

/// Create and register all metrics.
pub fn create_metrics() -> Result<SharedMetrics, prometheus::Error> {
    let registry = Registry::new_custom(Some("kafka_status".to_string()), None)?;

    let http_requests = IntCounterVec::new(
        Opts::new("http_requests_total", "HTTP requests by path and status"),
        &["path", "status"],
    )?;
    registry.register(Box::new(http_requests.clone()))?;

    let http_duration = HistogramVec::new(
        HistogramOpts::new(
            "http_request_duration_seconds",
            "HTTP request latency by path",
        ),
        &["path"],
    )?;
    registry.register(Box::new(http_duration.clone()))?;

    let reports = IntCounterVec::new(
        Opts::new("reports_total", "Status report generations by outcome"),
        &["outcome"],
    )?;
    registry.register(Box::new(reports.clone()))?;

    Ok(Arc::new(Metrics {
        registry,
        http_requests,
        http_duration,
        reports,
    }))
}

impl Metrics {
    /// Record one served HTTP request.
    pub fn record_http(&self, path: &str, status: u16, seconds: f64) {
        self.http_requests
            .with_label_values(&[path, &status.to_string()])
            .inc();
        self.http_duration
            .with_label_values(&[path])
            .observe(seconds);
    }

    /// Record how a report generation ended.
    pub fn record_report(&self, outcome: ReportOutcome) {
        self.reports.with_label_values(&[outcome.label()]).inc();
    }

    /// Current report-outcome count for a label; used by tests.
    pub fn report_count(&self, label: &str) -> u64 {
        self.reports.with_label_values(&[label]).get()
    }

    /// Encode all registered metrics in Prometheus text format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        String::from_utf8(buf).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
