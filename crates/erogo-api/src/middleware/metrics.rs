//! # Prometheus Metrics
//!
//! HTTP-level metrics (request counts, latency, errors) are recorded in
//! middleware. Domain-level gauges (disbursements by state, history
//! entries, audit/notification failure counters) are updated on each
//! `/metrics` scrape (pull model) — see the metrics handler in `lib.rs`.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::{MatchedPath, Request};
use axum::middleware::Next;
use axum::response::Response;
use axum::Extension;
use prometheus::{
    Encoder, Gauge, GaugeVec, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};

/// Shared metrics state backed by a Prometheus registry.
#[derive(Clone)]
pub struct ApiMetrics {
    inner: Arc<Inner>,
}

struct Inner {
    registry: Registry,

    // -- HTTP middleware metrics (push model) --
    http_requests_total: IntCounterVec,
    http_request_duration_seconds: HistogramVec,
    http_errors_total: IntCounterVec,

    // -- Domain gauges (pull model, updated on /metrics scrape) --
    disbursements_total: GaugeVec,
    history_entries_total: Gauge,
    audit_failures_total: Gauge,
    notification_failures_total: Gauge,
}

impl std::fmt::Debug for ApiMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiMetrics").finish_non_exhaustive()
    }
}

impl ApiMetrics {
    /// Create a new metrics instance with a fresh Prometheus registry.
    pub fn new() -> Self {
        let registry = Registry::new();

        let http_requests_total = IntCounterVec::new(
            Opts::new("erogo_http_requests_total", "Total HTTP requests"),
            &["method", "path", "status"],
        )
        .expect("metric can be created");

        let http_request_duration_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "erogo_http_request_duration_seconds",
                "HTTP request duration in seconds",
            )
            .buckets(vec![
                0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
            ]),
            &["method", "path"],
        )
        .expect("metric can be created");

        let http_errors_total = IntCounterVec::new(
            Opts::new("erogo_http_errors_total", "Total HTTP errors (4xx and 5xx)"),
            &["method", "path", "status"],
        )
        .expect("metric can be created");

        let disbursements_total = GaugeVec::new(
            Opts::new(
                "erogo_disbursements_total",
                "Disbursement requests by kind and state",
            ),
            &["kind", "state"],
        )
        .expect("metric can be created");

        let history_entries_total = Gauge::new(
            "erogo_history_entries_total",
            "Total history entries recorded",
        )
        .expect("metric can be created");

        let audit_failures_total = Gauge::new(
            "erogo_audit_failures_total",
            "History entries that failed to persist",
        )
        .expect("metric can be created");

        let notification_failures_total = Gauge::new(
            "erogo_notification_failures_total",
            "Notification deliveries that failed",
        )
        .expect("metric can be created");

        registry
            .register(Box::new(http_requests_total.clone()))
            .expect("metric can be registered");
        registry
            .register(Box::new(http_request_duration_seconds.clone()))
            .expect("metric can be registered");
        registry
            .register(Box::new(http_errors_total.clone()))
            .expect("metric can be registered");
        registry
            .register(Box::new(disbursements_total.clone()))
            .expect("metric can be registered");
        registry
            .register(Box::new(history_entries_total.clone()))
            .expect("metric can be registered");
        registry
            .register(Box::new(audit_failures_total.clone()))
            .expect("metric can be registered");
        registry
            .register(Box::new(notification_failures_total.clone()))
            .expect("metric can be registered");

        Self {
            inner: Arc::new(Inner {
                registry,
                http_requests_total,
                http_request_duration_seconds,
                http_errors_total,
                disbursements_total,
                history_entries_total,
                audit_failures_total,
                notification_failures_total,
            }),
        }
    }

    /// Disbursements-by-kind-and-state gauge.
    pub fn disbursements_total(&self) -> &GaugeVec {
        &self.inner.disbursements_total
    }

    /// Total history entries gauge.
    pub fn history_entries_total(&self) -> &Gauge {
        &self.inner.history_entries_total
    }

    /// Audit persistence failure gauge.
    pub fn audit_failures_total(&self) -> &Gauge {
        &self.inner.audit_failures_total
    }

    /// Notification delivery failure gauge.
    pub fn notification_failures_total(&self) -> &Gauge {
        &self.inner.notification_failures_total
    }

    /// Gather and encode all metrics in Prometheus text exposition format.
    pub fn gather_and_encode(&self) -> Result<String, String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder
            .encode(&self.inner.registry.gather(), &mut buffer)
            .map_err(|e| format!("failed to encode metrics: {e}"))?;
        String::from_utf8(buffer).map_err(|e| format!("metrics are not valid UTF-8: {e}"))
    }
}

impl Default for ApiMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Record request count, latency, and error count for every request.
///
/// Uses the matched route pattern (not the raw path) as the `path` label
/// to keep label cardinality bounded.
pub async fn metrics_middleware(
    Extension(metrics): Extension<ApiMetrics>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().to_string();
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());
    let start = Instant::now();

    let response = next.run(request).await;

    let status = response.status().as_u16().to_string();
    metrics
        .inner
        .http_requests_total
        .with_label_values(&[method.as_str(), path.as_str(), status.as_str()])
        .inc();
    metrics
        .inner
        .http_request_duration_seconds
        .with_label_values(&[method.as_str(), path.as_str()])
        .observe(start.elapsed().as_secs_f64());
    if response.status().is_client_error() || response.status().is_server_error() {
        metrics
            .inner
            .http_errors_total
            .with_label_values(&[method.as_str(), path.as_str(), status.as_str()])
            .inc();
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_metrics_encode_cleanly() {
        let metrics = ApiMetrics::new();
        let body = metrics.gather_and_encode().unwrap();
        assert!(body.contains("erogo_history_entries_total"));
    }

    #[test]
    fn gauges_are_settable() {
        let metrics = ApiMetrics::new();
        metrics
            .disbursements_total()
            .with_label_values(&["compensation", "IN_ATTESA"])
            .set(3.0);
        metrics.audit_failures_total().set(1.0);
        let body = metrics.gather_and_encode().unwrap();
        assert!(body.contains("erogo_disbursements_total"));
        assert!(body.contains("erogo_audit_failures_total 1"));
    }
}
