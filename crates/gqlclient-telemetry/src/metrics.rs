//! Prometheus metric definitions and recording helpers.

use prometheus::{
    GaugeVec, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
};
use thiserror::Error;

/// Errors raised while registering metrics.
#[derive(Debug, Error)]
pub enum MetricsError {
    /// A collector could not be created or registered.
    #[error("Metrics registration error: {0}")]
    Registration(#[from] prometheus::Error),
}

/// All metrics exposed by one client instance.
pub struct ClientMetrics {
    registry: Registry,
    /// Request round-trip duration in seconds.
    request_duration: Histogram,
    /// Total requests issued.
    requests_total: IntCounter,
    /// Total failed requests.
    errors_total: IntCounter,
    /// Failed requests by HTTP status code.
    errors_by_status: IntCounterVec,
    /// Per-cache gauges, labeled by cache name and gauge kind.
    cache_gauge: GaugeVec,
    /// Configured connection-pool ceiling.
    pool_max_connections: IntGauge,
    /// Requests currently in flight over the pool.
    pool_in_flight: IntGauge,
}

impl ClientMetrics {
    /// Create and register all collectors on a fresh registry.
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let request_duration = Histogram::with_opts(
            HistogramOpts::new(
                "gqlclient_request_duration_seconds",
                "GraphQL request round-trip duration",
            )
            .buckets(vec![
                0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
            ]),
        )?;
        let requests_total = IntCounter::new(
            "gqlclient_requests_total",
            "Total GraphQL requests issued",
        )?;
        let errors_total = IntCounter::new(
            "gqlclient_request_errors_total",
            "Total failed GraphQL requests",
        )?;
        let errors_by_status = IntCounterVec::new(
            Opts::new(
                "gqlclient_request_errors_by_status",
                "Failed GraphQL requests by HTTP status code",
            ),
            &["status"],
        )?;
        let cache_gauge = GaugeVec::new(
            Opts::new("gqlclient_cache", "Per-cache statistics"),
            &["cache", "stat"],
        )?;
        let pool_max_connections = IntGauge::new(
            "gqlclient_pool_max_connections",
            "Configured connection-pool ceiling",
        )?;
        let pool_in_flight = IntGauge::new(
            "gqlclient_pool_in_flight",
            "Requests currently in flight over the pool",
        )?;

        registry.register(Box::new(request_duration.clone()))?;
        registry.register(Box::new(requests_total.clone()))?;
        registry.register(Box::new(errors_total.clone()))?;
        registry.register(Box::new(errors_by_status.clone()))?;
        registry.register(Box::new(cache_gauge.clone()))?;
        registry.register(Box::new(pool_max_connections.clone()))?;
        registry.register(Box::new(pool_in_flight.clone()))?;

        Ok(Self {
            registry,
            request_duration,
            requests_total,
            errors_total,
            errors_by_status,
            cache_gauge,
            pool_max_connections,
            pool_in_flight,
        })
    }

    /// The registry holding every collector, for scraping/exposition.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Record a completed request and its duration.
    pub fn record_request(&self, duration_ms: u64) {
        self.requests_total.inc();
        self.request_duration.observe(duration_ms as f64 / 1000.0);
    }

    /// Record a failed request, with its status code when known.
    pub fn record_error(&self, status: Option<u16>) {
        self.errors_total.inc();
        if let Some(status) = status {
            self.errors_by_status
                .with_label_values(&[&status.to_string()])
                .inc();
        }
    }

    /// Publish one cache's statistics.
    pub fn record_cache_stats(
        &self,
        cache: &str,
        hits: u64,
        misses: u64,
        evictions: u64,
        fill_ratio: f64,
    ) {
        self.cache_gauge
            .with_label_values(&[cache, "hits"])
            .set(hits as f64);
        self.cache_gauge
            .with_label_values(&[cache, "misses"])
            .set(misses as f64);
        self.cache_gauge
            .with_label_values(&[cache, "evictions"])
            .set(evictions as f64);
        self.cache_gauge
            .with_label_values(&[cache, "fill_ratio"])
            .set(fill_ratio);
    }

    /// Set the configured pool ceiling.
    pub fn set_pool_max_connections(&self, max: usize) {
        self.pool_max_connections.set(max as i64);
    }

    /// Track a request entering the pool.
    pub fn request_started(&self) {
        self.pool_in_flight.inc();
    }

    /// Track a request leaving the pool.
    pub fn request_finished(&self) {
        self.pool_in_flight.dec();
    }

    /// Current in-flight request count.
    pub fn in_flight(&self) -> i64 {
        self.pool_in_flight.get()
    }
}

impl std::fmt::Debug for ClientMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientMetrics")
            .field("requests_total", &self.requests_total.get())
            .field("errors_total", &self.errors_total.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_request_and_error() {
        let metrics = ClientMetrics::new().unwrap();

        metrics.record_request(120);
        metrics.record_request(40);
        metrics.record_error(Some(503));
        metrics.record_error(None);

        assert_eq!(metrics.requests_total.get(), 2);
        assert_eq!(metrics.errors_total.get(), 2);
        assert_eq!(
            metrics
                .errors_by_status
                .with_label_values(&["503"])
                .get(),
            1
        );
    }

    #[test]
    fn test_in_flight_tracking() {
        let metrics = ClientMetrics::new().unwrap();
        metrics.set_pool_max_connections(20);
        metrics.request_started();
        metrics.request_started();
        metrics.request_finished();
        assert_eq!(metrics.in_flight(), 1);
    }

    #[test]
    fn test_cache_gauges() {
        let metrics = ClientMetrics::new().unwrap();
        metrics.record_cache_stats("products", 10, 2, 1, 0.5);

        let got = metrics
            .cache_gauge
            .with_label_values(&["products", "hits"])
            .get();
        assert!((got - 10.0).abs() < f64::EPSILON);
    }
}
