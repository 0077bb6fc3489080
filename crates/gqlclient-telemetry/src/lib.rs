//! # gqlclient-telemetry
//!
//! Prometheus metrics for the GraphQL client:
//! - Request duration histogram and error counters (overall and per status)
//! - Per-cache hit/miss/eviction/fill-ratio gauges
//! - Connection-pool gauges (configured ceiling and in-flight count)

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod metrics;

pub use metrics::{ClientMetrics, MetricsError};
