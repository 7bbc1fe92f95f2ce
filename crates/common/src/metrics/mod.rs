//! Metrics and observability utilities
//!
//! Prometheus metrics with SLO-aligned histograms and standardized naming.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all ABC Ledger metrics
pub const METRICS_PREFIX: &str = "abcledger";

/// SLO-aligned histogram buckets for request latency (in seconds)
/// Targets: P50 < 50ms, P99 < 250ms
pub const LATENCY_BUCKETS: &[f64] = &[
    0.001,  // 1ms
    0.005,  // 5ms
    0.010,  // 10ms
    0.025,  // 25ms
    0.050,  // 50ms - P50 target
    0.100,  // 100ms
    0.250,  // 250ms - P99 target
    0.500,  // 500ms
    1.000,  // 1s
    2.500,  // 2.5s
    5.000,  // 5s
];

/// Buckets for narrative generation (hosted model round-trips)
pub const GENERATION_BUCKETS: &[f64] = &[
    0.500,  // 500ms
    1.000,  // 1s
    2.000,  // 2s
    5.000,  // 5s
    10.00,  // 10s
    20.00,  // 20s
    30.00,  // 30s
    60.00,  // 60s
];

/// Register all metric descriptions
pub fn register_metrics() {
    // Request metrics
    describe_counter!(
        format!("{}_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of HTTP requests"
    );

    describe_histogram!(
        format!("{}_request_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "HTTP request latency in seconds"
    );

    // Catalog metrics
    describe_counter!(
        format!("{}_catalog_mutations_total", METRICS_PREFIX),
        Unit::Count,
        "Catalog creates, updates and deletes by kind"
    );

    describe_counter!(
        format!("{}_ownership_denials_total", METRICS_PREFIX),
        Unit::Count,
        "Catalog writes refused by the ownership check"
    );

    // Client metrics
    describe_counter!(
        format!("{}_clients_created_total", METRICS_PREFIX),
        Unit::Count,
        "Client aggregates created"
    );

    describe_counter!(
        format!("{}_client_children_created_total", METRICS_PREFIX),
        Unit::Count,
        "Behaviors, programs and interventions created at intake"
    );

    // Session metrics
    describe_counter!(
        format!("{}_sessions_written_total", METRICS_PREFIX),
        Unit::Count,
        "Session creates and updates"
    );

    describe_counter!(
        format!("{}_session_abc_rows_total", METRICS_PREFIX),
        Unit::Count,
        "ABC rows derived from session forms"
    );

    // Notes metrics
    describe_counter!(
        format!("{}_notes_generations_total", METRICS_PREFIX),
        Unit::Count,
        "Narrative generation calls"
    );

    describe_histogram!(
        format!("{}_notes_generation_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Narrative generation latency in seconds"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record request metrics
pub struct RequestMetrics {
    start: Instant,
    endpoint: String,
    method: String,
}

impl RequestMetrics {
    /// Start tracking a request
    pub fn start(method: &str, endpoint: &str) -> Self {
        Self {
            start: Instant::now(),
            endpoint: endpoint.to_string(),
            method: method.to_string(),
        }
    }

    /// Record request completion
    pub fn finish(self, status: u16) {
        let duration = self.start.elapsed().as_secs_f64();

        counter!(
            format!("{}_requests_total", METRICS_PREFIX),
            "method" => self.method.clone(),
            "endpoint" => self.endpoint.clone(),
            "status" => status.to_string()
        )
        .increment(1);

        histogram!(
            format!("{}_request_duration_seconds", METRICS_PREFIX),
            "method" => self.method,
            "endpoint" => self.endpoint
        )
        .record(duration);
    }
}

/// Helper to record a catalog write
pub fn record_catalog_mutation(kind: &str, operation: &str) {
    counter!(
        format!("{}_catalog_mutations_total", METRICS_PREFIX),
        "kind" => kind.to_string(),
        "operation" => operation.to_string()
    )
    .increment(1);
}

/// Helper to record a refused catalog write
pub fn record_ownership_denial(kind: &str, reason: &str) {
    counter!(
        format!("{}_ownership_denials_total", METRICS_PREFIX),
        "kind" => kind.to_string(),
        "reason" => reason.to_string()
    )
    .increment(1);
}

pub fn record_client_created(behaviors: usize, linked: usize) {
    counter!(format!("{}_clients_created_total", METRICS_PREFIX)).increment(1);

    counter!(
        format!("{}_client_children_created_total", METRICS_PREFIX),
        "child" => "behavior"
    )
    .increment(behaviors as u64);

    counter!(
        format!("{}_client_children_created_total", METRICS_PREFIX),
        "child" => "linked"
    )
    .increment(linked as u64);
}

/// Helper to record session writes
pub fn record_session_write(operation: &str, abc_rows: usize) {
    counter!(
        format!("{}_sessions_written_total", METRICS_PREFIX),
        "operation" => operation.to_string()
    )
    .increment(1);

    counter!(format!("{}_session_abc_rows_total", METRICS_PREFIX)).increment(abc_rows as u64);
}

/// Helper to record narrative generation metrics
pub fn record_generation(duration_secs: f64, model: &str, success: bool) {
    let status = if success { "success" } else { "error" };

    counter!(
        format!("{}_notes_generations_total", METRICS_PREFIX),
        "model" => model.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    if success {
        histogram!(
            format!("{}_notes_generation_duration_seconds", METRICS_PREFIX),
            "model" => model.to_string()
        )
        .record(duration_secs);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latency_buckets() {
        let mut prev = 0.0;
        for &bucket in LATENCY_BUCKETS {
            assert!(bucket > prev);
            prev = bucket;
        }

        assert!(LATENCY_BUCKETS.contains(&0.050));
        assert!(LATENCY_BUCKETS.contains(&0.250));
    }

    #[test]
    fn test_generation_buckets_cover_client_timeout() {
        assert_eq!(GENERATION_BUCKETS.last(), Some(&60.0));
    }

    #[test]
    fn test_request_metrics() {
        let metrics = RequestMetrics::start("GET", "/api/behaviors");
        std::thread::sleep(std::time::Duration::from_millis(10));
        metrics.finish(200);
        // Just verify it runs without panic
    }
}
