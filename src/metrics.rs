use lazy_static::lazy_static;
use prometheus::{
    Counter, Encoder, Gauge, Histogram, TextEncoder, register_counter, register_gauge,
    register_histogram,
};

lazy_static! {
    pub static ref REQUEST_TOTAL: Counter =
        register_counter!("throttle_requests_total", "Total number of requests").unwrap();
    pub static ref REQUESTS_REJECTED: Counter = register_counter!(
        "throttle_requests_rejected_total",
        "Requests rejected over quota"
    )
    .unwrap();
    pub static ref REQUESTS_FAILED: Counter =
        register_counter!("throttle_requests_failed_total", "Requests failed closed").unwrap();
    pub static ref UPSTREAM_LATENCY: Histogram = register_histogram!(
        "throttle_upstream_latency_seconds",
        "Upstream round trip latency in seconds"
    )
    .unwrap();
    pub static ref TRACKED_KEYS: Gauge = register_gauge!(
        "throttle_tracked_keys",
        "Client keys currently held by the rate tracker"
    )
    .unwrap();
}

// Render the default registry in the prometheus text format
pub fn render() -> Result<String, String> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| format!("Encode Error: {}", e))?;
    String::from_utf8(buffer).map_err(|e| format!("Encode Error: {}", e))
}
