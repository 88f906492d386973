use once_cell::sync::Lazy;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, Encoder,
    HistogramOpts, HistogramVec, IntCounter, IntCounterVec, TextEncoder,
};

use crate::backend::ErrorKind;

const DEFAULT_BUCKETS: &[f64] = &[
    1.0, 2.0, 5.0, 10.0, 20.0, 50.0, 100.0, 200.0, 500.0, 1000.0, 2000.0, 5000.0, 10000.0, 30000.0,
    60000.0,
];

// Total number of requests
static REQUESTS: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "http_requests_total",
        "The total number of client requests since the gateway started"
    )
    .unwrap()
});

// Counter for HTTP status codes
static STATUS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "http_status",
        "HTTP status codes per route",
        &[
            "code",  // HTTP status code
            "route", // Matched route pattern
        ]
    )
    .unwrap()
});

// Histogram for request latency
static LATENCY: Lazy<HistogramVec> = Lazy::new(|| {
    let opts = HistogramOpts::new("http_latency", "HTTP request latency in milliseconds per route")
        .buckets(DEFAULT_BUCKETS.to_vec());
    register_histogram_vec!(opts, &["route"]).unwrap()
});

static CACHE_LOOKUPS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "cache_lookups_total",
        "Cache lookups per namespace and result",
        &["namespace", "result"]
    )
    .unwrap()
});

static BACKEND_CALLS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "backend_calls_total",
        "Backend RPC calls per service, method and outcome",
        &["service", "method", "outcome"]
    )
    .unwrap()
});

pub fn record_request(route: &str, code: u16, elapsed_ms: u128) {
    REQUESTS.inc();
    STATUS
        .with_label_values(&[code.to_string().as_str(), route])
        .inc();
    LATENCY
        .with_label_values(&[route])
        .observe(elapsed_ms as f64);
}

pub fn record_cache_lookup(namespace: &str, hit: bool) {
    CACHE_LOOKUPS
        .with_label_values(&[namespace, if hit { "hit" } else { "miss" }])
        .inc();
}

pub fn record_backend_call(service: &str, method: &str, error: Option<ErrorKind>) {
    let outcome = match error {
        None => "ok",
        Some(ErrorKind::NotFound) => "not_found",
        Some(ErrorKind::AlreadyExists) => "already_exists",
        Some(ErrorKind::InvalidState) => "invalid_state",
        Some(ErrorKind::Unauthenticated) => "unauthenticated",
        Some(ErrorKind::Internal) => "internal",
    };
    BACKEND_CALLS
        .with_label_values(&[service, method, outcome])
        .inc();
}

/// Text exposition of every registered metric.
pub fn gather() -> Vec<u8> {
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();
    if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
        log::error!("Failed to encode metrics: {e}");
    }
    buffer
}
