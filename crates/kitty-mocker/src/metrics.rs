//! Prometheus metrics for kitty-mocker.
//!
//! Tracks served requests, live mockers and port allocation activity.
//! Exposed on a dedicated listener when `metrics_port` is configured.

use anyhow::Context;
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_histogram_vec, register_int_counter_vec, register_int_gauge,
    CounterVec, Encoder, HistogramVec, IntCounterVec, IntGauge, TextEncoder,
};
use std::convert::Infallible;
use tracing::{debug, info};

use crate::allocator::bind_port;
use crate::response::build_response_with_headers;

lazy_static! {
    /// Total number of requests answered by mockers and the root dispatcher
    pub static ref REQUESTS_TOTAL: CounterVec = register_counter_vec!(
        "kitty_requests_total",
        "Total number of requests answered",
        &["method", "status"]
    )
    .unwrap();

    /// Time from request receipt to response handoff
    pub static ref REQUEST_DURATION_MS: HistogramVec = register_histogram_vec!(
        "kitty_request_duration_ms",
        "Request processing time in milliseconds",
        &["method"],
        vec![0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0]
    )
    .unwrap();

    /// Mockers currently listening
    pub static ref ACTIVE_MOCKERS: IntGauge = register_int_gauge!(
        "kitty_active_mockers",
        "Number of live mockers"
    )
    .unwrap();

    /// Bind attempts made by the port allocator
    pub static ref PORT_BIND_ATTEMPTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "kitty_port_bind_attempts_total",
        "Port bind attempts by outcome",
        &["result"]  // result: bound|in_use|error
    )
    .unwrap();
}

/// Collect and return all metrics in Prometheus text format
pub fn collect_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        debug!("Failed to encode metrics: {}", e);
    }
    String::from_utf8(buffer).unwrap_or_default()
}

/// Helper to record an answered request
pub fn record_request(method: &str, status: u16, duration_ms: f64) {
    REQUESTS_TOTAL
        .with_label_values(&[method, &status.to_string()])
        .inc();
    REQUEST_DURATION_MS
        .with_label_values(&[method])
        .observe(duration_ms);
}

/// Helper to record a bind attempt
pub fn record_bind_attempt(result: &str) {
    PORT_BIND_ATTEMPTS_TOTAL.with_label_values(&[result]).inc();
}

pub fn mocker_started() {
    ACTIVE_MOCKERS.inc();
}

pub fn mocker_stopped() {
    ACTIVE_MOCKERS.dec();
}

/// Standalone `/metrics` listener.
pub struct MetricsServer {
    host: String,
    port: u16,
}

impl MetricsServer {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub async fn run(self) -> Result<(), anyhow::Error> {
        let listener = bind_port(&self.host, self.port)
            .await
            .with_context(|| format!("failed to bind metrics port {}", self.port))?;
        info!("Metrics listening on http://{}/metrics", listener.local_addr()?);

        loop {
            let (stream, _) = listener.accept().await?;
            let io = TokioIo::new(stream);

            tokio::spawn(async move {
                let service = service_fn(handle_metrics_request);
                if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                    debug!("Metrics connection error: {}", e);
                }
            });
        }
    }
}

async fn handle_metrics_request(
    req: Request<Incoming>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let response = match (req.method(), req.uri().path()) {
        (&Method::GET, "/metrics") => build_response_with_headers(
            StatusCode::OK,
            [("Content-Type", "text/plain; version=0.0.4")],
            collect_metrics(),
        ),
        _ => build_response_with_headers(
            StatusCode::NOT_FOUND,
            [("Content-Type", "text/plain")],
            "Not found",
        ),
    };
    Ok(response)
}
